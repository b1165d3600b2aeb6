//! Server configuration.

use std::path::PathBuf;

/// Runtime configuration of the server kernel.
///
/// Assembled from the command line by the binary; see `main.rs`.
#[derive(Clone, Debug)]
pub struct Config {
    /// The OPER password. The empty default disables OPER, since no argument
    /// on the wire can be empty.
    pub password: String,

    /// Where the message of the day is read from, on every use.
    pub motd_path: PathBuf,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            password: String::new(),
            motd_path: PathBuf::from("motd.txt"),
        }
    }
}
