//! The conformance trace sink.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tokio::sync::{Mutex, MutexGuard};

/// A sink that records every line crossing the server.
///
/// The async mutex serializes whole commands: the reader holds it from the
/// moment the input record is written until the handler returns, so the
/// records of one command never interleave with another's and every response
/// record follows the input that caused it. The inner lock only guards the
/// file handle.
pub struct Trace {
    commands: Mutex<()>,
    file: std::sync::Mutex<File>,
}

impl Trace {
    pub fn create(path: &Path) -> io::Result<Trace> {
        Ok(Trace {
            commands: Mutex::new(()),
            file: std::sync::Mutex::new(File::create(path)?),
        })
    }

    /// Takes the per-command serialization lock.
    pub async fn serialized(&self) -> MutexGuard<'_, ()> {
        self.commands.lock().await
    }

    /// Records a client-to-server line.
    pub fn input(&self, key: usize, line: &str) {
        self.record(format_args!("S <- {key}  {line}"));
    }

    /// Records a server-to-client line, CRLF excluded.
    pub fn output(&self, key: usize, line: &str) {
        let line = line.strip_suffix("\r\n").unwrap_or(line);
        self.record(format_args!("S -> {key}  {line}"));
    }

    fn record(&self, args: fmt::Arguments<'_>) {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(file, "{args}") {
            log::warn!("failed to write trace record: {err}");
        }
    }
}
