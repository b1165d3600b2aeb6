use clap::Parser;
use ferric::{net, Config, State, Trace};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A fast, single-process IRC relay server.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Which port to bind on.
    #[arg(short = 'p', default_value_t = 6667)]
    port: u16,

    /// Operator password; the empty default disables OPER.
    #[arg(short = 'o', default_value = "")]
    operator_password: String,

    /// Path to the trace file.
    #[arg(short = 't')]
    trace: Option<PathBuf>,

    /// Message of the day file.
    #[arg(short = 'm', default_value = "motd.txt")]
    motd: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let trace = match args.trace {
        Some(path) => match Trace::create(&path) {
            Ok(trace) => Some(Arc::new(trace)),
            Err(err) => {
                log::error!("failed to create trace file {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let config = Config {
        password: args.operator_password,
        motd_path: args.motd,
    };
    let state = State::new(config, trace.clone());

    let listener = match TcpListener::bind(("0.0.0.0", args.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("failed to bind port {}: {}", args.port, err);
            return ExitCode::FAILURE;
        }
    };
    match listener.local_addr() {
        Ok(addr) => println!("Listening on {}", addr),
        Err(_) => println!("Listening on port {}", args.port),
    }

    if let Err(err) = net::serve(listener, state, trace).await {
        log::error!("accept failed: {}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
