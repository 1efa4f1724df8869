//! coax3174 command line entry point

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use coax3174::link::{open_serial, DeviceLink};
use coax3174::{Controller, ControllerConfig, HostSpec};

/// Attach an IBM 3270 terminal to a TN3270 host or a local process
#[derive(Parser, Debug)]
#[command(name = "coax3174")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "3174 controller replacement for a serial coax interface", long_about = None)]
struct Args {
    /// Serial port of the coax interface
    serial_port: PathBuf,

    /// Configuration file, instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG when absent
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    host: HostCommand,
}

#[derive(Subcommand, Debug)]
enum HostCommand {
    /// Connect to a TN3270 host
    Tn3270 {
        /// host[:port], port 23 by default
        host: String,
    },
    /// Run a local process with VT100 emulation
    Vt100 {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl From<HostCommand> for HostSpec {
    fn from(command: HostCommand) -> Self {
        match command {
            HostCommand::Tn3270 { host } => HostSpec::Tn3270 { address: host },
            HostCommand::Vt100 { command, args } => HostSpec::Vt100 { command, args },
        }
    }
}

fn init_logging(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = ControllerConfig::load(args.config.as_deref()).context("unable to load configuration")?;

    let interface = open_serial(&args.serial_port, config.serial_baud_rate)
        .with_context(|| format!("unable to open {}", args.serial_port.display()))?;
    let link = DeviceLink::new(interface, config.receive_timeout());

    let mut controller = Controller::new(link, config);
    let shutdown = controller.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let spec = HostSpec::from(args.host);
    tokio::task::spawn_blocking(move || controller.run(&spec))
        .await
        .context("controller task failed")??;

    info!("Controller stopped");
    Ok(())
}
