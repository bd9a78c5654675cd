// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

mod cli;

#[derive(Parser)]
#[command(name = "depth-relay")]
#[command(about = "Kinect depth segmentation, blob tracking and live depth streaming")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Args, Debug, Default)]
struct SessionArgs {
    /// Use the generated demo scene instead of a Kinect
    #[arg(long, global = true)]
    synthetic: bool,

    /// Depth video node of the Kinect to use (from 'depth-relay list')
    #[arg(long, global = true)]
    device: Option<String>,

    /// GStreamer sink description replacing the PipeWire output
    #[arg(long, global = true)]
    sink: Option<String>,

    /// Process frames without streaming them
    #[arg(long, global = true)]
    no_stream: bool,

    /// Write the effective settings to the config file
    #[arg(long, global = true)]
    save_config: bool,
}

impl From<&SessionArgs> for cli::Overrides {
    fn from(args: &SessionArgs) -> Self {
        Self {
            synthetic: args.synthetic,
            device: args.device.clone(),
            sink: args.sink.clone(),
            no_stream: args.no_stream,
            save_config: args.save_config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run with the terminal viewer (default)
    Run,

    /// Stream without a user interface
    Headless {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// List Kinect devices
    List,

    /// Print the effective settings
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = cli::Overrides::from(&cli.session);

    match cli.command {
        None | Some(Commands::Run) => {
            init_file_logging()?;
            let settings = cli::load_settings(&overrides)?;
            let mut app = cli::build_app(settings, &overrides)?;
            depth_relay::terminal::run(&mut app)
        }
        Some(Commands::Headless { duration }) => {
            init_stderr_logging();
            let settings = cli::load_settings(&overrides)?;
            let mut app = cli::build_app(settings, &overrides)?;

            let stop = Arc::new(AtomicBool::new(false));
            let handler_stop = Arc::clone(&stop);
            ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))?;

            app.run_headless(duration.map(Duration::from_secs), &stop)?;
            Ok(())
        }
        Some(Commands::List) => {
            init_stderr_logging();
            cli::list_devices()
        }
        Some(Commands::Config) => {
            init_stderr_logging();
            let settings = cli::load_settings(&overrides)?;
            cli::print_config(&settings)
        }
    }
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    // RUST_LOG=debug, RUST_LOG=depth_relay=trace, ...
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

/// The terminal viewer owns the screen, so logs go to a file
fn init_file_logging() -> Result<(), Box<dyn std::error::Error>> {
    let dir = cli::log_directory();
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::File::create(dir.join("depth-relay.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .init();
    Ok(())
}
