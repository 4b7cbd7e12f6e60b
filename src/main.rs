// Semdev CLI
// list-devices / debug-events / ptraccel debug tools

use clap::{Parser, Subcommand, ValueEnum};

mod cli;

#[derive(Parser, Debug)]
#[command(name = "semdev")]
#[command(about = "Semantic input-device event tools", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProfileArg {
    SmoothSimple,
    Linear,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List input devices and their capabilities
    ListDevices,
    /// Print the semantic event stream
    DebugEvents {
        /// Only open these device nodes instead of enumerating
        #[arg(short, long, value_name = "PATH")]
        device: Vec<std::path::PathBuf>,
        /// Enable tapping on all touchpads
        #[arg(long)]
        enable_tap: bool,
        /// Enable natural scrolling on all devices
        #[arg(long)]
        natural_scroll: bool,
    },
    /// Drive the pointer-acceleration filter and emit gnuplot data
    Ptraccel {
        /// Acceleration profile to plot
        #[arg(long, value_enum, default_value_t = ProfileArg::SmoothSimple)]
        profile: ProfileArg,
        /// Device resolution for the smooth-simple profile
        #[arg(long, default_value_t = 400)]
        dpi: u32,
        /// Speed setting in [-1, 1]
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        speed: f64,
    },
}

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Warn);
    }
    builder.init();

    let result = match args.command {
        Command::ListDevices => cli::list_devices::run(),
        Command::DebugEvents {
            device,
            enable_tap,
            natural_scroll,
        } => cli::debug_events::run(&device, enable_tap, natural_scroll),
        Command::Ptraccel { profile, dpi, speed } => {
            let profile = match profile {
                ProfileArg::SmoothSimple => semdev_core::AccelProfile::SmoothSimple,
                ProfileArg::Linear => semdev_core::AccelProfile::Linear,
            };
            cli::ptraccel::run(profile, dpi, speed)
        }
    };

    if let Err(e) = result {
        eprintln!("semdev: {}", e);
        std::process::exit(1);
    }
}
