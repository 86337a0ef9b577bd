use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use streetsphere::config::{self, Config, ConfigError};
use streetsphere::output;
use streetsphere::process::{self, ErrorClass, ProcessError, ProcessOptions};
use thiserror::Error;

/// Shared flags for commands that plan a canvas.
#[derive(clap::Args, Clone)]
struct PaddingArgs {
    /// Round the canvas height up to a multiple of N (overrides config)
    #[arg(long, value_name = "N")]
    alignment: Option<u32>,
}

#[derive(Parser)]
#[command(name = "streetsphere")]
#[command(about = "Pad photos onto 2:1 canvases for Street View and Photo Sphere viewers")]
#[command(long_about = "\
Pad photos onto 2:1 canvases for Street View and Photo Sphere viewers

Each photo is centered on a canvas twice as wide as it is tall and written to
its own bundle directory together with the GPano crop fields:

  dist/
  └── photosphere-streetview-IMG_0042/
      ├── IMG_0042.jpg        # padded canvas, same format as the source
      ├── streetview.html     # fields, XMP packet, exiftool command
      └── IMG_0042.xmp        # GPano sidecar

Canvas height = max(height, ceil(width / 2)), width = 2 x height. The photo
sits centered; odd padding goes right and bottom.

Run 'streetsphere gen-config' to generate a documented streetsphere.toml.")]
#[command(version = env!("STREETSPHERE_VERSION"))]
struct Cli {
    /// Config file; a missing file means stock defaults
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pad images (or directories of images) into bundles
    Convert {
        /// Image files or directories to walk
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,

        #[command(flatten)]
        padding: PaddingArgs,

        /// Disable the padding cache and re-encode every image
        #[arg(long)]
        no_cache: bool,
    },
    /// Show the canvas an image would get, reading only its header
    Inspect {
        input: PathBuf,

        #[command(flatten)]
        padding: PaddingArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock streetsphere.toml with all options documented
    GenConfig,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Process(#[from] ProcessError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn class(&self) -> ErrorClass {
        match self {
            CliError::Config(ConfigError::Io(_)) | CliError::Json(_) => ErrorClass::Internal,
            CliError::Config(_) => ErrorClass::Input,
            CliError::Process(e) => e.class(),
        }
    }
}

fn exit_code(class: ErrorClass) -> ExitCode {
    match class {
        ErrorClass::Input => ExitCode::from(2),
        ErrorClass::Internal => ExitCode::from(1),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(class)) => exit_code(class),
        Err(e) => {
            eprintln!("error: {e}");
            exit_code(e.class())
        }
    }
}

/// Run a command, returning the worst failure class of a partial batch.
fn run(cli: Cli) -> Result<Option<ErrorClass>, CliError> {
    match cli.command {
        Command::Convert {
            inputs,
            output,
            padding,
            no_cache,
        } => {
            let config = load_config(&cli.config, &padding)?;
            init_thread_pool(&config.processing);

            let generator = format!("streetsphere {}", env!("STREETSPHERE_VERSION"));
            let options = ProcessOptions {
                output_dir: &output,
                use_cache: !no_cache,
                generator: Some(generator.as_str()),
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_process_event(&event);
                }
            });
            let result = process::process(&inputs, &config, &options, Some(tx));
            if printer.join().is_err() {
                log::warn!("progress printer panicked");
            }
            let result = result?;

            output::print_convert_summary(&result);
            Ok(result.worst_failure())
        }
        Command::Inspect {
            input,
            padding,
            json,
        } => {
            let config = load_config(&cli.config, &padding)?;
            let report = process::inspect(&input, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_inspection(&report);
            }
            Ok(None)
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(None)
        }
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(path: &std::path::Path, padding: &PaddingArgs) -> Result<Config, ConfigError> {
    let mut config = config::load_config(path)?;
    if let Some(alignment) = padding.alignment {
        config.padding.alignment = alignment;
        config.validate()?;
    }
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
