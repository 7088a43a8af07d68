// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chunkwise::app_config::{Config, LogLevel, TranslatorKind};
use chunkwise::app_controller::Controller;
use chunkwise::errors::{AppError, RunError};

/// CLI Wrapper for TranslatorKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslator {
    Passthrough,
    Command,
    Http,
}

impl From<CliTranslator> for TranslatorKind {
    fn from(cli_translator: CliTranslator) -> Self {
        match cli_translator {
            CliTranslator::Passthrough => TranslatorKind::Passthrough,
            CliTranslator::Command => TranslatorKind::Command,
            CliTranslator::Http => TranslatorKind::Http,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a subtitle file chunk by chunk, resuming earlier progress (default command)
    #[command(alias = "translate")]
    Run {
        /// Input SRT file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Discard persisted progress and split again
        #[arg(long, alias = "fresh")]
        restart: bool,
    },

    /// Show persisted progress for a subtitle file
    Status {
        /// Input SRT file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Generate shell completions for chunkwise
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// chunkwise - resumable chunked subtitle translation
///
/// Splits an SRT file into overlapping chunks, hands each chunk to a translator,
/// validates every result against the source and joins the validated chunks.
#[derive(Parser, Debug)]
#[command(name = "chunkwise")]
#[command(version)]
#[command(about = "Resumable chunked subtitle translation")]
#[command(long_about = "chunkwise splits an SRT file into overlapping chunks, sends them to a translator
one at a time, checks that every translated chunk keeps the source structure and timing, and
joins the validated chunks into the output file. Interrupted runs resume where they stopped.

EXAMPLES:
    chunkwise movie.srt                          # Translate using conf.json
    chunkwise run --restart movie.srt            # Discard earlier progress
    chunkwise -t pt --translator command movie.srt
    chunkwise status movie.srt                   # Show persisted progress
    chunkwise completions bash > chunkwise.bash  # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

TRANSLATORS:
    passthrough - Returns chunks unchanged (dry run)
    command     - Runs an external program per chunk
    http        - Posts chunks to a remote translation agent")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input SRT file (same as `run INPUT`)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json", global = true)]
    config_path: String,

    /// Directory for the translated file
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Target language code (e.g., 'fr', 'pt', 'spa')
    #[arg(short, long, global = true)]
    target_language: Option<String>,

    /// Translator to use
    #[arg(long, value_enum, global = true)]
    translator: Option<CliTranslator>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // The level is lowered or raised once the config is known
    if CustomLogger::init(LevelFilter::Trace).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }

    let cli = CommandLineOptions::parse();

    let outcome = match &cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(*shell, &mut cmd, "chunkwise", &mut std::io::stdout());
            return ExitCode::SUCCESS;
        }
        Some(Commands::Run { input, restart }) => run_translate(&cli, input, *restart).await,
        Some(Commands::Status { input }) => show_status(&cli, input),
        None => match &cli.input {
            Some(input) => run_translate(&cli, input, false).await,
            None => Err(anyhow!("INPUT is required when no subcommand is specified")),
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            exit_code_for(&e)
        }
    }
}

/// 2 when a chunk exhausted its attempts, 3 when the translator aborted, 1 otherwise
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<AppError>() {
        Some(AppError::Run(RunError::RetryExhausted { .. } | RunError::PreviouslyFailed { .. })) => ExitCode::from(2),
        Some(AppError::Run(RunError::TranslatorAborted { .. })) => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

async fn run_translate(options: &CommandLineOptions, input: &Path, restart: bool) -> Result<()> {
    let config = load_config(options)?;
    let controller = Controller::with_config(config)?;

    let report = controller
        .run(input, options.output_dir.as_deref(), restart)
        .await?;
    info!("Success: {}", report.output_path.display());

    Ok(())
}

fn show_status(options: &CommandLineOptions, input: &Path) -> Result<()> {
    let config = load_config(options)?;
    let controller = Controller::with_config(config)?;

    match controller.status(input)? {
        None => println!("No run found for {}", input.display()),
        Some(status) => print!("{}", status),
    }

    Ok(())
}

/// Load the config file (or create it with defaults) and apply CLI overrides
fn load_config(options: &CommandLineOptions) -> Result<Config> {
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;

        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    if let Some(target_language) = &options.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(translator) = &options.translator {
        config.translator.kind = translator.clone().into();
    }
    if let Some(output_dir) = &options.output_dir {
        config.output_dir = Some(output_dir.clone());
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    log::set_max_level(config.log_level.to_level_filter());

    config.validate().context("Configuration validation failed")?;

    Ok(config)
}
