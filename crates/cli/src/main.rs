mod answers;
mod commands;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use intake_engine::{EngineConfig, FormSchema, Wizard};
use tracing_subscriber::EnvFilter;

/// Exit code for validation and submission failures.
pub(crate) const EXIT_FAILED: i32 = 1;
/// Exit code for bad arguments, unreadable inputs and configuration errors.
pub(crate) const EXIT_USAGE: i32 = 2;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Multi-step application intake: validate and submit wizard answers.
#[derive(Parser)]
#[command(
    name = "intake",
    version,
    about = "Multi-step application intake: validate and submit wizard answers"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in forms
    Forms,

    /// Show the steps and fields of a form
    Schema {
        /// Form name (see `intake forms`)
        form: String,
    },

    /// Validate an answers document against every step of a form
    Validate {
        /// Form name (see `intake forms`)
        form: String,
        /// Path to the answers JSON file
        #[arg(long)]
        answers: PathBuf,
        /// Engine configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Walk the wizard step by step with an answers document and submit
    Submit {
        /// Form name (see `intake forms`)
        form: String,
        /// Path to the answers JSON file
        #[arg(long)]
        answers: PathBuf,
        /// Serve directory, registry and geographic data from a fixture file
        #[arg(long)]
        fixtures: Option<PathBuf>,
        /// Engine configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Forms => {
            commands::forms::cmd_forms(cli.output);
        }
        Commands::Schema { form } => {
            commands::schema::cmd_schema(&form, cli.output, cli.quiet);
        }
        Commands::Validate {
            form,
            answers,
            config,
        } => {
            commands::validate::cmd_validate(
                &form,
                &answers,
                config.as_deref(),
                cli.output,
                cli.quiet,
            );
        }
        Commands::Submit {
            form,
            answers,
            fixtures,
            config,
        } => {
            commands::submit::cmd_submit(commands::submit::SubmitOptions {
                form: &form,
                answers: &answers,
                fixtures: fixtures.as_deref(),
                config: config.as_deref(),
                output: cli.output,
                quiet: cli.quiet,
            });
        }
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// the default directive.
fn init_tracing(quiet: bool) {
    let default = if quiet { "intake=error" } else { "intake=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Resolve a form name or exit with a usage error.
pub(crate) fn resolve_form(name: &str, output: OutputFormat, quiet: bool) -> FormSchema {
    match intake_engine::forms::by_name(name) {
        Some(schema) => schema,
        None => {
            let msg = format!(
                "error: unknown form '{}'. Available: {}",
                name,
                intake_engine::forms::NAMES.join(", ")
            );
            report_error(&msg, output, quiet);
            process::exit(EXIT_USAGE);
        }
    }
}

/// Load the engine configuration: the given file, or defaults, plus
/// `INTAKE_*` environment overrides.
pub(crate) fn load_config(path: Option<&Path>, output: OutputFormat, quiet: bool) -> EngineConfig {
    let loaded = match path {
        Some(p) => EngineConfig::load(p),
        None => EngineConfig::from_env(),
    };
    match loaded {
        Ok(config) => config,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(EXIT_USAGE);
        }
    }
}

pub(crate) fn open_wizard(
    schema: FormSchema,
    config: &EngineConfig,
    output: OutputFormat,
    quiet: bool,
) -> Wizard {
    match Wizard::new(schema, config) {
        Ok(w) => w,
        Err(e) => {
            report_error(&format!("internal error: invalid form schema: {}", e), output, quiet);
            process::exit(EXIT_FAILED);
        }
    }
}
