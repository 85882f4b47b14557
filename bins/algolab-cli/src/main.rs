mod commands;

use algolab_common::config::{EngineKind, HarnessConfig};
use algolab_common::types::Language;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "algolab")]
#[command(about = "Algolab - Run and grade solutions against test cases", long_about = None)]
struct Cli {
    /// Execution backend (process, docker); overrides ALGOLAB_ENGINE
    #[arg(long, global = true)]
    engine: Option<EngineKind>,

    /// Per-test wall-clock limit in milliseconds; overrides ALGOLAB_TIMEOUT_MS
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Print machine-readable JSON instead of a report
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a sumArray solution against a test file
    Run {
        /// JavaScript source file
        #[arg(short, long)]
        code: PathBuf,

        /// JSON array of test cases
        #[arg(short, long)]
        tests: PathBuf,
    },

    /// Grade a solution for a built-in problem (sumArray, fibonacci, sortArray)
    Problem {
        /// JavaScript source file
        #[arg(short, long)]
        code: PathBuf,

        /// Problem name
        #[arg(short, long)]
        problem: String,

        /// Custom test cases replacing the problem's defaults
        #[arg(short, long)]
        tests: Option<PathBuf>,
    },

    /// Wrap arbitrary code in the generated harness and grade it
    Exec {
        /// Source file
        #[arg(short, long)]
        code: PathBuf,

        /// Language (javascript, typescript, python)
        #[arg(short, long)]
        language: Language,

        /// JSON array of test cases
        #[arg(short, long)]
        tests: PathBuf,
    },

    /// Print the program generated for a source file
    Wrap {
        /// Source file
        #[arg(short, long)]
        code: PathBuf,

        /// Language name; unsupported names print the code unchanged
        #[arg(short, long)]
        language: String,
    },

    /// Print the value a raw input string coerces to
    Coerce {
        /// Raw input text
        input: String,
    },

    /// Show which function the harness would call
    Detect {
        /// Source file
        #[arg(short, long)]
        code: PathBuf,

        /// Language (javascript, typescript, python)
        #[arg(short, long)]
        language: Language,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = HarnessConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        anyhow::anyhow!(e)
    })?;
    if let Some(engine) = cli.engine {
        config.engine = engine;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        if timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        config.timeout_ms = timeout_ms;
    }

    let all_passed = match cli.command {
        Commands::Run { code, tests } => {
            commands::run(&config, &code, &tests, cli.json).await?
        }
        Commands::Problem {
            code,
            problem,
            tests,
        } => commands::problem(&config, &code, &problem, tests.as_deref(), cli.json).await?,
        Commands::Exec {
            code,
            language,
            tests,
        } => commands::exec(&config, &code, language, &tests, cli.json).await?,
        Commands::Wrap { code, language } => {
            commands::wrap(&code, &language)?;
            true
        }
        Commands::Coerce { input } => {
            commands::coerce(&input)?;
            true
        }
        Commands::Detect { code, language } => {
            commands::detect(&code, language, cli.json)?;
            true
        }
    };

    if !all_passed {
        std::process::exit(1);
    }

    Ok(())
}
