//! lessonkit CLI: play lessons in the terminal and manage lesson files.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lessonkit", version, about = "Interactive lesson player")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a lesson interactively
    Play {
        /// Path to a lesson .toml or .json file
        lesson: Option<PathBuf>,

        /// Fetch the lesson from the backend instead of a file
        #[arg(long, conflicts_with = "lesson")]
        lesson_id: Option<String>,

        /// Show every question with its answer revealed
        #[arg(long)]
        reveal: bool,

        /// Do not contact the backend; remote-graded answers fail
        #[arg(long)]
        offline: bool,

        /// Write the run report as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate lesson files
    Validate {
        /// Path to a lesson file or directory
        path: PathBuf,
    },

    /// Show a saved run report
    Report {
        /// Report JSON written by `play --output`
        path: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Manage the backend bearer token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Create a starter config and example lesson
    Init,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a token
    Set {
        /// The token; read from stdin when omitted
        token: Option<String>,
    },
    /// Remove the stored token
    Clear,
    /// Show the stored token, masked
    Show,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "lessonkit=info"
                    .parse()
                    .unwrap_or_else(|_| tracing::level_filters::LevelFilter::INFO.into()),
            ),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Play {
            lesson,
            lesson_id,
            reveal,
            offline,
            output,
        } => commands::play::execute(lesson, lesson_id, reveal, offline, output, config).await,
        Commands::Validate { path } => commands::validate::execute(path),
        Commands::Report { path, format } => commands::report::execute(path, format),
        Commands::Token { action } => match action {
            TokenAction::Set { token } => commands::token::set(token, config).await,
            TokenAction::Clear => commands::token::clear(config).await,
            TokenAction::Show => commands::token::show(config).await,
        },
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
