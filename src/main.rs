use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use safedash::cli;
use safedash::web;

#[derive(Debug, Parser)]
#[command(name = "safedash")]
#[command(about = "Safety analytics dashboard: charts, uploads and streamed insights")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every dashboard resource once and print the result
    Refresh {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Upload an Excel workbook (.xlsx/.xls), then refresh
    Upload {
        file: PathBuf,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Ask a question and stream the answer
    Chat {
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,
        /// Model to request instead of chat.model
        #[arg(long)]
        model: Option<String>,
    },
    /// Stream insights for one chart
    Insights {
        /// Resource key, see `safedash resources`
        chart_key: String,
        /// Ask for the short form
        #[arg(long)]
        brief: bool,
    },
    /// List the dashboard resources
    Resources,
    /// Serve the web dashboard
    Serve {
        #[arg(long, default_value = web::DEFAULT_ADDR)]
        addr: String,
        /// Open the dashboard in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Show refresh and streaming statistics from the event log
    Stats {
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
        /// Only include the last N days of data
        #[arg(long)]
        days: Option<u32>,
    },
    /// Check configuration and backend connectivity
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default ~/.safedash/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `dashboard.settlement per-resource`
    Set { key: String, value: String },
    /// Restore the default configuration
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Refresh { format } => {
            cli::run_refresh(cli::OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Upload { file, format } => {
            cli::run_upload(&file, cli::OutputFormat::from_str_opt(Some(&format)))
        }
        Commands::Chat { question, model } => cli::run_chat(&question.join(" "), model),
        Commands::Insights { chart_key, brief } => cli::run_insights(&chart_key, brief),
        Commands::Resources => cli::run_resources(),
        Commands::Serve { addr, open } => cli::run_serve(&addr, open),
        Commands::Stats { format, days } => {
            cli::run_stats(cli::OutputFormat::from_str_opt(Some(&format)), days)
        }
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
