//! `CallScope` dashboard CLI
//!
//! Renders the sales-call dashboard for an organization in the terminal.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use callscope_core::{Config, DateFilter, Error, OrganizationId, Result};
use callscope_dashboard::{
    AnalysisComplete, AnalysisEventBus, DashboardApi, LogNotifier, MockDashboardApi,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Command line interface for the dashboard
#[derive(Parser)]
#[command(
    name = "callscope-dashboard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sales-call analytics dashboard",
    long_about = "Fetches dashboard metrics, sentiment trends, objections and transcripts for an organization and renders them in the terminal."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log format (json, pretty); overrides the config file
    #[arg(long)]
    log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Render the dashboard
    Show {
        /// Organization id
        #[arg(short, long, default_value = "")]
        org: String,

        /// Date filter token (today, yesterday, this_week, last_15days, this_month, all)
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Transcript page
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Print the view model as JSON
        #[arg(long)]
        json: bool,

        /// Use built-in sample data instead of the backend
        #[arg(long)]
        demo: bool,

        /// Publish an analysis-complete event before rendering
        #[arg(long)]
        analysis_complete: bool,
    },

    /// List the date filters
    Filters {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Main entry point for the dashboard CLI
///
/// # Errors
///
/// Returns error if configuration, logging or output fails
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    callscope_core::init_logging(&config.logging)?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Show {
            org,
            filter,
            page,
            json,
            demo,
            analysis_complete,
        } => {
            let options = ShowOptions {
                page,
                json,
                demo,
                analysis_complete,
            };
            show(&config, OrganizationId::from(org), &filter, &options).await
        }
        Commands::Filters { json } => list_filters(json),
    }
}

struct ShowOptions {
    page: u32,
    json: bool,
    demo: bool,
    analysis_complete: bool,
}

async fn show(
    config: &Config,
    org: OrganizationId,
    filter: &str,
    options: &ShowOptions,
) -> Result<()> {
    let notifier = Arc::new(LogNotifier);
    let controller = if options.demo {
        info!("using built-in sample data");
        let api: Arc<dyn DashboardApi> = Arc::new(MockDashboardApi::demo());
        callscope_dashboard::with_api(config, api, org, notifier)
    } else {
        callscope_dashboard::connect(config, org, notifier)?
    };

    let filter = DateFilter::parse(filter);
    if !filter.is_all() {
        controller.change_filter(filter).await;
    }
    controller.set_page(options.page);

    let bus = AnalysisEventBus::from_config(&config.dashboard);
    let listener = controller.listen(&bus);

    let mut screen = controller.load().await;
    if options.analysis_complete {
        let mut refreshes = controller.refreshes();
        let handled = *refreshes.borrow_and_update();
        bus.publish(AnalysisComplete::new());
        refreshes
            .wait_for(|done| *done > handled)
            .await
            .map_err(|_| Error::Other("dashboard closed before the refresh finished".to_string()))?;
        screen = controller.load().await;
    }
    listener.shutdown().await;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&screen)?);
    } else {
        print!("{screen}");
    }
    Ok(())
}

fn list_filters(as_json: bool) -> Result<()> {
    if as_json {
        let filters: Vec<_> = DateFilter::PRESETS
            .iter()
            .map(|f| json!({ "token": f.token(), "api": f.api_value(), "label": f.label() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&filters)?);
    } else {
        println!("{:<14} {:<14} Label", "Token", "API");
        for filter in &DateFilter::PRESETS {
            println!(
                "{:<14} {:<14} {}",
                filter.token(),
                format!("{:?}", filter.api_value()),
                filter.label()
            );
        }
    }
    Ok(())
}
