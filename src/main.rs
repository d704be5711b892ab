//! # LeadPilot
//!
//! Lead-generation autopilot: pull contacts from ZoomInfo, push them to
//! HubSpot, score them with Claude, and report to Slack.
//!
//! Usage:
//!   leadpilot serve                  # HTTP gateway (+ cron schedule if configured)
//!   leadpilot run                    # One workflow run, in-process
//!   leadpilot fetch --limit 50       # Single phases
//!   leadpilot sync --all
//!   leadpilot score --lead-id <id>
//!   leadpilot stats --hours 24
//!   leadpilot check-zoominfo

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leadpilot_core::LeadPilotConfig;
use leadpilot_core::types::ContactFilters;
use leadpilot_db::Datastore;
use leadpilot_gateway::AppState;
use leadpilot_jobs::phases::{self, FetchRequest, ScoreRequest, SyncRequest};
use leadpilot_jobs::{JobLog, LocalDispatch, PhaseContext, SlackNotifier, WorkflowRunner};
use leadpilot_providers::{AnthropicClient, HubSpotClient, ZoomInfoClient};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "leadpilot",
    version,
    about = "🎯 LeadPilot — ZoomInfo → HubSpot → Claude lead autopilot"
)]
struct Cli {
    /// Config file (default: ~/.leadpilot/config.toml)
    #[arg(short, long, env = "LEADPILOT_CONFIG", global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the full workflow once, in-process
    Run,
    /// Fetch contacts from ZoomInfo into the lead store
    Fetch {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        min_employees: Option<u32>,
    },
    /// Push leads to HubSpot
    Sync {
        /// Sync every lead, not only unlinked ones
        #[arg(long)]
        all: bool,
        #[arg(long = "lead-id")]
        lead_ids: Vec<String>,
    },
    /// Score leads with Claude
    Score {
        /// Include leads not yet in HubSpot
        #[arg(long)]
        all: bool,
        #[arg(long = "lead-id")]
        lead_ids: Vec<String>,
    },
    /// Job counts per type
    Stats {
        #[arg(long, default_value = "24")]
        hours: u32,
    },
    /// Authenticate against ZoomInfo and run a one-result search
    CheckZoominfo,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        "leadpilot=debug,leadpilot_jobs=debug,leadpilot_providers=debug,leadpilot_gateway=debug,tower_http=debug"
    } else {
        "leadpilot=info,leadpilot_jobs=info,leadpilot_providers=info,leadpilot_gateway=info,leadpilot_db=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Everything the commands share, wired from config.
struct App {
    config: LeadPilotConfig,
    phases: PhaseContext,
    runner: Arc<WorkflowRunner>,
}

impl App {
    fn build(config: LeadPilotConfig) -> Result<Self> {
        let db_path = expand_path(&config.database.path);
        let store = Arc::new(
            Datastore::open(&db_path)
                .with_context(|| format!("opening database {}", db_path.display()))?,
        );
        tracing::debug!("💾 Database: {}", db_path.display());

        let jobs = JobLog::new(store.clone());
        let phases = PhaseContext::from_config(
            &config,
            store,
            jobs.clone(),
            Arc::new(ZoomInfoClient::new(&config.zoominfo)?),
            Arc::new(HubSpotClient::new(&config.hubspot)?),
            Arc::new(AnthropicClient::new(&config.anthropic)?),
        );
        let notifier = SlackNotifier::new(&config.notify);
        if !notifier.is_configured() {
            tracing::info!("Slack webhook not configured, summaries will only be logged");
        }
        let runner = Arc::new(WorkflowRunner::new(
            jobs,
            Arc::new(notifier),
            config.workflow.clone(),
        ));

        Ok(Self {
            config,
            phases,
            runner,
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config_path = cli.config.as_deref().map(expand_path);
    let config = LeadPilotConfig::load(config_path.as_deref()).context("loading config")?;
    let app = App::build(config)?;

    match cli.command {
        Command::Serve { port } => {
            let mut config = app.config.clone();
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let state = AppState::new(&config, app.phases, app.runner);
            leadpilot_gateway::start(&config, state).await?;
        }
        Command::Run => {
            let dispatch = LocalDispatch::new(app.phases.clone());
            match app.runner.run(&dispatch, "cli").await {
                Ok(report) => print_json(&report)?,
                Err(failure) => {
                    anyhow::bail!(
                        "workflow {} failed: {}",
                        failure.job_id.as_deref().unwrap_or("<not created>"),
                        failure.error
                    );
                }
            }
        }
        Command::Fetch {
            limit,
            industry,
            company,
            location,
            min_employees,
        } => {
            let request = FetchRequest {
                filters: ContactFilters {
                    industry,
                    company_name: company,
                    location,
                    employee_count_min: min_employees,
                    ..ContactFilters::default()
                },
                limit,
            };
            print_json(&phases::fetch_contacts(&app.phases, request).await?)?;
        }
        Command::Sync { all, lead_ids } => {
            let request = SyncRequest {
                lead_ids: (!lead_ids.is_empty()).then_some(lead_ids),
                sync_all: all,
            };
            print_json(&phases::sync_contacts(&app.phases, request).await?)?;
        }
        Command::Score { all, lead_ids } => {
            let request = ScoreRequest {
                lead_ids: (!lead_ids.is_empty()).then_some(lead_ids),
                score_all: all,
            };
            print_json(&phases::score_leads(&app.phases, request).await?)?;
        }
        Command::Stats { hours } => {
            let stats = app.phases.jobs.get_job_stats(hours);
            print_json(&serde_json::json!({ "hours": hours, "stats": stats }))?;
        }
        Command::CheckZoominfo => {
            let client = ZoomInfoClient::new(&app.config.zoominfo)?;
            let found = client.check().await?;
            println!("✅ ZoomInfo reachable, test search returned {found} contact(s)");
        }
    }

    Ok(())
}
