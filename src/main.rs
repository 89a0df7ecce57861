mod activity;
mod api;
mod cli;
mod config;
mod dashboard;
mod error;
mod loader;
mod model;
mod session;
mod storage;
#[cfg(test)]
mod testing;
mod views;

use anyhow::Result;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stokvel", about = "Member dashboard for a stokvel savings club")]
pub struct Args {
    #[arg(short, long, help = "Run a single command and exit (e.g. -c dashboard)")]
    pub command: Option<String>,

    #[arg(long, env = "STOKVEL_API_URL", help = "Backend base URL")]
    pub base_url: Option<String>,

    #[arg(long, value_name = "MS", help = "Request timeout in milliseconds")]
    pub timeout_ms: Option<u64>,

    #[arg(long, help = "Directory holding the stored session")]
    pub session_dir: Option<PathBuf>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Write a session log for this run under the session dir")]
    pub activity: bool,

    #[arg(long, help = "Skip confirmation prompts for deletions")]
    pub yes: bool,

    #[arg(long, help = "Verbose output (log each request)")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (log everything)")]
    pub debug: bool,
}

fn init_tracing(args: &Args) {
    let default = if args.debug {
        "stokvel=trace"
    } else if args.verbose {
        "stokvel=debug"
    } else {
        "stokvel=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    // CLI flags and environment override config files
    if let Some(url) = &args.base_url {
        cfg.api.base_url = Some(url.clone());
    }
    if let Some(timeout) = args.timeout_ms {
        cfg.api.timeout_ms = Some(timeout);
    }
    if let Some(dir) = &args.session_dir {
        cfg.session.dir = Some(dir.clone());
    }
    if args.activity {
        cfg.activity.enabled = Some(true);
    }

    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error {}", e);
        }
        return Err(anyhow::anyhow!(
            "Invalid configuration ({} error(s))",
            errors.len()
        ));
    }

    let base_url = cfg.base_url().unwrap_or_default().to_string();
    tracing::debug!(base_url = %base_url, timeout_ms = cfg.timeout_ms(), "configuration loaded");

    let store = storage::FileStore::in_dir(&cfg.session_dir());
    let session = Rc::new(session::SessionContext::new(Box::new(store)));
    let transport = api::HttpTransport::new(&base_url, Duration::from_millis(cfg.timeout_ms()));
    let client = api::ApiClient::new(Box::new(transport), session);

    let activity = if cfg.activity_enabled() {
        let run_id = uuid::Uuid::new_v4().to_string();
        let path = cfg.activity_dir().join(format!("{}.jsonl", run_id));
        match activity::ActivityLog::new(&path, &run_id) {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::warn!("activity log disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let mut dash = dashboard::Dashboard::new(client, activity);
    dash.restore();
    if let Some(path) = dash.activity_path() {
        tracing::debug!(path = %path.display(), "activity log");
    }

    let ctx = cli::Context {
        args,
        config: cfg,
        dashboard: RefCell::new(dash),
    };

    if let Some(command) = ctx.args.command.clone() {
        cli::run_once(&ctx, &command)
    } else {
        cli::run_repl(ctx)
    }
}
