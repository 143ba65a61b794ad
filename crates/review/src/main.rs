//! review-bot - Gitee webhook server gating pull requests on lgtm/approve labels.
//!
//! # Environment Variables
//!
//! - `GITEE_TOKEN` - Gitee API access token (required)
//! - `WEBHOOK_SECRET` - expected `X-Gitee-Token` header value (required)
//! - `GITEE_ENDPOINT` - Gitee API base URL
//! - `REPO_FILE_CACHE_ENDPOINT` - base URL of the repo file cache service
//! - `PORT` - listen port
//! - `RUST_LOG` - log filter (default `info`)

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scm::cache::FileCacheClient;
use scm::gitee::{GiteeClient, DEFAULT_ENDPOINT};
use tracing::info;
use tracing_subscriber::EnvFilter;

use review::bot::Robot;
use review::config::Configuration;
use review::server::{run_server, ServerState};

/// Pull request review bot for Gitee.
#[derive(Parser)]
#[command(name = "review-bot")]
#[command(about = "Gitee webhook server gating pull requests on lgtm/approve labels")]
#[command(version)]
struct Cli {
    /// Path to the bot configuration file
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Listen port
    #[arg(long, env = "PORT", default_value_t = 8888)]
    port: u16,

    /// Gitee API token
    #[arg(long, env = "GITEE_TOKEN", hide_env_values = true)]
    gitee_token: String,

    /// Gitee API base URL
    #[arg(long, env = "GITEE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    gitee_endpoint: String,

    /// Repo file cache service base URL
    #[arg(long, env = "REPO_FILE_CACHE_ENDPOINT", default_value = "http://repo-file-cache:8888/v1/file")]
    repo_file_cache_endpoint: String,

    /// Secret Gitee sends in the X-Gitee-Token header
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Configuration::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    let gitee = GiteeClient::with_endpoint(&cli.gitee_endpoint, &cli.gitee_token);
    let cache = FileCacheClient::new(&cli.repo_file_cache_endpoint);

    let state = Arc::new(ServerState {
        robot: Robot::new(Arc::new(gitee), Arc::new(cache), config),
        webhook_secret: cli.webhook_secret,
    });

    let addr = format!("0.0.0.0:{}", cli.port);
    info!(
        endpoint = %cli.gitee_endpoint,
        cache = %cli.repo_file_cache_endpoint,
        "Starting review bot"
    );

    run_server(state, &addr).await
}
