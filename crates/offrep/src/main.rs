mod config;
mod version;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Parser;
use offrep_core::{Notifier, PgReportStore, WebhookClient, WebhookError, WebhookMessage, runner};
use tracing::{error, info};

use crate::{
    config::{Config, open_config, write_default_config},
    version::{USER_AGENT, short_version},
};

#[derive(Parser)]
#[command(version = short_version())]
struct Args {
    /// 設定ファイル (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// データベース URL
    #[arg(long, env = "OFFREP_DATABASE_URL")]
    dburl: Option<String>,

    /// Webhook の送信先 URL
    #[arg(long, env = "OFFREP_WEBHOOK_URL")]
    webhookurl: Option<String>,

    /// 設定ファイルの雛形を書き出して終了する
    #[arg(long)]
    init: bool,

    /// 送信せずにメッセージを標準出力に表示する
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.init {
        let path = args.config.unwrap_or_else(|| PathBuf::from("config.toml"));
        write_default_config(&path)?;
        info!(path = ?path, "Created default configuration");
        return Ok(());
    }

    tracing::info!(version = short_version(), "offrep version");

    run(args).await.inspect_err(|e| {
        error!(error = format!("{e:#}"), "Officer report reminder failed");
    })
}

async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => open_config(path).context("Failed to load configuration")?,
        None => Config::default(),
    };
    config.apply_overrides(args.dburl, args.webhookurl);

    let database_url = config.database_url()?;
    // 送信しない場合は Webhook URL を要求しない
    let webhook_url = if args.dry_run {
        None
    } else {
        Some(config.webhook_url()?)
    };
    let schedule = config.meeting.schedule()?;
    info!(
        weekday = %schedule.weekday(),
        hour = schedule.hour(),
        timezone = %config.meeting.timezone,
        "Configuration loaded"
    );

    let store = PgReportStore::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let now = Utc::now().with_timezone(&config.meeting.timezone);
    let mut rng = rand::rng();
    let headers = &config.messages.headers;

    let summary = if let Some(webhook_url) = webhook_url {
        let client = WebhookClient::new(webhook_url, USER_AGENT)
            .context("Failed to create webhook client")?;
        runner::run(&store, &client, schedule, &now, headers, &mut rng).await
    } else {
        runner::run(&store, &StdoutNotifier, schedule, &now, headers, &mut rng).await
    }
    .context("Failed to send report status")?;

    info!(
        meeting = %summary.meeting,
        written = summary.written,
        unwritten = summary.unwritten,
        "Report status sent"
    );

    Ok(())
}

/// `--dry-run` 用。送信する代わりに JSON を標準出力に書き出す。
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), WebhookError> {
        println!("{}", serde_json::to_string_pretty(message)?);
        Ok(())
    }
}
