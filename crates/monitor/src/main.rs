use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use ewatch_core::{AlertChannel, FreshnessChecker};
use ewatch_db::PgFreshnessChecker;
use ewatch_discord::messages::DEFAULT_INTENTS;
use ewatch_discord::{DiscordApi, DiscordChannel, DiscordGateway, GatewayClient, ReconnectConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ewatch_monitor::signal::shutdown_signal;
use ewatch_monitor::{MonitorConfig, MonitorLoop, ShutdownReport, Supervisor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ewatch_monitor=info,ewatch_discord=info,ewatch_db=info".into()
            }),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    match run().await {
        Ok(report) if report.is_clean() => ExitCode::SUCCESS,
        Ok(report) => {
            tracing::error!(reason = ?report.reason, failures = ?report.failures, "Monitor stopped abnormally");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = ?e, "Monitor failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ShutdownReport> {
    // --- Configuration ---
    let config = MonitorConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        left = %config.left.label(),
        left_devices = config.left.len(),
        right = %config.right.label(),
        right_devices = config.right.len(),
        table = %config.samples_table,
        "Loaded monitor configuration",
    );
    let overlap = config.left.overlap(&config.right);
    if !overlap.is_empty() {
        tracing::warn!(devices = ?overlap, "Device groups share identifiers");
    }

    // --- Database ---
    let pool = ewatch_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    ewatch_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    let checker: Arc<dyn FreshnessChecker> =
        Arc::new(PgFreshnessChecker::new(pool, config.samples_table.clone()));

    // --- Discord ---
    let gateway = Arc::new(DiscordGateway::new(
        GatewayClient::new(
            config.discord.gateway_url.clone(),
            config.discord.token.clone(),
            DEFAULT_INTENTS,
        ),
        ReconnectConfig::default(),
    ));
    let api = DiscordApi::new(config.discord.api_url.clone(), config.discord.token.clone())
        .context("Failed to build Discord HTTP client")?;
    let channel: Arc<dyn AlertChannel> = Arc::new(DiscordChannel::new(
        api,
        config.discord.channel_id,
        gateway.subscribe_ready(),
    ));

    // --- Units ---
    let mut monitor = MonitorLoop::new(
        config.settings.clone(),
        config.groups(),
        Arc::clone(&checker),
        Arc::clone(&channel),
    )
    .with_query_timeout(config.query_timeout)
    .with_ready_timeout(config.ready_timeout);

    let supervisor = Supervisor::new(checker, channel, config.shutdown_grace);

    let gateway_cancel = supervisor.token();
    let channel_unit = async move { gateway.run(gateway_cancel).await };

    let monitor_cancel = supervisor.token();
    let monitor_unit = async move { monitor.run(monitor_cancel).await };

    Ok(supervisor
        .run(channel_unit, monitor_unit, shutdown_signal())
        .await)
}
