use clap::{Args, Parser};
use std::path::PathBuf;

mod config;
use config::{Config, Listener, MetricsConfig};

use config_manager::config::RolloutStrategy;
use config_manager::manager::{CommitCallback, ConfigManager};
use config_manager::service_configs::ServiceConfigsClient;
use config_manager::types::WeightedConfig;
use config_manager::{GlobalContext, token};
use metrics_exporter_statsd::StatsdBuilder;
use shared::admin::AdminService;
use shared::http::run_http_service;
use shared::metrics_defs::markdown_table;
use std::future::Future;
use std::process;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
enum CliCommand {
    /// Run the sidecar against the configured service
    Run(RunArgs),
    /// Show all metrics definitions as markdown table
    ShowMetrics,
    /// Sync METRICS.md with current metric definitions
    SyncMetrics,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("Failed to load config file: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to create runtime: {0}")]
    RuntimeError(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
enum SidecarError {
    #[error("invalid service config: {0}")]
    InvalidServiceConfig(#[from] config_manager::errors::ConfigError),
    #[error("the fixed rollout strategy requires service_config_id")]
    MissingConfigId,
    #[error("failed to fetch the pinned service config: {0}")]
    Fetch(#[from] config_manager::errors::FetchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() {
    init_tracing();

    if let Err(e) = cli() {
        tracing::error!(error = %e, "Startup error");
        std::process::exit(1);
    }
}

fn cli() -> Result<(), CliError> {
    let cmd = CliCommand::parse();

    match &cmd {
        CliCommand::Run(run_args) => {
            let config = Config::from_file(&run_args.base.config_file_path)?;
            let _sentry_guard = init_sentry(config.common.logging.clone());
            init_statsd_recorder("sidecar", config.common.metrics.clone());

            run_async(run(config))?;
            Ok(())
        }
        CliCommand::ShowMetrics => {
            println!(
                "{}",
                markdown_table(config_manager::metrics_defs::ALL_METRICS)
            );
            Ok(())
        }
        CliCommand::SyncMetrics => {
            let path = "METRICS.md";
            let mut content = std::fs::read_to_string(path).expect("Failed to read METRICS.md");

            content = sync_section(
                &content,
                "CONFIG_MANAGER_METRICS",
                &markdown_table(config_manager::metrics_defs::ALL_METRICS),
            );

            std::fs::write(path, content).expect("Failed to write METRICS.md");
            println!("Synced METRICS.md");
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<(), SidecarError> {
    let token_provider = token::from_config(&config.service.auth);
    let context = Arc::new(GlobalContext::new(config.service.clone(), token_provider)?);

    match context.rollout_strategy() {
        RolloutStrategy::Managed => run_managed(context, config.admin_listener).await,
        RolloutStrategy::Fixed => run_fixed(context, config.admin_listener).await,
    }
}

/// Managed strategy: the configuration manager tracks remote rollouts for
/// the process lifetime.
async fn run_managed(
    context: Arc<GlobalContext>,
    admin_listener: Option<Listener>,
) -> Result<(), SidecarError> {
    let callback: CommitCallback = Arc::new(|configs: Vec<WeightedConfig>| {
        // The embedding proxy swaps its data-plane config set here.
        tracing::info!(configs = configs.len(), "service configuration set published");
    });
    let manager = ConfigManager::new(context, callback);

    if let Some(listener) = admin_listener {
        let ready = {
            let manager = manager.clone();
            move || manager.is_ready()
        };
        let status = {
            let manager = manager.clone();
            move || {
                serde_json::to_value(manager.snapshot()).unwrap_or_else(|_| serde_json::json!({}))
            }
        };
        spawn_admin(listener, ready, status);
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    manager.stop().await;
    Ok(())
}

/// Fixed strategy: fetch the pinned config once at startup; no refresh loop.
async fn run_fixed(
    context: Arc<GlobalContext>,
    admin_listener: Option<Listener>,
) -> Result<(), SidecarError> {
    let config_id = context
        .bootstrap_config_id()
        .ok_or(SidecarError::MissingConfigId)?
        .to_string();

    let client = ServiceConfigsClient::new(context.clone());
    let blob = client.fetch(&config_id).await?;
    tracing::info!(config_id = %config_id, size = blob.len(), "pinned service configuration loaded");

    if let Some(listener) = admin_listener {
        let status = serde_json::json!({
            "rollout_id": serde_json::Value::Null,
            "configs": [{
                "config_id": config_id,
                "percent": 100,
                "size_bytes": blob.len(),
            }],
        });
        spawn_admin(listener, || true, move || status.clone());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

fn spawn_admin<R, S>(listener: Listener, is_ready: R, status: S)
where
    R: Fn() -> bool + Send + Sync + 'static,
    S: Fn() -> serde_json::Value + Send + Sync + 'static,
{
    let admin: AdminService<R, S, std::io::Error> = AdminService::new(is_ready, status);
    tokio::spawn(async move {
        if let Err(e) = run_http_service(&listener.host, listener.port, admin).await {
            tracing::error!(error = %e, "admin server failed");
        }
    });
}

fn sync_section(content: &str, name: &str, table: &str) -> String {
    let start_marker = format!("<!-- {}:START -->", name);
    let end_marker = format!("<!-- {}:END -->", name);

    let start_idx = content
        .find(&start_marker)
        .unwrap_or_else(|| panic!("Missing {} marker", start_marker));
    let end_idx = content
        .find(&end_marker)
        .unwrap_or_else(|| panic!("Missing {} marker", end_marker));

    format!(
        "{}{}\n{}\n{}{}",
        &content[..start_idx],
        start_marker,
        table,
        end_marker,
        &content[end_idx + end_marker.len()..]
    )
}

pub fn init_statsd_recorder(prefix: &str, metrics_config: Option<MetricsConfig>) {
    if let Some(MetricsConfig {
        statsd_host,
        statsd_port,
    }) = metrics_config
    {
        let recorder = StatsdBuilder::from(statsd_host, statsd_port)
            .build(Some(prefix))
            .expect("Could not create StatsdRecorder");

        metrics::set_global_recorder(recorder).expect("Could not set global metrics recorder")
    }
}

fn run_async(
    fut: impl Future<Output = Result<(), impl std::error::Error>>,
) -> Result<(), CliError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    if let Err(e) = rt.block_on(fut) {
        tracing::error!(error = %e, "Runtime error");
        process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(sentry::integrations::tracing::layer())
        .init();
}

fn init_sentry(logging_config: Option<config::LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    // Initialize Sentry client if configured
    // The Sentry tracing layer (already initialized in main) will automatically
    // start sending events to Sentry once this client is initialized
    logging_config.map(|cfg| {
        sentry::init((
            cfg.sentry_dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    })
}

#[derive(Args, Debug, Clone)]
struct BaseArgs {
    #[arg(long)]
    config_file_path: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    base: BaseArgs,
}

#[cfg(test)]
mod tests {
    #[test]
    fn metrics_md_contains_all_defined_metrics() {
        let metrics_md =
            std::fs::read_to_string("../METRICS.md").expect("Failed to read METRICS.md");

        let mut missing = Vec::new();
        for m in config_manager::metrics_defs::ALL_METRICS {
            if !metrics_md.contains(m.name) {
                missing.push(m.name);
            }
        }

        assert!(
            missing.is_empty(),
            "METRICS.md is missing these metrics: {:?}\nAdd them to METRICS.md",
            missing
        );
    }
}
