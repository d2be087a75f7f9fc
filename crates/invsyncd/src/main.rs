// # invsyncd - Inventory Sync Daemon
//
// Thin integration layer: reads configuration from the environment, wires
// the registry components together and triggers a sync run for every
// configured account on a fixed interval. All synchronization logic lives in
// invsync-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Accounts
// - `INVSYNC_ACCOUNTS_FILE`: JSON file with account records (required)
//
// ### Schedule
// - `INVSYNC_SYNC_INTERVAL_SECS`: Seconds between rounds (default 900)
// - `INVSYNC_RUN_ON_STARTUP`: Run a round immediately (default true)
// - `INVSYNC_MAX_CONCURRENT_RUNS`: Upper bound on parallel runs (default 8)
//
// ### Snapshot Store
// - `INVSYNC_SNAPSHOT_STORE_TYPE`: file, memory (default file)
// - `INVSYNC_SNAPSHOT_STORE_PATH`: Path to the snapshot file (for file)
//
// ### Queue
// - `INVSYNC_QUEUE_TYPE`: rabbitmq, memory (default rabbitmq)
// - `INVSYNC_QUEUE_NAME`: Queue name (default azure.resources)
// - `INVSYNC_RABBITMQ_API_URL`: Management API URL, e.g. http://localhost:15672
// - `INVSYNC_RABBITMQ_USERNAME` / `INVSYNC_RABBITMQ_PASSWORD`
// - `INVSYNC_RABBITMQ_VHOST`: Virtual host (default /)
//
// ### Azure
// - `INVSYNC_AZURE_AUTHORITY_HOST`: default https://login.microsoftonline.com
// - `INVSYNC_AZURE_MANAGEMENT_ENDPOINT`: default https://management.azure.com
// - `INVSYNC_HTTP_TIMEOUT_SECS`: Per-request timeout (default 30)
//
// ### Logging
// - `INVSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export INVSYNC_ACCOUNTS_FILE=/etc/invsync/accounts.json
// export INVSYNC_SNAPSHOT_STORE_PATH=/var/lib/invsync/snapshots.json
// export INVSYNC_RABBITMQ_API_URL=http://localhost:15672
// export INVSYNC_RABBITMQ_USERNAME=invsync
// export INVSYNC_RABBITMQ_PASSWORD=secret
//
// invsyncd
// ```

use anyhow::{Context, Result};
use invsync_core::config::{
    DEFAULT_AUTHORITY_HOST, DEFAULT_MANAGEMENT_ENDPOINT, DEFAULT_QUEUE_NAME,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use invsync_core::{
    CredentialResolver, NotificationChannel, NotificationConfig, ProviderConfig, ProviderRegistry,
    ScheduleConfig, SessionManager, SnapshotStore, SnapshotStoreConfig, StaticCredentialResolver,
    SyncConfig, SyncDispatcher, SyncWorker, WorkerConfig,
};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long in-flight runs may take to finish after a shutdown signal
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum InvsyncExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<InvsyncExitCode> for ExitCode {
    fn from(code: InvsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration as read from the environment
struct Config {
    accounts_file: String,
    sync_interval_secs: u64,
    run_on_startup: bool,
    max_concurrent_runs: usize,
    snapshot_store_type: String,
    snapshot_store_path: Option<String>,
    queue_type: String,
    queue_name: String,
    rabbitmq_api_url: Option<String>,
    rabbitmq_username: Option<String>,
    /// ⚠️ NEVER log this value
    rabbitmq_password: Option<String>,
    rabbitmq_vhost: String,
    azure_authority_host: String,
    azure_management_endpoint: String,
    http_timeout_secs: u64,
    log_level: String,
}

fn parse_number<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a number. Got: '{}'", name, raw)),
    }
}

fn parse_bool(name: &str, value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no") => Ok(false),
        Some(v) => anyhow::bail!("{} must be true or false. Got: '{}'", name, v),
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let schedule = ScheduleConfig::default();
        let worker = WorkerConfig::default();

        Ok(Self {
            accounts_file: get("INVSYNC_ACCOUNTS_FILE").unwrap_or_default(),
            sync_interval_secs: parse_number(
                "INVSYNC_SYNC_INTERVAL_SECS",
                get("INVSYNC_SYNC_INTERVAL_SECS"),
                schedule.interval_secs,
            )?,
            run_on_startup: parse_bool(
                "INVSYNC_RUN_ON_STARTUP",
                get("INVSYNC_RUN_ON_STARTUP"),
                schedule.run_on_startup,
            )?,
            max_concurrent_runs: parse_number(
                "INVSYNC_MAX_CONCURRENT_RUNS",
                get("INVSYNC_MAX_CONCURRENT_RUNS"),
                worker.max_concurrent_runs,
            )?,
            snapshot_store_type: get("INVSYNC_SNAPSHOT_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            snapshot_store_path: get("INVSYNC_SNAPSHOT_STORE_PATH"),
            queue_type: get("INVSYNC_QUEUE_TYPE").unwrap_or_else(|| "rabbitmq".to_string()),
            queue_name: get("INVSYNC_QUEUE_NAME").unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
            rabbitmq_api_url: get("INVSYNC_RABBITMQ_API_URL"),
            rabbitmq_username: get("INVSYNC_RABBITMQ_USERNAME"),
            rabbitmq_password: get("INVSYNC_RABBITMQ_PASSWORD"),
            rabbitmq_vhost: get("INVSYNC_RABBITMQ_VHOST").unwrap_or_else(|| "/".to_string()),
            azure_authority_host: get("INVSYNC_AZURE_AUTHORITY_HOST")
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            azure_management_endpoint: get("INVSYNC_AZURE_MANAGEMENT_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_MANAGEMENT_ENDPOINT.to_string()),
            http_timeout_secs: parse_number(
                "INVSYNC_HTTP_TIMEOUT_SECS",
                get("INVSYNC_HTTP_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            log_level: get("INVSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Field-level checks with actionable messages; structural checks are
    /// repeated by `SyncConfig::validate`.
    fn validate(&self) -> Result<()> {
        if self.accounts_file.is_empty() {
            anyhow::bail!(
                "INVSYNC_ACCOUNTS_FILE is required. \
                Set it via: export INVSYNC_ACCOUNTS_FILE=/etc/invsync/accounts.json"
            );
        }
        if !std::path::Path::new(&self.accounts_file).is_file() {
            anyhow::bail!(
                "INVSYNC_ACCOUNTS_FILE does not point to a file: {}",
                self.accounts_file
            );
        }

        if !(10..=86_400).contains(&self.sync_interval_secs) {
            anyhow::bail!(
                "INVSYNC_SYNC_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                self.sync_interval_secs
            );
        }

        if !(1..=256).contains(&self.max_concurrent_runs) {
            anyhow::bail!(
                "INVSYNC_MAX_CONCURRENT_RUNS must be between 1 and 256. Got: {}",
                self.max_concurrent_runs
            );
        }

        if !(1..=300).contains(&self.http_timeout_secs) {
            anyhow::bail!(
                "INVSYNC_HTTP_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.http_timeout_secs
            );
        }

        match self.snapshot_store_type.as_str() {
            "file" => match self.snapshot_store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "INVSYNC_SNAPSHOT_STORE_PATH is required when INVSYNC_SNAPSHOT_STORE_TYPE=file. \
                    Set it via: export INVSYNC_SNAPSHOT_STORE_PATH=/var/lib/invsync/snapshots.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "INVSYNC_SNAPSHOT_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            },
            "memory" => {
                eprintln!(
                    "WARNING: INVSYNC_SNAPSHOT_STORE_TYPE=memory keeps snapshots only until the \
                    daemon exits."
                );
            }
            other => anyhow::bail!(
                "INVSYNC_SNAPSHOT_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        }

        match self.queue_type.as_str() {
            "rabbitmq" => {
                if self.rabbitmq_api_url.as_ref().is_none_or(|u| u.is_empty()) {
                    anyhow::bail!(
                        "INVSYNC_RABBITMQ_API_URL is required when INVSYNC_QUEUE_TYPE=rabbitmq"
                    );
                }
                if self.rabbitmq_username.as_ref().is_none_or(|u| u.is_empty()) {
                    anyhow::bail!(
                        "INVSYNC_RABBITMQ_USERNAME is required when INVSYNC_QUEUE_TYPE=rabbitmq"
                    );
                }
                if self.rabbitmq_password.is_none() {
                    anyhow::bail!(
                        "INVSYNC_RABBITMQ_PASSWORD is required when INVSYNC_QUEUE_TYPE=rabbitmq"
                    );
                }
            }
            "memory" => {}
            other => anyhow::bail!(
                "INVSYNC_QUEUE_TYPE '{}' is not supported. Supported types: rabbitmq, memory",
                other
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "INVSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.sync_config()
            .validate()
            .context("Invalid synchronization configuration")?;
        Ok(())
    }

    /// Component configuration for the registry
    fn sync_config(&self) -> SyncConfig {
        let snapshot_store = match self.snapshot_store_type.as_str() {
            "file" => SnapshotStoreConfig::File {
                path: self.snapshot_store_path.clone().unwrap_or_default(),
            },
            _ => SnapshotStoreConfig::Memory,
        };

        let notification = match self.queue_type.as_str() {
            "rabbitmq" => NotificationConfig::RabbitMq {
                api_url: self.rabbitmq_api_url.clone().unwrap_or_default(),
                username: self.rabbitmq_username.clone().unwrap_or_default(),
                password: self.rabbitmq_password.clone().unwrap_or_default(),
                vhost: self.rabbitmq_vhost.clone(),
                queue: self.queue_name.clone(),
            },
            _ => NotificationConfig::Memory {
                queue: self.queue_name.clone(),
            },
        };

        SyncConfig {
            provider: ProviderConfig::Azure {
                authority_host: self.azure_authority_host.clone(),
                management_endpoint: self.azure_management_endpoint.clone(),
                request_timeout_secs: self.http_timeout_secs,
            },
            snapshot_store,
            notification,
            worker: WorkerConfig {
                max_concurrent_runs: self.max_concurrent_runs,
                ..WorkerConfig::default()
            },
            schedule: ScheduleConfig {
                interval_secs: self.sync_interval_secs,
                run_on_startup: self.run_on_startup,
            },
        }
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return InvsyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return InvsyncExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return InvsyncExitCode::ConfigError.into();
    }

    info!("Starting invsyncd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return InvsyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => InvsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                InvsyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Registry with the built-in components and every compiled-in plugin
fn build_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::with_builtins();

    #[cfg(feature = "azure")]
    {
        info!("Registering Azure provider");
        invsync_provider_azure::register(&registry);
    }

    #[cfg(feature = "rabbitmq")]
    {
        info!("Registering RabbitMQ channel");
        invsync_queue_rabbitmq::register(&registry);
    }

    registry
}

/// Run the daemon until SIGTERM/SIGINT
async fn run_daemon(config: Config) -> Result<()> {
    let sync_config = config.sync_config();
    let registry = build_registry();

    let provider = registry
        .create_provider(&sync_config.provider)
        .context("Failed to create cloud provider")?;
    let store: Arc<dyn SnapshotStore> = Arc::from(
        registry
            .create_snapshot_store(&sync_config.snapshot_store)
            .await
            .context("Failed to create snapshot store")?,
    );
    let channel: Arc<dyn NotificationChannel> = Arc::from(
        registry
            .create_channel(&sync_config.notification)
            .await
            .context("Failed to create notification channel")?,
    );

    let resolver = StaticCredentialResolver::from_file(&config.accounts_file).await?;
    if resolver.is_empty() {
        warn!("No accounts configured in {}", config.accounts_file);
    }

    info!(
        provider = provider.provider_name(),
        snapshot_store = sync_config.snapshot_store.type_name(),
        queue = channel.queue_name(),
        accounts = resolver.len(),
        interval_secs = sync_config.schedule.interval_secs,
        "Daemon initialized"
    );

    let sessions = Arc::new(SessionManager::new(Arc::from(provider)));
    let worker = Arc::new(SyncWorker::new(
        sessions,
        Arc::clone(&store),
        channel,
        sync_config.worker.clone(),
    ));
    let dispatcher = SyncDispatcher::new(worker, sync_config.worker.max_concurrent_runs)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(sync_config.schedule.interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !sync_config.schedule.run_on_startup {
        // The first tick completes immediately
        ticker.tick().await;
    }

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!("Received shutdown signal: {}", signal?);
                break;
            }
            _ = ticker.tick() => {
                let scheduled = schedule_round(&resolver, &dispatcher);
                info!("Scheduled {} sync run(s)", scheduled);
            }
        }
    }

    info!("Shutting down daemon, waiting for {} run(s)", dispatcher.in_flight());
    match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, dispatcher.drain()).await {
        Ok(reports) => {
            let failed = reports.iter().filter(|r| !r.is_success()).count();
            info!("{} run(s) finished during shutdown, {} failed", reports.len(), failed);
        }
        Err(_) => warn!("Shutdown drain timed out after {:?}", SHUTDOWN_DRAIN_TIMEOUT),
    }

    store.flush().await.context("Failed to flush snapshot store")?;
    Ok(())
}

/// Hand every resolvable account to the dispatcher
///
/// Accounts that cannot be resolved are skipped with a warning.
fn schedule_round(resolver: &dyn CredentialResolver, dispatcher: &SyncDispatcher) -> usize {
    let mut scheduled = 0;
    for (tenant_id, account_id) in resolver.accounts() {
        match resolver.resolve(&tenant_id, &account_id) {
            Ok(bundle) => {
                dispatcher.run_sync(&tenant_id, &account_id, bundle);
                scheduled += 1;
            }
            Err(e) => warn!(
                tenant_id = %tenant_id,
                account_id = %account_id,
                "Skipping account: {}",
                e
            ),
        }
    }
    scheduled
}

/// Wait for a shutdown signal (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for a shutdown signal (SIGINT only)
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use invsync_core::{AccountRecord, MemoryChannel, MemorySnapshotStore};
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.sync_interval_secs, 900);
        assert!(config.run_on_startup);
        assert_eq!(config.max_concurrent_runs, 8);
        assert_eq!(config.queue_name, "azure.resources");
        assert_eq!(config.rabbitmq_vhost, "/");
        assert_eq!(config.azure_management_endpoint, "https://management.azure.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("INVSYNC_SYNC_INTERVAL_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("INVSYNC_RUN_ON_STARTUP", "maybe")])).is_err());
    }

    #[test]
    fn test_valid_memory_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = dir.path().join("accounts.json");
        std::fs::write(&accounts, "[]").unwrap();

        let config = Config::from_lookup(lookup(&[
            ("INVSYNC_ACCOUNTS_FILE", accounts.to_str().unwrap()),
            ("INVSYNC_SNAPSHOT_STORE_TYPE", "memory"),
            ("INVSYNC_QUEUE_TYPE", "memory"),
            ("INVSYNC_RUN_ON_STARTUP", "false"),
        ]))
        .unwrap();

        assert!(config.validate().is_ok());
        let sync = config.sync_config();
        assert_eq!(sync.snapshot_store.type_name(), "memory");
        assert_eq!(sync.notification.type_name(), "memory");
        assert!(!sync.schedule.run_on_startup);
    }

    #[test]
    fn test_rabbitmq_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = dir.path().join("accounts.json");
        std::fs::write(&accounts, "[]").unwrap();

        let config = Config::from_lookup(lookup(&[
            ("INVSYNC_ACCOUNTS_FILE", accounts.to_str().unwrap()),
            ("INVSYNC_SNAPSHOT_STORE_TYPE", "memory"),
            ("INVSYNC_RABBITMQ_API_URL", "http://localhost:15672"),
        ]))
        .unwrap();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("INVSYNC_RABBITMQ_USERNAME"));
    }

    #[test]
    fn test_log_level_mapping() {
        let level = |value: &str| {
            Config::from_lookup(lookup(&[("INVSYNC_LOG_LEVEL", value)]))
                .unwrap()
                .log_level()
        };
        assert_eq!(level("DEBUG"), Level::DEBUG);
        assert_eq!(level("warn"), Level::WARN);
        assert_eq!(level("loud"), Level::INFO);
    }

    #[cfg(feature = "azure")]
    #[tokio::test]
    async fn test_schedule_round_skips_incomplete_accounts() {
        let complete = AccountRecord {
            tenant_id: "t1".into(),
            account_id: "a1".into(),
            app_id: "app".into(),
            key: "secret".into(),
            azure_tenant_id: "dir".into(),
            subscription: "sub".into(),
        };
        let incomplete = AccountRecord {
            account_id: "a2".into(),
            key: String::new(),
            ..complete.clone()
        };
        let resolver = StaticCredentialResolver::new(vec![complete, incomplete]);

        let registry = ProviderRegistry::new();
        invsync_provider_azure::register(&registry);
        let provider = registry
            .create_provider(&ProviderConfig::Azure {
                authority_host: "http://127.0.0.1:9".into(),
                management_endpoint: "http://127.0.0.1:9".into(),
                request_timeout_secs: 2,
            })
            .unwrap();

        let channel = Arc::new(MemoryChannel::new(DEFAULT_QUEUE_NAME));
        let worker = Arc::new(SyncWorker::new(
            Arc::new(SessionManager::new(Arc::from(provider))),
            Arc::new(MemorySnapshotStore::new()),
            channel,
            WorkerConfig::default(),
        ));
        let dispatcher = SyncDispatcher::new(worker, 2).unwrap();

        assert_eq!(schedule_round(&resolver, &dispatcher), 1);

        let reports = dispatcher.drain().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].correlation.account_id, "a1");
        // Nothing listens on the token endpoint
        assert!(!reports[0].is_success());
    }
}
