// # pagewatchd - Page Availability Watcher
//
// One invocation runs one watch cycle and exits, so the binary is meant to be
// driven by cron, a systemd timer or a CI schedule.
//
// This is a THIN integration layer ONLY:
// - Watch logic lives in pagewatch-core
// - Configuration is via environment variables ONLY (targets come from a YAML file)
//
// The runner is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Sleeping a random jitter so scheduled runs do not hit sites in lockstep
// 4. Registering collaborators and running one `Watcher` cycle
//
// ## Configuration
//
// ### Targets
// - `PAGEWATCH_TARGETS_PATH`: YAML target file (default `targets.yaml`)
//
// ### State Store
// - `PAGEWATCH_STATE_STORE_TYPE`: gist, file or memory (default gist)
// - `PAGEWATCH_STATE_STORE_PATH`: Path to state file (for file store)
// - `GIST_ID`, `GIST_TOKEN`: Gist holding `state.json` and `recipients.json`
//
// ### Notifier
// - `PAGEWATCH_NOTIFIER_TYPE`: line or log (default line)
// - `LINE_CHANNEL_ACCESS_TOKEN`: LINE Messaging API token
// - `LINE_USER_IDS`: Extra recipients, comma separated
//
// ### Run
// - `PAGEWATCH_MODE`: run, dry-run or test-push (default run)
// - `PAGEWATCH_JITTER_MIN_SECS`, `PAGEWATCH_JITTER_MAX_SECS`: Start delay range (default 15/60)
// - `PAGEWATCH_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// export PAGEWATCH_TARGETS_PATH=/etc/pagewatch/targets.yaml
// export GIST_ID=0123abcd
// export GIST_TOKEN=your_token
// export LINE_CHANNEL_ACCESS_TOKEN=your_token
//
// pagewatchd
// ```

use anyhow::Result;
use pagewatch_core::config::{
    AcquisitionEngine, NotifierConfig, StateStoreConfig, WatchConfig,
};
use pagewatch_core::engine::{WatchEngine, WatchEvent, Watcher};
use pagewatch_core::notify::{LogNotifier, broadcast, mask_recipient, parse_recipient_list};
use pagewatch_core::state::MemoryStateStore;
use pagewatch_core::traits::{RecipientSource, StaticRecipients, TextAcquirer};
use pagewatch_core::CollaboratorRegistry;
use rand::Rng;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Message sent by `PAGEWATCH_MODE=test-push`
const TEST_PUSH_MESSAGE: &str = "[Test notification] pagewatch push delivery test.";

/// Exit codes for different termination scenarios
///
/// - 0: Cycle completed
/// - 1: Configuration or startup error
/// - 2: Runtime error (state store, recipients, interruption)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagewatchExitCode {
    /// Cycle completed
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<PagewatchExitCode> for ExitCode {
    fn from(code: PagewatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What a single invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Observe, save, notify
    Run,
    /// Observe and log; nothing is saved or sent
    DryRun,
    /// Send a fixed message to every recipient
    TestPush,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "run" => Ok(Mode::Run),
            "dry-run" | "dry_run" | "dryrun" => Ok(Mode::DryRun),
            "test-push" | "test_push" => Ok(Mode::TestPush),
            other => anyhow::bail!(
                "PAGEWATCH_MODE '{}' is not valid. Valid modes: run, dry-run, test-push",
                other
            ),
        }
    }
}

/// Application configuration
struct Config {
    targets_path: String,
    state_store_type: String,
    state_store_path: Option<String>,
    gist_id: Option<String>,
    gist_token: Option<String>,
    notifier_type: String,
    line_channel_access_token: Option<String>,
    line_user_ids: Vec<String>,
    mode: Mode,
    jitter_min_secs: u64,
    jitter_max_secs: u64,
    log_level: String,
}

// Custom Debug implementation that hides secrets
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("targets_path", &self.targets_path)
            .field("state_store_type", &self.state_store_type)
            .field("state_store_path", &self.state_store_path)
            .field("gist_id", &self.gist_id)
            .field("gist_token", &self.gist_token.as_ref().map(|_| "<REDACTED>"))
            .field("notifier_type", &self.notifier_type)
            .field(
                "line_channel_access_token",
                &self.line_channel_access_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field("line_user_ids", &self.line_user_ids.len())
            .field("mode", &self.mode)
            .field("jitter_min_secs", &self.jitter_min_secs)
            .field("jitter_max_secs", &self.jitter_max_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    anyhow::anyhow!("{} must be a non-negative integer. Got: {}", key, raw)
                }),
                None => Ok(default),
            }
        };

        Ok(Self {
            targets_path: var("PAGEWATCH_TARGETS_PATH")
                .unwrap_or_else(|| "targets.yaml".to_string()),
            state_store_type: var("PAGEWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|| "gist".to_string())
                .to_lowercase(),
            state_store_path: var("PAGEWATCH_STATE_STORE_PATH"),
            gist_id: var("GIST_ID"),
            gist_token: var("GIST_TOKEN"),
            notifier_type: var("PAGEWATCH_NOTIFIER_TYPE")
                .unwrap_or_else(|| "line".to_string())
                .to_lowercase(),
            line_channel_access_token: var("LINE_CHANNEL_ACCESS_TOKEN"),
            line_user_ids: var("LINE_USER_IDS")
                .map(|raw| parse_recipient_list(&raw))
                .unwrap_or_default(),
            mode: var("PAGEWATCH_MODE").as_deref().unwrap_or("run").parse()?,
            jitter_min_secs: number("PAGEWATCH_JITTER_MIN_SECS", 15)?,
            jitter_max_secs: number("PAGEWATCH_JITTER_MAX_SECS", 60)?,
            log_level: var("PAGEWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.state_store_type.as_str() {
            "gist" => {
                if self.gist_id.is_none() || self.gist_token.is_none() {
                    anyhow::bail!(
                        "GIST_ID and GIST_TOKEN are required when PAGEWATCH_STATE_STORE_TYPE=gist"
                    );
                }
            }
            "file" => {
                if self.state_store_path.is_none() {
                    anyhow::bail!(
                        "PAGEWATCH_STATE_STORE_PATH is required when PAGEWATCH_STATE_STORE_TYPE=file. \
                        Set it via: export PAGEWATCH_STATE_STORE_PATH=/var/lib/pagewatch/state.json"
                    );
                }
            }
            "memory" => {}
            other => anyhow::bail!(
                "PAGEWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: gist, file, memory",
                other
            ),
        }

        match self.notifier_type.as_str() {
            "line" => {
                let needs_token = self.mode != Mode::DryRun;
                if needs_token && self.line_channel_access_token.is_none() {
                    anyhow::bail!(
                        "LINE_CHANNEL_ACCESS_TOKEN is required when PAGEWATCH_NOTIFIER_TYPE=line"
                    );
                }
            }
            "log" => {}
            other => anyhow::bail!(
                "PAGEWATCH_NOTIFIER_TYPE '{}' is not supported. Supported types: line, log",
                other
            ),
        }

        if self.jitter_min_secs > self.jitter_max_secs {
            anyhow::bail!(
                "PAGEWATCH_JITTER_MIN_SECS ({}) cannot exceed PAGEWATCH_JITTER_MAX_SECS ({})",
                self.jitter_min_secs,
                self.jitter_max_secs
            );
        }

        if self.jitter_max_secs > 3600 {
            anyhow::bail!(
                "PAGEWATCH_JITTER_MAX_SECS must be at most 3600 seconds. Got: {}",
                self.jitter_max_secs
            );
        }

        parse_log_level(&self.log_level)?;

        Ok(())
    }

    fn state_store_config(&self) -> StateStoreConfig {
        match self.state_store_type.as_str() {
            "file" => StateStoreConfig::File {
                path: self.state_store_path.clone().unwrap_or_default(),
            },
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::Gist {
                gist_id: self.gist_id.clone().unwrap_or_default(),
                token: self.gist_token.clone().unwrap_or_default(),
                file_name: "state.json".to_string(),
            },
        }
    }

    fn notifier_config(&self) -> NotifierConfig {
        match self.notifier_type.as_str() {
            "line" => NotifierConfig::Line {
                channel_access_token: self.line_channel_access_token.clone().unwrap_or_default(),
            },
            _ => NotifierConfig::Log,
        }
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "PAGEWATCH_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PagewatchExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PagewatchExitCode::ConfigError.into();
    }

    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PagewatchExitCode::ConfigError.into();
    }

    info!("Starting pagewatchd ({:?} mode)", config.mode);
    debug!("Configuration: {:?}", config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PagewatchExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(config).await {
            Ok(()) => PagewatchExitCode::Success,
            Err(e) => {
                error!("pagewatchd failed: {:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Configuration problems exit with 1, everything else with 2
fn exit_code_for(error: &anyhow::Error) -> PagewatchExitCode {
    match error.downcast_ref::<pagewatch_core::Error>() {
        Some(pagewatch_core::Error::Config(_))
        | Some(pagewatch_core::Error::Yaml(_))
        | Some(pagewatch_core::Error::Io(_)) => PagewatchExitCode::ConfigError,
        _ => PagewatchExitCode::RuntimeError,
    }
}

/// Build the registry with every collaborator compiled in
fn build_registry() -> CollaboratorRegistry {
    let registry = CollaboratorRegistry::with_builtins();

    pagewatch_fetch_http::register(&registry);

    #[cfg(feature = "chromium")]
    {
        debug!("Registering Chromium renderer");
        pagewatch_render_chromium::register(&registry);
    }

    #[cfg(feature = "gist")]
    {
        debug!("Registering gist state store");
        pagewatch_store_gist::register(&registry);
    }

    #[cfg(feature = "line")]
    {
        debug!("Registering LINE notifier");
        pagewatch_notify_line::register(&registry);
    }

    registry
}

/// Recipient list: the gist's `recipients.json` when a gist is configured,
/// always merged with `LINE_USER_IDS`
fn recipient_source(config: &Config) -> Result<Box<dyn RecipientSource>> {
    #[cfg(feature = "gist")]
    {
        if let (Some(gist_id), Some(token)) = (&config.gist_id, &config.gist_token) {
            let client = pagewatch_store_gist::GistClient::new(gist_id.clone(), token.clone())?;
            return Ok(Box::new(pagewatch_store_gist::GistRecipientSource::new(
                std::sync::Arc::new(client),
                config.line_user_ids.clone(),
            )));
        }
    }

    Ok(Box::new(StaticRecipients::new(config.line_user_ids.clone())))
}

async fn run(config: Config) -> Result<()> {
    let registry = build_registry();

    if config.mode == Mode::TestPush {
        return test_push(&config, &registry).await;
    }

    let watch_config = WatchConfig::from_yaml_file(&config.targets_path).await?;
    info!(
        "Loaded {} target(s) from {}",
        watch_config.targets.len(),
        config.targets_path
    );

    let acquirers = build_acquirers(&registry, &watch_config)?;
    let (engine, events) = WatchEngine::new(watch_config, acquirers)?;
    let event_log = tokio::spawn(log_events(events));

    let store = registry
        .create_state_store(&config.state_store_config())
        .await?;
    let recipients = recipient_source(&config)?;

    let watcher = match config.mode {
        Mode::DryRun => {
            let snapshot = store.load().await?;
            Watcher::new(
                engine,
                Box::new(MemoryStateStore::with_states(snapshot)),
                recipients,
                Box::new(LogNotifier),
            )
            .without_commit()
        }
        _ => {
            let notifier = registry.create_notifier(&config.notifier_config())?;
            Watcher::new(engine, store, recipients, notifier)
        }
    };

    sleep_jitter(config.jitter_min_secs, config.jitter_max_secs).await;

    // Only the part before the commit may be abandoned; once state is saved
    // the report for it is always sent.
    let committed = tokio::select! {
        result = watcher.commit_run() => result.map_err(anyhow::Error::from),
        signal = wait_for_shutdown_signal() => match signal {
            Ok(name) => Err(anyhow::anyhow!("Interrupted by {}; cycle abandoned", name)),
            Err(e) => Err(e),
        },
    };
    let outcome = match committed {
        Ok(committed) => Ok(watcher.notify(committed).await),
        Err(e) => Err(e),
    };

    watcher.shutdown().await;
    drop(watcher);
    if let Err(e) = event_log.await {
        debug!("Event logger ended abnormally: {}", e);
    }

    let report = outcome?;
    info!(
        "Cycle finished: {} observed, {} held, {} transition(s), saved: {}",
        report.run.stats.observed,
        report.run.stats.held_failed + report.run.stats.held_not_ready,
        report.run.stats.transitions,
        report.saved
    );
    if let Some(delivery) = &report.delivery
        && !delivery.all_delivered()
    {
        warn!(
            "Report delivered to {} of {} recipient(s)",
            delivery.delivered.len(),
            delivery.delivered.len() + delivery.failed.len()
        );
    }

    Ok(())
}

/// One acquirer per engine kind used by an enabled target
fn build_acquirers(
    registry: &CollaboratorRegistry,
    watch_config: &WatchConfig,
) -> Result<Vec<Box<dyn TextAcquirer>>> {
    let mut engines: Vec<AcquisitionEngine> = Vec::new();
    for target in watch_config.enabled_targets() {
        if !engines.contains(&target.engine) {
            engines.push(target.engine);
        }
    }

    engines
        .into_iter()
        .map(|engine| {
            registry
                .create_acquirer(engine, &watch_config.engine)
                .map_err(anyhow::Error::from)
        })
        .collect()
}

/// Drain engine events into the log until the engine is dropped
async fn log_events(mut events: tokio::sync::mpsc::Receiver<WatchEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Watch event: {:?}", event);
    }
}

async fn sleep_jitter(min_secs: u64, max_secs: u64) {
    if max_secs == 0 {
        return;
    }
    let secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    info!("Sleeping {}s before the first request", secs);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

async fn test_push(config: &Config, registry: &CollaboratorRegistry) -> Result<()> {
    let recipients = recipient_source(config)?.recipients().await?;
    info!(
        "Recipients ({}): {}",
        recipients.len(),
        recipients
            .iter()
            .map(|r| mask_recipient(r))
            .collect::<Vec<_>>()
            .join(", ")
    );
    if recipients.is_empty() {
        anyhow::bail!("No recipients configured; add them to recipients.json or LINE_USER_IDS");
    }

    let notifier = registry.create_notifier(&config.notifier_config())?;
    let report = broadcast(notifier.as_ref(), &recipients, TEST_PUSH_MESSAGE).await;
    if report.delivered.is_empty() {
        anyhow::bail!("Test push failed for every recipient");
    }
    Ok(())
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
