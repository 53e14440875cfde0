//! Command implementations for the renewal daemon.
//!
//! Handlers take loaded [`Settings`] and return serializable results; the
//! binary prints them as JSON on stdout. Logs go to stderr.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use renewal_engine::{
    classify, GenerationSummary, RebalanceRequest, RegenerationCoordinator,
    RetryPolicy, RunControl, Scope,
};
use renewal_scheduler::{
    create_renewal_job, RenewalJobConfig, SchedulerConfig, SchedulerService, RENEWAL_JOB_NAME,
};
use renewal_storage::{Dataset, ImportStats, Storage};
use renewal_types::{ExpiryStatus, Provenance, Session, SessionStatus, Settings};

use crate::cli::GenerateArgs;

/// Load configuration and apply the global CLI overrides.
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    data_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(data) = data_override {
        settings.data_path = data.to_string();
    }
    Ok(settings)
}

/// Initialize logging to stderr. `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_data_path();
    fs::create_dir_all(&db_path).context("Failed to create database directory")?;
    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

fn coordinator(storage: &Arc<Storage>, settings: &Settings) -> RegenerationCoordinator {
    RegenerationCoordinator::new(storage.clone(), storage.clone(), storage.clone())
        .with_retry(RetryPolicy::from(&settings.retry))
}

/// Run control that cancels on Ctrl+C.
fn interruptible(timeout: Duration) -> RunControl {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling run");
            token.cancel();
        }
    });
    RunControl::new(timeout).with_cancel(cancel)
}

/// Generate sessions with the given overrides.
pub async fn handle_generate(
    settings: &Settings,
    args: &GenerateArgs,
) -> Result<GenerationSummary> {
    let request = args.to_request(&settings.engine);
    let timeout =
        Duration::from_secs(args.timeout_secs.unwrap_or(settings.engine.run_timeout_secs));

    let storage = open_storage(settings)?;
    let summary = coordinator(&storage, settings)
        .generate(request, Utc::now(), interruptible(timeout))
        .await?;
    storage.flush().context("Failed to flush storage")?;
    Ok(summary)
}

/// Rebalance existing sessions to a new capacity.
pub async fn handle_regenerate(
    settings: &Settings,
    capacity: u32,
    requirements: &[String],
    timeout_secs: Option<u64>,
) -> Result<GenerationSummary> {
    let request = RebalanceRequest::new(capacity, settings.engine.days_before_expiry)
        .with_scope(Scope::requirements(requirements.iter().cloned()));
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(settings.engine.run_timeout_secs));

    let storage = open_storage(settings)?;
    let summary = coordinator(&storage, settings)
        .regenerate_with_capacity(request, Utc::now(), interruptible(timeout))
        .await?;
    storage.flush().context("Failed to flush storage")?;
    Ok(summary)
}

/// Output of the `classify` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyReport {
    pub expiry_date: Option<NaiveDate>,
    pub status: ExpiryStatus,
    pub days_remaining: Option<i64>,
    /// Expiring soon, critical or expired
    pub needs_attention: bool,
}

/// Classify an issue date; `now` defaults to the current instant.
pub fn handle_classify(
    issue_date: NaiveDate,
    validity_months: Option<u32>,
    now: Option<DateTime<Utc>>,
) -> ClassifyReport {
    let classification = classify(issue_date, validity_months, now.unwrap_or_else(Utc::now));
    ClassifyReport {
        expiry_date: classification.expiry_date,
        status: classification.status,
        days_remaining: classification.days_remaining,
        needs_attention: classification.status.needs_attention(),
    }
}

/// One line of session listing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub session_id: String,
    pub requirement_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub provenance: Provenance,
    pub capacity: u32,
    pub roster_size: usize,
    pub instructor_id: Option<String>,
    pub location: String,
}

impl From<&Session> for SessionRow {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            requirement_id: session.requirement_id.clone(),
            scheduled_at: session.scheduled_at,
            status: session.status,
            provenance: session.provenance,
            capacity: session.capacity,
            roster_size: session.roster.len(),
            instructor_id: session.instructor_id.clone(),
            location: session.location.clone(),
        }
    }
}

/// List stored sessions ordered by date, optionally by requirement.
pub fn handle_sessions(settings: &Settings, requirements: &[String]) -> Result<Vec<SessionRow>> {
    let scope = Scope::requirements(requirements.iter().cloned());
    let storage = open_storage(settings)?;
    let mut rows: Vec<SessionRow> = storage
        .list_sessions()
        .context("Failed to list sessions")?
        .iter()
        .filter(|s| scope.contains(&s.requirement_id))
        .map(SessionRow::from)
        .collect();
    rows.sort_by(|a, b| {
        a.scheduled_at
            .cmp(&b.scheduled_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    Ok(rows)
}

/// Import a JSON dataset file.
pub fn handle_import(settings: &Settings, file: &Path) -> Result<ImportStats> {
    let dataset = Dataset::from_path(file)
        .with_context(|| format!("Failed to read dataset {}", file.display()))?;
    let storage = open_storage(settings)?;
    let stats = storage.import(&dataset).context("Failed to import dataset")?;
    storage.flush().context("Failed to flush storage")?;
    Ok(stats)
}

/// Host the cron scheduler until Ctrl+C or SIGTERM.
pub async fn run_scheduler(settings: &Settings) -> Result<()> {
    info!("Renewal scheduler starting...");
    info!("  Database path: {}", settings.data_path);
    info!("  Schedule: {} ({})", settings.schedule.cron, settings.schedule.timezone);

    let storage = open_storage(settings)?;
    let coordinator = Arc::new(coordinator(&storage, settings));

    let mut scheduler = SchedulerService::new(SchedulerConfig::from(&settings.schedule))
        .await
        .context("Failed to create scheduler")?;
    create_renewal_job(&scheduler, coordinator, RenewalJobConfig::from_settings(settings))
        .await
        .context("Failed to register renewal job")?;
    scheduler.start().await.context("Failed to start scheduler")?;

    shutdown_signal().await;

    scheduler
        .shutdown()
        .await
        .context("Failed to stop scheduler")?;
    if let Some(status) = scheduler.registry().get_status(RENEWAL_JOB_NAME) {
        info!(
            runs = status.run_count,
            errors = status.error_count,
            "Renewal job summary"
        );
    }
    storage.flush().context("Failed to flush storage")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
