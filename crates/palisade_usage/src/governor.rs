//! The usage governor: records calls, enforces quotas, persists per service.

use crate::{
    CallRecord, Clock, LimitKind, ServiceQuota, ServiceStats, ServiceUsageRecord, SystemClock,
    UsageConfig, UsageReport,
};
use chrono::{DateTime, TimeDelta, Utc};
use palisade_error::{
    ConfigError, ExceededLimit, PalisadeResult, StorageError, StorageErrorKind,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// File extension of persisted usage records.
const RECORD_EXTENSION: &str = "json";

struct GovernorState {
    records: HashMap<String, ServiceUsageRecord>,
    last_save: Instant,
}

/// Tracks calls, costs and quotas for every outbound service.
///
/// One record per service name, created lazily on the first recorded call (or
/// first configuration change) and persisted as `<service>.json` in the data
/// directory. All operations take a single coarse lock for their duration.
///
/// Quota checks return a sentinel rather than an error; the caller decides
/// how to surface a blocked call.
///
/// # Example
///
/// ```
/// use palisade_error::ExceededLimit;
/// use palisade_usage::{CallRecord, LimitKind, UsageGovernor};
///
/// # #[tokio::main]
/// # async fn main() -> palisade_error::PalisadeResult<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let governor = UsageGovernor::open(dir.path()).await?;
///
/// governor.set_limit("search", LimitKind::Hourly, Some(2)).await;
/// governor.record_call("search", CallRecord::new("/query", true)).await;
/// assert_eq!(governor.check_limits("search").await, None);
///
/// governor.record_call("search", CallRecord::new("/query", false)).await;
/// assert_eq!(governor.check_limits("search").await, Some(ExceededLimit::Hourly));
/// # Ok(())
/// # }
/// ```
pub struct UsageGovernor {
    data_dir: PathBuf,
    state: Mutex<GovernorState>,
    clock: Arc<dyn Clock>,
    auto_save: bool,
    save_interval: Duration,
}

impl std::fmt::Debug for UsageGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageGovernor")
            .field("data_dir", &self.data_dir)
            .field("clock", &self.clock)
            .field("auto_save", &self.auto_save)
            .field("save_interval", &self.save_interval)
            .finish_non_exhaustive()
    }
}

impl UsageGovernor {
    /// Open (creating if needed) a data directory and load every saved record.
    ///
    /// Unreadable or corrupt record files are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    #[tracing::instrument(skip_all, fields(dir = %data_dir.as_ref().display()))]
    pub async fn open(data_dir: impl AsRef<Path>) -> PalisadeResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                data_dir.display(),
                e
            )))
        })?;

        let records = load_records(&data_dir).await;
        info!(services = records.len(), "Loaded usage records");

        Ok(Self {
            data_dir,
            state: Mutex::new(GovernorState {
                records,
                last_save: Instant::now(),
            }),
            clock: Arc::new(SystemClock),
            auto_save: true,
            save_interval: Duration::from_secs(60),
        })
    }

    /// Open the configured directory, set auto-save and apply preconfigured quotas.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the directory
    /// cannot be created.
    pub async fn from_config(config: &UsageConfig) -> PalisadeResult<Self> {
        config.validate()?;
        let governor = Self::open(config.resolved_data_dir())
            .await?
            .with_auto_save(*config.auto_save(), config.save_interval());
        governor.apply_quotas(config.services()).await;
        Ok(governor)
    }

    /// Use `clock` for bucket keys.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enable or disable saving from `record_call`, and set the minimum interval.
    pub fn with_auto_save(mut self, auto_save: bool, save_interval: Duration) -> Self {
        self.auto_save = auto_save;
        self.save_interval = save_interval;
        self
    }

    /// Directory holding the record files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Record one call for `service`.
    ///
    /// Every counter update for the call happens under one lock acquisition.
    /// Saves afterwards when auto-save is on and the interval has elapsed.
    #[tracing::instrument(skip(self, call), fields(endpoint = %call.endpoint(), success = call.success()))]
    pub async fn record_call(&self, service: &str, call: CallRecord) {
        if !is_valid_service_name(service) {
            warn!(service, "Refusing to record usage for invalid service name");
            return;
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let record = state
            .records
            .entry(service.to_string())
            .or_insert_with(|| ServiceUsageRecord::new(service, now));
        let charged = record.apply(now, &call);
        debug!(charged, total_calls = record.total_calls(), "Recorded call");

        if self.auto_save && state.last_save.elapsed() > self.save_interval {
            self.persist_all(&mut state).await;
        }
    }

    /// The first limit `service` has reached, or `None`.
    ///
    /// Checked in order hourly, daily, monthly, total, budget; a limit is
    /// reached when usage is at or above it. Unknown services are never limited.
    pub async fn check_limits(&self, service: &str) -> Option<ExceededLimit> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let exceeded = state.records.get(service)?.exceeded_limit(now);
        if let Some(limit) = exceeded {
            warn!(service, %limit, "Usage limit reached");
        }
        exceeded
    }

    /// Set (or with `None`, remove) a call-count limit, then save.
    ///
    /// Returns `false` when the service name is rejected and nothing changed.
    pub async fn set_limit(&self, service: &str, kind: LimitKind, value: Option<u64>) -> bool {
        if !is_valid_service_name(service) {
            warn!(service, "Refusing to set limit for invalid service name");
            return false;
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state
            .records
            .entry(service.to_string())
            .or_insert_with(|| ServiceUsageRecord::new(service, now))
            .limits_mut()
            .set(kind, value);
        info!(service, %kind, ?value, "Usage limit set");
        self.persist_one(&mut state, service).await;
        true
    }

    /// Update the per-call cost and/or monthly budget, then save.
    ///
    /// `None` leaves a setting unchanged. Returns `false` when the service
    /// name is rejected and nothing changed.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is negative or not finite; nothing is changed.
    pub async fn set_cost_info(
        &self,
        service: &str,
        cost_per_call: Option<f64>,
        monthly_budget: Option<f64>,
    ) -> PalisadeResult<bool> {
        let mut quota = ServiceQuota::default();
        if let Some(cost) = cost_per_call {
            quota = quota.with_cost_per_call(cost);
        }
        if let Some(budget) = monthly_budget {
            quota = quota.with_monthly_budget(budget);
        }
        quota.validate().map_err(ConfigError::new)?;
        if !is_valid_service_name(service) {
            warn!(service, "Refusing to set cost info for invalid service name");
            return Ok(false);
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let costs = state
            .records
            .entry(service.to_string())
            .or_insert_with(|| ServiceUsageRecord::new(service, now))
            .costs_mut();
        if let Some(cost) = cost_per_call {
            costs.set_cost_per_call(cost);
        }
        if monthly_budget.is_some() {
            costs.set_monthly_budget(monthly_budget);
        }
        info!(service, ?cost_per_call, ?monthly_budget, "Cost info set");
        self.persist_one(&mut state, service).await;
        Ok(true)
    }

    /// Remove the monthly budget for `service`, then save.
    pub async fn clear_budget(&self, service: &str) {
        let mut state = self.state.lock().await;
        if let Some(record) = state.records.get_mut(service) {
            record.costs_mut().set_monthly_budget(None);
            info!(service, "Monthly budget removed");
            self.persist_one(&mut state, service).await;
        }
    }

    /// Apply preconfigured quotas. Fields left unset keep their current value.
    pub async fn apply_quotas(&self, quotas: &BTreeMap<String, ServiceQuota>) {
        if quotas.is_empty() {
            return;
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        for (service, quota) in quotas {
            if !is_valid_service_name(service) {
                warn!(service = %service, "Skipping quota for invalid service name");
                continue;
            }
            let record = state
                .records
                .entry(service.clone())
                .or_insert_with(|| ServiceUsageRecord::new(service.as_str(), now));
            let limits = record.limits_mut();
            for (kind, value) in [
                (LimitKind::Hourly, quota.hourly()),
                (LimitKind::Daily, quota.daily()),
                (LimitKind::Monthly, quota.monthly()),
                (LimitKind::Total, quota.total()),
            ] {
                if value.is_some() {
                    limits.set(kind, *value);
                }
            }
            let costs = record.costs_mut();
            if let Some(cost) = quota.cost_per_call() {
                costs.set_cost_per_call(*cost);
            }
            if quota.monthly_budget().is_some() {
                costs.set_monthly_budget(*quota.monthly_budget());
            }
        }
        info!(services = quotas.len(), "Applied configured quotas");
        self.persist_all(&mut state).await;
    }

    /// Usage for one service, or for every service plus a summary.
    ///
    /// An unknown service yields an empty report.
    pub async fn usage_stats(&self, service: Option<&str>) -> UsageReport {
        let now = self.clock.now();
        let state = self.state.lock().await;
        match service {
            Some(name) => UsageReport::single(
                state
                    .records
                    .get(name)
                    .map(|record| (name.to_string(), ServiceStats::from_record(record, now))),
            ),
            None => UsageReport::all(
                state
                    .records
                    .iter()
                    .map(|(name, record)| (name.clone(), ServiceStats::from_record(record, now)))
                    .collect(),
            ),
        }
    }

    /// Copy of the full record for `service`.
    pub async fn record(&self, service: &str) -> Option<ServiceUsageRecord> {
        self.state.lock().await.records.get(service).cloned()
    }

    /// Names of all tracked services, sorted.
    pub async fn services(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut names: Vec<_> = state.records.keys().cloned().collect();
        names.sort();
        names
    }

    /// Zero counters and costs for one service (or all), keeping limits,
    /// `cost_per_call` and `monthly_budget`. Saves afterwards.
    pub async fn clear_usage_data(&self, service: Option<&str>) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match service {
            Some(name) => {
                if let Some(record) = state.records.get_mut(name) {
                    record.reset(now);
                    info!(service = name, "Usage data cleared");
                }
            }
            None => {
                for record in state.records.values_mut() {
                    record.reset(now);
                }
                info!(services = state.records.len(), "All usage data cleared");
            }
        }
        self.persist_all(&mut state).await;
    }

    /// Delete hourly and daily buckets older than `older_than_days`, then save.
    ///
    /// A cutoff before the earliest representable time prunes nothing.
    /// Returns the number of buckets removed.
    pub async fn prune_old_data(&self, older_than_days: u32) -> usize {
        let now = self.clock.now();
        let cutoff = TimeDelta::try_days(i64::from(older_than_days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut state = self.state.lock().await;
        let removed: usize = state
            .records
            .values_mut()
            .map(|record| record.prune(cutoff))
            .sum();
        info!(older_than_days, removed, "Pruned usage buckets");
        self.persist_all(&mut state).await;
        removed
    }

    /// Write every record to disk.
    ///
    /// # Errors
    ///
    /// Returns the first write or serialization failure; remaining records
    /// are still attempted.
    pub async fn save(&self) -> PalisadeResult<()> {
        let mut state = self.state.lock().await;
        let mut first_error = None;
        for (service, record) in &state.records {
            if let Err(e) = write_record(&self.data_dir, service, record).await {
                error!(service = %service, error = %e, "Failed to save usage record");
                first_error.get_or_insert(e);
            }
        }
        state.last_save = Instant::now();
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(services = state.records.len(), "Saved usage records");
                Ok(())
            }
        }
    }

    /// Replace in-memory records with what is on disk.
    ///
    /// Records with no file are dropped from memory.
    pub async fn load(&self) {
        let records = load_records(&self.data_dir).await;
        let mut state = self.state.lock().await;
        info!(services = records.len(), "Reloaded usage records");
        state.records = records;
    }

    async fn persist_one(&self, state: &mut GovernorState, service: &str) {
        if let Some(record) = state.records.get(service)
            && let Err(e) = write_record(&self.data_dir, service, record).await
        {
            error!(service, error = %e, "Failed to save usage record");
        }
    }

    async fn persist_all(&self, state: &mut GovernorState) {
        for (service, record) in &state.records {
            if let Err(e) = write_record(&self.data_dir, service, record).await {
                error!(service = %service, error = %e, "Failed to save usage record");
            }
        }
        state.last_save = Instant::now();
    }
}

/// Service names become file names, so they must stay inside the data directory.
fn is_valid_service_name(service: &str) -> bool {
    !service.is_empty()
        && !service.starts_with('.')
        && !service.contains(['/', '\\'])
        && !service.contains('\0')
}

fn record_path(data_dir: &Path, service: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", service, RECORD_EXTENSION))
}

async fn write_record(
    data_dir: &Path,
    service: &str,
    record: &ServiceUsageRecord,
) -> PalisadeResult<()> {
    let bytes = serde_json::to_vec_pretty(record).map_err(|e| {
        StorageError::new(StorageErrorKind::Serialization(format!("{}: {}", service, e)))
    })?;

    let path = record_path(data_dir, service);
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    })?;
    tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        )))
    })?;
    Ok(())
}

async fn load_records(data_dir: &Path) -> HashMap<String, ServiceUsageRecord> {
    let mut records = HashMap::new();
    let mut entries = match tokio::fs::read_dir(data_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            let err = StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                data_dir.display(),
                e
            )));
            error!(error = %err, "Failed to list usage directory");
            return records;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read usage directory entry");
                break;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        let Some(service) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !is_valid_service_name(service) {
            continue;
        }

        match read_record(&path).await {
            Ok(record) => {
                records.insert(service.to_string(), record);
            }
            Err(e) => error!(path = %path.display(), error = %e, "Skipping usage record"),
        }
    }
    records
}

async fn read_record(path: &Path) -> PalisadeResult<ServiceUsageRecord> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
    })?;
    let record = serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::new(StorageErrorKind::Deserialization(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(record)
}
