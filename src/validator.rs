//! Validator orchestrating syntax checks, snapshot refresh and matching.

use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::name::{check_syntax, NameMatcher};
use crate::registry::client::ClientOptions;
use crate::registry::{Registry, RegistryClient, RegistryEndpoints};
use crate::snapshot::SnapshotStore;
use crate::sync::{
    NoopObserver, SyncEvent, SyncExecutor, SyncObserver, SyncPlan, SyncPlanner, SyncReport,
};
use crate::types::{Result, ValidationResult, ValidationStatus};
use std::sync::Arc;
use tracing::{debug, info};

/// Check a name against the naming rules only.
///
/// Returns status `Valid` or `Invalid`; nothing is downloaded.
pub fn check_syntax_only(name: &str) -> ValidationResult {
    let report = check_syntax(name);
    if report.valid_for_new_packages() {
        ValidationResult::new(name, ValidationStatus::Valid)
    } else {
        let mut result = ValidationResult::new(name, ValidationStatus::Invalid);
        result.syntax_errors = report.into_messages();
        result
    }
}

/// Validates package names against a locally mirrored registry.
///
/// One validator corresponds to one run: the staleness verdict and the
/// loaded snapshot are computed once and reused for every name checked.
pub struct Validator<R: Registry> {
    registry: R,
    store: SnapshotStore,
    config: SyncConfig,
    planner: SyncPlanner,
    observer: Arc<dyn SyncObserver>,
    cancel: CancelToken,
    stale: Option<bool>,
    synced: bool,
}

impl Validator<RegistryClient> {
    /// Create a validator talking to the given registry endpoints.
    pub fn connect(
        config: SyncConfig,
        endpoints: RegistryEndpoints,
        options: &ClientOptions,
    ) -> Result<Self> {
        let registry = RegistryClient::new(endpoints, options)?;
        let store = SnapshotStore::open(&config.download_dir)?;
        Ok(Self::new(registry, store, config))
    }
}

impl<R: Registry> Validator<R> {
    pub fn new(registry: R, store: SnapshotStore, config: SyncConfig) -> Self {
        Self {
            registry,
            store,
            planner: SyncPlanner::new(config.change_cost_ratio),
            config,
            observer: Arc::new(NoopObserver),
            cancel: CancelToken::new(),
            stale: None,
            synced: false,
        }
    }

    /// Report sync progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Abort downloads when `cancel` fires.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Whether the snapshot is missing, unreadable or older than the
    /// configured max age.
    pub fn is_stale(&mut self) -> Result<bool> {
        if let Some(stale) = self.stale {
            return Ok(stale);
        }
        // Loading first discards a corrupt names file, which then reads as missing.
        self.store.load()?;
        let stale = self.store.is_stale(self.config.max_age_minutes)?;
        self.stale = Some(stale);
        Ok(stale)
    }

    /// Bring the snapshot up to date if it is stale.
    ///
    /// Runs at most once per validator. Returns `None` when nothing was done.
    pub async fn refresh(&mut self) -> Result<Option<SyncReport>> {
        if self.synced {
            return Ok(None);
        }
        if !self.is_stale()? {
            debug!("Snapshot is fresh, skipping sync");
            self.synced = true;
            return Ok(None);
        }

        let Self {
            registry,
            store,
            planner,
            observer,
            cancel,
            config,
            ..
        } = self;

        let remote = registry.remote_info().await?;
        observer.on_event(&SyncEvent::RemoteInfo(remote));

        let local = store.load()?;
        let plan = planner.decide(local, true, &remote);
        let missing = SyncPlanner::missing(local, &remote);
        info!("Sync plan: {:?} ({} sequences behind)", plan, missing);
        observer.on_event(&SyncEvent::Planned { plan, missing });

        let mut executor = SyncExecutor::new(
            &*registry,
            store,
            observer.as_ref(),
            cancel.clone(),
            config.feed_options(),
        );
        let report = match plan {
            SyncPlan::FullRefresh => executor.run_full(&remote).await?,
            SyncPlan::IncrementalUpdate => executor.run_incremental(&remote).await?,
            SyncPlan::NoOp => {
                self.synced = true;
                return Ok(None);
            }
        };

        self.synced = true;
        self.stale = Some(false);
        Ok(Some(report))
    }

    /// Validate `name`: naming rules first, then similarity to every known name.
    pub async fn validate(&mut self, name: &str) -> Result<ValidationResult> {
        let syntax = check_syntax_only(name);
        if syntax.status == ValidationStatus::Invalid {
            return Ok(syntax);
        }

        self.refresh().await?;

        let matcher = NameMatcher::new(name)?;
        let snapshot = self.store.load()?;
        let conflicts = matcher.conflicts(&snapshot.names);
        debug!(
            "{} of {} names collide with {:?}",
            conflicts.len(),
            snapshot.names.len(),
            matcher.name()
        );

        let status = if conflicts.is_empty() {
            ValidationStatus::Available
        } else {
            ValidationStatus::Unavailable
        };
        let mut result = ValidationResult::new(name, status);
        result.conflicting_names = conflicts;
        Ok(result)
    }
}
