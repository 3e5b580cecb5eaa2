//! Instance worker - the per-instance scan loop
//!
//! One worker owns one instance. Every cycle it:
//! 1. Re-authenticates with the instance's service account
//! 2. Asks storage for the accounts due for a scan
//! 3. Fetches followers and followings of each account
//! 4. Resolves every returned handle and records new accounts/instances
//! 5. Saves the counters of fully scanned accounts
//!
//! and then sleeps for the configured cycle interval.

use crate::api::{ApiError, Relation, RelationshipFetcher, RemoteAccount};
use crate::config::{FailurePolicy, ScannerConfig};
use crate::identity::{resolve, AccountLookup};
use crate::scanner::classify::{classify, ErrorKind};
use crate::storage::{Account, Instance, Storage};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Timing and policy knobs of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Sleep between two cycles
    pub cycle_interval: Duration,
    /// Sleep after a transient fetch failure
    pub transient_pause: Duration,
    pub failure_policy: FailurePolicy,
}

impl From<&ScannerConfig> for WorkerSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            cycle_interval: config.cycle_interval(),
            transient_pause: config.transient_pause(),
            failure_policy: config.failure_policy,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

/// Where a worker is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Authenticating,
    Scanning,
    /// The last cycle was abandoned; waiting out the cycle interval
    Backoff,
}

/// Split of one relationship batch by locality
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Accounts hosted on the scanned instance
    pub local: u32,
    /// Accounts hosted elsewhere
    pub remote: u32,
}

/// Summary of one scan cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub authenticated: bool,
    /// Accounts returned by the selection query
    pub selected: usize,
    /// Accounts whose both relations were fetched and saved
    pub saved: usize,
    /// Accounts left unsaved after a transient failure
    pub incomplete: usize,
    /// Accounts deleted after a not-found answer
    pub removed: usize,
    pub discovered_accounts: usize,
    pub discovered_instances: usize,
    /// Set when the cycle stopped early
    pub abandoned: Option<ErrorKind>,
}

enum AccountOutcome {
    Saved,
    Incomplete,
    Removed,
    Abandon(ErrorKind),
}

/// Crawl loop of a single instance
pub struct InstanceWorker {
    instance: Instance,
    fetcher: Box<dyn RelationshipFetcher>,
    lookup: Arc<dyn AccountLookup>,
    storage: Arc<dyn Storage>,
    settings: WorkerSettings,
    phase: WorkerPhase,
}

impl InstanceWorker {
    pub fn new(
        instance: Instance,
        fetcher: Box<dyn RelationshipFetcher>,
        lookup: Arc<dyn AccountLookup>,
        storage: Arc<dyn Storage>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            instance,
            fetcher,
            lookup,
            storage,
            settings,
            phase: WorkerPhase::Authenticating,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Runs cycles forever, sleeping `cycle_interval` after each one
    pub async fn run(mut self) {
        tracing::info!("Starting scan worker for {}", self.instance.domain);

        loop {
            let report = self.run_cycle().await;
            tracing::info!(
                "Cycle on {} done: {} selected, {} saved, {} incomplete, {} removed, {} new accounts, {} new instances",
                self.instance.domain,
                report.selected,
                report.saved,
                report.incomplete,
                report.removed,
                report.discovered_accounts,
                report.discovered_instances
            );
            if let Some(kind) = report.abandoned {
                tracing::warn!(
                    "Cycle on {} abandoned ({}), backing off for {:?}",
                    self.instance.domain,
                    kind,
                    self.settings.cycle_interval
                );
            }

            tokio::time::sleep(self.settings.cycle_interval).await;
        }
    }

    /// Runs one cycle: authenticate, select, scan every selected account
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport {
            authenticated: self.authenticate().await,
            ..CycleReport::default()
        };
        self.phase = WorkerPhase::Scanning;

        let accounts = match self.storage.find_accounts_to_scan(&self.instance) {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::error!(
                    "Failed to select accounts to scan on {}: {}",
                    self.instance.domain,
                    e
                );
                return report;
            }
        };
        report.selected = accounts.len();
        tracing::debug!(
            "{} accounts due for a scan on {}",
            accounts.len(),
            self.instance.domain
        );

        for account in accounts {
            match self.scan_account(account, &mut report).await {
                AccountOutcome::Saved => report.saved += 1,
                AccountOutcome::Incomplete => report.incomplete += 1,
                AccountOutcome::Removed => report.removed += 1,
                AccountOutcome::Abandon(kind) => {
                    report.abandoned = Some(kind);
                    self.phase = WorkerPhase::Backoff;
                    break;
                }
            }
        }

        report
    }

    /// Obtains a fresh token; failures are logged and the cycle goes on
    async fn authenticate(&mut self) -> bool {
        self.phase = WorkerPhase::Authenticating;

        let Some((username, password)) = self.instance.login() else {
            tracing::warn!(
                "No service account for {}, scanning unauthenticated",
                self.instance.domain
            );
            return false;
        };

        match self.fetcher.authenticate(username, password).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Authentication against {} failed: {}", self.instance.domain, e);
                false
            }
        }
    }

    async fn scan_account(&self, mut account: Account, report: &mut CycleReport) -> AccountOutcome {
        let Some(account_id) = account.id else {
            tracing::debug!("Skipping {} without a resolved id", account.handle());
            return AccountOutcome::Incomplete;
        };

        let mut complete = true;

        for relation in Relation::ALL {
            let err = match self.fetcher.relation(relation, account_id).await {
                Ok(batch) => {
                    let tally = self.record_batch(&batch, report).await;
                    apply_tally(&mut account, relation, tally);
                    continue;
                }
                Err(err) => err,
            };

            tracing::warn!(
                "Error when getting {} for account {}@{}: {}",
                relation,
                account_id,
                self.instance.domain,
                err
            );

            let kind = self.classify_failure(&err);
            if kind.abandons_cycle() {
                return AccountOutcome::Abandon(kind);
            }
            if kind == ErrorKind::NotFound {
                if let Err(e) = self.storage.remove_account(&account) {
                    tracing::error!("Failed to remove {}: {}", account.handle(), e);
                }
                return AccountOutcome::Removed;
            }

            complete = false;
            if !self.settings.transient_pause.is_zero() {
                tokio::time::sleep(self.settings.transient_pause).await;
            }
        }

        if !complete {
            return AccountOutcome::Incomplete;
        }

        account.last_scan = Some(Utc::now());
        if let Err(e) = self.storage.save_account(&account) {
            tracing::error!("Failed to save {}: {}", account.handle(), e);
            return AccountOutcome::Incomplete;
        }
        AccountOutcome::Saved
    }

    fn classify_failure(&self, err: &ApiError) -> ErrorKind {
        match self.settings.failure_policy {
            FailurePolicy::Classified => classify(err),
            FailurePolicy::Retry => ErrorKind::Transient,
        }
    }

    /// Resolves and records every handle of a batch, returning its locality split
    async fn record_batch(&self, batch: &[RemoteAccount], report: &mut CycleReport) -> Tally {
        let mut tally = Tally::default();

        for remote in batch {
            let account = match self.resolve_account(remote).await {
                Some(account) => account,
                None => continue,
            };

            match self
                .storage
                .create_instance_if_not_exist(&Instance::discovered(&account.instance))
            {
                Ok(true) => {
                    tracing::info!("Discovered instance {}", account.instance);
                    report.discovered_instances += 1;
                }
                Ok(false) => {}
                Err(e) => tracing::error!("Failed to record instance {}: {}", account.instance, e),
            }

            if account.id.is_some() {
                match self.storage.create_account_if_not_exist(&account) {
                    Ok(true) => report.discovered_accounts += 1,
                    Ok(false) => {}
                    Err(e) => tracing::error!("Failed to record {}: {}", account.handle(), e),
                }
            }

            if account.instance == self.instance.domain {
                tally.local += 1;
            } else {
                tally.remote += 1;
            }
        }

        tally
    }

    /// Turns a listing entry into an account, looking up foreign identifiers
    ///
    /// Returns `None` for malformed handles. Foreign accounts whose lookup
    /// fails come back with `id: None`.
    async fn resolve_account(&self, remote: &RemoteAccount) -> Option<Account> {
        let (username, domain) = match resolve(&remote.acct, &self.instance.domain) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!("Skipping handle from {}: {}", self.instance.domain, e);
                return None;
            }
        };

        let id = if domain == self.instance.domain {
            Some(remote.id)
        } else {
            match self
                .lookup
                .resolve_foreign_account_id(&username, &domain)
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("Could not resolve {}@{}: {}", username, domain, e);
                    None
                }
            }
        };

        tracing::debug!("Observed {}@{} (id {:?})", username, domain, id);
        Some(Account::new(id, username, domain))
    }
}

fn apply_tally(account: &mut Account, relation: Relation, tally: Tally) {
    match relation {
        Relation::Followers => {
            account.local_followers = tally.local;
            account.remote_followers = tally.remote;
        }
        Relation::Following => {
            account.local_followings = tally.local;
            account.remote_followings = tally.remote;
        }
    }
}
