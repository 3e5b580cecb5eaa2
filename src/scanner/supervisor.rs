//! Scan supervisor - startup and worker lifecycle
//!
//! Opens storage, provisions the configured instances, plants their seed
//! accounts and then runs one `InstanceWorker` per instance until the
//! process is stopped.

use crate::api::{build_http_client, MastodonClient};
use crate::config::{Config, InstanceEntry};
use crate::identity::{resolve, AccountLookup, HttpAccountLookup};
use crate::scanner::worker::{InstanceWorker, WorkerSettings};
use crate::storage::{Account, Instance, SqliteStorage, Storage, StorageResult};
use crate::FediError;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Runs the scanner described by `config`
///
/// Only returns early on startup errors; once the workers are spawned it
/// runs until they all stop, which in practice means until the process
/// is interrupted.
pub async fn run_scan(config: Config) -> Result<(), FediError> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?
        .with_selection(config.scanner.rescan_after(), config.scanner.batch_size);
    let storage: Arc<dyn Storage> = Arc::new(storage);

    let http = build_http_client(&config.user_agent)?;
    let lookup: Arc<dyn AccountLookup> = Arc::new(HttpAccountLookup::new(http.clone()));

    if config.instances.is_empty() {
        tracing::warn!("No instances configured, nothing to scan");
        return Ok(());
    }

    let instances = provision_instances(&config.instances, storage.as_ref())?;

    for (instance, entry) in instances.iter().zip(&config.instances) {
        let planted = seed_accounts(instance, &entry.seeds, lookup.as_ref(), storage.as_ref()).await;
        tracing::info!(
            "Planted {} of {} seed accounts on {}",
            planted,
            entry.seeds.len(),
            instance.domain
        );
    }

    let settings = WorkerSettings::from(&config.scanner);
    let mut workers = Vec::with_capacity(instances.len());
    for instance in instances {
        let client = MastodonClient::for_instance(http.clone(), &instance)?
            .with_paging(config.scanner.page_limit, config.scanner.max_pages);
        workers.push(InstanceWorker::new(
            instance,
            Box::new(client),
            lookup.clone(),
            storage.clone(),
            settings,
        ));
    }

    run_workers(workers).await;
    Ok(())
}

/// Stores every configured instance with its credentials
///
/// Existing records keep their domain and get their credentials replaced.
pub fn provision_instances(
    entries: &[InstanceEntry],
    storage: &dyn Storage,
) -> StorageResult<Vec<Instance>> {
    entries
        .iter()
        .map(|entry| {
            let instance = Instance::with_credentials(
                entry.domain.as_str(),
                entry.client_id.as_str(),
                entry.client_secret.as_str(),
                entry.username.as_str(),
                entry.password.as_str(),
            );
            storage.upsert_instance(&instance)?;
            tracing::debug!("Provisioned instance {}", instance.domain);
            Ok(instance)
        })
        .collect()
}

/// Records the seed accounts of `instance`, returning how many were created
///
/// Bare seeds belong to `instance`; qualified ones are looked up on their
/// own instance. Seeds already known with an id are left alone. Malformed
/// or unresolvable seeds are logged and skipped.
pub async fn seed_accounts(
    instance: &Instance,
    seeds: &[String],
    lookup: &dyn AccountLookup,
    storage: &dyn Storage,
) -> usize {
    let mut planted = 0;

    for seed in seeds {
        let (username, domain) = match resolve(seed, &instance.domain) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!("Skipping seed: {}", e);
                continue;
            }
        };

        match storage.get_account(&username, &domain) {
            Ok(Some(existing)) if existing.id.is_some() => continue,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to look up seed {}@{}: {}", username, domain, e);
                continue;
            }
        }

        let id = match lookup.resolve_foreign_account_id(&username, &domain).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Could not resolve seed {}@{}: {}", username, domain, e);
                continue;
            }
        };

        if let Err(e) = storage.create_instance_if_not_exist(&Instance::discovered(&domain)) {
            tracing::error!("Failed to record instance {}: {}", domain, e);
            continue;
        }

        let account = Account::new(Some(id), username, domain);
        match storage.create_account_if_not_exist(&account) {
            Ok(true) => planted += 1,
            Ok(false) => {
                // known without an id; the scan loop only selects resolved accounts
                if let Err(e) = storage.save_account(&account) {
                    tracing::error!("Failed to update seed {}: {}", account.handle(), e);
                } else {
                    planted += 1;
                }
            }
            Err(e) => tracing::error!("Failed to record seed {}: {}", account.handle(), e),
        }
    }

    planted
}

/// Spawns every worker on its own task and waits for them
pub async fn run_workers(workers: Vec<InstanceWorker>) {
    let mut tasks = JoinSet::new();

    for worker in workers {
        tracing::info!("Spawning worker for {}", worker.instance().domain);
        tasks.spawn(worker.run());
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Worker task ended abnormally: {}", e);
        }
    }
}
