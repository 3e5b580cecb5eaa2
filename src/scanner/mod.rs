//! Social-graph scanning
//!
//! This module contains the crawl loop proper:
//! - `classify`: maps API failures to the categories the loop reacts to
//! - `worker`: the per-instance scan cycle
//! - `supervisor`: provisioning, seeding and one task per instance

mod classify;
mod supervisor;
mod worker;

pub use classify::{classify, ErrorKind};
pub use supervisor::{provision_instances, run_scan, run_workers, seed_accounts};
pub use worker::{CycleReport, InstanceWorker, Tally, WorkerPhase, WorkerSettings};
