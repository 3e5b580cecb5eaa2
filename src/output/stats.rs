//! Statistics generation from the scan database
//!
//! This module provides functionality for extracting and displaying
//! scan statistics from the storage layer.

use crate::storage::Storage;
use crate::FediError;

/// Scan statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStatistics {
    /// Total number of instances discovered
    pub total_instances: u64,

    /// Total number of accounts discovered
    pub total_accounts: u64,

    /// Accounts that completed at least one scan
    pub scanned_accounts: u64,

    /// Breakdown for the instances that have a service account
    pub provisioned: Vec<InstanceStatistics>,
}

/// Per-instance counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatistics {
    pub domain: String,
    pub accounts: u64,
    pub scanned_accounts: u64,
}

impl ScanStatistics {
    /// Share of known accounts scanned at least once, in percent
    pub fn coverage(&self) -> f64 {
        percentage(self.scanned_accounts, self.total_accounts)
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ScanStatistics)` - Successfully loaded statistics
/// * `Err(FediError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<ScanStatistics, FediError> {
    let mut provisioned = Vec::new();
    for instance in storage.list_instances()? {
        if !instance.has_credentials() {
            continue;
        }
        provisioned.push(InstanceStatistics {
            accounts: storage.count_accounts(Some(&instance.domain))?,
            scanned_accounts: storage.count_scanned_accounts(Some(&instance.domain))?,
            domain: instance.domain,
        });
    }

    Ok(ScanStatistics {
        total_instances: storage.count_instances()?,
        total_accounts: storage.count_accounts(None)?,
        scanned_accounts: storage.count_scanned_accounts(None)?,
        provisioned,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ScanStatistics) {
    println!("=== Scan Statistics ===\n");

    println!("Overview:");
    println!("  Instances discovered: {}", stats.total_instances);
    println!("  Accounts discovered: {}", stats.total_accounts);
    println!(
        "  Accounts scanned: {} ({:.1}%)",
        stats.scanned_accounts,
        stats.coverage()
    );
    println!();

    if stats.provisioned.is_empty() {
        println!("No provisioned instances.");
        return;
    }

    println!("Scanned Instances ({}):", stats.provisioned.len());
    for instance in &stats.provisioned {
        println!(
            "  - {}: {} accounts, {} scanned ({:.1}%)",
            instance.domain,
            instance.accounts,
            instance.scanned_accounts,
            percentage(instance.scanned_accounts, instance.accounts)
        );
    }
}
