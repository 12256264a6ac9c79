//! Migrations: explicitly listed (network, contract) deployments from `config.json`.
//!
//! Unlike `deploy`, a failing migration is logged and the remaining ones still run.
//! Migrations run in list order; adjacent entries for the same network share one
//! connection.

use std::collections::BTreeMap;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::{
    compiler::Compiler,
    pipeline::{FailurePolicy, Pipeline},
    record::DeploymentRecord,
    target::Connector,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub network: String,
    pub contract: String,
}

impl Migration {
    pub fn new(network: impl Into<String>, contract: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            contract: contract.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MigrationSummary {
    pub applied: Vec<(Migration, Address)>,
    pub failed: Vec<(Migration, String)>,
}

/// Runs `migrations` in order. The record of each network lists every contract
/// migrated to it during this call.
pub async fn migrate<C, K>(pipeline: &Pipeline<'_, C, K>, migrations: &[Migration]) -> MigrationSummary
where
    C: Connector,
    K: Compiler + ?Sized,
{
    let mut summary = MigrationSummary::default();
    if migrations.is_empty() {
        log::info!("no migrations configured");
        return summary;
    }

    if let Err(err) = pipeline.ensure_artifacts().await {
        log::error!("cannot prepare artifacts for migrations: {}", err);
        summary.failed = migrations
            .iter()
            .map(|m| (m.clone(), err.to_string()))
            .collect();
        return summary;
    }

    let mut records: BTreeMap<String, DeploymentRecord> = BTreeMap::new();
    for (network, contracts) in consecutive_by_network(migrations) {
        log::info!("migrating {} contract(s) to {}", contracts.len(), network);
        match pipeline
            .deploy(Some(network.as_str()), &contracts, FailurePolicy::ContinueOnError)
            .await
        {
            Ok(report) => {
                let merged = records.entry(report.network.clone()).or_default();
                for contract in &contracts {
                    if let Some(address) = report.record.get(contract) {
                        merged.insert(contract.clone(), address);
                    }
                }
                for contract in contracts {
                    let migration = Migration::new(network.clone(), contract.clone());
                    match report.record.get(&contract) {
                        Some(address) => summary.applied.push((migration, address)),
                        None => {
                            let reason = report
                                .failures
                                .iter()
                                .find(|(name, _)| *name == contract)
                                .map(|(_, err)| err.to_string())
                                .unwrap_or_else(|| "not deployed".to_string());
                            summary.failed.push((migration, reason));
                        }
                    }
                }
            }
            Err(err) => {
                for contract in contracts {
                    log::error!("could not deploy {} to {}: {}", contract, network, err);
                    summary
                        .failed
                        .push((Migration::new(network.clone(), contract), err.to_string()));
                }
            }
        }
    }

    for (network, record) in records.iter().filter(|(_, record)| !record.is_empty()) {
        if let Err(err) = record.save(&pipeline.project().deployed_dir(), network) {
            log::error!("could not save migration record for {}: {}", network, err);
        }
    }
    summary
}

/// Splits `migrations` into runs of adjacent entries with the same network.
fn consecutive_by_network(migrations: &[Migration]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for migration in migrations {
        match groups.last_mut() {
            Some((network, contracts)) if *network == migration.network => {
                contracts.push(migration.contract.clone())
            }
            _ => groups.push((migration.network.clone(), vec![migration.contract.clone()])),
        }
    }
    groups
}
