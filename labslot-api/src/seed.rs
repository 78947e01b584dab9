//! Startup seeding of the resource registry from a JSON file.
//!
//! The file holds an array of resources:
//!
//! ```json
//! [{"id": "R1", "name": "Router 1", "ip_address": "10.0.0.1", "ssh_port": 22}]
//! ```
//!
//! `id` falls back to `name` when omitted. Entries whose id is already
//! registered are skipped, so seeding the same file twice is harmless.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{DataStore, RegisterResourceRequest, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to register resource {id}: {source}")]
    Register { id: String, source: StoreError },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedResource {
    pub id: Option<String>,
    pub name: String,
    pub ip_address: Option<String>,
    pub ssh_port: Option<u16>,
    pub web_port: Option<u16>,
}

impl From<SeedResource> for RegisterResourceRequest {
    fn from(r: SeedResource) -> Self {
        Self {
            id: r.id.unwrap_or_else(|| r.name.clone()),
            name: r.name,
            ip_address: r.ip_address,
            ssh_port: r.ssh_port,
            web_port: r.web_port,
        }
    }
}

/// Outcome of a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub registered: usize,
    pub skipped: usize,
}

pub fn parse_seed(json: &str) -> Result<Vec<RegisterResourceRequest>, SeedError> {
    let entries: Vec<SeedResource> = serde_json::from_str(json)?;
    Ok(entries.into_iter().map(Into::into).collect())
}

/// Register every resource from `requests` that is not already known.
pub async fn seed_resources(
    store: &dyn DataStore,
    requests: Vec<RegisterResourceRequest>,
) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();

    for req in requests {
        let id = req.id.clone();
        if store
            .get_resource(&id)
            .await
            .map_err(|source| SeedError::Register {
                id: id.clone(),
                source,
            })?
            .is_some()
        {
            debug!(resource_id = %id, "Resource already exists, skipping");
            summary.skipped += 1;
            continue;
        }

        match store.register_resource(req).await {
            Ok(_) => summary.registered += 1,
            // A duplicate id within the file itself
            Err(StoreError::Conflict(_)) => summary.skipped += 1,
            Err(source) => return Err(SeedError::Register { id, source }),
        }
    }

    Ok(summary)
}

/// Read `path` and register its resources.
pub async fn seed_from_file(
    store: &dyn DataStore,
    path: impl AsRef<Path>,
) -> Result<SeedSummary, SeedError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path).await?;
    let requests = parse_seed(&json)?;
    let summary = seed_resources(store, requests).await?;

    info!(
        path = %path.display(),
        registered = summary.registered,
        skipped = summary.skipped,
        "Seeded resources"
    );
    Ok(summary)
}
