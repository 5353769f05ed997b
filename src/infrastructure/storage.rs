//! Filesystem boundary: work directories, unit listing, and persisted
//! outputs.
//!
//! Output directories follow a create-and-clean lifecycle: a run starts
//! from an empty records/results directory so leftovers from earlier
//! runs never mix into the current one. The units directory is input
//! and is never touched.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::outcome::HarvestUnit;
use crate::domain::record_set::{RecordsRequest, RecordsResponse};
use crate::infrastructure::config::DirectoryConfig;

/// The three work directories of a run.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub units: PathBuf,
    pub records: PathBuf,
    pub results: PathBuf,
}

impl WorkDirs {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            units: config.units.clone(),
            records: config.records.clone(),
            results: config.results.clone(),
        }
    }

    /// Prepare the directories for the enabled stages.
    pub async fn prepare(&self, harvesting: bool, validating: bool) -> Result<()> {
        if harvesting {
            ensure!(
                self.units.is_dir(),
                "units directory {:?} does not exist",
                self.units
            );
            create_and_clean(&self.records).await?;
        } else if validating {
            ensure!(
                self.records.is_dir(),
                "records directory {:?} does not exist (nothing to validate without a harvest)",
                self.records
            );
        }
        if validating {
            create_and_clean(&self.results).await?;
        }
        Ok(())
    }

    /// Request documents to harvest, sorted by file name.
    pub async fn list_units(&self) -> Result<Vec<HarvestUnit>> {
        list_files(&self.units).await
    }

    /// Previously harvested record sets, sorted by file name. Input for
    /// validate-only runs.
    pub async fn list_record_sets(&self) -> Result<Vec<HarvestUnit>> {
        list_files(&self.records).await
    }

    /// Parse and root-check one unit's request document.
    pub async fn load_request(&self, unit: &HarvestUnit) -> Result<RecordsRequest> {
        let content = fs::read_to_string(&unit.path)
            .await
            .with_context(|| format!("failed to read unit file {:?}", unit.path))?;
        let request: RecordsRequest = serde_json::from_str(&content)
            .with_context(|| format!("unit file {:?} is not a valid request document", unit.path))?;
        request.ensure_root()?;
        Ok(request)
    }

    /// Persist a merged record set under the unit's name.
    pub async fn save_record_set(
        &self,
        name: &str,
        response: &RecordsResponse,
    ) -> Result<PathBuf> {
        let path = self.records.join(name);
        let content =
            serde_json::to_vec_pretty(response).context("failed to serialize record set")?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("failed to write record set {path:?}"))?;
        debug!("Saved merged record set: {:?}", path);
        Ok(path)
    }
}

/// Write one validation result file. Used by the validator
/// implementations; errors convert into their I/O error variant.
pub async fn persist_result(
    results_dir: &Path,
    file_name: &str,
    bytes: &[u8],
) -> io::Result<PathBuf> {
    let path = results_dir.join(file_name);
    fs::write(&path, bytes).await?;
    Ok(path)
}

async fn create_and_clean(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create output directory {dir:?}"))?;
        debug!("Created output directory: {:?}", dir);
        return Ok(());
    }

    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read output directory {dir:?}"))?;
    let mut removed = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to list output directory {dir:?}"))?
    {
        let path = entry.path();
        let result = if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(error) => warn!("Failed to remove {:?}: {}", path, error),
        }
    }
    if removed > 0 {
        debug!("Cleaned output directory {:?} ({} entries)", dir, removed);
    }
    Ok(())
}

async fn list_files(dir: &Path) -> Result<Vec<HarvestUnit>> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read directory {dir:?}"))?;
    let mut units = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to list directory {dir:?}"))?
    {
        if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        match HarvestUnit::from_path(entry.path()) {
            Some(unit) => units.push(unit),
            None => warn!("Skipping file with non-UTF-8 name: {:?}", entry.path()),
        }
    }
    units.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(units)
}
