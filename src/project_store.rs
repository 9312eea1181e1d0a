//! Cache of the last successful run. The report binary writes every
//! processed project here so downstream consumers (and the next run's
//! diagnostics) can read aggregates without refetching upstreams.

use result::{Error, Result};
use records::ProjectAggregate;
use serde_json;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const CACHE_FILE: &'static str = "projects.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectCache {
    pub generated_at: String,
    pub projects: Vec<ProjectAggregate>,
}

impl ProjectCache {
    pub fn new(generated_at: String, projects: Vec<ProjectAggregate>) -> Self {
        ProjectCache {
            generated_at,
            projects,
        }
    }

    pub fn all(&self) -> &[ProjectAggregate] {
        &self.projects
    }

    pub fn find(&self, id: u64) -> Result<&ProjectAggregate> {
        self.projects
            .iter()
            .find(|project| project.id == id)
            .ok_or_else(|| Error::NotFound(format!("project {} not in cache", id)))
    }
}

pub fn cache_path(dir: &Path) -> PathBuf {
    dir.join(CACHE_FILE)
}

/// Writes the cache atomically: serialize to a scratch file in the same
/// directory, then rename over the previous cache.
pub fn write_cache(dir: &Path, cache: &ProjectCache) -> Result<()> {
    let path = cache_path(dir);
    let tmp_path = dir.join(format!(".{}.tmp", CACHE_FILE));
    let file = File::create(&tmp_path).map_err(|err| {
        Error::Persistence(format!("create {}: {}", tmp_path.display(), err))
    })?;
    serde_json::to_writer_pretty(&file, cache)
        .map_err(|err| Error::Persistence(format!("serialize project cache: {}", err)))?;
    file.sync_all()
        .map_err(|err| Error::Persistence(format!("sync {}: {}", tmp_path.display(), err)))?;
    fs::rename(&tmp_path, &path).map_err(|err| {
        Error::Persistence(format!("rename {} to {}: {}", tmp_path.display(), path.display(), err))
    })?;
    Ok(())
}

pub fn read_cache(dir: &Path) -> Result<ProjectCache> {
    let path = cache_path(dir);
    let file = File::open(&path)
        .map_err(|err| Error::Persistence(format!("open {}: {}", path.display(), err)))?;
    let cache = serde_json::from_reader(file)
        .map_err(|err| Error::Persistence(format!("parse {}: {}", path.display(), err)))?;
    Ok(cache)
}
