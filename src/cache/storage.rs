//! Cache storage trait and directory-of-JSON-files implementation.

use chrono::{DateTime, Datelike, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use super::store::{Issue, Project};

/// Name of the file holding the project record.
const META_FILE: &str = "meta";

/// Trait for cache storage backends.
pub trait CacheStorage {
  /// Persist the project's scalar fields (owner, repo, watermark).
  fn save_meta(&self, project: &Project) -> Result<()>;

  /// Persist one issue with its timeline and commits.
  fn save_issue(&self, issue: &Issue) -> Result<()>;

  /// Populate `project` from the cache. An empty cache is not an error.
  fn load(&self, project: &mut Project) -> Result<()>;
}

/// On-disk form of the project record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetaRecord {
  owner: String,
  repo: String,
  #[serde(default, deserialize_with = "deserialize_watermark")]
  refreshed_at: Option<DateTime<Utc>>,
}

/// Accept both `null` and the zero time `0001-01-01T00:00:00Z` as "never".
fn deserialize_watermark<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
  D: Deserializer<'de>,
{
  let value: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
  Ok(value.filter(|t| t.year() > 1))
}

/// Cache kept as one JSON file per issue plus a `meta` file.
pub struct DirStorage {
  dir: PathBuf,
}

impl DirStorage {
  /// Open the cache at `dir`, creating the directory if needed.
  pub fn open(dir: &Path) -> Result<Self> {
    std::fs::create_dir_all(dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;

    Ok(Self {
      dir: dir.to_path_buf(),
    })
  }

  fn issue_path(&self, number: u64) -> PathBuf {
    self.dir.join(number.to_string())
  }

  fn read_issue(&self, path: &Path) -> Result<Issue> {
    let data = std::fs::read(path).map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
    let issue: Issue = serde_json::from_slice(&data)
      .map_err(|e| eyre!("Corrupt cache file {}: {}", path.display(), e))?;
    if issue.number() == 0 {
      return Err(eyre!("Corrupt cache file {}: missing issue number", path.display()));
    }
    Ok(issue)
  }
}

/// Parse a cache file name as an issue number. Only plain positive decimals qualify.
fn issue_number(name: &str) -> Option<u64> {
  if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  name.parse().ok().filter(|n| *n > 0)
}

/// Serialize `value` as tab-indented JSON.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
  let mut buf = Vec::new();
  let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
  let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
  value
    .serialize(&mut serializer)
    .map_err(|e| eyre!("Failed to serialize cache record: {}", e))?;
  Ok(buf)
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
  std::fs::write(path, data).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
}

impl CacheStorage for DirStorage {
  fn save_meta(&self, project: &Project) -> Result<()> {
    let record = MetaRecord {
      owner: project.name.owner.clone(),
      repo: project.name.repo.clone(),
      refreshed_at: project.refreshed_at,
    };
    write_file(&self.dir.join(META_FILE), &to_pretty_json(&record)?)
  }

  fn save_issue(&self, issue: &Issue) -> Result<()> {
    write_file(&self.issue_path(issue.number()), &to_pretty_json(issue)?)
  }

  fn load(&self, project: &mut Project) -> Result<()> {
    let meta_path = self.dir.join(META_FILE);
    match std::fs::read(&meta_path) {
      Ok(data) => {
        let meta: MetaRecord = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Corrupt cache file {}: {}", meta_path.display(), e))?;
        if meta.owner != project.name.owner || meta.repo != project.name.repo {
          return Err(eyre!(
            "Cache {} holds {}/{}, not {}; use a different cache directory",
            self.dir.display(),
            meta.owner,
            meta.repo,
            project.name
          ));
        }
        project.refreshed_at = meta.refreshed_at;
      }
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!("No metadata in {}, starting fresh", self.dir.display());
      }
      Err(e) => return Err(eyre!("Failed to read {}: {}", meta_path.display(), e)),
    }

    let entries = std::fs::read_dir(&self.dir)
      .map_err(|e| eyre!("Failed to list cache directory {}: {}", self.dir.display(), e))?;

    let mut paths = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| eyre!("Failed to list cache directory: {}", e))?;
      if entry.file_name().to_str().and_then(issue_number).is_some() {
        paths.push(entry.path());
      }
    }
    if paths.is_empty() {
      return Ok(());
    }

    let start = Instant::now();
    info!("loading {} ({} issues)", self.dir.display(), paths.len());
    for path in paths {
      let issue = self.read_issue(&path)?;
      project.store.insert(issue);
    }
    info!(
      "  done ({}) {:.1}s",
      project.store.len(),
      start.elapsed().as_secs_f64()
    );

    Ok(())
  }
}
