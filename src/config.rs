use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PROJECT: &str = "cockroachdb/cockroach";
const DEFAULT_CACHE_DIR: &str = ".ghpulse";
const TOKEN_FILE: &str = ".github-issue-token";
const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
const DEFAULT_PER_PAGE: u32 = 100;

/// GitHub `owner/repo` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectName {
  pub owner: String,
  pub repo: String,
}

impl ProjectName {
  pub fn parse(s: &str) -> Result<Self> {
    match s.split('/').collect::<Vec<_>>().as_slice() {
      [owner, repo] if !owner.is_empty() && !repo.is_empty() => Ok(Self {
        owner: owner.to_string(),
        repo: repo.to_string(),
      }),
      _ => Err(eyre!(
        "Invalid project {:?}: must be owner/repo, like cockroachdb/cockroach",
        s
      )),
    }
  }
}

impl fmt::Display for ProjectName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.owner, self.repo)
  }
}

/// Optional settings file. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
  pub project: Option<String>,
  pub cache_dir: Option<PathBuf>,
  pub token_file: Option<PathBuf>,
  pub retry_delay_secs: Option<u64>,
  pub per_page: Option<u32>,
}

impl FileConfig {
  /// Load settings from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./ghpulse.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ghpulse/config.yaml
  ///
  /// Finding no file is not an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("ghpulse.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ghpulse").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }

    serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }
}

/// Values given on the command line, which win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub project: Option<String>,
  pub cache_dir: Option<PathBuf>,
  pub token_file: Option<PathBuf>,
  pub refresh: bool,
}

/// Resolved run configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub project: ProjectName,
  pub cache_dir: PathBuf,
  pub token_file: PathBuf,
  pub refresh: bool,
  pub retry_delay: Duration,
  pub per_page: u32,
}

impl Config {
  pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
    let project = overrides
      .project
      .or(file.project)
      .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
    let project = ProjectName::parse(&project)?;

    let cache_dir = match overrides.cache_dir.or(file.cache_dir) {
      Some(dir) => dir,
      None => home_dir()?.join(DEFAULT_CACHE_DIR),
    };
    let token_file = match overrides.token_file.or(file.token_file) {
      Some(path) => path,
      None => home_dir()?.join(TOKEN_FILE),
    };

    let per_page = file.per_page.unwrap_or(DEFAULT_PER_PAGE);
    if per_page == 0 || per_page > 100 {
      return Err(eyre!("per_page must be between 1 and 100, got {}", per_page));
    }

    Ok(Self {
      project,
      cache_dir,
      token_file,
      refresh: overrides.refresh,
      retry_delay: Duration::from_secs(file.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS)),
      per_page,
    })
  }

  /// Read the GitHub personal access token.
  ///
  /// The file must not be readable or writable by group or others.
  pub fn load_token(&self) -> Result<String> {
    let path = &self.token_file;
    let data = std::fs::read_to_string(path).map_err(|e| {
      eyre!(
        "reading token: {}: {}\n\n\
         Please create a personal access token at https://github.com/settings/tokens/new\n\
         and write it to {} to use this program.\n\
         The token only needs the repo scope, or private_repo if you want to\n\
         view issues for private repositories.",
        path.display(),
        e,
        path.display()
      )
    })?;

    check_token_mode(path)?;

    let token = data.trim();
    if token.is_empty() {
      return Err(eyre!("reading token: {} is empty", path.display()));
    }
    Ok(token.to_string())
  }
}

fn home_dir() -> Result<PathBuf> {
  dirs::home_dir().ok_or_else(|| eyre!("Could not determine home directory"))
}

#[cfg(unix)]
fn check_token_mode(path: &Path) -> Result<()> {
  use std::os::unix::fs::PermissionsExt;

  let mode = std::fs::metadata(path)
    .map_err(|e| eyre!("reading token: {}: {}", path.display(), e))?
    .permissions()
    .mode();
  if mode & 0o077 != 0 {
    return Err(eyre!(
      "reading token: {} mode is {:#o}, want {:#o}",
      path.display(),
      mode & 0o777,
      mode & 0o700
    ));
  }
  Ok(())
}

#[cfg(not(unix))]
fn check_token_mode(_path: &Path) -> Result<()> {
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config_with_token(path: PathBuf) -> Config {
    Config::resolve(
      FileConfig::default(),
      Overrides {
        cache_dir: Some(PathBuf::from("/tmp/cache")),
        token_file: Some(path),
        ..Default::default()
      },
    )
    .unwrap()
  }

  #[test]
  fn test_project_name_parse() {
    let name = ProjectName::parse("cockroachdb/cockroach").unwrap();
    assert_eq!(name.owner, "cockroachdb");
    assert_eq!(name.repo, "cockroach");
    assert_eq!(name.to_string(), "cockroachdb/cockroach");
  }

  #[test]
  fn test_project_name_rejects_bad_forms() {
    for bad in ["cockroach", "a/b/c", "/repo", "owner/", ""] {
      assert!(ProjectName::parse(bad).is_err(), "{:?} should be rejected", bad);
    }
  }

  #[test]
  fn test_overrides_win_over_file() {
    let file = FileConfig {
      project: Some("golang/go".to_string()),
      cache_dir: Some(PathBuf::from("/from/file")),
      retry_delay_secs: Some(1),
      ..Default::default()
    };
    let config = Config::resolve(
      file,
      Overrides {
        project: Some("rust-lang/rust".to_string()),
        token_file: Some(PathBuf::from("/tok")),
        refresh: true,
        ..Default::default()
      },
    )
    .unwrap();

    assert_eq!(config.project.to_string(), "rust-lang/rust");
    assert_eq!(config.cache_dir, PathBuf::from("/from/file"));
    assert_eq!(config.retry_delay, Duration::from_secs(1));
    assert_eq!(config.per_page, 100);
    assert!(config.refresh);
  }

  #[test]
  fn test_defaults() {
    let config = Config::resolve(
      FileConfig::default(),
      Overrides {
        cache_dir: Some(PathBuf::from("/c")),
        token_file: Some(PathBuf::from("/t")),
        ..Default::default()
      },
    )
    .unwrap();
    assert_eq!(config.project.to_string(), DEFAULT_PROJECT);
    assert_eq!(config.retry_delay, Duration::from_secs(5));
    assert!(!config.refresh);
  }

  #[test]
  fn test_invalid_per_page() {
    let file = FileConfig {
      per_page: Some(500),
      ..Default::default()
    };
    let overrides = Overrides {
      cache_dir: Some(PathBuf::from("/c")),
      token_file: Some(PathBuf::from("/t")),
      ..Default::default()
    };
    assert!(Config::resolve(file, overrides).is_err());
  }

  #[test]
  fn test_file_config_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "project: golang/go\nper_page: 50\n").unwrap();

    let file = FileConfig::load(Some(&path)).unwrap();
    assert_eq!(file.project.as_deref(), Some("golang/go"));
    assert_eq!(file.per_page, Some(50));
  }

  #[test]
  fn test_missing_explicit_config_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(FileConfig::load(Some(&dir.path().join("nope.yaml"))).is_err());
  }

  #[test]
  fn test_unknown_config_key_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "projcet: golang/go\n").unwrap();
    assert!(FileConfig::load(Some(&path)).is_err());
  }

  #[cfg(unix)]
  #[test]
  fn test_token_mode_checked() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token");
    std::fs::write(&path, "  ghp_secret\n").unwrap();
    let config = config_with_token(path.clone());

    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
    let err = config.load_token().unwrap_err().to_string();
    assert!(err.contains("mode is 0o644"), "{}", err);

    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
    assert_eq!(config.load_token().unwrap(), "ghp_secret");
  }

  #[test]
  fn test_missing_token_explains() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with_token(dir.path().join("absent"));
    let err = config.load_token().unwrap_err().to_string();
    assert!(err.contains("personal access token"), "{}", err);
  }
}
