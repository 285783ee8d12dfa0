// Configuration loading and parsing (snakedraft.toml, credentials.toml).

use serde::Deserialize;
use snakedraft_core::AdmissionPolicy;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub draft: DraftConfig,
    pub workspace: WorkspaceConfig,
    pub admin: AdminConfig,
    pub tba: TbaConfig,
    pub credentials: CredentialsConfig,
    pub db_path: String,
}

// ---------------------------------------------------------------------------
// snakedraft.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire snakedraft.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    draft: DraftConfig,
    workspace: WorkspaceConfig,
    #[serde(default)]
    admin: AdminConfig,
    database: DatabaseSection,
    tba: TbaConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    pub alliance_size: usize,
    #[serde(default)]
    pub target_group_size: usize,
    #[serde(default)]
    pub admission: AdmissionPolicy,
    #[serde(default)]
    pub strip_name_suffix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    pub id: String,
    pub channel: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub users: Vec<String>,
}

impl AdminConfig {
    /// Whether `identity` may manage drafts it does not own.
    pub fn is_admin(&self, identity: &str) -> bool {
        self.users.iter().any(|u| u == identity)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TbaConfig {
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub tba_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/snakedraft.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- snakedraft.toml (required) ---
    let settings_path = config_dir.join("snakedraft.toml");
    let settings_text = read_file(&settings_path)?;
    let settings: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        draft: settings.draft,
        workspace: settings.workspace,
        admin: settings.admin,
        tba: settings.tba,
        credentials,
        db_path: settings.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy any config file missing from `config/` out of `defaults/`.
/// Existing files are never overwritten and `.example` files are skipped.
/// Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path, defaults_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither {} nor {} exists",
                    defaults_dir.display(),
                    config_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }

        let target = config_dir.join(file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, seeding missing
/// files from `./defaults`.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd, &cwd.join("defaults"))?;
    load_config_from(&cwd)
}

/// Where the SQLite file lives. An empty configured path falls back to the
/// platform data directory.
pub fn resolve_db_path(configured: &str) -> PathBuf {
    if !configured.trim().is_empty() {
        return PathBuf::from(configured);
    }
    match directories::ProjectDirs::from("org", "snakedraft", "snakedraft") {
        Some(dirs) => dirs.data_dir().join("snakedraft.db"),
        None => PathBuf::from("snakedraft.db"),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.draft.alliance_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "draft.alliance_size".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.workspace.id.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "workspace.id".into(),
            message: "must not be empty".into(),
        });
    }

    let url = &config.tba.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError {
            field: "tba.base_url".into(),
            message: format!("must be an http(s) URL, got {url:?}"),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
