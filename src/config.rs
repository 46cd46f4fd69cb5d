use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use url::Url;

const APP_DIR: &str = ".littlelearners";
const CONFIG_FILE: &str = "config.json";
pub const BACKEND_KEY_ENV: &str = "LITTLELEARNERS_BACKEND_KEY";
const MIN_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub backend_api_key: Option<String>,
    pub backend_timeout_seconds: u64,
    pub snapshot_path: Option<PathBuf>,
    pub report_dir: PathBuf,
    pub db_path: PathBuf,
    pub api_port: u16,
    pub default_user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            backend_url: "http://127.0.0.1:54321/rest/v1".to_string(),
            backend_api_key: None,
            backend_timeout_seconds: 20,
            snapshot_path: None,
            report_dir: default_report_dir(),
            db_path: root.join("db").join("exports.db"),
            api_port: 7890,
            default_user_id: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.backend_timeout_seconds = config.backend_timeout_seconds.max(MIN_TIMEOUT_SECONDS);

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.display()
            )
        })?;

        Ok(())
    }

    /// Environment variable first, then the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(BACKEND_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.backend_api_key
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn resolve_user_id(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.default_user_id.clone())
            .filter(|value| !value.trim().is_empty())
            .context("No user given. Pass --user <id> or set `config set report.user <id>`")
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);

        match normalized {
            "backend_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                Url::parse(trimmed)
                    .with_context(|| format!("backend_url must be an absolute URL: {value}"))?;
                self.backend_url = trimmed.to_string();
            }
            "backend_api_key" => {
                self.backend_api_key = (!value.trim().is_empty()).then(|| value.trim().to_string());
            }
            "backend_timeout_seconds" => {
                self.backend_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("backend_timeout_seconds must be a number"))?
                    .max(MIN_TIMEOUT_SECONDS);
            }
            "snapshot_path" => {
                self.snapshot_path = (!value.trim().is_empty()).then(|| expand_home(value.trim()));
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "default_user_id" => {
                self.default_user_id = (!value.trim().is_empty()).then(|| value.trim().to_string());
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: backend_url|backend.url, backend_api_key|backend.api_key, backend_timeout_seconds|backend.timeout_seconds, snapshot_path|backend.snapshot, report_dir|report.dir, db_path|db.path, api_port|api.port, default_user_id|report.user"
                );
            }
        }

        if normalized == "report_dir" {
            fs::create_dir_all(&self.report_dir).with_context(|| {
                format!(
                    "Failed to create report directory: {}",
                    self.report_dir.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "backend_url" => Some(self.backend_url.clone()),
            "backend_api_key" => Some(
                self.backend_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "backend_timeout_seconds" => Some(self.backend_timeout_seconds.to_string()),
            "snapshot_path" => Some(
                self.snapshot_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "default_user_id" => Some(
                self.default_user_id
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "backend_url" | "backend.url" => "backend_url",
        "backend_api_key" | "backend.api_key" => "backend_api_key",
        "backend_timeout_seconds" | "backend.timeout_seconds" => "backend_timeout_seconds",
        "snapshot_path" | "backend.snapshot" => "snapshot_path",
        "report_dir" | "report.dir" => "report_dir",
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "default_user_id" | "report.user" => "default_user_id",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("LittleLearners")
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_keys_map_to_fields() {
        let mut config = Config::default();
        config
            .set_value("backend.url", "https://example.supabase.co/rest/v1/")
            .expect("url accepted");
        config
            .set_value("backend.timeout_seconds", "1")
            .expect("timeout accepted");
        config.set_value("report.user", "user-42").expect("user accepted");

        assert_eq!(config.backend_url, "https://example.supabase.co/rest/v1");
        assert_eq!(config.backend_timeout_seconds, MIN_TIMEOUT_SECONDS);
        assert_eq!(config.get_value("report.user").as_deref(), Some("user-42"));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut config = Config::default();

        assert!(config.set_value("polling_seconds", "300").is_err());
        assert!(config.set_value("api.port", "not-a-port").is_err());
        assert!(config.set_value("backend.url", "not a url").is_err());
    }

    #[test]
    fn api_key_is_masked() {
        let mut config = Config::default();
        assert_eq!(config.get_value("backend.api_key").as_deref(), Some("not_set"));

        config
            .set_value("backend.api_key", "secret-key")
            .expect("key accepted");
        assert_eq!(config.get_value("backend.api_key").as_deref(), Some("***set***"));
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        let config = Config {
            api_port: 9000,
            default_user_id: Some("user-7".to_string()),
            ..Config::default()
        };

        config.save_to(&path).expect("saved");
        let loaded = Config::load_from(&path).expect("loaded");

        assert_eq!(loaded.api_port, 9000);
        assert_eq!(loaded.default_user_id.as_deref(), Some("user-7"));
    }

    #[test]
    fn explicit_user_wins_over_default() {
        let config = Config {
            default_user_id: Some("fallback".to_string()),
            ..Config::default()
        };

        assert_eq!(
            config.resolve_user_id(Some("chosen".to_string())).expect("user"),
            "chosen"
        );
        assert_eq!(config.resolve_user_id(None).expect("user"), "fallback");
        assert!(Config::default().resolve_user_id(None).is_err());
    }
}
