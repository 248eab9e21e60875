use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn cycle(self) -> Theme {
        match self {
            Theme::Auto => Theme::Light,
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Auto,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
    pub theme: Theme,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            stream: true,
            theme: Theme::Auto,
            source_lang: "Auto".to_string(),
            target_lang: "en".to_string(),
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        let dir = exe.parent().unwrap_or(Path::new("."));
        dir.join("config.json")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<Config>(&s).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Normalizes and stores the base URL. Trailing slashes are stripped here,
    /// at save time, so the dispatcher can assume a clean base.
    pub fn set_api_url(&mut self, url: &str) {
        let trimmed = url.trim().trim_end_matches('/');
        self.api_url = if trimmed.is_empty() {
            DEFAULT_API_URL.to_string()
        } else {
            trimmed.to_string()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slashes_at_save_time() {
        let mut cfg = Config::default();
        cfg.set_api_url("https://host/v1/");
        assert_eq!(cfg.api_url, "https://host/v1");
        cfg.set_api_url("https://host///");
        assert_eq!(cfg.api_url, "https://host");
    }

    #[test]
    fn empty_url_falls_back_to_default() {
        let mut cfg = Config::default();
        cfg.set_api_url("   ");
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = Config::default();
        cfg.api_key = "sk-test".into();
        cfg.model = "my-model".into();
        cfg.stream = false;
        cfg.theme = Theme::Dark;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.api_key, "sk-test");
        assert_eq!(loaded.model, "my-model");
        assert!(!loaded.stream);
        assert_eq!(loaded.theme, Theme::Dark);
    }

    #[test]
    fn missing_or_corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load_from(&dir.path().join("nope.json"));
        assert_eq!(missing.api_url, DEFAULT_API_URL);

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let corrupt = Config::load_from(&path);
        assert_eq!(corrupt.model, DEFAULT_MODEL);
    }
}
