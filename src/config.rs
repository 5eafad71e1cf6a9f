use crate::error::{CheckError, Result};
use photo_check_common::{EntryDefaults, RowOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 保存先URLを上書きする環境変数
pub const SERVER_ENV: &str = "PHOTO_CHECK_SERVER";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 採点記録の保存先（例: http://localhost:8080/api）
    pub server_url: Option<String>,
    /// 再採点結果を初回結果より前に出すプロバイダ
    pub prefer_latest_providers: Vec<String>,
    pub entry_defaults: EntryDefaults,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 設定ディレクトリ（~/.config/photo-check）
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CheckError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("photo-check"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn get_server_url(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(url) = std::env::var(SERVER_ENV) {
            if !url.trim().is_empty() {
                return Ok(url.trim().to_string());
            }
        }

        self.server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or(CheckError::MissingServer)
    }

    pub fn set_server_url(&mut self, url: String) -> Result<()> {
        let url = url.trim().trim_end_matches('/').to_string();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CheckError::Config(format!("URLが不正です: {}", url)));
        }
        self.server_url = Some(url);
        Ok(())
    }

    pub fn add_prefer_latest(&mut self, provider: &str) {
        let provider = provider.trim().to_lowercase();
        if !provider.is_empty() && !self.prefer_latest_providers.contains(&provider) {
            self.prefer_latest_providers.push(provider);
        }
    }

    pub fn row_options(&self) -> RowOptions {
        RowOptions::prefer_latest(self.prefer_latest_providers.iter().cloned())
    }
}
