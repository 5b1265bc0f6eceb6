use crate::controller::{ControllerConfig, MergePolicy};
use crate::error::{CineStubError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// APIキーを読む環境変数（優先順）
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    /// 解析に送る画像の最大辺（px）
    pub max_image_size: u32,
    /// 解析呼び出しのタイムアウト（未設定なら無制限）
    pub timeout_seconds: Option<u64>,
    /// 画像生成の倍率
    pub export_scale: f32,
    /// 解析中にユーザーが編集した項目を解析結果で上書きしない
    pub preserve_user_edits: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".into(),
            api_endpoint: "https://generativelanguage.googleapis.com/v1beta/models".into(),
            max_image_size: 1568,
            timeout_seconds: None,
            export_scale: 3.0,
            preserve_user_edits: false,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数のAPIキーを反映する
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_api_key_override(|name| std::env::var(name).ok()))
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

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CineStubError::Config("找不到用户主目录".into()))?;
        Ok(home.join(".config").join("cinestub").join("config.json"))
    }

    /// 環境変数を優先してAPIキーを差し替える
    pub fn with_api_key_override(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|v| !v.trim().is_empty())
        {
            self.api_key = Some(key);
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn get_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CineStubError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    /// コントローラー用の明示的な設定
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            analysis_enabled: self.has_api_key(),
            merge_policy: if self.preserve_user_edits {
                MergePolicy::PreserveUserEdits
            } else {
                MergePolicy::LastWriterWins
            },
            max_image_size: self.max_image_size,
        }
    }
}
