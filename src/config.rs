use crate::error::{FinderError, Result};
use koho_finder_common::{CompletionMode, FinderSettings, OutcomePolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_DATASET: &str = "RAG_CSV_PATH";
const ENV_SYNONYMS: &str = "RAG_SYNONYMS_PATH";
const ENV_THRESHOLD: &str = "RESULTS_REFINE_THRESHOLD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub synonyms_path: Option<PathBuf>,
    pub refine_threshold: usize,
    pub top_n: usize,
    pub depth_candidate_limit: usize,
    pub completion_mode: CompletionMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("restructured_file.csv"),
            synonyms_path: None,
            refine_threshold: 10,
            top_n: 5,
            depth_candidate_limit: 8,
            completion_mode: CompletionMode::Literal,
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書きする
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 壊れた設定ファイルでも止めずにデフォルトで読み込む（`config` サブコマンド用）
    pub fn load_or_default() -> Result<Self> {
        let mut config = Self::load_or_default_from(&Self::config_path()?);
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_or_default_from(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// 指定パスから読み込み（無ければデフォルト）
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
            .ok_or_else(|| FinderError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("koho-finder").join("config.json"))
    }

    /// 環境変数による上書き（数値が読めないものは無視）
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATASET).filter(|v| !v.trim().is_empty()) {
            self.dataset_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_SYNONYMS).filter(|v| !v.trim().is_empty()) {
            self.synonyms_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_THRESHOLD) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.refine_threshold = n,
                _ => tracing::warn!(value = %raw, "invalid {}, keeping {}", ENV_THRESHOLD, self.refine_threshold),
            }
        }
    }

    /// コマンドライン引数による上書き
    pub fn with_overrides(mut self, dataset: Option<PathBuf>, synonyms: Option<PathBuf>) -> Self {
        if let Some(path) = dataset {
            self.dataset_path = path;
        }
        if let Some(path) = synonyms {
            self.synonyms_path = Some(path);
        }
        self
    }

    pub fn set_dataset(&mut self, path: PathBuf) -> Result<()> {
        self.dataset_path = path;
        self.save()
    }

    pub fn set_synonyms(&mut self, path: PathBuf) -> Result<()> {
        self.synonyms_path = Some(path);
        self.save()
    }

    /// 検索エンジン用の設定値
    pub fn finder_settings(&self) -> FinderSettings {
        FinderSettings {
            completion_mode: self.completion_mode,
            policy: OutcomePolicy {
                refine_threshold: self.refine_threshold,
                depth_candidate_limit: self.depth_candidate_limit,
            },
            ..FinderSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.refine_threshold, 10);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.completion_mode, CompletionMode::Literal);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("RAG_CSV_PATH", "/data/catalog.csv"),
            ("RESULTS_REFINE_THRESHOLD", "15"),
        ]));
        assert_eq!(config.dataset_path, PathBuf::from("/data/catalog.csv"));
        assert_eq!(config.refine_threshold, 15);
        assert!(config.synonyms_path.is_none());
    }

    #[test]
    fn test_invalid_threshold_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("RESULTS_REFINE_THRESHOLD", "many")]));
        assert_eq!(config.refine_threshold, 10);
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = Config::default();
        config.apply_env(env(&[("RAG_CSV_PATH", "/env.csv")]));
        let config = config.with_overrides(Some(PathBuf::from("/cli.csv")), None);
        assert_eq!(config.dataset_path, PathBuf::from("/cli.csv"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"top_n": 3, "completion_mode": "partial"}"#).unwrap();
        assert_eq!(config.top_n, 3);
        assert_eq!(config.refine_threshold, 10);
        assert_eq!(config.completion_mode, CompletionMode::Partial);
    }

    #[test]
    fn test_broken_file_can_be_overwritten() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(Config::load_from(&path).is_err());
        let mut config = Config::load_or_default_from(&path);
        assert_eq!(config, Config::default());

        config.dataset_path = PathBuf::from("/data/catalog.csv");
        config.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.dataset_path, PathBuf::from("/data/catalog.csv"));
    }
}
