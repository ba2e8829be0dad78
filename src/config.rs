// パス: src/config.rs
// 役割: パイプラインと REPL の設定値（出力先・停止フェーズ・診断の扱い・ログ水準）
// 意図: JSON 設定ファイルと CLI 引数から同じ構造体を組み立てられるようにする
// 関連ファイル: src/pipeline/context.rs, src/bin/replc.rs, src/repl/adapter.rs
//! 設定
//!
//! すべての項目に既定値があり、JSON では必要な項目だけを書けばよい。
//!
//! ```
//! use replc::config::Settings;
//! let s = Settings::from_json_str(r#"{ "fatal_warnings": true }"#).unwrap();
//! assert!(s.fatal_warnings);
//! assert_eq!(s.max_errors, 100);
//! assert!(s.output_dir.is_none());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PhaseId;

/// 設定の読み込みで発生しうるエラー種別。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_max_errors() -> usize {
    100
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// 明示的な出力ディレクトリ。指定時は REPL でもディスクへ書き出す。
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// 完全パイプラインをこのフェーズの後で止める。
    #[serde(default)]
    pub stop_after: Option<PhaseId>,
    /// 警告をエラーとして扱う。
    #[serde(default)]
    pub fatal_warnings: bool,
    /// これを超えたエラーは記録しない。
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: None,
            stop_after: None,
            fatal_warnings: false,
            max_errors: default_max_errors(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}
