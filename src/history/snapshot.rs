//! 履歴スナップショット
//!
//! 最後に取得した履歴一覧をファイルに残し、オフラインでも一覧を表示できるようにする。

use crate::error::Result;
use photo_check_common::HistoryItem;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::warn;

pub const SNAPSHOT_FILE_NAME: &str = "history-cache.json";

/// スナップショットファイルの構造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// バージョン（互換性チェック用）
    version: u32,
    /// 保存日時（RFC 3339）
    pub saved_at: Option<String>,
    pub items: Vec<HistoryItem>,
}

impl HistorySnapshot {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(items: Vec<HistoryItem>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
            items,
        }
    }

    /// スナップショットを読み込み
    ///
    /// ファイルがない・壊れている・バージョンが違う場合は空を返す。
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, HistorySnapshot>(reader) {
            Ok(snapshot) => {
                if snapshot.version != Self::CURRENT_VERSION {
                    warn!("履歴スナップショットのバージョン不一致、破棄します");
                    return Self::default();
                }
                snapshot
            }
            Err(e) => {
                warn!("履歴スナップショットが読めません: {}", e);
                Self::default()
            }
        }
    }

    /// スナップショットを保存
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for HistorySnapshot {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: None,
            items: Vec::new(),
        }
    }
}
