//! テスト用のメモリ上の保存先
//!
//! `gate` を指定したIDへの操作は、`gate` が通知されるまで完了しない。
//! 操作が保存先に到達したことは `entered` で通知する。

#![allow(dead_code)]

use async_trait::async_trait;
use photo_check::error::{CheckError, Result};
use photo_check::history::{HistoryStore, SavedRecord};
use photo_check_common::HistoryItem;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub struct FakeStore {
    pub items: Mutex<Vec<HistoryItem>>,
    pub gated_id: Option<String>,
    pub gate: Arc<Notify>,
    pub entered: Arc<Notify>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
    pub next_id: AtomicUsize,
}

impl FakeStore {
    pub fn with_items(items: Vec<HistoryItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// `id` への操作（一覧取得は `"*"`）を `gate` 通知まで止める
    pub fn gated(mut self, id: &str) -> Self {
        self.gated_id = Some(id.to_string());
        self
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated_id.as_deref() == Some(id) {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(CheckError::Server {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FakeStore {
    async fn save_check(&self, _payload: &Value) -> Result<SavedRecord> {
        self.enter("save").await?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SavedRecord {
            record_id: format!("rec-{}", n),
            created_at: Some(format!("2024-06-0{}T09:00:00Z", n.min(9))),
        })
    }

    async fn list(&self) -> Result<Vec<HistoryItem>> {
        self.enter("*").await?;
        Ok(self.items.lock().unwrap().clone())
    }

    async fn rename(&self, id: &str, alias: &str) -> Result<HistoryItem> {
        self.enter(id).await?;
        Ok(HistoryItem {
            id: id.to_string(),
            alias: alias.to_string(),
            ..Default::default()
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.enter(id).await?;
        self.items.lock().unwrap().retain(|item| item.id != id);
        Ok(())
    }
}

pub fn item(id: &str, created_at: &str) -> HistoryItem {
    HistoryItem {
        id: id.to_string(),
        created_at: Some(created_at.to_string()),
        ..Default::default()
    }
}
