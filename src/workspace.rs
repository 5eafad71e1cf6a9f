//! 表示中のレポートと履歴キャッシュの連携
//!
//! 採点が完了したらレポートを表示すると同時に履歴へ反映し、
//! 表示中の記録が削除されたらレポートも消す。

use crate::error::Result;
use crate::history::{HistoryCache, HistoryStore, Outcome};
use photo_check_common::{normalize_check, HistoryItem, ReportSession, RowOptions};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub struct Workspace {
    store: Arc<dyn HistoryStore>,
    session: ReportSession,
    history: HistoryCache,
}

impl Workspace {
    pub fn new(store: Arc<dyn HistoryStore>, options: RowOptions) -> Self {
        Self {
            history: HistoryCache::new(store.clone()),
            store,
            session: ReportSession::new(options),
        }
    }

    /// 履歴キャッシュを差し替える（スナップショット付きなど）
    pub fn with_history(mut self, history: HistoryCache) -> Self {
        self.history = history;
        self
    }

    pub fn session(&self) -> &ReportSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ReportSession {
        &mut self.session
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    /// 完了した採点結果を保存し、レポート表示と履歴反映を行う
    ///
    /// 保存に失敗した場合は表示中のレポートも履歴も変更しない。
    pub async fn complete_check(&mut self, payload: &Value) -> Result<HistoryItem> {
        let saved = self.store.save_check(payload).await?;

        let mut check = normalize_check(payload);
        check.record_id = Some(saved.record_id.clone());
        check.created_at = saved
            .created_at
            .or(check.created_at)
            .or_else(|| Some(chrono::Utc::now().to_rfc3339()));

        let item = HistoryItem::from_check(saved.record_id.clone(), &check);
        self.session.load(check);
        let merged = self.history.upsert(item);
        self.history.select(Some(merged.id.as_str()));
        info!(record_id = %merged.id, "採点結果を保存");
        Ok(merged)
    }

    pub async fn refresh_history(&self) -> Result<Outcome<Vec<HistoryItem>>> {
        self.history.list().await
    }

    pub async fn rename_history(&self, id: &str, alias: &str) -> Result<Outcome<HistoryItem>> {
        self.history.rename_alias(id, alias).await
    }

    /// 履歴を削除し、表示中の記録なら表示も消す
    pub async fn delete_history(&mut self, id: &str) -> Result<Outcome<()>> {
        let outcome = self.history.delete(id).await?;
        if !outcome.is_busy() && self.session.record_id() == Some(id) {
            info!(id, "表示中の記録が削除されたためレポートを閉じます");
            self.session.clear();
        }
        Ok(outcome)
    }
}
