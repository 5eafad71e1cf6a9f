//! 履歴キャッシュ
//!
//! 保存先の採点記録一覧をクライアント側に写したもの。
//! - 一覧取得中は全体で1つの loading フラグを立てる
//! - 別名変更・削除は記録IDごとに mutating フラグを立て、同じIDへの同時操作を弾く
//! - フラグは成功・失敗どちらの経路でもガードの Drop で下ろす
//!
//! 状態のロックは通信の `.await` をまたいで保持しない。

use super::snapshot::HistorySnapshot;
use super::store::HistoryStore;
use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use photo_check_common::HistoryItem;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// ガード付き操作の結果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    /// 同じ対象への操作が進行中のため何もしなかった（キューには積まない）
    Busy,
}

impl<T> Outcome<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, Outcome::Busy)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Busy => None,
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    items: Vec<HistoryItem>,
    selected_id: Option<String>,
    loading: bool,
    mutating: HashSet<String>,
}

pub struct HistoryCache {
    store: Arc<dyn HistoryStore>,
    state: Mutex<CacheState>,
    snapshot_path: Option<PathBuf>,
}

/// 記録IDごとの mutating フラグ
struct MutationGuard<'a> {
    cache: &'a HistoryCache,
    id: String,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.cache.lock().mutating.remove(&self.id);
    }
}

/// 一覧取得中フラグ
struct LoadingGuard<'a> {
    cache: &'a HistoryCache,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.cache.lock().loading = false;
    }
}

impl HistoryCache {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::default()),
            snapshot_path: None,
        }
    }

    /// スナップショットの内容でキャッシュを初期化し、
    /// 以後は成功した一覧取得・更新のたびに書き出す
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = HistorySnapshot::load(&path);
        debug!(count = snapshot.len(), "履歴スナップショットを読み込み");
        self.replace(snapshot.items);
        self.snapshot_path = Some(path);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_mutation(&self, id: &str) -> Option<MutationGuard<'_>> {
        if !self.lock().mutating.insert(id.to_string()) {
            debug!(id, "同じ記録への操作が進行中のためスキップ");
            return None;
        }
        Some(MutationGuard {
            cache: self,
            id: id.to_string(),
        })
    }

    fn begin_loading(&self) -> Option<LoadingGuard<'_>> {
        let mut state = self.lock();
        if state.loading {
            return None;
        }
        state.loading = true;
        Some(LoadingGuard { cache: self })
    }

    pub fn items(&self) -> Vec<HistoryItem> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: &str) -> Option<HistoryItem> {
        self.lock().items.iter().find(|item| item.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_mutating(&self, id: &str) -> bool {
        self.lock().mutating.contains(id)
    }

    pub fn selected_id(&self) -> Option<String> {
        self.lock().selected_id.clone()
    }

    /// 一覧にある記録だけ選択できる
    pub fn select(&self, id: Option<&str>) -> bool {
        let mut state = self.lock();
        match id {
            Some(id) if state.items.iter().any(|item| item.id == id) => {
                state.selected_id = Some(id.to_string());
                true
            }
            Some(_) => false,
            None => {
                state.selected_id = None;
                true
            }
        }
    }

    /// 一覧をそのまま差し替える（スナップショットからの復元用）
    pub fn replace(&self, items: Vec<HistoryItem>) {
        let mut state = self.lock();
        state.items = sort_and_dedup(items);
        retain_selection(&mut state);
    }

    /// 保存先から一覧を取得してキャッシュを置き換える
    ///
    /// 選択中の記録は新しい一覧に残っていれば選択を保つ。
    /// 失敗時はキャッシュを変更しない。
    pub async fn list(&self) -> Result<Outcome<Vec<HistoryItem>>> {
        let Some(_guard) = self.begin_loading() else {
            debug!("履歴一覧を取得中のためスキップ");
            return Ok(Outcome::Busy);
        };

        let fetched = match self.store.list().await {
            Ok(items) => items,
            Err(e) => {
                warn!("履歴一覧の取得に失敗: {}", e);
                return Err(e);
            }
        };

        let items = {
            let mut state = self.lock();
            state.items = sort_and_dedup(fetched);
            retain_selection(&mut state);
            state.items.clone()
        };
        info!(count = items.len(), "履歴一覧を更新");
        self.persist(&items);
        Ok(Outcome::Done(items))
    }

    /// 記録を追加、または同じIDの記録に統合する
    ///
    /// 統合後は作成日時の新しい順に並べ直し、IDの重複は先頭側を残す。
    pub fn upsert(&self, item: HistoryItem) -> HistoryItem {
        self.apply(item, false)
    }

    /// `overwrite_alias` なら空の別名でも既存を上書きする（別名の削除）
    fn apply(&self, item: HistoryItem, overwrite_alias: bool) -> HistoryItem {
        let (merged, items) = {
            let mut state = self.lock();
            let merged = match state.items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => {
                    merge_item(existing, item, overwrite_alias);
                    existing.clone()
                }
                None => {
                    state.items.push(item.clone());
                    item
                }
            };
            let items = std::mem::take(&mut state.items);
            state.items = sort_and_dedup(items);
            (merged, state.items.clone())
        };
        debug!(id = %merged.id, "履歴に反映");
        self.persist(&items);
        merged
    }

    /// 別名を変更
    ///
    /// 同じIDの操作が進行中なら `Outcome::Busy` を返して何もしない。
    pub async fn rename_alias(&self, id: &str, alias: &str) -> Result<Outcome<HistoryItem>> {
        let Some(_guard) = self.begin_mutation(id) else {
            return Ok(Outcome::Busy);
        };

        let mut updated = match self.store.rename(id, alias).await {
            Ok(item) => item,
            Err(e) => {
                warn!(id, "別名の変更に失敗: {}", e);
                return Err(e);
            }
        };
        if updated.id.is_empty() {
            updated.id = id.to_string();
        }
        if updated.alias.is_empty() {
            updated.alias = alias.to_string();
        }

        let merged = self.apply(updated, true);
        info!(id, alias = %merged.alias, "別名を変更");
        Ok(Outcome::Done(merged))
    }

    /// 記録を削除
    ///
    /// 同じIDの操作が進行中なら `Outcome::Busy`。削除した記録が選択中なら選択を外す。
    pub async fn delete(&self, id: &str) -> Result<Outcome<()>> {
        let Some(_guard) = self.begin_mutation(id) else {
            return Ok(Outcome::Busy);
        };

        if let Err(e) = self.store.delete(id).await {
            warn!(id, "履歴の削除に失敗: {}", e);
            return Err(e);
        }

        let items = {
            let mut state = self.lock();
            state.items.retain(|item| item.id != id);
            if state.selected_id.as_deref() == Some(id) {
                state.selected_id = None;
            }
            state.items.clone()
        };
        info!(id, "履歴を削除");
        self.persist(&items);
        Ok(Outcome::Done(()))
    }

    fn persist(&self, items: &[HistoryItem]) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = HistorySnapshot::new(items.to_vec()).save(path) {
            warn!("履歴スナップショットの保存に失敗: {}", e);
        }
    }
}

fn retain_selection(state: &mut CacheState) {
    let keep = state
        .selected_id
        .as_ref()
        .is_some_and(|id| state.items.iter().any(|item| &item.id == id));
    if !keep {
        state.selected_id = None;
    }
}

/// 新しい値で上書きし、空の値は既存を残す
fn merge_item(existing: &mut HistoryItem, update: HistoryItem, overwrite_alias: bool) {
    if overwrite_alias || !update.alias.is_empty() {
        existing.alias = update.alias;
    }
    if update.created_at.is_some() {
        existing.created_at = update.created_at;
    }
    if update.total_images > 0 {
        existing.total_images = update.total_images;
    }
    if update.problems > 0 {
        existing.problems = update.problems;
    }
    if update.overall.total > 0 {
        existing.overall = update.overall;
    }
}

/// 作成日時の解釈（RFC 3339、日時、日付のみ）
pub fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// 作成日時の新しい順（解釈できないものは末尾）に並べ、IDの重複は先頭側を残す
pub fn sort_and_dedup(mut items: Vec<HistoryItem>) -> Vec<HistoryItem> {
    items.sort_by_cached_key(|item| {
        std::cmp::Reverse(item.created_at.as_deref().and_then(parse_created_at))
    });
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.id.clone()));
    items
}
