//! 採点記録の保存先
//!
//! 保存先サーバーとのやり取りは `HistoryStore` トレイトの背後に置き、
//! テストではメモリ上の実装に差し替える。

use crate::error::{CheckError, Result};
use async_trait::async_trait;
use photo_check_common::value::pick_text;
use photo_check_common::HistoryItem;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// 採点結果を保存したときにサーバーが返す識別情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecord {
    pub record_id: String,
    pub created_at: Option<String>,
}

impl SavedRecord {
    /// `{recordId|record_id|id, createdAt|created_at}` を読む
    pub fn from_response(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| CheckError::InvalidResponse("保存結果がオブジェクトではありません".into()))?;
        let record_id = pick_text(map, &["recordId", "record_id", "id"])
            .ok_or_else(|| CheckError::InvalidResponse("保存結果に recordId がありません".into()))?;
        Ok(Self {
            record_id,
            created_at: pick_text(map, &["createdAt", "created_at"]),
        })
    }
}

/// 採点記録の保存先
///
/// 実装は `Send + Sync` で、1回の呼び出しで1回だけ通信する（再試行しない）。
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 採点結果を保存
    async fn save_check(&self, payload: &Value) -> Result<SavedRecord>;

    /// 保存済みの記録一覧
    async fn list(&self) -> Result<Vec<HistoryItem>>;

    /// 別名を変更して更新後の記録を返す
    async fn rename(&self, id: &str, alias: &str) -> Result<HistoryItem>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// HTTPの保存先
///
/// - `POST {base}/checks` → `{recordId|id, createdAt}`
/// - `GET {base}/checks` → `HistoryItem[]`（`{items: [...]}` も可）
/// - `PATCH {base}/checks/{id}` `{alias}` → `HistoryItem`
/// - `DELETE {base}/checks/{id}`
pub struct HttpHistoryStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/checks", self.base_url)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/checks/{}", self.base_url, id)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "保存先サーバーがエラーを返しました");
            return Err(CheckError::Server {
                status: status.as_u16(),
                message: server_message(&message),
            });
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// エラー応答の本文から表示用メッセージを取り出す
fn server_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.get("message").or_else(|| v.get("error")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// 一覧応答（配列、または `items` / `records` を持つオブジェクト）
pub fn parse_history_list(value: Value) -> Result<Vec<HistoryItem>> {
    let items = match value {
        items @ Value::Array(_) => items,
        Value::Object(mut map) => map
            .remove("items")
            .or_else(|| map.remove("records"))
            .unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    Ok(serde_json::from_value(items)?)
}

/// 単一記録の応答（そのまま、または `item` で包まれたもの）
pub fn parse_history_item(value: Value) -> Result<HistoryItem> {
    let item = match value {
        Value::Object(mut map) if map.contains_key("item") => map.remove("item").unwrap_or_default(),
        other => other,
    };
    Ok(serde_json::from_value(item)?)
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn save_check(&self, payload: &Value) -> Result<SavedRecord> {
        debug!(url = %self.collection_url(), "採点結果を保存");
        let response = self
            .client
            .post(self.collection_url())
            .json(payload)
            .send()
            .await?;
        let value = Self::read_json(response).await?;
        SavedRecord::from_response(&value)
    }

    async fn list(&self) -> Result<Vec<HistoryItem>> {
        let response = self.client.get(self.collection_url()).send().await?;
        parse_history_list(Self::read_json(response).await?)
    }

    async fn rename(&self, id: &str, alias: &str) -> Result<HistoryItem> {
        let response = self
            .client
            .patch(self.item_url(id))
            .json(&json!({ "alias": alias }))
            .send()
            .await?;
        parse_history_item(Self::read_json(response).await?)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self.client.delete(self.item_url(id)).send().await?;
        Self::read_json(response).await?;
        Ok(())
    }
}
