//! 採点履歴モジュール
//!
//! 保存先との通信、クライアント側キャッシュ、オフライン用スナップショットを提供する。

mod cache;
mod snapshot;
mod store;

pub use cache::{parse_created_at, sort_and_dedup, HistoryCache, Outcome};
pub use snapshot::{HistorySnapshot, SNAPSHOT_FILE_NAME};
pub use store::{parse_history_item, parse_history_list, HistoryStore, HttpHistoryStore, SavedRecord};
