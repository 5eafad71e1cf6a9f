//! photo-check
//!
//! 写真採点結果のレポート表示・エントリ保存・履歴管理。
//! 正規化とレポート生成は `photo-check-common` が担当する。

pub mod cli;
pub mod config;
pub mod entries;
pub mod error;
pub mod history;
pub mod logging;
pub mod workspace;

pub use photo_check_common as common;
