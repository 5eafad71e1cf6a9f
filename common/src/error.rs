//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// テキストも画像もないエントリは保存できない
    #[error("Entry for photo {batch_index} question {problem_index} has neither text nor image")]
    EmptyEntry { batch_index: u32, problem_index: u32 },

    #[error("Unknown selection key: {0}")]
    UnknownSelection(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
