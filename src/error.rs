//! エラー型定義

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("保存先サーバーが設定されていません。`photo-check config --set-server URL` で設定してください")]
    MissingServer,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("サーバーエラー ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("保存先の応答が不正: {0}")]
    InvalidResponse(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    /// 一括保存で失敗した行（以降の行は保存しない）
    #[error("問題 {problem_index} の保存に失敗: {reason}")]
    EntrySave { problem_index: u32, reason: String },

    #[error(transparent)]
    Common(#[from] photo_check_common::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;
