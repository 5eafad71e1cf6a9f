//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use photo_check::config::Config;
use photo_check::error::CheckError;
use photo_check_common::{parse_check, EntryDefaults, EntryDraft, Correctness};
use tempfile::tempdir;

/// 壊れた設定ファイルはJSON解析エラー
#[test]
fn test_broken_config_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let result = Config::load_from(&path);
    assert!(matches!(result, Err(CheckError::JsonParse(_))));
}

/// JSONを含まないテキストはパースエラー
#[test]
fn test_payload_without_json() {
    let result = parse_check("採点できませんでした");
    assert!(matches!(result, Err(photo_check_common::Error::Parse(_))));
}

/// CheckErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        CheckError::Config("テスト設定エラー".to_string()),
        CheckError::FileNotFound("result.json".to_string()),
        CheckError::Server { status: 500, message: "internal".to_string() },
        CheckError::InvalidResponse("recordIdなし".to_string()),
        CheckError::EntrySave { problem_index: 3, reason: "空".to_string() },
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingServerエラーのメッセージ確認
#[test]
fn test_missing_server_message() {
    let display = format!("{}", CheckError::MissingServer);
    assert!(display.contains("保存先サーバー"));
    assert!(display.contains("photo-check config"));
}

/// サーバーエラーは状態コードを含む
#[test]
fn test_server_error_display() {
    let err = CheckError::Server { status: 404, message: "not found".to_string() };
    assert_eq!(format!("{}", err), "サーバーエラー (404): not found");
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: CheckError = io_err.into();

    assert!(matches!(err, CheckError::Io(_)));
    assert!(format!("{}", err).contains("IO"));
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: CheckError = json_err.into();

    assert!(matches!(err, CheckError::JsonParse(_)));
}

/// common::Errorからの変換（透過的エラー）
#[test]
fn test_common_error_transparent() {
    let draft = EntryDraft {
        key: "1:4".to_string(),
        batch_index: 1,
        batch_name: "p.jpg".to_string(),
        problem_index: 4,
        question: None,
        student_answer: None,
        solved_answer: None,
        analysis: None,
        verdict: Correctness::Unknown,
        image: None,
        bounding_box: None,
        providers: Vec::new(),
    };
    let common_err = draft.to_payload(&EntryDefaults::default(), "now").unwrap_err();
    let expected = common_err.to_string();
    let err: CheckError = common_err.into();

    assert!(matches!(err, CheckError::Common(_)));
    // 透過的エラーなのでメッセージがそのまま表示される
    assert_eq!(format!("{}", err), expected);
    assert!(expected.contains("photo 1 question 4"));
}
