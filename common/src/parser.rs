//! 採点結果テキストのパーサー
//!
//! AIや保存先から届くテキストから採点結果のJSONを取り出し、
//! 正規化済みの採点結果に変換する

use crate::error::{Error, Result};
use crate::normalize::normalize_check;
use crate::types::NormalizedCheck;
use serde_json::Value;

/// テキストからJSON部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック（言語指定なしの ``` ブロックも可）
/// 2. 先に現れる `{` または `[` から、対応する最後の `}` / `]` まで
/// 3. エラー
///
/// # Examples
/// ```
/// use photo_check_common::extract_payload;
///
/// let text = "結果です: {\"results\": []} 以上";
/// assert_eq!(extract_payload(text).unwrap(), "{\"results\": []}");
/// ```
pub fn extract_payload(text: &str) -> Result<&str> {
    if let Some(block) = fenced_block(text) {
        return Ok(block);
    }

    let object = text.find('{').and_then(|s| text.rfind('}').map(|e| (s, e)));
    let array = text.find('[').and_then(|s| text.rfind(']').map(|e| (s, e)));
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if o.0 < a.0 { o } else { a }),
        (o, a) => o.or(a),
    };

    match span {
        Some((start, end)) if end > start => Ok(&text[start..=end]),
        _ => Err(Error::Parse("JSONが見つかりません".into())),
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let (start, marker_len) = match text.find("```json") {
        Some(pos) => (pos, 7),
        None => (text.find("```")?, 3),
    };
    let body = start + marker_len;
    let end = text[body..].find("```")?;
    let block = text[body..body + end].trim();
    (!block.is_empty()).then_some(block)
}

/// テキストをJSON値としてパース
pub fn parse_payload(text: &str) -> Result<Value> {
    let json_str = extract_payload(text)?;
    serde_json::from_str(json_str.trim())
        .map_err(|e| Error::Parse(format!("採点結果 JSONパースエラー: {}", e)))
}

/// テキストから採点結果を読み込んで正規化
pub fn parse_check(text: &str) -> Result<NormalizedCheck> {
    let payload = parse_payload(text)?;
    Ok(normalize_check(&payload))
}
