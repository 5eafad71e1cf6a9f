//! 値の正規化
//!
//! AIの生JSON値（型も表記もバラバラ）を正規のスカラー値へ変換する純粋関数群。
//! 変換できない値はエラーにせず `None` / `Unknown` として扱う。

use crate::types::{BoundingBox, BoxUnit, Correctness};
use regex::Regex;
use serde_json::{Map, Value};

/// 正解を表す語（小文字で比較）
const AFFIRMATIVE: &[&str] = &[
    "correct", "right", "yes", "true", "ok", "pass", "passed", "√", "✓", "✔", "对", "對",
    "正确", "正確", "是", "答对", "答對",
];

/// 不正解を表す語（小文字で比較）
const NEGATIVE: &[&str] = &[
    "incorrect", "wrong", "no", "false", "fail", "failed", "×", "✗", "✘", "x", "错", "錯",
    "错误", "錯誤", "不正确", "不正確", "否", "答错", "答錯",
];

const LEFT_KEYS: &[&str] = &["left", "x", "x1", "x0", "xmin", "minX", "min_x", "l"];
const TOP_KEYS: &[&str] = &["top", "y", "y1", "y0", "ymin", "minY", "min_y", "t"];
const WIDTH_KEYS: &[&str] = &["width", "w"];
const HEIGHT_KEYS: &[&str] = &["height", "h"];
const RIGHT_KEYS: &[&str] = &["right", "x2", "xmax", "maxX", "max_x", "r"];
const BOTTOM_KEYS: &[&str] = &["bottom", "y2", "ymax", "maxY", "max_y", "b"];
const UNIT_KEYS: &[&str] = &["unit", "units", "coordinateUnit", "coordinate_unit"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "score", "probability", "conf"];
const NESTED_BOX_KEYS: &[&str] = &["bbox", "box", "boundingBox", "bounding_box", "rect", "coords"];

/// 文字列→JSON再帰の上限
const MAX_BOX_DEPTH: usize = 3;

lazy_static::lazy_static! {
    static ref FENCE_LINE_RE: Regex = Regex::new(r"^(```|~~~)[\w+-]*$").unwrap();
    static ref ORDINAL_LINE_RE: Regex =
        Regex::new(r"^(?:\d{1,3}[.．、)）]|[(（]\d{1,3}[)）])$").unwrap();
    static ref FIRST_INTEGER_RE: Regex = Regex::new(r"\d+").unwrap();
    static ref BOX_SPLIT_RE: Regex = Regex::new(r"[\s,;，]+").unwrap();
}

/// 座標単位の指定
#[derive(Debug, Clone, Copy, PartialEq)]
enum UnitHint {
    Ratio,
    Pixel,
    Percent,
}

// =============================================
// 汎用ヘルパー
// =============================================

/// 別名キーのうち最初に見つかった非null値を返す
pub fn pick<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

/// 別名キーのうち最初に空でないテキストになる値を返す
pub fn pick_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| clean_text(map.get(*key)))
}

/// 数値または数値文字列を f64 に変換
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// =============================================
// 正誤・件数・番号
// =============================================

/// 正誤判定を3状態に正規化
///
/// - bool はそのまま
/// - 数値 1 / 0 は正解 / 不正解
/// - 文字列は英語・中国語の同義語と大文字小文字を無視して照合
/// - それ以外は `Unknown`
pub fn normalize_correctness(raw: Option<&Value>) -> Correctness {
    match raw {
        Some(Value::Bool(b)) => Correctness::from(Some(*b)),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 1.0 => Correctness::Correct,
            Some(v) if v == 0.0 => Correctness::Incorrect,
            _ => Correctness::Unknown,
        },
        Some(Value::String(s)) => {
            let word = s
                .trim()
                .trim_end_matches(['.', '!', '。', '！'])
                .to_lowercase();
            if AFFIRMATIVE.contains(&word.as_str()) {
                Correctness::Correct
            } else if NEGATIVE.contains(&word.as_str()) {
                Correctness::Incorrect
            } else {
                Correctness::Unknown
            }
        }
        _ => Correctness::Unknown,
    }
}

/// 件数を0以上の整数に正規化
///
/// 有限でない値・欠落は `None`（フォールバックは呼び出し側が決める）。
///
/// # Examples
/// ```
/// use photo_check_common::value::normalize_count;
/// use serde_json::json;
///
/// assert_eq!(normalize_count(Some(&json!("7.9"))), Some(8));
/// assert_eq!(normalize_count(Some(&json!("abc"))), None);
/// assert_eq!(normalize_count(Some(&json!(-3))), Some(0));
/// ```
pub fn normalize_count(raw: Option<&Value>) -> Option<u32> {
    let n = as_number(raw?)?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, u32::MAX as f64) as u32)
}

/// 1始まりの番号に正規化
///
/// "3." / "Q3" / "第3题" のような装飾付き文字列は最初の整数を採用する。
pub fn normalize_ordinal(raw: Option<&Value>) -> Option<u32> {
    let raw = raw?;
    if let Some(n) = normalize_count(Some(raw)) {
        return (n >= 1).then_some(n);
    }
    let text = raw.as_str()?;
    let digits = FIRST_INTEGER_RE.find(text)?;
    digits.as_str().parse::<u32>().ok().filter(|n| *n >= 1)
}

// =============================================
// テキスト
// =============================================

/// テキストを正規化
///
/// - 前後の空白と行頭インデントを除去
/// - コードフェンス（```）を除去
/// - 番号だけの行（"3."）と直後の本文行を1行にまとめる
/// - 空になれば `None`
pub fn clean_text(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(s) => clean_str(s),
        Value::Number(n) => clean_str(&n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(|v| clean_text(Some(v))).collect();
            clean_str(&parts.join("\n"))
        }
        _ => None,
    }
}

/// 文字列版の [`clean_text`]
pub fn clean_str(text: &str) -> Option<String> {
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !FENCE_LINE_RE.is_match(line))
        .map(|line| line.replace("```", "").trim().to_string())
        .collect();

    let mut merged: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let next = lines.get(i + 1);
        match next {
            Some(next)
                if ORDINAL_LINE_RE.is_match(line)
                    && !next.is_empty()
                    && !ORDINAL_LINE_RE.is_match(next) =>
            {
                merged.push(format!("{} {}", line, next));
                i += 2;
            }
            _ => {
                // 連続する空行は1つにまとめる
                if !(line.is_empty() && merged.last().is_some_and(|l| l.is_empty())) {
                    merged.push(line.clone());
                }
                i += 1;
            }
        }
    }

    let joined = merged.join("\n");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// =============================================
// バウンディングボックス
// =============================================

/// バウンディングボックスを正規化
///
/// 受け付ける形式:
/// 1. `[left, top, width|right, height|bottom]`（3・4番目が1を超えれば右端・下端とみなす）
/// 2. 別名キーを持つオブジェクト（`x`/`x1`/`xmin`、`right`/`x2` など）
/// 3. JSON文字列、またはカンマ・空白区切りの文字列
///
/// 単位指定がなく4値すべてが [0,1] なら `Ratio`、それ以外は `Pixel`。
/// 幅・高さが正の値に決まらなければ `None`。
pub fn normalize_bounding_box(raw: Option<&Value>) -> Option<BoundingBox> {
    bbox_from_value(raw?, 0)
}

fn bbox_from_value(value: &Value, depth: usize) -> Option<BoundingBox> {
    match value {
        Value::Array(items) => {
            if items.len() < 4 {
                return None;
            }
            let numbers: Vec<f64> = items.iter().take(4).map(as_number).collect::<Option<_>>()?;
            bbox_from_numbers(&numbers)
        }
        Value::Object(map) => bbox_from_object(map, depth),
        Value::String(s) => bbox_from_str(s, depth),
        _ => None,
    }
}

fn bbox_from_str(text: &str, depth: usize) -> Option<BoundingBox> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if depth >= MAX_BOX_DEPTH {
            return None;
        }
        let parsed: Value = serde_json::from_str(trimmed).ok()?;
        return bbox_from_value(&parsed, depth + 1);
    }

    let inner = trimmed.trim_matches(|c| matches!(c, '(' | ')' | '（' | '）'));
    let numbers: Vec<f64> = BOX_SPLIT_RE
        .split(inner)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<f64>().ok())
        .collect::<Option<_>>()?;
    if numbers.len() < 4 {
        return None;
    }
    bbox_from_numbers(&numbers[..4])
}

fn bbox_from_numbers(values: &[f64]) -> Option<BoundingBox> {
    let (left, top, third, fourth) = (values[0], values[1], values[2], values[3]);
    let unit = infer_unit(values);
    let width = edge_to_extent(left, third);
    let height = edge_to_extent(top, fourth);
    finalize_box(left, top, width, height, unit, None)
}

/// 1を超える値は右端（下端）として幅（高さ）に変換する
fn edge_to_extent(start: f64, value: f64) -> f64 {
    if value > 1.0 && value > start {
        value - start
    } else {
        value
    }
}

fn bbox_from_object(map: &Map<String, Value>, depth: usize) -> Option<BoundingBox> {
    let number = |keys: &[&str]| pick(map, keys).and_then(as_number);
    let confidence = number(CONFIDENCE_KEYS);

    let left_raw = number(LEFT_KEYS);
    let top_raw = number(TOP_KEYS);
    let width_raw = number(WIDTH_KEYS);
    let height_raw = number(HEIGHT_KEYS);
    let right_raw = number(RIGHT_KEYS);
    let bottom_raw = number(BOTTOM_KEYS);

    let has_coordinates = [left_raw, top_raw, width_raw, height_raw, right_raw, bottom_raw]
        .iter()
        .any(Option::is_some);
    if !has_coordinates {
        // {"bbox": [...], "confidence": 0.9} のような入れ子
        if depth >= MAX_BOX_DEPTH {
            return None;
        }
        let mut nested = bbox_from_value(pick(map, NESTED_BOX_KEYS)?, depth + 1)?;
        if nested.confidence.is_none() {
            nested.confidence = normalize_confidence(confidence);
        }
        return Some(nested);
    }

    let width = width_raw.or_else(|| Some(right_raw? - left_raw.unwrap_or(0.0)))?;
    let height = height_raw.or_else(|| Some(bottom_raw? - top_raw.unwrap_or(0.0)))?;
    let left = left_raw
        .or_else(|| Some(right_raw? - width_raw?))
        .unwrap_or(0.0);
    let top = top_raw
        .or_else(|| Some(bottom_raw? - height_raw?))
        .unwrap_or(0.0);

    let hint = pick(map, UNIT_KEYS)
        .and_then(Value::as_str)
        .and_then(parse_unit);
    let (left, top, width, height, unit) = match hint {
        Some(UnitHint::Percent) => (
            left / 100.0,
            top / 100.0,
            width / 100.0,
            height / 100.0,
            BoxUnit::Ratio,
        ),
        Some(UnitHint::Ratio) => (left, top, width, height, BoxUnit::Ratio),
        Some(UnitHint::Pixel) => (left, top, width, height, BoxUnit::Pixel),
        None => (left, top, width, height, infer_unit(&[left, top, width, height])),
    };

    finalize_box(left, top, width, height, unit, confidence)
}

fn parse_unit(text: &str) -> Option<UnitHint> {
    match text.trim().to_lowercase().as_str() {
        "ratio" | "normalized" | "normalised" | "relative" | "fraction" => Some(UnitHint::Ratio),
        "pixel" | "pixels" | "px" | "absolute" => Some(UnitHint::Pixel),
        "percent" | "percentage" | "%" => Some(UnitHint::Percent),
        _ => None,
    }
}

fn infer_unit(values: &[f64]) -> BoxUnit {
    if values.iter().all(|v| (0.0..=1.0).contains(v)) {
        BoxUnit::Ratio
    } else {
        BoxUnit::Pixel
    }
}

fn normalize_confidence(raw: Option<f64>) -> Option<f64> {
    raw.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 1.0))
}

/// 不変条件（幅・高さ > 0、比率なら画像内に収まる）を満たすよう整える
fn finalize_box(
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    unit: BoxUnit,
    confidence: Option<f64>,
) -> Option<BoundingBox> {
    if ![left, top, width, height].iter().all(|v| v.is_finite()) {
        return None;
    }
    let mut left = left.max(0.0);
    let mut top = top.max(0.0);
    let mut width = width;
    let mut height = height;

    if unit == BoxUnit::Ratio {
        left = left.min(1.0);
        top = top.min(1.0);
        width = width.min(1.0 - left);
        height = height.min(1.0 - top);
    }

    if width <= 0.0 || height <= 0.0 {
        return None;
    }

    Some(BoundingBox {
        left,
        top,
        width,
        height,
        unit,
        confidence: normalize_confidence(confidence),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bbox(value: Value) -> Option<BoundingBox> {
        normalize_bounding_box(Some(&value))
    }

    // =============================================
    // normalize_correctness テスト
    // =============================================

    #[test]
    fn test_correctness_bool_and_number() {
        assert_eq!(normalize_correctness(Some(&json!(true))), Correctness::Correct);
        assert_eq!(normalize_correctness(Some(&json!(false))), Correctness::Incorrect);
        assert_eq!(normalize_correctness(Some(&json!(1))), Correctness::Correct);
        assert_eq!(normalize_correctness(Some(&json!(0))), Correctness::Incorrect);
        assert_eq!(normalize_correctness(Some(&json!(0.5))), Correctness::Unknown);
    }

    #[test]
    fn test_correctness_words() {
        assert_eq!(normalize_correctness(Some(&json!("Correct"))), Correctness::Correct);
        assert_eq!(normalize_correctness(Some(&json!(" WRONG "))), Correctness::Incorrect);
        assert_eq!(normalize_correctness(Some(&json!("正确"))), Correctness::Correct);
        assert_eq!(normalize_correctness(Some(&json!("错误"))), Correctness::Incorrect);
        assert_eq!(normalize_correctness(Some(&json!("Yes."))), Correctness::Correct);
    }

    #[test]
    fn test_correctness_unknown() {
        assert_eq!(normalize_correctness(None), Correctness::Unknown);
        assert_eq!(normalize_correctness(Some(&json!(null))), Correctness::Unknown);
        assert_eq!(normalize_correctness(Some(&json!("maybe"))), Correctness::Unknown);
        assert_eq!(normalize_correctness(Some(&json!({"a": 1}))), Correctness::Unknown);
    }

    // =============================================
    // normalize_count / normalize_ordinal テスト
    // =============================================

    #[test]
    fn test_count_rounds_and_floors() {
        assert_eq!(normalize_count(Some(&json!("7.9"))), Some(8));
        assert_eq!(normalize_count(Some(&json!(2.4))), Some(2));
        assert_eq!(normalize_count(Some(&json!(-1))), Some(0));
        assert_eq!(normalize_count(Some(&json!(" 12 "))), Some(12));
    }

    #[test]
    fn test_count_invalid() {
        assert_eq!(normalize_count(Some(&json!("abc"))), None);
        assert_eq!(normalize_count(Some(&json!("NaN"))), None);
        assert_eq!(normalize_count(Some(&json!("inf"))), None);
        assert_eq!(normalize_count(Some(&json!(true))), None);
        assert_eq!(normalize_count(None), None);
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(normalize_ordinal(Some(&json!(3))), Some(3));
        assert_eq!(normalize_ordinal(Some(&json!("Q4"))), Some(4));
        assert_eq!(normalize_ordinal(Some(&json!("第12题"))), Some(12));
        assert_eq!(normalize_ordinal(Some(&json!(0))), None);
        assert_eq!(normalize_ordinal(Some(&json!("none"))), None);
    }

    // =============================================
    // clean_text テスト
    // =============================================

    #[test]
    fn test_clean_text_trims_and_drops_empty() {
        assert_eq!(clean_text(Some(&json!("  x + 1 = 2  "))), Some("x + 1 = 2".to_string()));
        assert_eq!(clean_text(Some(&json!("   "))), None);
        assert_eq!(clean_text(Some(&json!(null))), None);
        assert_eq!(clean_text(Some(&json!(42))), Some("42".to_string()));
    }

    #[test]
    fn test_clean_text_removes_fences_and_indent() {
        let raw = json!("```markdown\n    line one\n\tline two\n```");
        assert_eq!(clean_text(Some(&raw)), Some("line one\nline two".to_string()));
    }

    #[test]
    fn test_clean_text_merges_ordinal_line() {
        let raw = json!("3.\nSolve for x: 2x = 6");
        assert_eq!(clean_text(Some(&raw)), Some("3. Solve for x: 2x = 6".to_string()));

        let raw = json!("(2)\n求面积");
        assert_eq!(clean_text(Some(&raw)), Some("(2) 求面积".to_string()));
    }

    #[test]
    fn test_clean_text_array_joined() {
        let raw = json!(["first", "", "second"]);
        assert_eq!(clean_text(Some(&raw)), Some("first\nsecond".to_string()));
    }

    // =============================================
    // normalize_bounding_box テスト
    // =============================================

    #[test]
    fn test_bbox_array_ratio() {
        let b = bbox(json!([0.1, 0.2, 0.3, 0.4])).unwrap();
        assert_eq!(b.unit, BoxUnit::Ratio);
        assert_eq!((b.left, b.top, b.width, b.height), (0.1, 0.2, 0.3, 0.4));
    }

    #[test]
    fn test_bbox_array_right_bottom_pixels() {
        let b = bbox(json!([10, 20, 110, 70])).unwrap();
        assert_eq!(b.unit, BoxUnit::Pixel);
        assert_eq!((b.left, b.top, b.width, b.height), (10.0, 20.0, 100.0, 50.0));
    }

    #[test]
    fn test_bbox_array_width_when_right_reading_impossible() {
        let b = bbox(json!([300, 400, 50, 60])).unwrap();
        assert_eq!(b.unit, BoxUnit::Pixel);
        assert_eq!((b.width, b.height), (50.0, 60.0));
    }

    #[test]
    fn test_bbox_ratio_clipped_to_image() {
        let b = bbox(json!({"x": 0.8, "y": 0.5, "w": 0.5, "h": 0.9})).unwrap();
        assert_eq!(b.unit, BoxUnit::Ratio);
        assert!((b.width - 0.2).abs() < 1e-9);
        assert!((b.height - 0.5).abs() < 1e-9);
        assert!(b.left + b.width <= 1.0 + 1e-9);
    }

    #[test]
    fn test_bbox_object_aliases_right_bottom() {
        let b = bbox(json!({"xmin": 5, "ymin": 10, "xmax": 25, "ymax": 40, "score": 0.8})).unwrap();
        assert_eq!(b.unit, BoxUnit::Pixel);
        assert_eq!((b.left, b.top, b.width, b.height), (5.0, 10.0, 20.0, 30.0));
        assert_eq!(b.confidence, Some(0.8));
    }

    #[test]
    fn test_bbox_explicit_units() {
        let b = bbox(json!({"left": 0.5, "top": 0.5, "width": 0.2, "height": 0.2, "unit": "px"}))
            .unwrap();
        assert_eq!(b.unit, BoxUnit::Pixel);

        let b = bbox(json!({"left": 10, "top": 20, "width": 30, "height": 40, "unit": "percent"}))
            .unwrap();
        assert_eq!(b.unit, BoxUnit::Ratio);
        assert!((b.left - 0.1).abs() < 1e-9);
        assert!((b.height - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_bbox_strings() {
        let b = bbox(json!("[0.1, 0.1, 0.5, 0.5]")).unwrap();
        assert_eq!(b.unit, BoxUnit::Ratio);

        let b = bbox(json!("12 30 112 80")).unwrap();
        assert_eq!(b.unit, BoxUnit::Pixel);
        assert_eq!((b.width, b.height), (100.0, 50.0));

        let b = bbox(json!(r#"{"left": 1, "top": 2, "width": 3, "height": 4}"#)).unwrap();
        assert_eq!(b.unit, BoxUnit::Pixel);
    }

    #[test]
    fn test_bbox_nested_with_confidence() {
        let b = bbox(json!({"bbox": [0.2, 0.2, 0.4, 0.4], "confidence": 1.7})).unwrap();
        assert_eq!(b.unit, BoxUnit::Ratio);
        assert_eq!(b.confidence, Some(1.0));
    }

    #[test]
    fn test_bbox_unresolvable() {
        assert!(bbox(json!([1, 2, 3])).is_none());
        assert!(bbox(json!({"left": 0.1, "top": 0.1})).is_none());
        assert!(bbox(json!({"x": 0.1, "y": 0.1, "w": 0, "h": 0.3})).is_none());
        assert!(bbox(json!("not a box")).is_none());
        assert!(bbox(json!(7)).is_none());
    }

    #[test]
    fn test_bbox_unit_inference_property() {
        let ratio_boxes = [
            json!([0.0, 0.0, 1.0, 1.0]),
            json!([0.25, 0.5, 0.5, 0.25]),
            json!({"x": 0.3, "y": 0.3, "width": 0.3, "height": 0.3}),
        ];
        for raw in ratio_boxes {
            assert_eq!(bbox(raw.clone()).unwrap().unit, BoxUnit::Ratio, "{raw}");
        }

        let pixel_boxes = [
            json!([0.5, 0.5, 2.0, 3.0]),
            json!([40, 0.5, 0.5, 0.5]),
            json!({"x": 0.3, "y": 0.3, "width": 1.5, "height": 0.3}),
        ];
        for raw in pixel_boxes {
            assert_eq!(bbox(raw.clone()).unwrap().unit, BoxUnit::Pixel, "{raw}");
        }
    }
}
