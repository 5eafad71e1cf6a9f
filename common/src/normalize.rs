//! 問題・Attempt・写真（Batch）の正規化
//!
//! AI呼び出し結果の生JSONから正規のエンティティツリーを組み立てる。
//! 意味のある値にならない要素は `None` として捨て、レポート全体は止めない。

use crate::summary::sum_summaries;
use crate::types::{
    Attempt, Batch, BatchImage, NormalizedCheck, Problem, ProblemImage, Summary,
};
use crate::value::{
    clean_text, normalize_bounding_box, normalize_correctness, normalize_count,
    normalize_ordinal, pick, pick_text,
};
use serde_json::{Map, Value};
use tracing::debug;

// 問題
const PROBLEM_INDEX_KEYS: &[&str] = &[
    "index", "questionIndex", "question_index", "questionNumber", "question_number",
    "questionNo", "question_no", "problemIndex", "problem_index", "problemNo", "number", "no",
    "num", "seq",
];
const QUESTION_KEYS: &[&str] = &[
    "question", "questionText", "question_text", "stem", "prompt", "problem", "content", "title",
];
const STUDENT_ANSWER_KEYS: &[&str] = &[
    "studentAnswer", "student_answer", "userAnswer", "user_answer", "myAnswer", "answer",
    "response", "studentResponse",
];
const SOLVED_ANSWER_KEYS: &[&str] = &[
    "solvedAnswer", "solved_answer", "correctAnswer", "correct_answer", "standardAnswer",
    "standard_answer", "referenceAnswer", "expectedAnswer", "rightAnswer", "solution",
];
const ANALYSIS_KEYS: &[&str] = &[
    "analysis", "explanation", "reason", "reasoning", "comment", "feedback", "errorReason",
    "error_reason",
];
const CORRECTNESS_KEYS: &[&str] = &[
    "isCorrect", "is_correct", "correct", "correctness", "verdict", "judgement", "judgment",
    "result", "status",
];
const BOX_KEYS: &[&str] = &[
    "boundingBox", "bounding_box", "bbox", "box", "region", "rect", "position", "location",
    "coords", "coordinates",
];
const PROBLEM_IMAGE_KEYS: &[&str] = &[
    "image", "questionImage", "question_image", "imageUrl", "image_url", "crop", "cropImage",
    "snippet",
];

// 画像
const URL_KEYS: &[&str] = &["url", "src", "href", "dataUrl", "data_url", "imageUrl", "image_url", "path"];
const IMAGE_WIDTH_KEYS: &[&str] = &["width", "naturalWidth", "imageWidth", "image_width"];
const IMAGE_HEIGHT_KEYS: &[&str] = &["height", "naturalHeight", "imageHeight", "image_height"];
const IMAGE_SOURCE_KEYS: &[&str] = &["source", "origin", "kind", "type"];
const IMAGE_ATTEMPT_KEYS: &[&str] = &["attempt", "attemptIndex", "attempt_index"];

// Attempt
const ATTEMPT_INDEX_KEYS: &[&str] = &["attempt", "attemptIndex", "attempt_index", "index", "pass", "round"];
const PROVIDER_KEYS: &[&str] = &["provider", "model", "source", "engine", "name", "vendor"];
const LABEL_KEYS: &[&str] = &["label", "title", "displayName", "display_name"];
const SUMMARY_KEYS: &[&str] = &["summary", "stats", "statistics"];
const PROBLEM_LIST_KEYS: &[&str] = &["problems", "questions", "items", "entries"];
const TOTAL_KEYS: &[&str] = &["total", "totalCount", "total_count", "count"];
const CORRECT_KEYS: &[&str] = &["correct", "correctCount", "correct_count", "right"];
const INCORRECT_KEYS: &[&str] = &["incorrect", "incorrectCount", "incorrect_count", "wrong", "wrongCount"];
const UNKNOWN_KEYS: &[&str] = &["unknown", "unknownCount", "unknown_count", "unresolved", "pending"];

// Batch
const BATCH_INDEX_KEYS: &[&str] = &[
    "index", "imageIndex", "image_index", "photoIndex", "photo_index", "batchIndex",
    "batch_index", "page",
];
const BATCH_NAME_KEYS: &[&str] = &["name", "fileName", "file_name", "filename", "title", "label"];
const BATCH_IMAGE_KEYS: &[&str] = &["image", "photo", "imageUrl", "image_url", "url", "preview"];
const ATTEMPT_LIST_KEYS: &[&str] = &["attempts", "passes", "runs"];

// ペイロード
const RECORD_ID_KEYS: &[&str] = &["recordId", "record_id", "id"];
const CREATED_AT_KEYS: &[&str] = &["createdAt", "created_at"];

/// 問題を正規化
///
/// 問題番号は「問題自身の番号 → 画像の番号 → `fallback_index`」の順に解決する。
/// テキストも画像もない問題は `None`。
pub fn normalize_problem(raw: &Value, fallback_index: u32) -> Option<Problem> {
    let map = match raw {
        Value::Object(map) => map,
        Value::String(_) => {
            // 文字列だけの問題は問題文として扱う
            let question = clean_text(Some(raw))?;
            return Some(Problem {
                index: fallback_index.max(1),
                question: Some(question),
                student_answer: None,
                solved_answer: None,
                analysis: None,
                is_correct: Default::default(),
                bounding_box: None,
                image: None,
            });
        }
        _ => return None,
    };

    let image_raw = pick(map, PROBLEM_IMAGE_KEYS);
    let image_map = image_raw.and_then(Value::as_object);

    let index = normalize_ordinal(pick(map, PROBLEM_INDEX_KEYS))
        .or_else(|| image_map.and_then(|m| normalize_ordinal(pick(m, PROBLEM_INDEX_KEYS))))
        .unwrap_or(fallback_index.max(1));

    let bounding_box = normalize_bounding_box(pick(map, BOX_KEYS))
        .or_else(|| image_map.and_then(|m| normalize_bounding_box(pick(m, BOX_KEYS))));

    let image = image_raw.and_then(|value| {
        let mut image = normalize_problem_image(value)?;
        if image.bounding_box.is_none() {
            image.bounding_box = bounding_box.clone();
        }
        Some(image)
    });

    let problem = Problem {
        index,
        question: pick_text(map, QUESTION_KEYS),
        student_answer: pick_text(map, STUDENT_ANSWER_KEYS),
        solved_answer: pick_text(map, SOLVED_ANSWER_KEYS),
        analysis: pick_text(map, ANALYSIS_KEYS),
        is_correct: normalize_correctness(pick(map, CORRECTNESS_KEYS)),
        bounding_box,
        image,
    };

    if !problem.has_content() {
        debug!(index, "discarding problem without text or image");
        return None;
    }
    Some(problem)
}

/// 問題画像を正規化（URL文字列またはオブジェクト）
pub fn normalize_problem_image(raw: &Value) -> Option<ProblemImage> {
    match raw {
        Value::String(url) => {
            let url = url.trim();
            (!url.is_empty()).then(|| ProblemImage {
                url: url.to_string(),
                width: None,
                height: None,
                bounding_box: None,
                source: None,
                attempt: None,
                index: None,
            })
        }
        Value::Object(map) => {
            let url = pick(map, URL_KEYS)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())?;
            Some(ProblemImage {
                url: url.to_string(),
                width: normalize_count(pick(map, IMAGE_WIDTH_KEYS)).filter(|w| *w > 0),
                height: normalize_count(pick(map, IMAGE_HEIGHT_KEYS)).filter(|h| *h > 0),
                bounding_box: normalize_bounding_box(pick(map, BOX_KEYS)),
                source: pick_text(map, IMAGE_SOURCE_KEYS),
                attempt: normalize_ordinal(pick(map, IMAGE_ATTEMPT_KEYS)),
                index: normalize_ordinal(pick(map, PROBLEM_INDEX_KEYS)),
            })
        }
        _ => None,
    }
}

/// プロバイダ名を正規化（前後空白除去・小文字化）
pub fn normalize_provider(raw: Option<&Value>) -> Option<String> {
    let text = raw?.as_str()?.trim().to_lowercase();
    (!text.is_empty()).then_some(text)
}

/// Attempt（AI呼び出し1回分）を正規化
///
/// 集計は明示値を優先し、欠けた値は問題リストから導出する。
/// ただし `total` は問題数未満にならないよう引き上げ、その場合 `unknown` は残差で再計算する。
pub fn normalize_attempt(raw: &Value, fallback_index: u32) -> Option<Attempt> {
    let map = raw.as_object()?;

    let index = normalize_ordinal(pick(map, ATTEMPT_INDEX_KEYS)).unwrap_or(fallback_index.max(1));
    let provider = normalize_provider(pick(map, PROVIDER_KEYS));
    let label = pick_text(map, LABEL_KEYS);

    let problems: Vec<Problem> = pick(map, PROBLEM_LIST_KEYS)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| normalize_problem(item, i as u32 + 1))
                .collect()
        })
        .unwrap_or_default();

    let explicit = pick(map, SUMMARY_KEYS).and_then(Value::as_object);
    let summary = resolve_summary(explicit, &problems);

    Some(Attempt {
        index,
        provider,
        label,
        summary,
        problems,
    })
}

/// 明示的な集計と問題リストから導出した集計を突き合わせる
fn resolve_summary(explicit: Option<&Map<String, Value>>, problems: &[Problem]) -> Summary {
    use crate::types::Correctness;

    let derived_correct = problems
        .iter()
        .filter(|p| p.is_correct == Correctness::Correct)
        .count() as u32;
    let derived_incorrect = problems
        .iter()
        .filter(|p| p.is_correct == Correctness::Incorrect)
        .count() as u32;
    let problem_count = problems.len() as u32;

    let field = |keys: &[&str]| explicit.and_then(|m| normalize_count(pick(m, keys)));

    let mut total = field(TOTAL_KEYS).unwrap_or(problem_count);
    let correct = field(CORRECT_KEYS).unwrap_or(derived_correct);
    let incorrect = field(INCORRECT_KEYS).unwrap_or(derived_incorrect);
    let remainder = |total: u32| total.saturating_sub(correct).saturating_sub(incorrect);
    let mut unknown = field(UNKNOWN_KEYS).unwrap_or_else(|| remainder(total));

    if total < problem_count {
        total = problem_count;
        unknown = remainder(total);
    }

    Summary {
        total,
        correct,
        incorrect,
        unknown,
    }
}

/// 写真全体の画像を正規化
fn normalize_batch_image(raw: &Value) -> Option<BatchImage> {
    normalize_problem_image(raw).map(|image| BatchImage {
        url: image.url,
        width: image.width,
        height: image.height,
    })
}

/// 写真1枚分の要素を正規化
///
/// `attempts` 配列がなければ要素自身を1回分のAttemptとして扱う。
/// Attemptも画像もない要素は `None`。
pub fn normalize_batch(raw: &Value, fallback_index: u32, arrival: usize) -> Option<Batch> {
    let map = raw.as_object()?;

    let index = normalize_ordinal(pick(map, BATCH_INDEX_KEYS)).unwrap_or(fallback_index.max(1));
    let order = normalize_count(map.get("order"))
        .map(|o| o as usize)
        .unwrap_or(arrival);
    let name = pick_text(map, BATCH_NAME_KEYS).unwrap_or_else(|| format!("Photo {}", index));
    let image = pick(map, BATCH_IMAGE_KEYS).and_then(normalize_batch_image);

    let attempts: Vec<Attempt> = match pick(map, ATTEMPT_LIST_KEYS).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| normalize_attempt(item, i as u32 + 1))
            .collect(),
        None if pick(map, PROBLEM_LIST_KEYS).is_some() => {
            single_attempt_from(map).into_iter().collect()
        }
        None => Vec::new(),
    };

    if attempts.is_empty() && image.is_none() {
        debug!(index, "discarding photo without attempts or image");
        return None;
    }

    let derived = sum_summaries(attempts.iter().map(|a| a.summary));
    let summary = match pick(map, SUMMARY_KEYS).and_then(Value::as_object) {
        Some(explicit) => {
            let field = |keys: &[&str]| normalize_count(pick(explicit, keys));
            let total = field(TOTAL_KEYS).unwrap_or(derived.total);
            let correct = field(CORRECT_KEYS).unwrap_or(derived.correct);
            let incorrect = field(INCORRECT_KEYS).unwrap_or(derived.incorrect);
            Summary {
                total,
                correct,
                incorrect,
                unknown: field(UNKNOWN_KEYS).unwrap_or_else(|| {
                    total.saturating_sub(correct).saturating_sub(incorrect)
                }),
            }
        }
        None => derived,
    };

    Some(Batch {
        index,
        order,
        name,
        attempts,
        summary,
        image,
    })
}

/// 単一写真形式の要素を1回分のAttemptとして読む
///
/// 要素の `name` は写真名なのでプロバイダとしては読まない。
fn single_attempt_from(map: &Map<String, Value>) -> Option<Attempt> {
    let mut attempt_map = map.clone();
    for key in ["name", "index", "title", "label"] {
        attempt_map.remove(key);
    }
    normalize_attempt(&Value::Object(attempt_map), 1)
}

/// ペイロード全体を写真（Batch）の列に正規化
///
/// - `results` 配列が空でなければ複数写真形式。番号昇順、同番号は到着順
/// - それ以外は単一写真形式として番号1の写真を1枚だけ作る
pub fn normalize_batches(payload: &Value) -> Vec<Batch> {
    let results = match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => map
            .get("results")
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty()),
        _ => None,
    };

    match results {
        Some(items) => {
            let mut batches: Vec<Batch> = items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| normalize_batch(item, i as u32 + 1, i))
                .collect();
            batches.sort_by_key(|batch| (batch.index, batch.order));
            batches
        }
        None => {
            let Some(map) = payload.as_object() else {
                return Vec::new();
            };
            let mut single = map.clone();
            // 単一写真形式では番号を常に1とする
            for key in BATCH_INDEX_KEYS {
                single.remove(*key);
            }
            single.remove("order");
            normalize_batch(&Value::Object(single), 1, 0)
                .into_iter()
                .collect()
        }
    }
}

/// 採点結果ペイロード全体を正規化
pub fn normalize_check(payload: &Value) -> NormalizedCheck {
    let batches = normalize_batches(payload);
    let overall = sum_summaries(batches.iter().map(|b| b.summary));
    let map = payload.as_object();
    let text = |keys: &[&str]| map.and_then(|m| pick_text(m, keys));

    NormalizedCheck {
        record_id: text(RECORD_ID_KEYS),
        created_at: text(CREATED_AT_KEYS),
        alias: text(&["alias"]),
        batches,
        overall,
    }
}
