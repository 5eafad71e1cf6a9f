//! 選択キーと選択状態、エントリ下書き
//!
//! 選択キー `"{写真番号}:{問題番号}"` が再描画をまたいで唯一安定した識別子になる。
//! 選択状態はこのキーの集合として保持し、画面状態から読み戻さない。

use crate::error::{Error, Result};
use crate::rows::{RowSet, ProblemRow};
use crate::types::{Batch, BoundingBox, Correctness, Problem, ProblemImage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 選択キーを作る
///
/// どちらかが有限の正数（切り捨て後1以上）でなければ空文字を返す。
///
/// # Examples
/// ```
/// use photo_check_common::selection::selection_key;
///
/// assert_eq!(selection_key(2, 5), "2:5");
/// assert_eq!(selection_key(0, 5), "");
/// assert_eq!(selection_key(2.9, f64::NAN), "");
/// ```
pub fn selection_key(batch_index: impl Into<f64>, problem_index: impl Into<f64>) -> String {
    let batch = batch_index.into();
    let problem = problem_index.into();
    if !batch.is_finite() || !problem.is_finite() {
        return String::new();
    }
    let (batch, problem) = (batch.floor(), problem.floor());
    if batch < 1.0 || problem < 1.0 || batch > u32::MAX as f64 || problem > u32::MAX as f64 {
        return String::new();
    }
    format!("{}:{}", batch as u32, problem as u32)
}

/// 選択キーを (写真番号, 問題番号) に分解
pub fn parse_selection_key(key: &str) -> Option<(u32, u32)> {
    let (batch, problem) = key.trim().split_once(':')?;
    let batch = batch.trim().parse::<u32>().ok().filter(|b| *b >= 1)?;
    let problem = problem.trim().parse::<u32>().ok().filter(|p| *p >= 1)?;
    Some((batch, problem))
}

/// ユーザーの選択状態（選択キーの集合）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    keys: BTreeSet<String>,
}

impl Selection {
    /// 選択を反転し、反転後に選択されていれば `true`
    ///
    /// 空キーは無視する。
    pub fn toggle(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        if self.keys.remove(key) {
            false
        } else {
            self.keys.insert(key.to_string());
            true
        }
    }

    pub fn set(&mut self, key: &str, selected: bool) {
        if key.is_empty() {
            return;
        }
        if selected {
            self.keys.insert(key.to_string());
        } else {
            self.keys.remove(key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

/// 選択キーから引く行の文脈
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub key: String,
    pub batch_index: u32,
    pub batch_name: String,
    pub problem_index: u32,
    /// Attempt番号と問題（`attempt_order` 順）
    pub attempts: Vec<(u32, Problem)>,
    pub attempt_order: Vec<u32>,
    /// (Attempt番号, プロバイダ名)
    pub providers: Vec<(u32, Option<String>)>,
    pub image: Option<ProblemImage>,
    pub bounding_box: Option<BoundingBox>,
}

impl RowContext {
    pub fn new(key_batch_index: u32, batch: &Batch, set: &RowSet, row: &ProblemRow) -> Self {
        let attempts: Vec<(u32, Problem)> = set
            .attempt_order
            .iter()
            .filter_map(|index| row.get(*index).map(|p| (*index, p.clone())))
            .collect();
        let image = attempts.iter().find_map(|(_, p)| p.image.clone());
        let providers = set
            .attempt_order
            .iter()
            .map(|index| {
                let provider = set
                    .attempt_metadata
                    .get(index)
                    .and_then(|meta| meta.provider.clone());
                (*index, provider)
            })
            .collect();

        Self {
            key: selection_key(key_batch_index, row.index),
            batch_index: key_batch_index,
            batch_name: batch.name.clone(),
            problem_index: row.index,
            attempts,
            attempt_order: set.attempt_order.clone(),
            providers,
            image,
            bounding_box: row.bounding_box.clone(),
        }
    }
}

/// 選択キー → 行文脈（写真番号・問題番号順）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowLookup {
    rows: BTreeMap<(u32, u32), RowContext>,
}

impl RowLookup {
    pub fn insert(&mut self, context: RowContext) {
        self.rows
            .insert((context.batch_index, context.problem_index), context);
    }

    pub fn get(&self, key: &str) -> Option<&RowContext> {
        self.rows.get(&parse_selection_key(key)?)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowContext> {
        self.rows.values()
    }
}

/// 保存用エントリの下書き
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub key: String,
    pub batch_index: u32,
    pub batch_name: String,
    pub problem_index: u32,
    pub question: Option<String>,
    pub student_answer: Option<String>,
    pub solved_answer: Option<String>,
    pub analysis: Option<String>,
    pub verdict: Correctness,
    pub image: Option<ProblemImage>,
    pub bounding_box: Option<BoundingBox>,
    pub providers: Vec<String>,
}

impl EntryDraft {
    pub fn has_text(&self) -> bool {
        self.question.is_some()
            || self.student_answer.is_some()
            || self.solved_answer.is_some()
            || self.analysis.is_some()
    }
}

/// 複数Attemptの判定をまとめる
///
/// 1つでも不正解があれば不正解（1回の異議で人の確認に回す）。
/// それ以外で正解があれば正解、なければ不明。
pub fn combine_verdicts(verdicts: impl IntoIterator<Item = Correctness>) -> Correctness {
    let mut any_correct = false;
    for verdict in verdicts {
        match verdict {
            Correctness::Incorrect => return Correctness::Incorrect,
            Correctness::Correct => any_correct = true,
            Correctness::Unknown => {}
        }
    }
    if any_correct {
        Correctness::Correct
    } else {
        Correctness::Unknown
    }
}

/// 行からエントリ下書きを作る
///
/// テキストは見直し（主Attempt以外）の結果を優先し、なければ主Attemptを使う。
pub fn build_entry_draft(row: &RowContext) -> EntryDraft {
    let primary = row.attempt_order.first().copied();
    let primary_problem = row
        .attempts
        .iter()
        .find(|(index, _)| Some(*index) == primary)
        .map(|(_, p)| p);
    let reviews: Vec<&Problem> = row
        .attempts
        .iter()
        .filter(|(index, _)| Some(*index) != primary)
        .map(|(_, p)| p)
        .collect();

    let providers = row
        .providers
        .iter()
        .filter(|(index, _)| row.attempts.iter().any(|(i, _)| i == index))
        .filter_map(|(_, provider)| provider.clone())
        .collect();

    EntryDraft {
        key: row.key.clone(),
        batch_index: row.batch_index,
        batch_name: row.batch_name.clone(),
        problem_index: row.problem_index,
        question: pick_field(&reviews, primary_problem, |p| &p.question),
        student_answer: pick_field(&reviews, primary_problem, |p| &p.student_answer),
        solved_answer: pick_field(&reviews, primary_problem, |p| &p.solved_answer),
        analysis: pick_field(&reviews, primary_problem, |p| &p.analysis),
        verdict: combine_verdicts(row.attempts.iter().map(|(_, p)| p.is_correct)),
        image: row.image.clone(),
        bounding_box: row.bounding_box.clone(),
        providers,
    }
}

fn pick_field(
    reviews: &[&Problem],
    primary: Option<&Problem>,
    get: fn(&Problem) -> &Option<String>,
) -> Option<String> {
    reviews
        .iter()
        .find_map(|problem| get(*problem).clone())
        .or_else(|| primary.and_then(|problem| get(problem).clone()))
}

/// エントリ作成時の既定値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryDefaults {
    pub source: String,
    pub subject: String,
    pub semester: String,
    #[serde(alias = "question_type")]
    pub question_type: String,
}

impl Default for EntryDefaults {
    fn default() -> Self {
        Self {
            source: "photo-check".to_string(),
            subject: String::new(),
            semester: String::new(),
            question_type: String::new(),
        }
    }
}

/// エントリ作成側へ渡すペイロード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    pub source: String,
    pub subject: String,
    pub semester: String,
    pub question_type: String,
    pub question_text: String,
    pub answer_text: String,
    pub error_reason: String,
    pub remark: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_image: Option<String>,
}

impl EntryDraft {
    /// 保存用ペイロードに変換
    ///
    /// テキストも画像もない場合は `Error::EmptyEntry`。
    pub fn to_payload(&self, defaults: &EntryDefaults, created_at: &str) -> Result<EntryPayload> {
        if !self.has_text() && self.image.is_none() {
            return Err(Error::EmptyEntry {
                batch_index: self.batch_index,
                problem_index: self.problem_index,
            });
        }

        let mut remark = vec![format!(
            "{} · Question {}",
            self.batch_name, self.problem_index
        )];
        if let Some(answer) = &self.student_answer {
            remark.push(format!("Student answer: {}", answer));
        }
        remark.push(format!("AI verdict: {}", self.verdict.label()));
        if !self.providers.is_empty() {
            remark.push(format!("Checked by: {}", self.providers.join(", ")));
        }

        Ok(EntryPayload {
            source: defaults.source.clone(),
            subject: defaults.subject.clone(),
            semester: defaults.semester.clone(),
            question_type: defaults.question_type.clone(),
            question_text: self.question.clone().unwrap_or_default(),
            answer_text: self.solved_answer.clone().unwrap_or_default(),
            error_reason: self.analysis.clone().unwrap_or_default(),
            remark: remark.join("\n"),
            created_at: created_at.to_string(),
            question_image: self.image.as_ref().map(|image| image.url.clone()),
        })
    }
}
