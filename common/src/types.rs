//! 採点結果の型定義
//!
//! AIの生JSONを正規化した後の型:
//! - Batch: アップロード写真1枚分の結果
//! - Attempt: 写真1枚に対するAI呼び出し1回分の結果
//! - Problem: Attempt内の1問
//! - HistoryItem: サーバーに保存された採点記録の要約

use serde::{Deserialize, Serialize};

/// バウンディングボックスの座標単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxUnit {
    /// 画像サイズに対する比率（0〜1）
    Ratio,
    /// ピクセル
    Pixel,
}

/// 問題領域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub unit: BoxUnit,
    pub confidence: Option<f64>,
}

/// 正誤判定（正解・不正解・不明の3状態）
///
/// JSON上は `true` / `false` / `null` として表現する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Correctness {
    Correct,
    Incorrect,
    #[default]
    Unknown,
}

impl Correctness {
    pub fn as_option(self) -> Option<bool> {
        match self {
            Correctness::Correct => Some(true),
            Correctness::Incorrect => Some(false),
            Correctness::Unknown => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Correctness::Correct => "correct",
            Correctness::Incorrect => "needs review",
            Correctness::Unknown => "unresolved",
        }
    }
}

impl From<Option<bool>> for Correctness {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Correctness::Correct,
            Some(false) => Correctness::Incorrect,
            None => Correctness::Unknown,
        }
    }
}

impl From<Correctness> for Option<bool> {
    fn from(value: Correctness) -> Self {
        value.as_option()
    }
}

/// 問題ごとの切り出し画像
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bounding_box: Option<BoundingBox>,
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

/// AIが判定した1問
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// 写真内の問題番号（1始まり）
    pub index: u32,
    pub question: Option<String>,
    pub student_answer: Option<String>,
    pub solved_answer: Option<String>,
    pub analysis: Option<String>,
    pub is_correct: Correctness,
    pub bounding_box: Option<BoundingBox>,
    pub image: Option<ProblemImage>,
}

impl Problem {
    /// テキストまたは画像を1つでも持つか
    pub fn has_content(&self) -> bool {
        self.question.is_some()
            || self.student_answer.is_some()
            || self.solved_answer.is_some()
            || self.analysis.is_some()
            || self.image.is_some()
    }
}

/// 件数集計
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub total: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub unknown: u32,
}

/// AI呼び出し1回分の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub index: u32,
    pub provider: Option<String>,
    pub label: Option<String>,
    pub summary: Summary,
    pub problems: Vec<Problem>,
}

/// 写真全体の画像情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// アップロード写真1枚分の結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// 業務上の写真番号（AIが付与する場合は欠番・重複あり）
    pub index: u32,
    /// 到着順（indexが重複した場合の並べ替えにのみ使用）
    pub order: usize,
    pub name: String,
    pub attempts: Vec<Attempt>,
    pub summary: Summary,
    pub image: Option<BatchImage>,
}

/// 1回の採点リクエスト全体の正規化結果
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCheck {
    pub record_id: Option<String>,
    pub created_at: Option<String>,
    pub alias: Option<String>,
    pub batches: Vec<Batch>,
    pub overall: Summary,
}

impl NormalizedCheck {
    /// 全写真の問題行数（写真ごとの問題番号のユニーク数の合計）
    pub fn problem_count(&self) -> u32 {
        self.batches
            .iter()
            .map(|batch| {
                let mut indices: Vec<u32> = batch
                    .attempts
                    .iter()
                    .flat_map(|a| a.problems.iter().map(|p| p.index))
                    .collect();
                indices.sort_unstable();
                indices.dedup();
                indices.len() as u32
            })
            .sum()
    }
}

/// 保存済み採点記録の要約
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryItem {
    #[serde(alias = "recordId", alias = "record_id")]
    pub id: String,
    pub alias: String,
    #[serde(alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(alias = "total_images", alias = "images")]
    pub total_images: u32,
    pub problems: u32,
    pub overall: Summary,
}

impl HistoryItem {
    /// 完了した採点結果から履歴項目を作る
    pub fn from_check(id: impl Into<String>, check: &NormalizedCheck) -> Self {
        Self {
            id: id.into(),
            alias: check.alias.clone().unwrap_or_default(),
            created_at: check.created_at.clone(),
            total_images: check.batches.len() as u32,
            problems: check.problem_count(),
            overall: check.overall,
        }
    }
}
