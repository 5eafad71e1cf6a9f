//! 問題行の組み立て
//!
//! 1枚の写真について、複数Attemptの同じ問題番号の問題を1行にまとめる。
//! 問題同士は参照で結ばず、番号から毎回行キーを計算し直す純粋関数として実装する。

use crate::types::{Attempt, Batch, BoundingBox, Problem};
use std::collections::{BTreeMap, HashMap};

/// 列見出し用のAttempt情報
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttemptMeta {
    pub provider: Option<String>,
    pub label: Option<String>,
}

/// 行の組み立てオプション
#[derive(Debug, Clone, Default)]
pub struct RowOptions {
    /// 最新の呼び出し結果を初回より前に出すプロバイダ（小文字）
    pub prefer_latest_providers: Vec<String>,
}

impl RowOptions {
    pub fn prefer_latest(providers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefer_latest_providers: providers
                .into_iter()
                .map(|p| p.into().trim().to_lowercase())
                .collect(),
        }
    }

    fn prefers_latest(&self, provider: Option<&str>) -> bool {
        provider.is_some_and(|p| self.prefer_latest_providers.iter().any(|q| q == p))
    }
}

/// 問題行（ユーザーが選択する単位）
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemRow {
    /// 写真内の問題番号
    pub index: u32,
    /// 行の作成順
    pub order: usize,
    /// Attempt番号 → 問題（挿入順を保持）
    pub attempts: Vec<(u32, Problem)>,
    /// 最初に見つかったバウンディングボックス
    pub bounding_box: Option<BoundingBox>,
}

impl ProblemRow {
    pub fn get(&self, attempt: u32) -> Option<&Problem> {
        self.attempts
            .iter()
            .find(|(index, _)| *index == attempt)
            .map(|(_, problem)| problem)
    }

    /// 同じAttempt番号があれば位置を保ったまま置き換える
    fn set(&mut self, attempt: u32, problem: Problem) {
        match self.attempts.iter_mut().find(|(index, _)| *index == attempt) {
            Some(slot) => slot.1 = problem,
            None => self.attempts.push((attempt, problem)),
        }
    }
}

/// 写真1枚分の行組み立て結果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowSet {
    /// Attempt番号の正規順（初出順・重複なし）
    pub attempt_order: Vec<u32>,
    pub attempt_metadata: BTreeMap<u32, AttemptMeta>,
    pub rows: Vec<ProblemRow>,
}

impl RowSet {
    /// 主Attempt（正規順の先頭）
    pub fn primary_attempt(&self) -> Option<u32> {
        self.attempt_order.first().copied()
    }
}

/// Attemptを処理順に並べる
///
/// `prefer_latest_providers` に含まれるプロバイダは、そのプロバイダが占める位置の中で
/// 新しい呼び出しから順に並べ替える（再採点結果を初回結果より前に出す）。
pub fn ordered_attempts<'a>(batch: &'a Batch, options: &RowOptions) -> Vec<&'a Attempt> {
    let mut ordered: Vec<&Attempt> = batch.attempts.iter().collect();

    let mut handled: Vec<&str> = Vec::new();
    for attempt in &batch.attempts {
        let Some(provider) = attempt.provider.as_deref() else {
            continue;
        };
        if handled.contains(&provider) || !options.prefers_latest(Some(provider)) {
            continue;
        }
        handled.push(provider);

        let positions: Vec<usize> = ordered
            .iter()
            .enumerate()
            .filter(|(_, a)| a.provider.as_deref() == Some(provider))
            .map(|(i, _)| i)
            .collect();
        let mut reversed: Vec<&Attempt> = positions.iter().map(|&i| ordered[i]).collect();
        reversed.reverse();
        for (&position, attempt) in positions.iter().zip(reversed) {
            ordered[position] = attempt;
        }
    }

    ordered
}

/// 写真1枚分の問題行を組み立てる
///
/// 同じ入力に対して何度呼んでも同じ行順・同じAttemptマップを返す。
pub fn build_rows(batch: &Batch, options: &RowOptions) -> RowSet {
    let attempts = ordered_attempts(batch, options);

    let mut attempt_order: Vec<u32> = Vec::new();
    let mut attempt_metadata: BTreeMap<u32, AttemptMeta> = BTreeMap::new();
    for attempt in &attempts {
        if !attempt_order.contains(&attempt.index) {
            attempt_order.push(attempt.index);
        }
        attempt_metadata
            .entry(attempt.index)
            .or_insert_with(|| AttemptMeta {
                provider: attempt.provider.clone(),
                label: attempt.label.clone(),
            });
    }

    let mut rows: Vec<ProblemRow> = Vec::new();
    let mut positions: HashMap<u32, usize> = HashMap::new();
    for attempt in &attempts {
        for problem in &attempt.problems {
            let position = *positions.entry(problem.index).or_insert_with(|| {
                rows.push(ProblemRow {
                    index: problem.index,
                    order: rows.len(),
                    attempts: Vec::new(),
                    bounding_box: None,
                });
                rows.len() - 1
            });
            let row = &mut rows[position];
            if row.bounding_box.is_none() {
                row.bounding_box = problem.bounding_box.clone();
            }
            row.set(attempt.index, problem.clone());
        }
    }

    rows.sort_by_key(|row| (row.index, row.order));

    RowSet {
        attempt_order,
        attempt_metadata,
        rows,
    }
}
