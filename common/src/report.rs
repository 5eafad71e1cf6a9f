//! レポート描画ツリー
//!
//! 正規化済みの採点結果から、写真ごと・問題行ごとの表示用ツリーを組み立てる。
//! ツリーは毎回作り直す使い捨ての値で、選択状態は `Selection` から再適用する。

use crate::rows::{build_rows, AttemptMeta, RowOptions};
use crate::selection::{combine_verdicts, RowContext, RowLookup, Selection};
use crate::summary::{attempt_summary_lines, format_summary, workflow_sentence};
use crate::types::{BatchImage, BoundingBox, Correctness, NormalizedCheck, Problem, ProblemImage};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// Attempt列の見出し
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    pub attempt: u32,
    pub title: String,
    pub provider: Option<String>,
}

/// 1セル（ある問題行 × あるAttempt）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    pub attempt: u32,
    pub question: Option<String>,
    pub student_answer: Option<String>,
    pub solved_answer: Option<String>,
    pub analysis: Option<String>,
    pub verdict: Correctness,
}

impl CellView {
    fn from_problem(attempt: u32, problem: &Problem) -> Self {
        Self {
            attempt,
            question: problem.question.clone(),
            student_answer: problem.student_answer.clone(),
            solved_answer: problem.solved_answer.clone(),
            analysis: problem.analysis.clone(),
            verdict: problem.is_correct,
        }
    }
}

/// 問題行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub key: String,
    pub problem_index: u32,
    pub selected: bool,
    pub bounding_box: Option<BoundingBox>,
    pub image: Option<ProblemImage>,
    /// 全Attemptをまとめた判定
    pub verdict: Correctness,
    /// `columns` と同じ順。そのAttemptに問題がなければ `None`
    pub cells: Vec<Option<CellView>>,
}

/// 写真1枚分
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    /// 選択キーに使う写真番号（重複は解消済み）
    pub index: u32,
    pub name: String,
    pub image: Option<BatchImage>,
    pub summary_text: String,
    pub attempt_summaries: Vec<String>,
    pub columns: Vec<ColumnView>,
    pub rows: Vec<RowView>,
}

/// レポート全体
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub record_id: Option<String>,
    pub workflow: String,
    pub overall_text: String,
    pub batches: Vec<BatchView>,
}

impl ReportView {
    /// 選択集合から各行の `selected` を付け直す
    pub fn sync_selection(&mut self, selection: &Selection) {
        for row in self.batches.iter_mut().flat_map(|b| b.rows.iter_mut()) {
            row.selected = selection.contains(&row.key);
        }
    }

    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.rows.len()).sum()
    }
}

fn column_title(attempt: u32, meta: Option<&AttemptMeta>) -> String {
    meta.and_then(|m| m.label.clone().or_else(|| m.provider.clone()))
        .unwrap_or_else(|| format!("Attempt {}", attempt))
}

/// 採点結果からレポートと行ルックアップを組み立てる
///
/// 写真番号が重複する場合、後の写真にはどの写真も宣言していない番号
/// （宣言済みの最大番号より後）を振り直して選択キーの衝突を防ぐ。
pub fn build_report(check: &NormalizedCheck, options: &RowOptions) -> (ReportView, RowLookup) {
    let mut lookup = RowLookup::default();
    let declared: BTreeSet<u32> = check.batches.iter().map(|b| b.index).collect();
    let mut next_free = declared.iter().next_back().copied().unwrap_or(0) + 1;
    let mut used: BTreeSet<u32> = BTreeSet::new();
    let mut batches = Vec::with_capacity(check.batches.len());

    for batch in &check.batches {
        let key_index = if used.insert(batch.index) {
            batch.index
        } else {
            let next = next_free;
            next_free += 1;
            debug!(
                "写真番号 {} が重複しているため {} として扱います: {}",
                batch.index, next, batch.name
            );
            next
        };

        let set = build_rows(batch, options);
        let columns: Vec<ColumnView> = set
            .attempt_order
            .iter()
            .map(|attempt| {
                let meta = set.attempt_metadata.get(attempt);
                ColumnView {
                    attempt: *attempt,
                    title: column_title(*attempt, meta),
                    provider: meta.and_then(|m| m.provider.clone()),
                }
            })
            .collect();

        let mut rows = Vec::with_capacity(set.rows.len());
        for row in &set.rows {
            let context = RowContext::new(key_index, batch, &set, row);
            let cells = set
                .attempt_order
                .iter()
                .map(|attempt| row.get(*attempt).map(|p| CellView::from_problem(*attempt, p)))
                .collect();
            rows.push(RowView {
                key: context.key.clone(),
                problem_index: row.index,
                selected: false,
                bounding_box: context.bounding_box.clone(),
                image: context.image.clone(),
                verdict: combine_verdicts(context.attempts.iter().map(|(_, p)| p.is_correct)),
                cells,
            });
            lookup.insert(context);
        }

        batches.push(BatchView {
            index: key_index,
            name: batch.name.clone(),
            image: batch.image.clone(),
            summary_text: format_summary(&batch.summary),
            attempt_summaries: attempt_summary_lines(batch),
            columns,
            rows,
        });
    }

    let view = ReportView {
        record_id: check.record_id.clone(),
        workflow: workflow_sentence(&check.batches),
        overall_text: format_summary(&check.overall),
        batches,
    };
    (view, lookup)
}

fn verdict_mark(verdict: Correctness) -> &'static str {
    match verdict {
        Correctness::Correct => "o",
        Correctness::Incorrect => "x",
        Correctness::Unknown => "?",
    }
}

/// テキスト形式で出力（CLI用）
pub fn render_text(view: &ReportView) -> String {
    let mut out = String::new();
    if let Some(id) = &view.record_id {
        out.push_str(&format!("Record: {}\n", id));
    }
    out.push_str(&view.workflow);
    out.push('\n');
    out.push_str(&format!("Overall: {}\n", view.overall_text));

    for batch in &view.batches {
        out.push_str(&format!("\n== Photo {}: {} ==\n", batch.index, batch.name));
        out.push_str(&format!("  {}\n", batch.summary_text));
        if batch.attempt_summaries.len() > 1 {
            for line in &batch.attempt_summaries {
                out.push_str(&format!("    {}\n", line));
            }
        }
        if batch.rows.is_empty() {
            out.push_str("  (no problems)\n");
            continue;
        }

        for row in &batch.rows {
            let check = if row.selected { "[*]" } else { "[ ]" };
            out.push_str(&format!(
                "  {} {:<6} Question {} ({})\n",
                check,
                row.key,
                row.problem_index,
                row.verdict.label()
            ));
            let question = row
                .cells
                .iter()
                .flatten()
                .find_map(|cell| cell.question.as_deref());
            if let Some(question) = question {
                for line in question.lines() {
                    out.push_str(&format!("        {}\n", line));
                }
            }
            let marks: Vec<String> = batch
                .columns
                .iter()
                .zip(&row.cells)
                .map(|(column, cell)| match cell {
                    Some(cell) => format!("{} {}", column.title, verdict_mark(cell.verdict)),
                    None => format!("{} -", column.title),
                })
                .collect();
            out.push_str(&format!("        {}\n", marks.join(" | ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_check;
    use serde_json::json;

    fn two_photo_check() -> NormalizedCheck {
        normalize_check(&json!({
            "recordId": "rec-1",
            "results": [
                {
                    "index": 1,
                    "name": "page1.jpg",
                    "attempts": [
                        {"provider": "qwen", "problems": [
                            {"index": 1, "question": "1+1", "isCorrect": true},
                            {"index": 2, "question": "2+2", "isCorrect": true}
                        ]},
                        {"provider": "kimi", "problems": [
                            {"index": 1, "question": "1+1", "isCorrect": false}
                        ]}
                    ]
                },
                {
                    "index": 2,
                    "name": "page2.jpg",
                    "problems": [{"index": 1, "question": "3+3", "isCorrect": null}]
                }
            ]
        }))
    }

    // =============================================
    // build_report テスト
    // =============================================

    #[test]
    fn test_build_report_structure() {
        let check = two_photo_check();
        let (view, lookup) = build_report(&check, &RowOptions::default());

        assert_eq!(view.record_id.as_deref(), Some("rec-1"));
        assert_eq!(view.batches.len(), 2);
        assert_eq!(view.row_count(), 3);
        assert_eq!(lookup.len(), 3);

        let first = &view.batches[0];
        let titles: Vec<&str> = first.columns.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["qwen", "kimi"]);
        assert_eq!(first.rows[0].key, "1:1");
        assert_eq!(first.rows[0].verdict, Correctness::Incorrect);
        assert_eq!(first.rows[1].key, "1:2");
        assert!(first.rows[1].cells[1].is_none());

        assert_eq!(view.batches[1].rows[0].key, "2:1");
        assert!(lookup.contains("2:1"));
    }

    #[test]
    fn test_build_report_resolves_duplicate_batch_indices() {
        let check = normalize_check(&json!({
            "results": [
                {"index": 1, "name": "a", "problems": [{"index": 1, "question": "a"}]},
                {"index": 1, "name": "b", "problems": [{"index": 1, "question": "b"}]}
            ]
        }));
        let (view, lookup) = build_report(&check, &RowOptions::default());
        assert_eq!(view.batches[0].index, 1);
        assert_eq!(view.batches[1].index, 2);
        assert_eq!(lookup.get("2:1").map(|r| r.batch_name.as_str()), Some("b"));
    }

    #[test]
    fn test_duplicate_index_does_not_take_declared_index() {
        let check = normalize_check(&json!({
            "results": [
                {"index": 1, "name": "a", "problems": [{"index": 1, "question": "a"}]},
                {"index": 1, "name": "b", "problems": [{"index": 1, "question": "b"}]},
                {"index": 2, "name": "c", "problems": [{"index": 1, "question": "c"}]}
            ]
        }));
        let (view, lookup) = build_report(&check, &RowOptions::default());
        let mut keyed: Vec<(u32, &str)> = view
            .batches
            .iter()
            .map(|b| (b.index, b.name.as_str()))
            .collect();
        keyed.sort();
        assert_eq!(keyed, vec![(1, "a"), (2, "c"), (3, "b")]);
        assert_eq!(lookup.get("2:1").map(|r| r.batch_name.as_str()), Some("c"));
        assert_eq!(lookup.get("3:1").map(|r| r.batch_name.as_str()), Some("b"));
    }

    #[test]
    fn test_sync_selection() {
        let (mut view, _) = build_report(&two_photo_check(), &RowOptions::default());
        let mut selection = Selection::default();
        selection.toggle("1:2");
        view.sync_selection(&selection);

        let selected: Vec<&str> = view
            .batches
            .iter()
            .flat_map(|b| b.rows.iter())
            .filter(|r| r.selected)
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(selected, vec!["1:2"]);
    }

    #[test]
    fn test_empty_report_does_not_fail() {
        let (view, lookup) = build_report(&NormalizedCheck::default(), &RowOptions::default());
        assert!(lookup.is_empty());
        assert_eq!(view.workflow, "No AI checks were recorded for this submission.");
        let text = render_text(&view);
        assert!(text.contains("Overall: 0 total, 0 correct, 0 need review"));
    }

    // =============================================
    // render_text テスト
    // =============================================

    #[test]
    fn test_render_text() {
        let (mut view, _) = build_report(&two_photo_check(), &RowOptions::default());
        let mut selection = Selection::default();
        selection.toggle("1:1");
        view.sync_selection(&selection);

        let text = render_text(&view);
        assert!(text.starts_with("Record: rec-1\n"));
        assert!(text.contains("== Photo 1: page1.jpg =="));
        assert!(text.contains("qwen: "));
        assert!(text.contains("[*] 1:1"));
        assert!(text.contains("[ ] 1:2"));
        assert!(text.contains("qwen o | kimi x"));
        assert!(text.contains("qwen o | kimi -"));
        assert!(text.contains("Question 1 (unresolved)"));
    }
}
