//! 集計と要約文
//!
//! 件数の合算と、人が読む要約文を作る。

use crate::types::{Attempt, Batch, Summary};
use std::ops::Add;

impl Add for Summary {
    type Output = Summary;

    fn add(self, other: Summary) -> Summary {
        Summary {
            total: self.total.saturating_add(other.total),
            correct: self.correct.saturating_add(other.correct),
            incorrect: self.incorrect.saturating_add(other.incorrect),
            unknown: self.unknown.saturating_add(other.unknown),
        }
    }
}

impl std::iter::Sum for Summary {
    fn sum<I: Iterator<Item = Summary>>(iter: I) -> Summary {
        iter.fold(Summary::default(), Add::add)
    }
}

/// 集計を合算
pub fn sum_summaries(summaries: impl Iterator<Item = Summary>) -> Summary {
    summaries.sum()
}

/// "12 total, 9 correct, 2 need review, 1 unresolved"
///
/// `unknown` が0なら最後の項目は省略する。
pub fn format_summary(summary: &Summary) -> String {
    let mut text = format!(
        "{} total, {} correct, {} need review",
        summary.total, summary.correct, summary.incorrect
    );
    if summary.unknown > 0 {
        text.push_str(&format!(", {} unresolved", summary.unknown));
    }
    text
}

/// Attemptの表示名（ラベル → プロバイダ → 番号）
pub fn attempt_display_name(attempt: &Attempt) -> String {
    attempt
        .label
        .clone()
        .or_else(|| attempt.provider.clone())
        .unwrap_or_else(|| format!("Attempt {}", attempt.index))
}

/// 写真内の各Attemptの要約文
///
/// Attemptが複数ある場合は表示名を前置して、プロバイダ間の食い違いが見えるようにする。
pub fn attempt_summary_lines(batch: &Batch) -> Vec<String> {
    let multiple = batch.attempts.len() > 1;
    batch
        .attempts
        .iter()
        .map(|attempt| {
            let text = format_summary(&attempt.summary);
            if multiple {
                format!("{}: {}", attempt_display_name(attempt), text)
            } else {
                text
            }
        })
        .collect()
}

/// 何回・どのプロバイダでAI採点したかを述べる文
///
/// Attemptが1つもなくても汎用メッセージを返す。
pub fn workflow_sentence(batches: &[Batch]) -> String {
    let attempts: Vec<&Attempt> = batches.iter().flat_map(|b| b.attempts.iter()).collect();
    if attempts.is_empty() {
        return "No AI checks were recorded for this submission.".to_string();
    }

    let mut names: Vec<String> = Vec::new();
    for attempt in &attempts {
        let name = attempt.label.as_ref().or(attempt.provider.as_ref());
        if let Some(name) = name {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }

    let checks = plural(attempts.len(), "AI check", "AI checks");
    let photos = plural(batches.len(), "photo", "photos");
    if names.is_empty() {
        format!("Ran {} across {}.", checks, photos)
    } else {
        format!("Ran {} across {} using {}.", checks, photos, names.join(", "))
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{} {}", count, if count == 1 { one } else { many })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(index: u32, provider: Option<&str>, label: Option<&str>, summary: Summary) -> Attempt {
        Attempt {
            index,
            provider: provider.map(str::to_string),
            label: label.map(str::to_string),
            summary,
            problems: Vec::new(),
        }
    }

    fn batch(attempts: Vec<Attempt>) -> Batch {
        Batch {
            index: 1,
            order: 0,
            name: "Photo 1".to_string(),
            summary: attempts.iter().map(|a| a.summary).sum(),
            attempts,
            image: None,
        }
    }

    #[test]
    fn test_format_summary() {
        let s = Summary { total: 5, correct: 3, incorrect: 2, unknown: 0 };
        assert_eq!(format_summary(&s), "5 total, 3 correct, 2 need review");

        let s = Summary { total: 6, correct: 3, incorrect: 2, unknown: 1 };
        assert_eq!(format_summary(&s), "6 total, 3 correct, 2 need review, 1 unresolved");
    }

    #[test]
    fn test_summary_sum() {
        let a = Summary { total: 2, correct: 1, incorrect: 1, unknown: 0 };
        let b = Summary { total: 3, correct: 0, incorrect: 1, unknown: 2 };
        assert_eq!(
            sum_summaries([a, b].into_iter()),
            Summary { total: 5, correct: 1, incorrect: 2, unknown: 2 }
        );
    }

    #[test]
    fn test_attempt_lines_prefixed_when_multiple() {
        let s = Summary { total: 1, correct: 1, incorrect: 0, unknown: 0 };
        let single = batch(vec![attempt(1, Some("qwen"), None, s)]);
        assert_eq!(attempt_summary_lines(&single), vec!["1 total, 1 correct, 0 need review"]);

        let multi = batch(vec![
            attempt(1, Some("qwen"), None, s),
            attempt(2, None, Some("Review pass"), s),
            attempt(3, None, None, s),
        ]);
        let lines = attempt_summary_lines(&multi);
        assert!(lines[0].starts_with("qwen: "));
        assert!(lines[1].starts_with("Review pass: "));
        assert!(lines[2].starts_with("Attempt 3: "));
    }

    #[test]
    fn test_workflow_sentence() {
        assert_eq!(
            workflow_sentence(&[]),
            "No AI checks were recorded for this submission."
        );

        let s = Summary::default();
        let batches = vec![
            batch(vec![attempt(1, Some("qwen"), None, s), attempt(2, Some("kimi"), None, s)]),
            batch(vec![attempt(1, Some("qwen"), None, s)]),
        ];
        assert_eq!(
            workflow_sentence(&batches),
            "Ran 3 AI checks across 2 photos using qwen, kimi."
        );

        let batches = vec![batch(vec![attempt(1, None, None, s)])];
        assert_eq!(workflow_sentence(&batches), "Ran 1 AI check across 1 photo.");
    }
}
