//! レポートセッション
//!
//! 表示中のレポート・行ルックアップ・選択集合を1か所で所有する。
//! 選択を書き換えるのは `toggle` / `set_selected` と、全体を作り直す `load` だけ。

use crate::error::{Error, Result};
use crate::report::{build_report, ReportView};
use crate::rows::RowOptions;
use crate::selection::{build_entry_draft, EntryDraft, RowLookup, Selection};
use crate::types::NormalizedCheck;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ReportSession {
    options: RowOptions,
    check: Option<NormalizedCheck>,
    view: ReportView,
    lookup: RowLookup,
    selection: Selection,
}

impl ReportSession {
    pub fn new(options: RowOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// 新しい採点結果を表示する
    ///
    /// 以前の選択は無効になるので消去し、ルックアップも作り直す。
    pub fn load(&mut self, check: NormalizedCheck) {
        let (view, lookup) = build_report(&check, &self.options);
        debug!(rows = lookup.len(), "report loaded");
        self.selection.clear();
        self.view = view;
        self.lookup = lookup;
        self.check = Some(check);
    }

    /// 表示中のレポートを破棄
    pub fn clear(&mut self) {
        self.selection.clear();
        self.view = ReportView::default();
        self.lookup = RowLookup::default();
        self.check = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.check.is_some()
    }

    pub fn check(&self) -> Option<&NormalizedCheck> {
        self.check.as_ref()
    }

    pub fn record_id(&self) -> Option<&str> {
        self.check.as_ref().and_then(|c| c.record_id.as_deref())
    }

    /// 行の選択を反転する
    ///
    /// 表示中のレポートにないキーは `Error::UnknownSelection`。
    pub fn toggle(&mut self, key: &str) -> Result<bool> {
        self.ensure_known(key)?;
        Ok(self.selection.toggle(key))
    }

    pub fn set_selected(&mut self, key: &str, selected: bool) -> Result<()> {
        self.ensure_known(key)?;
        self.selection.set(key, selected);
        Ok(())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn lookup(&self) -> &RowLookup {
        &self.lookup
    }

    /// 選択状態を反映したレポート
    pub fn view(&self) -> ReportView {
        let mut view = self.view.clone();
        view.sync_selection(&self.selection);
        view
    }

    /// 選択行のエントリ下書き（写真番号・問題番号順）
    pub fn selected_drafts(&self) -> Vec<EntryDraft> {
        self.lookup
            .iter()
            .filter(|row| self.selection.contains(&row.key))
            .map(build_entry_draft)
            .collect()
    }

    fn ensure_known(&self, key: &str) -> Result<()> {
        if self.lookup.contains(key) {
            Ok(())
        } else {
            Err(Error::UnknownSelection(key.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_check;
    use crate::types::Correctness;
    use serde_json::json;

    fn sample(record_id: &str) -> NormalizedCheck {
        normalize_check(&json!({
            "recordId": record_id,
            "results": [
                {"index": 1, "attempts": [
                    {"provider": "qwen", "problems": [{"index": 1, "question": "a", "isCorrect": true}]},
                    {"provider": "kimi", "problems": [{"index": 1, "question": "a", "isCorrect": false}]}
                ]},
                {"index": 2, "problems": [{"index": 1, "question": "b"}, {"index": 2, "question": "c"}]}
            ]
        }))
    }

    #[test]
    fn test_toggle_and_view() {
        let mut session = ReportSession::default();
        session.load(sample("r1"));
        assert!(session.toggle("2:2").unwrap());
        assert!(session.view().batches[1].rows[1].selected);
        assert!(!session.toggle("2:2").unwrap());
        assert!(!session.view().batches[1].rows[1].selected);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut session = ReportSession::default();
        session.load(sample("r1"));
        assert!(matches!(session.toggle("9:9"), Err(Error::UnknownSelection(_))));
        assert!(session.set_selected("", true).is_err());
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_load_clears_selection() {
        let mut session = ReportSession::default();
        session.load(sample("r1"));
        session.set_selected("1:1", true).unwrap();
        assert_eq!(session.selection().len(), 1);

        session.load(sample("r2"));
        assert!(session.selection().is_empty());
        assert_eq!(session.record_id(), Some("r2"));
    }

    #[test]
    fn test_selected_drafts_in_key_order() {
        let mut session = ReportSession::default();
        session.load(sample("r1"));
        session.set_selected("2:1", true).unwrap();
        session.set_selected("1:1", true).unwrap();

        let drafts = session.selected_drafts();
        let keys: Vec<&str> = drafts.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["1:1", "2:1"]);
        assert_eq!(drafts[0].verdict, Correctness::Incorrect);
    }

    #[test]
    fn test_clear() {
        let mut session = ReportSession::default();
        session.load(sample("r1"));
        session.set_selected("1:1", true).unwrap();
        session.clear();
        assert!(!session.is_loaded());
        assert!(session.selection().is_empty());
        assert!(session.view().batches.is_empty());
        assert_eq!(session.record_id(), None);
    }
}
