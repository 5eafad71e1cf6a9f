//! 選択行のエントリ保存
//!
//! 選択された問題行をエントリ作成側へ渡す。一括保存は最初の失敗で止める。

use crate::error::{CheckError, Result};
use photo_check_common::{EntryDefaults, EntryDraft, EntryPayload};
use std::io::Write;
use tracing::{info, warn};

/// エントリ作成側
pub trait EntrySink {
    /// エントリを1件作成し、作成されたエントリのIDを返す
    fn create(&mut self, payload: &EntryPayload) -> Result<String>;
}

/// ペイロードを1行1件のJSONとして書き出す
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EntrySink for JsonLinesSink<W> {
    fn create(&mut self, payload: &EntryPayload) -> Result<String> {
        serde_json::to_writer(&mut self.writer, payload)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(format!("entry-{}", self.written))
    }
}

/// 選択行を順に保存する
///
/// 途中の行が失敗したらそこで止め、`CheckError::EntrySave` で失敗した問題番号を返す。
/// それ以前に保存した行は取り消さない。
pub fn save_selected(
    drafts: &[EntryDraft],
    defaults: &EntryDefaults,
    created_at: &str,
    sink: &mut dyn EntrySink,
) -> Result<Vec<String>> {
    let mut saved = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let fail = |reason: String| {
            warn!(key = %draft.key, "エントリ保存を中断: {}", reason);
            CheckError::EntrySave {
                problem_index: draft.problem_index,
                reason: format!("{} ({}): {}", draft.batch_name, draft.key, reason),
            }
        };

        let payload = draft
            .to_payload(defaults, created_at)
            .map_err(|e| fail(e.to_string()))?;
        let id = sink.create(&payload).map_err(|e| fail(e.to_string()))?;
        info!(key = %draft.key, id = %id, "エントリを保存");
        saved.push(id);
    }
    Ok(saved)
}
