//! Photo Check Common Library
//!
//! 写真採点結果の正規化・行の組み立て・選択・レポート生成を行う純粋なエンジン。
//! I/Oは持たず、CLI側の履歴管理や保存処理から共有される。

pub mod error;
pub mod normalize;
pub mod parser;
pub mod report;
pub mod rows;
pub mod selection;
pub mod session;
pub mod summary;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use normalize::{normalize_attempt, normalize_batch, normalize_batches, normalize_check, normalize_problem};
pub use parser::{extract_payload, parse_check, parse_payload};
pub use report::{build_report, render_text, ReportView};
pub use rows::{build_rows, RowOptions, RowSet};
pub use selection::{
    build_entry_draft, parse_selection_key, selection_key, EntryDefaults, EntryDraft, EntryPayload,
    RowContext, RowLookup, Selection,
};
pub use session::ReportSession;
pub use summary::{format_summary, workflow_sentence};
pub use types::{
    Attempt, Batch, BoundingBox, BoxUnit, Correctness, HistoryItem, NormalizedCheck, Problem,
    Summary,
};
pub use value::{normalize_bounding_box, normalize_correctness, normalize_count};
