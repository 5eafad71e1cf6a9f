use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photo-check")]
#[command(about = "写真採点結果の集計・レポート・履歴管理ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 採点結果JSONからレポートを表示
    Report {
        /// 採点結果ファイル（JSON、またはJSONを含むテキスト）
        #[arg(required = true)]
        input: PathBuf,

        /// 選択する行（写真番号:問題番号、複数指定可）
        #[arg(short, long = "select", value_name = "B:P")]
        select: Vec<String>,

        /// 選択行のエントリ下書きをJSONで出力
        #[arg(long)]
        drafts: bool,

        /// レポートをJSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 選択行をエントリとして一括保存（最初の失敗で中断）
    Save {
        /// 採点結果ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 保存する行（写真番号:問題番号）
        #[arg(short, long = "select", value_name = "B:P", required = true)]
        select: Vec<String>,

        /// 出力先（JSON Lines、省略時は標準出力）
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// 採点結果を保存先に登録してレポートを表示
    Check {
        /// 採点結果ファイル
        #[arg(required = true)]
        input: PathBuf,
    },

    /// 採点履歴
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// 設定を表示/編集
    Config {
        /// 保存先サーバーURLを設定
        #[arg(long)]
        set_server: Option<String>,

        /// 再採点結果を先に表示するプロバイダを追加
        #[arg(long)]
        prefer_latest: Vec<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// 履歴一覧を表示
    List {
        /// 保存先に接続せず、前回取得した一覧を表示
        #[arg(long)]
        offline: bool,
    },

    /// 別名を変更
    Rename {
        /// 記録ID
        id: String,
        /// 新しい別名
        alias: String,
    },

    /// 履歴を削除
    Delete {
        /// 記録ID
        id: String,

        /// 確認なしで削除
        #[arg(short, long)]
        yes: bool,
    },
}
