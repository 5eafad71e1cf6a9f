use anyhow::{bail, Context};
use clap::Parser;
use photo_check::{cli, config, entries, history, logging, workspace};
use photo_check_common::{format_summary, parse_check, parse_payload, render_text, HistoryItem, ReportSession};
use cli::{Cli, Commands, HistoryAction};
use config::Config;
use history::{HistoryCache, HistorySnapshot, HttpHistoryStore, Outcome, SNAPSHOT_FILE_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use workspace::Workspace;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Report { input, select, drafts, json } => {
            let mut session = ReportSession::new(config.row_options());
            session.load(parse_check(&read_input(&input)?)?);
            apply_selection(&mut session, &select)?;

            let view = session.view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", render_text(&view));
            }

            if drafts {
                let drafts = session.selected_drafts();
                println!("{}", serde_json::to_string_pretty(&drafts)?);
            }
        }

        Commands::Save { input, select, out } => {
            let mut session = ReportSession::new(config.row_options());
            session.load(parse_check(&read_input(&input)?)?);
            apply_selection(&mut session, &select)?;

            let drafts = session.selected_drafts();
            let created_at = chrono::Utc::now().to_rfc3339();
            let saved = match &out {
                Some(path) => {
                    let file = std::fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .with_context(|| format!("出力ファイルを開けません: {}", path.display()))?;
                    let mut sink = entries::JsonLinesSink::new(std::io::BufWriter::new(file));
                    entries::save_selected(&drafts, &config.entry_defaults, &created_at, &mut sink)?
                }
                None => {
                    let mut sink = entries::JsonLinesSink::new(std::io::stdout().lock());
                    entries::save_selected(&drafts, &config.entry_defaults, &created_at, &mut sink)?
                }
            };
            eprintln!("✔ {}件のエントリを保存しました", saved.len());
        }

        Commands::Check { input } => {
            let payload = parse_payload(&read_input(&input)?)?;
            let mut workspace = open_workspace(&config)?;

            let item = workspace.complete_check(&payload).await?;
            print!("{}", render_text(&workspace.session().view()));
            eprintln!("\n✔ 保存しました: {}", item.id);
        }

        Commands::History { action } => match action {
            HistoryAction::List { offline } => {
                let items = if offline {
                    HistorySnapshot::load(&snapshot_path()?).items
                } else {
                    let workspace = open_workspace(&config)?;
                    match workspace.refresh_history().await? {
                        Outcome::Done(items) => items,
                        Outcome::Busy => bail!("履歴を取得中です"),
                    }
                };
                print_history(&items);
            }

            HistoryAction::Rename { id, alias } => {
                let workspace = open_workspace(&config)?;
                match workspace.rename_history(&id, &alias).await? {
                    Outcome::Done(item) => println!("✔ 別名を変更しました: {} → {}", item.id, item.alias),
                    Outcome::Busy => bail!("{} は他の操作中です。完了後に再実行してください", id),
                }
            }

            HistoryAction::Delete { id, yes } => {
                if !yes {
                    let confirmed = dialoguer::Confirm::new()
                        .with_prompt(format!("{} を削除しますか？", id))
                        .default(false)
                        .interact()?;
                    if !confirmed {
                        println!("キャンセルしました");
                        return Ok(());
                    }
                }

                let mut workspace = open_workspace(&config)?;
                match workspace.delete_history(&id).await? {
                    Outcome::Done(()) => println!("✔ 削除しました: {}", id),
                    Outcome::Busy => bail!("{} は他の操作中です。完了後に再実行してください", id),
                }
            }
        },

        Commands::Config { set_server, prefer_latest, show } => {
            let mut config = config;
            let changed = set_server.is_some() || !prefer_latest.is_empty();

            if let Some(url) = set_server {
                config.set_server_url(url)?;
                println!("✔ 保存先サーバーを設定しました");
            }
            for provider in &prefer_latest {
                config.add_prefer_latest(provider);
            }
            if changed {
                config.save()?;
            }

            if show || !changed {
                println!("設定: {}", Config::config_path()?.display());
                println!(
                    "  保存先サーバー: {}",
                    config.get_server_url().unwrap_or_else(|_| "未設定".to_string())
                );
                println!(
                    "  再採点優先プロバイダ: {}",
                    if config.prefer_latest_providers.is_empty() {
                        "なし".to_string()
                    } else {
                        config.prefer_latest_providers.join(", ")
                    }
                );
                println!("  エントリ既定値: {}", serde_json::to_string(&config.entry_defaults)?);
            }
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        return Err(photo_check::error::CheckError::FileNotFound(path.display().to_string()).into());
    }
    std::fs::read_to_string(path).with_context(|| format!("読み込みに失敗: {}", path.display()))
}

fn apply_selection(session: &mut ReportSession, keys: &[String]) -> anyhow::Result<()> {
    for key in keys {
        session
            .set_selected(key.trim(), true)
            .with_context(|| format!("選択できない行です: {}", key))?;
    }
    Ok(())
}

fn snapshot_path() -> anyhow::Result<PathBuf> {
    Ok(Config::config_dir()?.join(SNAPSHOT_FILE_NAME))
}

fn open_workspace(config: &Config) -> anyhow::Result<Workspace> {
    let store = Arc::new(HttpHistoryStore::new(config.get_server_url()?)?);
    let history = HistoryCache::new(store.clone()).with_snapshot(snapshot_path()?);
    Ok(Workspace::new(store, config.row_options()).with_history(history))
}

fn print_history(items: &[HistoryItem]) {
    if items.is_empty() {
        println!("履歴はありません");
        return;
    }
    for item in items {
        let alias = if item.alias.is_empty() { "-" } else { item.alias.as_str() };
        println!(
            "{}  {}  {}  ({} photos, {} problems) {}",
            item.id,
            item.created_at.as_deref().unwrap_or("-"),
            alias,
            item.total_images,
            item.problems,
            format_summary(&item.overall)
        );
    }
}
