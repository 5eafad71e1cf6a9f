//! ログ出力の初期化
//!
//! `RUST_LOG` があればそれに従い、なければ `--verbose` で debug、既定は warn。
//! レポート本文は標準出力に出すので、ログは標準エラーへ。

use tracing_subscriber::EnvFilter;

pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "photo_check=debug,photo_check_common=debug"
    } else {
        "warn"
    }
}

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
