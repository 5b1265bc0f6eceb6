//! ログ初期化
//!
//! 進捗表示は stdout（println!）、診断ログは stderr（tracing）に出す。

use tracing::Level;

/// サブスクライバーを初期化（二回目以降の呼び出しは無視される）
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}
