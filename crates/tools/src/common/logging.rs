//! ツール共通のログ初期化
//!
//! 標準出力は所見の出力先なので、ログは常に標準エラーへ出す。

use std::io::Write;

/// `RUST_LOG` が未設定なら `verbose` に応じて debug / info を既定にする
pub fn init(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level),
    );
    builder
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr);
    // テストなどで二重に初期化されても失敗にしない
    let _ = builder.try_init();
}
