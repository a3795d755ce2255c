/// PGN アーカイブの終局局面解析
///
/// 引き分けの終局局面の駒配置（`d<駒><マス>`）と、詰み局面の玉・利いている駒
/// （`c<駒><マス>`）を1行ずつ出力する。1局分の出力は必ず `game` 行で終わる。
///
/// 使い方:
///   # 標準出力へ
///   analyze_archive games.pgn
///
///   # gzip アーカイブを読み、gzip で書き出し、集計を JSON で残す
///   analyze_archive lichess.pgn.gz --output findings.txt.gz --summary-json summary.json
///
///   # 同時実行数・終了待ちを設定ファイルで指定（コマンドライン引数が優先）
///   analyze_archive games.pgn --config analyzer.toml --workers 4
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use chessmap_pgn::{PgnSplitter, open_reader};
use tools::analyzer::{
    AnalyzerConfig, Dispatcher, Emitter, ReplayClassifier, RunSummary, shutdown,
};
use tools::common::io::FindingSink;
use tools::common::logging;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(about = "Classify drawn layouts and checkmate attackers in a PGN archive")]
struct Cli {
    /// PGN archive (.pgn, .pgn.gz, or - for stdin)
    archive: PathBuf,

    /// Number of worker threads [default: available parallelism]
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum number of games in flight [default: 32]
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Seconds to wait for in-flight games after the archive is exhausted [default: 300]
    #[arg(long)]
    drain_timeout_secs: Option<u64>,

    /// Stop reading after this many games
    #[arg(long)]
    max_games: Option<u64>,

    /// Output path for findings (- for stdout, .gz to compress)
    #[arg(long, default_value = "-")]
    output: PathBuf,

    /// TOML config file (workers, max_in_flight, drain_timeout_secs, max_games)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write run statistics as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// 設定ファイル（または既定値）にコマンドライン引数を上書きする
    fn resolve_config(&self) -> Result<AnalyzerConfig> {
        let mut cfg = match &self.config {
            Some(path) => AnalyzerConfig::load(path)?,
            None => AnalyzerConfig::default(),
        };
        if let Some(n) = self.workers {
            cfg.workers = n;
        }
        if let Some(n) = self.max_in_flight {
            cfg.max_in_flight = n;
        }
        if let Some(secs) = self.drain_timeout_secs {
            cfg.drain_timeout_secs = secs;
        }
        if self.max_games.is_some() {
            cfg.max_games = self.max_games;
        }
        Ok(cfg)
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let options = cli.resolve_config()?.pipeline_options()?;

    let reader = open_reader(&cli.archive)
        .with_context(|| format!("failed to open archive {}", cli.archive.display()))?;
    let mut source = PgnSplitter::new(reader);
    let sink = FindingSink::create(&cli.output)
        .with_context(|| format!("failed to open output {}", cli.output.display()))?;
    debug!("output sink: {}", sink.kind());

    let stop = Arc::new(AtomicBool::new(false));
    shutdown::install_interrupt_flag(&stop);

    info!("archive: {}", cli.archive.display());
    let dispatcher = Dispatcher::new(ReplayClassifier::new(), Emitter::new(sink), options)
        .with_stop_flag(stop);
    let result = dispatcher.run(&mut source);
    let archive_games = source.emitted();
    drop(source);

    // 失敗時もそこまでの出力は閉じて残す
    let closed = match dispatcher.into_emitter() {
        Some(emitter) => emitter.into_inner().finish().context("failed to finalize output"),
        None => {
            warn!("output left open: workers still running after drain timeout");
            Ok(())
        }
    };

    let summary = result.context("archive analysis aborted")?;
    closed?;

    info!(
        "{} game(s) read, {} dispatched, {} finding line(s), peak in flight {}",
        archive_games, summary.dispatched, summary.finding_lines, summary.peak_in_flight
    );
    if summary.recoverable_errors() > 0 {
        warn!(
            "{} game(s) skipped (parse errors: {}, illegal moves: {})",
            summary.recoverable_errors(),
            summary.parse_errors,
            summary.illegal_move_errors
        );
    }
    if let Some(path) = &cli.summary_json {
        write_summary(path, &summary)?;
        info!("summary written to {}", path.display());
    }
    Ok(())
}
