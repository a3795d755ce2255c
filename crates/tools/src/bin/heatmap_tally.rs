/// analyze_archive の出力をマス目ごとに集計する
///
/// 使い方:
///   # パイプで受ける
///   analyze_archive games.pgn | heatmap_tally
///
///   # gzip 出力を読み、JSON で保存
///   heatmap_tally findings.txt.gz --json > heatmaps.json
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use chessmap_pgn::open_reader;
use tools::common::io::FindingSink;
use tools::common::logging;
use tools::heatmap::HeatmapTally;

#[derive(Parser)]
#[command(about = "Tally analyze_archive findings into per-square heatmaps")]
struct Cli {
    /// Findings file (- for stdin, .gz supported)
    #[arg(default_value = "-")]
    input: PathBuf,

    /// JSON出力モード
    #[arg(long)]
    json: bool,

    /// Output path (- for stdout)
    #[arg(long, default_value = "-")]
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let reader = open_reader(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    let mut tally = HeatmapTally::new();
    tally
        .tally_reader(reader)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    info!("finished tallying {} games", tally.games);

    let mut out = FindingSink::create(&cli.output)
        .with_context(|| format!("failed to open output {}", cli.output.display()))?;
    if cli.json {
        serde_json::to_writer_pretty(&mut out, &tally)?;
        writeln!(out)?;
    } else {
        out.write_all(tally.render_text().as_bytes())?;
    }
    out.finish().context("failed to finalize output")?;
    Ok(())
}
