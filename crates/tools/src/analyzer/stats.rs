//! 実行統計
//!
//! ワーカーから並行に更新されるカウンタと、実行終了時に JSON へ書き出す集計値。

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::classifier::Finding;

#[derive(Debug, Default)]
pub struct RunStats {
    draws: AtomicU64,
    mates: AtomicU64,
    no_finding: AtomicU64,
    parse_errors: AtomicU64,
    illegal_move_errors: AtomicU64,
    fatal_errors: AtomicU64,
}

impl RunStats {
    pub fn record_finding(&self, finding: &Finding) {
        let counter = match finding {
            Finding::DrawLayout { .. } => &self.draws,
            Finding::MateAttack { .. } => &self.mates,
            Finding::None => &self.no_finding,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_illegal_move(&self) {
        self.illegal_move_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// 1回の実行の集計（`--summary-json` の出力形式）
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_ms: u64,
    pub workers: usize,
    pub max_in_flight: usize,
    pub dispatched: u64,
    pub markers: u64,
    pub draws: u64,
    pub mates: u64,
    pub no_finding: u64,
    pub parse_errors: u64,
    pub illegal_move_errors: u64,
    pub fatal_errors: u64,
    pub finding_lines: u64,
    pub peak_in_flight: usize,
    /// Ctrl-C または max_games で読み込みを途中で止めた
    pub stopped_early: bool,
}

/// [`RunSummary`] を組み立てるための実行時の値
pub(crate) struct SummaryInputs {
    pub started_at: DateTime<Local>,
    pub elapsed_ms: u64,
    pub workers: usize,
    pub max_in_flight: usize,
    pub dispatched: u64,
    pub markers: u64,
    pub finding_lines: u64,
    pub peak_in_flight: usize,
    pub stopped_early: bool,
}

impl RunSummary {
    pub(crate) fn from_stats(stats: &RunStats, inputs: SummaryInputs) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Self {
            started_at: inputs.started_at.to_rfc3339(),
            finished_at: Local::now().to_rfc3339(),
            elapsed_ms: inputs.elapsed_ms,
            workers: inputs.workers,
            max_in_flight: inputs.max_in_flight,
            dispatched: inputs.dispatched,
            markers: inputs.markers,
            draws: load(&stats.draws),
            mates: load(&stats.mates),
            no_finding: load(&stats.no_finding),
            parse_errors: load(&stats.parse_errors),
            illegal_move_errors: load(&stats.illegal_move_errors),
            fatal_errors: load(&stats.fatal_errors),
            finding_lines: inputs.finding_lines,
            peak_in_flight: inputs.peak_in_flight,
            stopped_early: inputs.stopped_early,
        }
    }

    /// 回復可能エラーで所見なしになった局数
    pub fn recoverable_errors(&self) -> u64 {
        self.parse_errors + self.illegal_move_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_collects_counters_and_serializes() {
        let stats = RunStats::default();
        stats.record_finding(&Finding::None);
        stats.record_finding(&Finding::DrawLayout { pieces: Vec::new() });
        stats.record_parse_error();
        stats.record_illegal_move();
        stats.record_illegal_move();

        let summary = RunSummary::from_stats(
            &stats,
            SummaryInputs {
                started_at: Local::now(),
                elapsed_ms: 12,
                workers: 2,
                max_in_flight: 4,
                dispatched: 5,
                markers: 5,
                finding_lines: 0,
                peak_in_flight: 3,
                stopped_early: false,
            },
        );
        assert_eq!(summary.draws, 1);
        assert_eq!(summary.no_finding, 1);
        assert_eq!(summary.recoverable_errors(), 3);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["dispatched"], 5);
        assert_eq!(json["illegal_move_errors"], 2);
        assert_eq!(json["stopped_early"], false);
        assert!(json["started_at"].as_str().unwrap().contains('T'));
    }
}
