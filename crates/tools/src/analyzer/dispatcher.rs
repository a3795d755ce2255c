//! 読み込みループとワーカープール
//!
//! 読み込みループ（呼び出しスレッド）だけがアーカイブを順に読み、1局ごとに許可証を
//! 取得してからチャネルへ投入する。ワーカーは受け取った局を分類・出力し、最後に
//! 許可証を返却する。局の処理順は不定。

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chessmap_pgn::{GameError, RawGameBlock, RecordSource};
use chrono::Local;
use crossbeam_channel as chan;
use log::{debug, error, info, trace, warn};

use super::classifier::{ClassifyError, Finding, GameClassifier};
use super::config::PipelineOptions;
use super::emitter::Emitter;
use super::error::PipelineError;
use super::permit::{Permit, PermitPool};
use super::shutdown;
use super::stats::{RunStats, RunSummary, SummaryInputs};
use crate::common::sync::lock_or_recover;

const PROGRESS_INTERVAL: u64 = 100_000;

/// ワーカーへ渡す1局分の仕事（許可証を所有する）
struct Job {
    block: RawGameBlock,
    permit: Permit,
}

/// 最初に起きた致命的エラー
#[derive(Default)]
struct FatalSlot {
    tripped: AtomicBool,
    first: Mutex<Option<PipelineError>>,
}

impl FatalSlot {
    fn record(&self, err: PipelineError) {
        error!("fatal ({}): {err}", err.kind());
        let mut first = lock_or_recover(&self.first);
        if first.is_none() {
            *first = Some(err);
        }
        self.tripped.store(true, Ordering::Release);
    }

    fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    fn take(&self) -> Option<PipelineError> {
        lock_or_recover(&self.first).take()
    }
}

/// 1回の実行中にワーカー間で共有する状態
struct Shared<C, W> {
    classifier: Arc<C>,
    emitter: Arc<Emitter<W>>,
    stats: RunStats,
    fatal: FatalSlot,
}

pub struct Dispatcher<C, W> {
    classifier: Arc<C>,
    emitter: Arc<Emitter<W>>,
    options: PipelineOptions,
    stop: Arc<AtomicBool>,
}

impl<C, W> Dispatcher<C, W>
where
    C: GameClassifier + 'static,
    W: Write + Send + 'static,
{
    pub fn new(classifier: C, emitter: Emitter<W>, options: PipelineOptions) -> Self {
        Self {
            classifier: Arc::new(classifier),
            emitter: Arc::new(emitter),
            options,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 外部からの停止要求（Ctrl-C など）を受けるフラグを差し替える
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn emitter(&self) -> &Emitter<W> {
        &self.emitter
    }

    /// 出力先を取り戻す
    ///
    /// 終了待ちがタイムアウトしてワーカーが残っている場合は `None`。
    pub fn into_emitter(self) -> Option<Emitter<W>> {
        Arc::try_unwrap(self.emitter).ok()
    }

    /// アーカイブを最後まで（または停止条件まで）処理する
    pub fn run<S>(&self, source: &mut S) -> Result<RunSummary, PipelineError>
    where
        S: RecordSource + ?Sized,
    {
        let opts = &self.options;
        if opts.workers == 0 || opts.max_in_flight == 0 {
            return Err(PipelineError::Config(
                "workers and max_in_flight must be at least 1".to_string(),
            ));
        }

        let started_at = Local::now();
        let start = Instant::now();
        let markers_before = self.emitter.games();
        let lines_before = self.emitter.finding_lines();

        let pool = PermitPool::new(opts.max_in_flight);
        let shared = Arc::new(Shared {
            classifier: Arc::clone(&self.classifier),
            emitter: Arc::clone(&self.emitter),
            stats: RunStats::default(),
            fatal: FatalSlot::default(),
        });

        info!(
            "start: workers={} max_in_flight={} drain_timeout={:?} max_games={}",
            opts.workers,
            opts.max_in_flight,
            opts.drain_timeout,
            opts.max_games.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
        );

        let (tx, rx) = chan::unbounded::<Job>();
        let mut handles = Vec::with_capacity(opts.workers);
        for id in 0..opts.workers {
            let rx = rx.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("classify-{id}"))
                .spawn(move || worker_main(rx, shared))
                .map_err(PipelineError::Spawn)?;
            handles.push(handle);
        }
        drop(rx);

        let (dispatched, stopped_early) = self.pull_loop(source, &pool, &tx, &shared);
        // 投入終了。キューが空になったワーカーから順に抜ける
        drop(tx);

        let drained = shutdown::drain(&pool, handles, opts.drain_timeout);
        // 完了済みの局の出力は失敗時も吐き出す
        let flushed = self.emitter.flush();

        if let Some(fatal) = shared.fatal.take() {
            if let Err(timeout) = drained {
                error!("{timeout}");
            }
            if let Err(e) = flushed {
                error!("flush after fatal error failed: {e}");
            }
            return Err(fatal);
        }
        if drained.is_err() {
            if let Err(e) = &flushed {
                error!("flush after drain timeout failed: {e}");
            }
        }
        drained?;
        flushed.map_err(PipelineError::Flush)?;
        debug_assert_eq!(pool.acquired_total(), pool.released_total());

        let summary = RunSummary::from_stats(
            &shared.stats,
            SummaryInputs {
                started_at,
                elapsed_ms: start.elapsed().as_millis() as u64,
                workers: opts.workers,
                max_in_flight: opts.max_in_flight,
                dispatched,
                markers: self.emitter.games() - markers_before,
                finding_lines: self.emitter.finding_lines() - lines_before,
                peak_in_flight: pool.peak(),
                stopped_early,
            },
        );
        info!(
            "done: {} game(s) in {:.1}s (draws={} mates={} none={} parse_errors={} illegal_moves={})",
            summary.dispatched,
            summary.elapsed_ms as f64 / 1000.0,
            summary.draws,
            summary.mates,
            summary.no_finding,
            summary.parse_errors,
            summary.illegal_move_errors
        );
        Ok(summary)
    }

    /// 投入した局数と、停止要求・上限で打ち切ったかを返す
    fn pull_loop<S>(
        &self,
        source: &mut S,
        pool: &Arc<PermitPool>,
        tx: &chan::Sender<Job>,
        shared: &Shared<C, W>,
    ) -> (u64, bool)
    where
        S: RecordSource + ?Sized,
    {
        let mut dispatched = 0u64;
        loop {
            if shared.fatal.is_tripped() {
                warn!("stopping after {dispatched} game(s) due to a fatal error");
                return (dispatched, false);
            }
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested; no more games will be dispatched");
                return (dispatched, true);
            }
            if self.options.max_games.is_some_and(|max| dispatched >= max) {
                info!("reached max_games={dispatched}");
                return (dispatched, true);
            }

            let block = match source.next_block() {
                Ok(Some(block)) => block,
                Ok(None) => return (dispatched, false),
                Err(e) => {
                    shared.fatal.record(PipelineError::Source {
                        games_read: dispatched,
                        source: e,
                    });
                    return (dispatched, false);
                }
            };

            // 上限に達している間はここでブロックする
            let permit = pool.acquire();
            if shared.fatal.is_tripped() {
                // 待っている間に致命的エラーが起きた。この局は投入しない
                return (dispatched, false);
            }

            trace!(
                "dispatch game #{} (line {}, in flight {})",
                block.index,
                block.line,
                pool.outstanding()
            );
            if tx.send(Job { block, permit }).is_err() {
                shared.fatal.record(PipelineError::PoolClosed {
                    games_dispatched: dispatched,
                });
                return (dispatched, false);
            }
            dispatched += 1;
            if dispatched.is_multiple_of(PROGRESS_INTERVAL) {
                info!("{dispatched} games dispatched");
            }
        }
    }
}

fn worker_main<C, W>(rx: chan::Receiver<Job>, shared: Arc<Shared<C, W>>)
where
    C: GameClassifier,
    W: Write,
{
    while let Ok(job) = rx.recv() {
        run_task(&shared, job);
    }
    debug!(
        "{} exiting",
        thread::current().name().unwrap_or("worker")
    );
}

/// 1局分の処理。どの経路でも `game` 行を1回書き、許可証を1回返す
fn run_task<C, W>(shared: &Shared<C, W>, job: Job)
where
    C: GameClassifier,
    W: Write,
{
    let Job { block, permit } = job;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.classifier.classify(&block)));
    let finding = match outcome {
        Ok(Ok(finding)) => {
            shared.stats.record_finding(&finding);
            finding
        }
        Ok(Err(ClassifyError::Game(err))) => {
            match &err {
                GameError::Parse { .. } => shared.stats.record_parse_error(),
                GameError::IllegalMove { .. } => shared.stats.record_illegal_move(),
            }
            warn!(
                "game #{} (line {}) skipped [{}]: {err}",
                block.index,
                block.line,
                err.kind()
            );
            Finding::None
        }
        Ok(Err(ClassifyError::Invariant { detail, board })) => {
            shared.stats.record_fatal();
            shared.fatal.record(PipelineError::InvariantViolation {
                game: block.index,
                line: block.line,
                detail,
                board,
            });
            Finding::None
        }
        Err(payload) => {
            shared.stats.record_fatal();
            shared.fatal.record(PipelineError::TaskPanicked {
                game: block.index,
                line: block.line,
                message: panic_message(payload.as_ref()),
            });
            Finding::None
        }
    };

    if let Err(e) = shared.emitter.emit_game(&finding) {
        shared.stats.record_fatal();
        shared.fatal.record(PipelineError::Output {
            game: block.index,
            source: e,
        });
    }
    drop(permit);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
