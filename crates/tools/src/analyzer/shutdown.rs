//! 読み込み終了後の終了待ち
//!
//! 投入チャネルを閉じた後に呼ぶ。全許可証の返却を制限時間まで待ち、返却されたら
//! ワーカースレッドを join する。制限時間を超えた場合、ワーカーは join せずに
//! 切り離す（止まっているタスクに付き合って終了できなくなるのを避ける）。
//!
//! Ctrl-C は停止フラグを立てるだけで、その後は通常の終了待ちに合流する。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use super::error::PipelineError;
use super::permit::PermitPool;

/// Ctrl-C で `stop` を立てるハンドラを登録する
///
/// 登録できなかった場合は警告を出して `false` を返す（解析自体は続ける）。
pub fn install_interrupt_flag(stop: &Arc<AtomicBool>) -> bool {
    let flag = Arc::clone(stop);
    let installed = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted: finishing in-flight games...");
        flag.store(true, Ordering::Relaxed);
    });
    match installed {
        Ok(()) => true,
        Err(e) => {
            warn!("failed to install Ctrl-C handler: {e}; interrupts will abort without draining");
            false
        }
    }
}

pub fn drain(
    pool: &PermitPool,
    handles: Vec<JoinHandle<()>>,
    timeout: Duration,
) -> Result<(), PipelineError> {
    let started = Instant::now();
    debug!(
        "draining {} in-flight game(s), timeout {:?}",
        pool.outstanding(),
        timeout
    );

    if let Err(outstanding) = pool.wait_idle(timeout) {
        return Err(PipelineError::DrainTimeout {
            timeout,
            outstanding,
        });
    }

    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            // タスク本体の panic は捕捉済みなので、ここに来るのはワーカーループ自体の異常
            error!("{name} terminated abnormally");
        }
    }
    debug!("drained in {:.3}s", started.elapsed().as_secs_f64());
    Ok(())
}
