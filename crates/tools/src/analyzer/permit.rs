//! 同時実行数の上限を管理する許可証プール
//!
//! 読み込みループが投入前に1枚取得し、タスク終了時に [`Permit`] の drop で返却する。
//! 返却は drop でのみ行われるので、成功・失敗・panic のどの経路でも1回だけ返る。

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::common::sync::lock_or_recover;

#[derive(Debug, Default)]
struct PermitState {
    outstanding: usize,
    peak: usize,
    acquired_total: u64,
    released_total: u64,
}

/// 上限付きカウンタ（取得は上限に達している間ブロックする）
#[derive(Debug)]
pub struct PermitPool {
    capacity: usize,
    state: Mutex<PermitState>,
    changed: Condvar,
}

/// 取得済みの許可証。drop で返却される
#[must_use = "dropping a permit releases it immediately"]
#[derive(Debug)]
pub struct Permit {
    pool: Arc<PermitPool>,
}

impl PermitPool {
    /// `capacity` は 1 以上（設定検証で保証する）
    pub fn new(capacity: usize) -> Arc<Self> {
        debug_assert!(capacity > 0, "permit pool capacity must be positive");
        Arc::new(Self {
            capacity: capacity.max(1),
            state: Mutex::new(PermitState::default()),
            changed: Condvar::new(),
        })
    }

    /// 空きができるまで待って1枚取得する
    pub fn acquire(self: &Arc<Self>) -> Permit {
        let mut state = lock_or_recover(&self.state);
        while state.outstanding >= self.capacity {
            state = self.changed.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.outstanding += 1;
        state.acquired_total += 1;
        state.peak = state.peak.max(state.outstanding);
        Permit {
            pool: Arc::clone(self),
        }
    }

    /// 空きがあれば取得する（待たない）
    #[cfg(test)]
    fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut state = lock_or_recover(&self.state);
        if state.outstanding >= self.capacity {
            return None;
        }
        state.outstanding += 1;
        state.acquired_total += 1;
        state.peak = state.peak.max(state.outstanding);
        Some(Permit {
            pool: Arc::clone(self),
        })
    }

    fn release(&self) {
        let mut state = lock_or_recover(&self.state);
        debug_assert!(state.outstanding > 0, "permit released more times than acquired");
        state.outstanding = state.outstanding.saturating_sub(1);
        state.released_total += 1;
        // 読み込みループと wait_idle の両方が待っている可能性がある
        self.changed.notify_all();
    }

    /// 全許可証が返却されるまで最大 `timeout` 待つ
    ///
    /// タイムアウト時は未返却の枚数を `Err` で返す。
    pub fn wait_idle(&self, timeout: Duration) -> Result<(), usize> {
        let deadline = Instant::now() + timeout;
        let mut state = lock_or_recover(&self.state);
        while state.outstanding > 0 {
            let now = Instant::now();
            if now >= deadline {
                return Err(state.outstanding);
            }
            let (next, _) = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn outstanding(&self) -> usize {
        lock_or_recover(&self.state).outstanding
    }

    /// これまでの同時保持数の最大値
    pub fn peak(&self) -> usize {
        lock_or_recover(&self.state).peak
    }

    pub fn acquired_total(&self) -> u64 {
        lock_or_recover(&self.state).acquired_total
    }

    pub fn released_total(&self) -> u64 {
        lock_or_recover(&self.state).released_total
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn try_acquire_respects_capacity() {
        let pool = PermitPool::new(2);
        let a = pool.try_acquire().unwrap();
        let _b = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());
        assert_eq!(pool.outstanding(), 2);
        drop(a);
        assert_eq!(pool.outstanding(), 1);
        assert!(pool.try_acquire().is_some());
        assert_eq!(pool.peak(), 2);
    }

    #[test]
    fn acquire_blocks_until_release() {
        let pool = PermitPool::new(1);
        let held = pool.acquire();
        let acquired = Arc::new(AtomicBool::new(false));

        let handle = {
            let pool = Arc::clone(&pool);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _permit = pool.acquire();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst), "second acquire must wait");
        drop(held);
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.acquired_total(), 2);
        assert_eq!(pool.released_total(), 2);
        assert_eq!(pool.peak(), 1);
    }

    #[test]
    fn permit_released_when_holder_panics() {
        let pool = PermitPool::new(1);
        let permit = pool.acquire();
        let result = thread::spawn(move || {
            let _permit = permit;
            panic!("task failure");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn wait_idle_times_out_with_outstanding_count() {
        let pool = PermitPool::new(4);
        let _a = pool.acquire();
        let _b = pool.acquire();
        assert_eq!(pool.wait_idle(Duration::from_millis(20)), Err(2));
    }

    #[test]
    fn wait_idle_returns_after_last_release() {
        let pool = PermitPool::new(4);
        let permit = pool.acquire();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(permit);
        });
        assert_eq!(pool.wait_idle(Duration::from_secs(5)), Ok(()));
        handle.join().unwrap();
    }
}
