use std::sync::{Mutex, MutexGuard};

/// Poisoned 状態でも中身を取り出してロックする
///
/// ワーカーの panic はタスク境界で捕捉して報告するので、ロックの poison で
/// パイプライン全体を止めない。
pub fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::error!("Mutex was poisoned, attempting recovery");
            poisoned.into_inner()
        }
    }
}
