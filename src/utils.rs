use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use env_logger::Builder;
use std::io::Write;

/// A handy shortcut to replace the `RwLock` `write()/read().unwrap()`
/// pattern with `wl()`/`rl()`.
///
/// copy from https://github.com/tikv/tikv/blob/b15ea3b1cd766375cb52019e35c195ed797124df/components/tikv_util/src/lib.rs#L171-L186
pub trait HandyRwLock<T: ?Sized> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T: ?Sized> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

/// Install an `env_logger` that prefixes each line with level, file and line
/// number. Intended to be called once, near the top of `main` or the first
/// test in a binary (tests should guard this with `std::sync::Once`).
pub fn init_log() {
    let mut builder = Builder::from_default_env();
    builder
        .format_timestamp_millis()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}
