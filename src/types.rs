use std::sync::{Arc, RwLock};

use crate::error::CoreError;

/// A handle to a value shared between the cache and whoever is currently
/// holding a page lock on it. Mirrors this crate's long-standing `Pod<T>`
/// idiom: `Arc` for shared ownership across threads, `RwLock` so a reader
/// holding a shared page lock and a writer holding an exclusive page lock
/// map onto the obvious guard types.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, CoreError>;

pub type CoreResult = Result<(), CoreError>;
