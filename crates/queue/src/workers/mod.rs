//! Job workers.

mod notify;

pub use notify::{NOTIFY_RETRIES, NotifyContext, notify_worker, spawn_notify_worker};
