//! The core's one source of wall-clock time, so every `now()` call in a runner goes
//! through a single seam.

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
