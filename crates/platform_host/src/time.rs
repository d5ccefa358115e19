//! Wall-clock helpers for item timestamps and envelope stamps.

use std::cell::Cell;

thread_local! {
    static LAST_STAMP_MS: Cell<u64> = const { Cell::new(0) };
}

/// Milliseconds since the unix epoch; the browser clock on wasm32.
pub fn unix_time_ms_now() -> u64 {
    #[cfg(target_arch = "wasm32")]
    let now = js_sys::Date::now().max(0.0) as u64;

    #[cfg(not(target_arch = "wasm32"))]
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);

    now
}

/// Like [`unix_time_ms_now`], but each call on a thread returns a value greater than the last,
/// even within the same millisecond.
pub fn next_monotonic_timestamp_ms() -> u64 {
    let now = unix_time_ms_now();
    LAST_STAMP_MS.with(|last| {
        let stamp = now.max(last.get() + 1);
        last.set(stamp);
        stamp
    })
}
