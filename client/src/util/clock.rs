//! Wall clock for the browser build.
//!
//! `time::OffsetDateTime::now_utc` is unavailable on `wasm32-unknown-unknown`,
//! so the hydrated build reads `Date.now()` instead. Server renders fall back
//! to the system clock.

use identity::clock::Clock;

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        #[cfg(feature = "hydrate")]
        {
            js_sys::Date::now() as i64
        }
        #[cfg(not(feature = "hydrate"))]
        {
            identity::clock::SystemClock.now_ms()
        }
    }
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    BrowserClock.now_ms()
}
