//! Timer primitives for native and browser targets.
//!
//! `std::time::Instant` panics on `wasm32-unknown-unknown`, and tokio timers
//! need a tokio runtime, so the browser build goes through JS instead.

use std::time::Duration;

/// Non-blocking sleep: `tokio::time::sleep` on native targets.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn sleep(delay: Duration) {
    tokio::time::sleep(delay).await;
}

/// Non-blocking sleep: awaits a `setTimeout` promise in the browser.
#[cfg(target_arch = "wasm32")]
pub(crate) async fn sleep(delay: Duration) {
    use wasm_bindgen::{JsCast, JsValue};

    let millis = delay.as_millis().min(i32::MAX as u128) as i32;
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let global = js_sys::global();
        // setTimeout lives on both Window and WorkerGlobalScope.
        let set_timeout = js_sys::Reflect::get(&global, &JsValue::from_str("setTimeout"))
            .ok()
            .and_then(|value| value.dyn_into::<js_sys::Function>().ok());
        schedule_or_settle(
            || {
                set_timeout.is_some_and(|set_timeout| {
                    set_timeout
                        .call2(&global, &resolve, &JsValue::from(millis))
                        .is_ok()
                })
            },
            || {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            },
        );
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

/// Arms a timer with `schedule`; if that fails, calls `settle` at once so the
/// waiting future never hangs.
#[cfg(any(target_arch = "wasm32", test))]
fn schedule_or_settle(schedule: impl FnOnce() -> bool, settle: impl FnOnce()) {
    if !schedule() {
        settle();
    }
}

/// Monotonic elapsed-time measurement for request deadlines.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Stopwatch {
    #[cfg(not(target_arch = "wasm32"))]
    started: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    started_ms: f64,
}

impl Stopwatch {
    pub(crate) fn start() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            started: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            started_ms: js_sys::Date::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.started.elapsed()
        }
        #[cfg(target_arch = "wasm32")]
        {
            let elapsed = (js_sys::Date::now() - self.started_ms).max(0.0);
            Duration::from_millis(elapsed as u64)
        }
    }
}
