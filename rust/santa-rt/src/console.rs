//! The console sink behind `puts`.
//!
//! A process-wide capture with an enable/disable lifecycle: while enabled,
//! output is recorded with millisecond timestamps relative to `enable()`;
//! otherwise it goes to stdout. Execution is single-threaded, so the mutex
//! only exists to make the global safe to construct.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleEvent {
    pub timestamp_ms: i64,
    pub message: String,
}

struct CaptureState {
    started: Instant,
    events: Vec<ConsoleEvent>,
}

static CAPTURE: Lazy<Mutex<Option<CaptureState>>> = Lazy::new(|| Mutex::new(None));

pub struct ConsoleCapture;

impl ConsoleCapture {
    /// Start recording; resets the clock and discards prior events.
    pub fn enable() {
        let mut capture = CAPTURE.lock().expect("console capture poisoned");
        *capture = Some(CaptureState {
            started: Instant::now(),
            events: Vec::new(),
        });
    }

    /// Stop recording and return the captured events.
    pub fn disable() -> Vec<ConsoleEvent> {
        let mut capture = CAPTURE.lock().expect("console capture poisoned");
        capture
            .take()
            .map(|state| state.events)
            .unwrap_or_default()
    }
}

pub(crate) fn emit(message: &str) {
    let mut capture = CAPTURE.lock().expect("console capture poisoned");
    match capture.as_mut() {
        Some(state) => {
            let timestamp_ms = state.started.elapsed().as_millis() as i64;
            state.events.push(ConsoleEvent {
                timestamp_ms,
                message: message.to_string(),
            });
        }
        None => println!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test drives the whole lifecycle: the sink is process-wide, so
    // splitting these assertions across parallel tests would race.
    #[test]
    fn capture_lifecycle() {
        assert!(ConsoleCapture::disable().is_empty());
        ConsoleCapture::enable();
        emit("first");
        emit("second");
        let events = ConsoleCapture::disable();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "first");
        assert_eq!(events[1].message, "second");
        assert!(events[0].timestamp_ms <= events[1].timestamp_ms);
        assert!(ConsoleCapture::disable().is_empty());
    }
}
