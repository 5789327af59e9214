use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use pinfold_core::config::Mode;

/// Holds the current operating mode as a single atomic value, read by event
/// dispatch and written by the facade. Persisting a change is the caller's
/// responsibility.
#[derive(Debug)]
pub struct ModeController {
    mode: AtomicU8,
}

fn encode(mode: Mode) -> u8 {
    match mode {
        Mode::Autonomous => 0,
        Mode::OperatorApproved => 1,
    }
}

fn decode(value: u8) -> Mode {
    match value {
        0 => Mode::Autonomous,
        _ => Mode::OperatorApproved,
    }
}

impl ModeController {
    pub fn new(initial: Mode) -> Self {
        Self {
            mode: AtomicU8::new(encode(initial)),
        }
    }

    pub fn get(&self) -> Mode {
        decode(self.mode.load(Ordering::Relaxed))
    }

    pub fn set(&self, mode: Mode) {
        let old = decode(self.mode.swap(encode(mode), Ordering::Relaxed));
        if old != mode {
            info!(from = %old, to = %mode, "mode changed");
        }
    }
}
