use std::collections::VecDeque;
use std::sync::{Mutex, RwLock};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::AppError;
use crate::gpio::{GpioBackend, Level};

/// Oldest entries are dropped once the write log holds this many.
pub const WRITE_LOG_CAPACITY: usize = 1024;

/// In-memory backend that keeps pin levels and a bounded log of recent writes.
#[derive(Default)]
pub struct MockGpioBackend {
    pins: RwLock<FxHashMap<u32, Level>>, // keyed by pin
    writes: Mutex<VecDeque<(u32, Level)>>,
    broken: RwLock<FxHashSet<u32>>,
}

impl MockGpioBackend {
    /// Make every configure/write on `pin` fail from now on.
    pub fn break_pin(&self, pin: u32) {
        if let Ok(mut broken) = self.broken.write() {
            broken.insert(pin);
        }
    }

    pub fn level(&self, pin: u32) -> Option<Level> {
        self.pins.read().ok().and_then(|pins| pins.get(&pin).copied())
    }

    /// Levels written to `pin` that are still in the write log, oldest first.
    pub fn writes_to(&self, pin: u32) -> Vec<Level> {
        self.writes
            .lock()
            .map(|w| w.iter().filter(|(p, _)| *p == pin).map(|(_, l)| *l).collect())
            .unwrap_or_default()
    }

    fn is_broken(&self, pin: u32) -> bool {
        self.broken
            .read()
            .map(|broken| broken.contains(&pin))
            .unwrap_or(true)
    }
}

impl GpioBackend for MockGpioBackend {
    fn configure_output(&self, pin: u32, initial: Level) -> Result<(), AppError> {
        if self.is_broken(pin) {
            return Err(AppError::GpioConfiguration(format!("pin {pin} is broken")));
        }

        let mut pins = self
            .pins
            .write()
            .map_err(|e| AppError::GpioConfiguration(format!("lock poisoned: {e}")))?;
        pins.insert(pin, initial);

        Ok(())
    }

    fn write_level(&self, pin: u32, level: Level) -> Result<(), AppError> {
        if self.is_broken(pin) {
            return Err(AppError::Gpio(format!("pin {pin} is broken")));
        }

        let mut pins = self
            .pins
            .write()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
        let current = pins
            .get_mut(&pin)
            .ok_or_else(|| AppError::Gpio(format!("pin {pin} not configured as output")))?;
        *current = level;

        let mut writes = self
            .writes
            .lock()
            .map_err(|e| AppError::Gpio(format!("lock poisoned: {e}")))?;
        if writes.len() == WRITE_LOG_CAPACITY {
            writes.pop_front();
        }
        writes.push_back((pin, level));

        Ok(())
    }
}
