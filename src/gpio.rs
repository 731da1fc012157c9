use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::registry::ChannelState;

/// Physical output level of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

/// Mapping between logical channel state and the level driving the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    pub fn level_for(self, state: ChannelState) -> Level {
        match (self, state) {
            (Polarity::ActiveLow, ChannelState::On) => Level::Low,
            (Polarity::ActiveLow, ChannelState::Off) => Level::High,
            (Polarity::ActiveHigh, ChannelState::On) => Level::High,
            (Polarity::ActiveHigh, ChannelState::Off) => Level::Low,
        }
    }
}

pub trait GpioBackend: Send + Sync {
    /// Claim `pin` as an output and drive it to `initial` before anything else
    /// can observe it. Failures are `AppError::GpioConfiguration`.
    fn configure_output(&self, pin: u32, initial: Level) -> Result<(), AppError>;
    fn write_level(&self, pin: u32, level: Level) -> Result<(), AppError>;
}
