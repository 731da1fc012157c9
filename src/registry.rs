use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::gpio::{GpioBackend, Level, Polarity};
use crate::storage::{Snapshot, SnapshotSlot, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelState {
    On,
    #[default]
    Off,
}

impl ChannelState {
    pub fn flipped(self) -> Self {
        match self {
            ChannelState::On => ChannelState::Off,
            ChannelState::Off => ChannelState::On,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ChannelState::On => 1,
            ChannelState::Off => 0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ChannelState::On => "ON",
            ChannelState::Off => "OFF",
        }
    }
}

/// Point-in-time copy of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub id: usize,
    pub name: String,
    pub pin: u32,
    pub polarity: Polarity,
    pub state: ChannelState,
}

struct Channel {
    name: String,
    pin: u32,
    polarity: Polarity,
    state: ChannelState,
    last_toggle: Option<Instant>,
}

impl Channel {
    fn level(&self) -> Level {
        self.polarity.level_for(self.state)
    }
}

struct Indicator {
    pin: u32,
    on_time: Duration,
    count: u32,
}

/// Owns every channel record and is the only place channel state changes.
///
/// All operations take the same lock, and a mutating operation keeps it
/// through its GPIO writes and the snapshot write, so the stored snapshot
/// always matches some state the registry has actually been in.
pub struct ChannelRegistry<B: GpioBackend> {
    backend: Arc<B>,
    channels: Mutex<Vec<Channel>>,
    snapshot: Option<SnapshotSlot>,
    debounce: Duration,
    indicator: Option<Indicator>,
}

impl<B: GpioBackend> ChannelRegistry<B> {
    /// Configures every channel pin, restores the saved snapshot when
    /// persistence is enabled and drives the resulting levels.
    ///
    /// Any GPIO failure here aborts construction.
    pub fn new(
        config: &AppConfig,
        backend: Arc<B>,
        store: Option<Arc<dyn StateStore>>,
    ) -> Result<Self, AppError> {
        let snapshot = match (config.persistence.enabled, store) {
            (true, Some(store)) => Some(SnapshotSlot::new(
                store,
                &config.persistence.namespace,
                &config.persistence.key,
            )),
            (true, None) => {
                return Err(AppError::Config(
                    "persistence is enabled but no state store was provided".into(),
                ));
            }
            (false, _) => None,
        };

        let mut channels: Vec<Channel> = config
            .channels
            .iter()
            .map(|c| Channel {
                name: c.name.clone(),
                pin: c.pin,
                polarity: config.polarity_of(c),
                state: config.default_state,
                last_toggle: None,
            })
            .collect();

        for channel in &channels {
            let off = channel.polarity.level_for(ChannelState::Off);
            backend
                .configure_output(channel.pin, off)
                .inspect_err(|e| {
                    error!("Failed to configure GPIO {} for {}: {e}", channel.pin, channel.name)
                })?;
            info!("Configured GPIO {} for {}", channel.pin, channel.name);
        }

        let indicator = match &config.indicator {
            Some(led) => {
                backend.configure_output(led.pin, Level::Low)?;
                info!("Status indicator initialized on GPIO {}", led.pin);
                Some(Indicator {
                    pin: led.pin,
                    on_time: Duration::from_millis(led.blink_ms),
                    count: led.blink_count,
                })
            }
            None => None,
        };

        if let Some(slot) = &snapshot {
            match slot.load() {
                Ok(Some(saved)) => {
                    for (i, channel) in channels.iter_mut().enumerate() {
                        channel.state = saved.state_of(i);
                    }
                }
                Ok(None) => info!("No saved states found, using defaults"),
                Err(e) => warn!("Could not read saved states, using defaults: {e}"),
            }
        }

        for channel in &channels {
            backend
                .write_level(channel.pin, channel.level())
                .map_err(|e| AppError::GpioConfiguration(format!("pin {}: {e}", channel.pin)))?;
            info!("{} initialized: {}", channel.name, channel.state.label());
        }

        Ok(Self {
            backend,
            channels: Mutex::new(channels),
            snapshot,
            debounce: Duration::from_millis(config.debounce_ms),
            indicator,
        })
    }

    pub fn count(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn get_state(&self, id: usize) -> Result<ChannelState, AppError> {
        self.channels
            .lock()
            .get(id)
            .map(|c| c.state)
            .ok_or(AppError::ChannelNotFound(id))
    }

    pub fn get_info(&self, id: usize) -> Result<ChannelInfo, AppError> {
        self.channels
            .lock()
            .get(id)
            .map(|c| Self::info(id, c))
            .ok_or(AppError::ChannelNotFound(id))
    }

    /// Every channel in id order, read under one lock.
    pub fn list(&self) -> Vec<ChannelInfo> {
        self.channels
            .lock()
            .iter()
            .enumerate()
            .map(|(id, c)| Self::info(id, c))
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_states(self.channels.lock().iter().map(|c| c.state))
    }

    /// Forces `id` to `desired`, ignoring debounce. Returns the previous state.
    pub fn set_state(&self, id: usize, desired: ChannelState) -> Result<ChannelState, AppError> {
        let mut channels = self.channels.lock();
        let channel = channels.get_mut(id).ok_or(AppError::ChannelNotFound(id))?;

        let previous = channel.state;
        channel.state = desired;
        self.drive(channel);
        info!("{} set to {}", channel.name, desired.label());

        self.blink();
        self.persist(&channels);
        Ok(previous)
    }

    /// Flips `id` and returns the new state.
    ///
    /// Inside the debounce window of the last accepted toggle this changes
    /// nothing and returns the current state.
    pub fn toggle(&self, id: usize) -> Result<ChannelState, AppError> {
        let mut channels = self.channels.lock();
        let channel = channels.get_mut(id).ok_or(AppError::ChannelNotFound(id))?;

        let now = Instant::now();
        if let Some(last) = channel.last_toggle
            && now.duration_since(last) < self.debounce
        {
            warn!("Toggle ignored (debounce): {}", channel.name);
            return Ok(channel.state);
        }

        channel.state = channel.state.flipped();
        channel.last_toggle = Some(now);
        self.drive(channel);
        let state = channel.state;
        info!("{} toggled to {}", channel.name, state.label());

        self.blink();
        self.persist(&channels);
        Ok(state)
    }

    pub fn all_on(&self) {
        self.set_all(ChannelState::On);
    }

    pub fn all_off(&self) {
        self.set_all(ChannelState::Off);
    }

    fn set_all(&self, desired: ChannelState) {
        info!("Turning all relays {}", desired.label());
        let mut channels = self.channels.lock();
        for channel in channels.iter_mut() {
            channel.state = desired;
            self.drive(channel);
        }
        // one write for the whole batch
        self.persist(&channels);
    }

    fn info(id: usize, channel: &Channel) -> ChannelInfo {
        ChannelInfo {
            id,
            name: channel.name.clone(),
            pin: channel.pin,
            polarity: channel.polarity,
            state: channel.state,
        }
    }

    fn drive(&self, channel: &Channel) {
        if let Err(e) = self.backend.write_level(channel.pin, channel.level()) {
            error!("Failed to drive GPIO {} for {}: {e}", channel.pin, channel.name);
        }
    }

    fn persist(&self, channels: &[Channel]) {
        let Some(slot) = &self.snapshot else {
            return;
        };
        let snapshot = Snapshot::from_states(channels.iter().map(|c| c.state));
        if let Err(e) = slot.save(snapshot) {
            error!("Failed to save states: {e}");
        }
    }

    fn blink(&self) {
        let Some(led) = &self.indicator else {
            return;
        };
        for i in 0..led.count {
            if let Err(e) = self.backend.write_level(led.pin, Level::High) {
                warn!("Status indicator write failed: {e}");
                return;
            }
            std::thread::sleep(led.on_time);
            if let Err(e) = self.backend.write_level(led.pin, Level::Low) {
                warn!("Status indicator write failed: {e}");
                return;
            }
            if i + 1 < led.count {
                std::thread::sleep(led.on_time);
            }
        }
    }
}
