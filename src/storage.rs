use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::AppError;
use crate::registry::ChannelState;

/// Key-addressed byte storage, grouped by namespace.
pub trait StateStore: Send + Sync {
    /// `Ok(None)` means the key was never written.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, AppError>;
    fn put(&self, namespace: &str, key: &str, value: &[u8]) -> Result<(), AppError>;
}

/// Channel states packed one bit per channel, bit `i` set when channel `i` is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot(u8);

impl Snapshot {
    pub fn from_mask(mask: u8) -> Self {
        Self(mask)
    }

    pub fn from_states<I>(states: I) -> Self
    where
        I: IntoIterator<Item = ChannelState>,
    {
        let mask = states
            .into_iter()
            .take(8)
            .enumerate()
            .filter(|(_, s)| *s == ChannelState::On)
            .fold(0u8, |mask, (i, _)| mask | (1 << i));
        Self(mask)
    }

    pub fn mask(self) -> u8 {
        self.0
    }

    pub fn state_of(self, index: usize) -> ChannelState {
        if index < 8 && self.0 & (1 << index) != 0 {
            ChannelState::On
        } else {
            ChannelState::Off
        }
    }
}

/// The single storage slot the registry snapshot lives in.
#[derive(Clone)]
pub struct SnapshotSlot {
    store: Arc<dyn StateStore>,
    namespace: String,
    key: String,
}

impl SnapshotSlot {
    pub fn new(store: Arc<dyn StateStore>, namespace: &str, key: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    /// Missing and malformed values both read as "never saved".
    pub fn load(&self) -> Result<Option<Snapshot>, AppError> {
        match self.store.get(&self.namespace, &self.key)? {
            None => Ok(None),
            Some(bytes) => match bytes.as_slice() {
                [mask] => {
                    info!("States loaded: {mask:#04x}");
                    Ok(Some(Snapshot::from_mask(*mask)))
                }
                other => {
                    warn!(
                        "Ignoring snapshot {}/{} with unexpected length {}",
                        self.namespace,
                        self.key,
                        other.len()
                    );
                    Ok(None)
                }
            },
        }
    }

    pub fn save(&self, snapshot: Snapshot) -> Result<(), AppError> {
        self.store
            .put(&self.namespace, &self.key, &[snapshot.mask()])?;
        debug!("States saved: {:#04x}", snapshot.mask());
        Ok(())
    }
}
