mod backend;
mod config;
mod error;
mod gpio;
mod registry;
mod response;
mod routes;
mod storage;

pub use config::{
    Addressing, AppConfig, ChannelConfig, HttpConfig, IndicatorConfig, KeepAliveConfig,
    MAX_CHANNELS, NetworkConfig, OutputDrive, PersistenceConfig,
};
pub use error::AppError;
pub use gpio::{GpioBackend, Level, Polarity};
pub use registry::{ChannelInfo, ChannelRegistry, ChannelState};
pub use response::{BulkResult, BulkStatus, ChannelStatus, ErrorBody};
pub use routes::{Action, AppState, Selector};
pub use storage::{Snapshot, SnapshotSlot, StateStore};

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::{FileStore, MemoryStore, MockGpioBackend};
