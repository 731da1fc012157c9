//! Implementations of the GPIO and snapshot-storage capabilities.

mod file_store;
#[cfg(feature = "hardware-gpio")]
mod libgpiod;
mod memory_store;
mod mock;

pub use file_store::FileStore;
#[cfg(feature = "hardware-gpio")]
pub use libgpiod::LibgpiodBackend;
pub use memory_store::MemoryStore;
pub use mock::MockGpioBackend;
