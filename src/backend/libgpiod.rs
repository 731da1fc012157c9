use std::path::PathBuf;

use libgpiod::{chip::Chip, line, request};
use parking_lot::{FairMutex, RwLock};
use rustc_hash::FxHashMap;

use crate::config::OutputDrive;
use crate::error::AppError;
use crate::gpio::{GpioBackend, Level};

pub struct LibgpiodBackend {
    chip: String,
    drive: OutputDrive,
    lines: RwLock<FxHashMap<u32, FairMutex<request::Request>>>, // keyed by line offset
}

impl LibgpiodBackend {
    pub fn new(chip: &str, drive: OutputDrive) -> Result<Self, AppError> {
        // fail early if the chip is missing rather than on the first request
        Self::open_chip(chip)?;

        Ok(Self {
            chip: chip.to_string(),
            drive,
            lines: RwLock::new(FxHashMap::default()),
        })
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| AppError::GpioConfiguration(format!("open chip {path}: {e}")))
    }

    fn to_value(level: Level) -> line::Value {
        match level {
            Level::Low => line::Value::InActive,
            Level::High => line::Value::Active,
        }
    }

    fn make_line_settings(&self, initial: Level) -> Result<line::Settings, AppError> {
        let mut ls = line::Settings::new()
            .map_err(|e| AppError::GpioConfiguration(format!("libgpiod settings: {e}")))?;

        ls.set_direction(line::Direction::Output)
            .map_err(|e| AppError::GpioConfiguration(format!("set direction: {e}")))?;
        ls.set_drive(match self.drive {
            OutputDrive::PushPull => line::Drive::PushPull,
            OutputDrive::OpenDrain => line::Drive::OpenDrain,
        })
        .map_err(|e| AppError::GpioConfiguration(format!("set drive: {e}")))?;
        ls.set_output_value(Self::to_value(initial))
            .map_err(|e| AppError::GpioConfiguration(format!("set output value: {e}")))?;

        Ok(ls)
    }

    fn request_line(&self, offset: u32, settings: line::Settings) -> Result<request::Request, AppError> {
        let mut line_cfg = line::Config::new()
            .map_err(|e| AppError::GpioConfiguration(format!("line config: {e}")))?;
        line_cfg
            .add_line_settings(&[offset], settings)
            .map_err(|e| AppError::GpioConfiguration(format!("line config add settings: {e}")))?;

        let mut req_cfg = request::Config::new()
            .map_err(|e| AppError::GpioConfiguration(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| AppError::GpioConfiguration(format!("request consumer: {e}")))?;

        let chip = Self::open_chip(&self.chip)?;
        chip.request_lines(Some(&req_cfg), &line_cfg)
            .map_err(|e| AppError::GpioConfiguration(format!("request line {offset}: {e}")))
    }
}

impl GpioBackend for LibgpiodBackend {
    fn configure_output(&self, pin: u32, initial: Level) -> Result<(), AppError> {
        let settings = self.make_line_settings(initial)?;
        let request = self.request_line(pin, settings)?;

        // replacing an old request releases its line on drop
        self.lines.write().insert(pin, FairMutex::new(request));
        Ok(())
    }

    fn write_level(&self, pin: u32, level: Level) -> Result<(), AppError> {
        let lines = self.lines.read();
        let request = lines
            .get(&pin)
            .ok_or_else(|| AppError::Gpio(format!("line {pin} not configured as output")))?;

        request
            .lock()
            .set_value(pin, Self::to_value(level))
            .map_err(|e| AppError::Gpio(format!("set value: {e}")))?;
        Ok(())
    }
}
