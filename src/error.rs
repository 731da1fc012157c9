use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::response::{self, ErrorBody};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid relay ID")]
    InvalidSelector,
    #[error("Relay not found")]
    ChannelNotFound(usize),
    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("GPIO configuration failed: {0}")]
    GpioConfiguration(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidSelector => StatusCode::BAD_REQUEST,
            AppError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PersistenceUnavailable(_)
            | AppError::GpioConfiguration(_)
            | AppError::Gpio(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        response::json(
            self.status_code(),
            &ErrorBody {
                error: self.to_string(),
            },
        )
    }
}
