use log::{info, warn};
use std::sync::Arc;

use actix_web::{HttpResponse, Responder, guard, http::Method, web};

use crate::error::AppError;
use crate::gpio::GpioBackend;
use crate::registry::{ChannelRegistry, ChannelState};
use crate::response::{self, BulkResult, BulkStatus, ChannelStatus};

pub struct AppState<B: GpioBackend> {
    pub registry: Arc<ChannelRegistry<B>>,
    /// Address printed on the home page.
    pub address: String,
}

impl<B: GpioBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            address: self.address.clone(),
        }
    }
}

/// First path segment after the channel prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    Channel(usize),
}

impl Selector {
    /// Accepts `all` or plain decimal digits naming an id below `count`.
    pub fn parse(raw: &str, count: usize) -> Result<Self, AppError> {
        if raw == "all" {
            return Ok(Selector::All);
        }
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidSelector);
        }
        match raw.parse::<usize>() {
            Ok(id) if id < count => Ok(Selector::Channel(id)),
            _ => Err(AppError::InvalidSelector),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Toggle,
    Status,
    On,
    Off,
}

impl Action {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "toggle" => Some(Action::Toggle),
            "status" => Some(Action::Status),
            "on" => Some(Action::On),
            "off" => Some(Action::Off),
            _ => None,
        }
    }
}

impl<B: GpioBackend + 'static> AppState<B> {
    /// Registers the home page, `/channel/...` and the legacy `/relay/...` alias.
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.service(
            web::resource("/")
                .route(web::get().to(home::<B>))
                .route(
                    web::route()
                        .guard(guard_not_methods(&[Method::GET]))
                        .to(method_not_allowed),
                ),
        )
        .service(Self::api_scope("/channel"))
        .service(Self::api_scope("/relay"));
    }

    pub fn api_scope(base_path: &str) -> actix_web::Scope {
        web::scope(base_path).service(
            web::resource("/{selector}/{action}")
                .route(web::get().to(dispatch::<B>))
                .route(
                    web::route()
                        .guard(guard_not_methods(&[Method::GET]))
                        .to(method_not_allowed),
                ),
        )
    }
}

async fn home<B: GpioBackend + 'static>(state: web::Data<AppState<B>>) -> impl Responder {
    info!("GET /");
    response::home_page(&state.address, &state.registry.list())
}

async fn dispatch<B: GpioBackend + 'static>(
    path: web::Path<(String, String)>,
    state: web::Data<AppState<B>>,
) -> Result<HttpResponse, AppError> {
    let (selector, action) = path.into_inner();
    let registry = &state.registry;

    let selector = Selector::parse(&selector, registry.count())?;
    let Some(action) = Action::parse(&action) else {
        return Ok(HttpResponse::NotFound().finish());
    };

    match selector {
        Selector::All => {
            info!("GET all/{action:?}");
            dispatch_all(registry, action)
        }
        Selector::Channel(id) => {
            info!("GET {id}/{action:?}");
            dispatch_one(registry, id, action).inspect_err(|e| {
                if let AppError::ChannelNotFound(id) = e {
                    warn!("Validated channel id {id} missing from registry");
                }
            })
        }
    }
}

fn dispatch_all<B: GpioBackend>(
    registry: &ChannelRegistry<B>,
    action: Action,
) -> Result<HttpResponse, AppError> {
    match action {
        Action::Status => Ok(response::ok(&BulkStatus::new(&registry.list()))),
        Action::On => {
            registry.all_on();
            Ok(response::ok(&BulkResult::all(ChannelState::On)))
        }
        Action::Off => {
            registry.all_off();
            Ok(response::ok(&BulkResult::all(ChannelState::Off)))
        }
        // no bulk toggle route
        Action::Toggle => Ok(HttpResponse::NotFound().finish()),
    }
}

fn dispatch_one<B: GpioBackend>(
    registry: &ChannelRegistry<B>,
    id: usize,
    action: Action,
) -> Result<HttpResponse, AppError> {
    let info = registry.get_info(id)?;
    let state = match action {
        Action::Status => info.state,
        Action::Toggle => registry.toggle(id)?,
        Action::On => {
            registry.set_state(id, ChannelState::On)?;
            ChannelState::On
        }
        Action::Off => {
            registry.set_state(id, ChannelState::Off)?;
            ChannelState::Off
        }
    };

    Ok(response::ok(&ChannelStatus {
        id,
        name: info.name,
        state: state.as_u8(),
    }))
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
