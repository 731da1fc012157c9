use log::{debug, info};
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, http::KeepAlive, web};
use socket2::{SockRef, TcpKeepalive};

use relayd::{
    Addressing, AppConfig, AppState, ChannelRegistry, FileStore, KeepAliveConfig, StateStore,
};

#[cfg(all(feature = "hardware-gpio", not(feature = "mock-gpio")))]
use relayd::LibgpiodBackend;
#[cfg(any(not(feature = "hardware-gpio"), feature = "mock-gpio"))]
use relayd::MockGpioBackend;

#[cfg(all(feature = "hardware-gpio", not(feature = "mock-gpio")))]
type Backend = LibgpiodBackend;
#[cfg(any(not(feature = "hardware-gpio"), feature = "mock-gpio"))]
type Backend = MockGpioBackend;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RELAYD_CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let config = AppConfig::load_from_file(&config_path)
        .unwrap_or_else(|e| panic!("Failed to load config: {e}"));

    match config.network.addressing {
        Addressing::Dhcp => info!("Network: DHCP on '{}'", config.network.ssid),
        Addressing::Static => info!(
            "Network: static {} via {} on '{}'",
            config.network.static_ip.as_deref().unwrap_or_default(),
            config.network.gateway.as_deref().unwrap_or_default(),
            config.network.ssid
        ),
    }

    let backend = {
        #[cfg(all(feature = "hardware-gpio", not(feature = "mock-gpio")))]
        {
            Arc::new(
                LibgpiodBackend::new(&config.gpio_chip, config.gpio_drive)
                    .unwrap_or_else(|e| panic!("Failed to init libgpiod backend: {e}")),
            )
        }
        #[cfg(any(not(feature = "hardware-gpio"), feature = "mock-gpio"))]
        {
            Arc::new(MockGpioBackend::default())
        }
    };

    let store: Option<Arc<dyn StateStore>> = if config.persistence.enabled {
        let store = FileStore::open(&config.persistence.path)
            .unwrap_or_else(|e| panic!("Failed to open state store: {e}"));
        Some(Arc::new(store))
    } else {
        None
    };

    info!("Initializing relay service...");
    let registry: Arc<ChannelRegistry<Backend>> = Arc::new(
        ChannelRegistry::new(&config, backend, store)
            .unwrap_or_else(|e| panic!("Failed to initialize relays: {e}")),
    );
    info!("Relay service initialized with {} channels", registry.count());

    if config.status_log_interval_secs > 0 {
        let registry = registry.clone();
        let period = Duration::from_secs(config.status_log_interval_secs);
        actix_web::rt::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                debug!("System running, relay states: {:#04x}", registry.snapshot().mask());
            }
        });
    }

    let app_state = AppState {
        registry,
        address: config.advertised_address(),
    };

    let http_cfg = config.http.clone();
    info!(
        "HTTP config: workers={}, max_conn={} ({} per worker), priority={}, stack={}, keep_alive={}",
        http_cfg.workers,
        http_cfg.max_connections,
        http_cfg.connections_per_worker(),
        http_cfg.worker_priority,
        http_cfg.worker_stack_size,
        http_cfg.keep_alive.enabled
    );

    let keep_alive = if http_cfg.keep_alive.enabled {
        KeepAlive::Timeout(Duration::from_secs(http_cfg.keep_alive.idle))
    } else {
        KeepAlive::Disabled
    };

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .configure(AppState::<Backend>::configure)
    })
    .workers(http_cfg.workers)
    .max_connections(http_cfg.connections_per_worker())
    .client_request_timeout(Duration::from_secs(http_cfg.timeout))
    .keep_alive(keep_alive);

    let bind_addrs: String;
    let server = match (&http_cfg.unix_socket, &http_cfg.host) {
        (Some(socket_path), Some(host)) => {
            if Path::new(socket_path).exists() {
                fs::remove_file(socket_path)?;
            }
            bind_addrs = format!("{} and {}", socket_path, host);

            server
                .bind_uds(socket_path)?
                .listen_auto_h2c(tcp_listener(host, &http_cfg.keep_alive)?)?
        }
        (Some(socket_path), None) => {
            if Path::new(socket_path).exists() {
                fs::remove_file(socket_path)?;
            }
            bind_addrs = socket_path.clone();

            server.bind_uds(socket_path)?
        }
        (None, Some(host)) => {
            bind_addrs = host.clone();

            server.listen_auto_h2c(tcp_listener(host, &http_cfg.keep_alive)?)?
        }
        (None, None) => {
            panic!("Config error: either 'http.unix_socket' or 'http.host' must be specified")
        }
    };

    info!("Starting server on {}...", bind_addrs);

    server.run().await
}

/// Binds `host` with TCP keep-alive probes configured on the listening socket;
/// accepted connections inherit them.
fn tcp_listener(host: &str, keep_alive: &KeepAliveConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(host)?;

    if keep_alive.enabled {
        let params = TcpKeepalive::new().with_time(Duration::from_secs(keep_alive.idle));
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let params = params
            .with_interval(Duration::from_secs(keep_alive.interval))
            .with_retries(keep_alive.count);
        SockRef::from(&listener).set_tcp_keepalive(&params)?;
    }

    Ok(listener)
}
