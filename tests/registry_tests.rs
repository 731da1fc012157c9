use std::sync::Arc;
use std::thread;
use std::time::Duration;

use relayd::{
    AppConfig, AppError, ChannelRegistry, ChannelState, Level, MemoryStore, MockGpioBackend,
    Polarity, StateStore,
};

const PINS: [u32; 4] = [16, 17, 18, 19];

fn config_with(extra: &str) -> AppConfig {
    let json = format!(
        r#"
        {{
            "channels": [
                {{ "name": "Light 1", "pin": 16 }},
                {{ "name": "Light 2", "pin": 17 }},
                {{ "name": "Fan 1", "pin": 18 }},
                {{ "name": "Fan 2", "pin": 19 }}
            ]{extra}
        }}
        "#
    );
    AppConfig::from_json(&json).expect("valid sample config")
}

fn sample_config() -> AppConfig {
    config_with("")
}

struct Rig {
    backend: Arc<MockGpioBackend>,
    store: Arc<MemoryStore>,
}

impl Rig {
    fn new() -> Self {
        Self {
            backend: Arc::new(MockGpioBackend::default()),
            store: Arc::new(MemoryStore::default()),
        }
    }

    fn store(&self) -> Option<Arc<dyn StateStore>> {
        let store: Arc<dyn StateStore> = self.store.clone();
        Some(store)
    }

    fn registry(&self, config: &AppConfig) -> ChannelRegistry<MockGpioBackend> {
        ChannelRegistry::new(config, self.backend.clone(), self.store()).expect("registry init")
    }
}

fn states(registry: &ChannelRegistry<MockGpioBackend>) -> Vec<ChannelState> {
    (0..registry.count())
        .map(|id| registry.get_state(id).unwrap())
        .collect()
}

#[test]
fn boots_with_defaults_when_nothing_saved() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());

    assert_eq!(registry.count(), 4);
    assert_eq!(states(&registry), vec![ChannelState::Off; 4]);
    // active-low: off is driven high
    for pin in PINS {
        assert_eq!(rig.backend.level(pin), Some(Level::High));
    }
    assert_eq!(rig.store.write_count(), 0);
}

#[test]
fn default_state_on_is_applied_at_boot() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "default_state": "on""#));

    assert_eq!(states(&registry), vec![ChannelState::On; 4]);
    assert_eq!(rig.backend.level(16), Some(Level::Low));
}

#[test]
fn get_info_reports_configuration_and_state() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());

    let info = registry.get_info(2).unwrap();
    assert_eq!(info.id, 2);
    assert_eq!(info.name, "Fan 1");
    assert_eq!(info.pin, 18);
    assert_eq!(info.polarity, Polarity::ActiveLow);
    assert_eq!(info.state, ChannelState::Off);

    let list = registry.list();
    assert_eq!(list.len(), 4);
    assert!(list.iter().enumerate().all(|(i, c)| c.id == i));
}

#[test]
fn toggle_twice_outside_window_restores_state() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "debounce_ms": 20"#));

    for id in 0..registry.count() {
        let original = registry.get_state(id).unwrap();
        assert_eq!(registry.toggle(id).unwrap(), original.flipped());
        thread::sleep(Duration::from_millis(40));
        assert_eq!(registry.toggle(id).unwrap(), original);
        assert_eq!(registry.get_state(id).unwrap(), original);
    }
}

#[test]
fn toggle_inside_window_is_silent_no_op() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "debounce_ms": 10000"#));

    let first = registry.toggle(0).unwrap();
    let writes = rig.backend.writes_to(16).len();
    let saves = rig.store.write_count();

    let second = registry.toggle(0).unwrap();

    assert_eq!(first, ChannelState::On);
    assert_eq!(second, first);
    assert_eq!(registry.get_state(0).unwrap(), ChannelState::On);
    assert_eq!(rig.backend.writes_to(16).len(), writes);
    assert_eq!(rig.store.write_count(), saves);
}

#[test]
fn debounce_is_per_channel() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "debounce_ms": 10000"#));

    assert_eq!(registry.toggle(0).unwrap(), ChannelState::On);
    assert_eq!(registry.toggle(1).unwrap(), ChannelState::On);
}

#[test]
fn set_state_bypasses_debounce_and_returns_previous() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "debounce_ms": 10000"#));

    registry.toggle(0).unwrap();
    assert_eq!(
        registry.set_state(0, ChannelState::Off).unwrap(),
        ChannelState::On
    );
    assert_eq!(
        registry.set_state(0, ChannelState::Off).unwrap(),
        ChannelState::Off
    );
    assert_eq!(registry.get_state(0).unwrap(), ChannelState::Off);
}

#[test]
fn active_low_drives_low_for_on() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());

    registry.set_state(1, ChannelState::On).unwrap();
    assert_eq!(rig.backend.level(17), Some(Level::Low));

    registry.set_state(1, ChannelState::Off).unwrap();
    assert_eq!(rig.backend.level(17), Some(Level::High));
}

#[test]
fn active_high_drives_high_for_on() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "active_low": false"#));

    assert_eq!(rig.backend.level(17), Some(Level::Low));
    registry.set_state(1, ChannelState::On).unwrap();
    assert_eq!(rig.backend.level(17), Some(Level::High));
}

#[test]
fn per_channel_polarity_overrides_global_flag() {
    let config = AppConfig::from_json(
        r#"
        {
            "channels": [
                { "name": "Relay", "pin": 16 },
                { "name": "Lamp", "pin": 17, "polarity": "active-high" }
            ]
        }
        "#,
    )
    .unwrap();
    let rig = Rig::new();
    let registry = rig.registry(&config);

    registry.all_on();
    assert_eq!(rig.backend.level(16), Some(Level::Low));
    assert_eq!(rig.backend.level(17), Some(Level::High));
}

#[test]
fn bulk_operations_reach_every_channel_with_one_save() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());

    registry.all_on();
    assert_eq!(states(&registry), vec![ChannelState::On; 4]);
    assert_eq!(rig.store.write_count(), 1);
    assert_eq!(registry.snapshot().mask(), 0b1111);

    registry.all_off();
    assert_eq!(states(&registry), vec![ChannelState::Off; 4]);
    assert_eq!(rig.store.write_count(), 2);
    for pin in PINS {
        assert_eq!(rig.backend.level(pin), Some(Level::High));
    }
}

#[test]
fn bulk_operations_ignore_debounce() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "debounce_ms": 10000"#));

    registry.toggle(0).unwrap();
    registry.all_off();
    assert_eq!(registry.get_state(0).unwrap(), ChannelState::Off);
}

#[test]
fn saved_mask_restores_states_at_boot() {
    let rig = Rig::new();
    rig.store
        .put("relay_ctrl", "relay_state", &[0b0101])
        .unwrap();

    let registry = rig.registry(&sample_config());

    assert_eq!(
        states(&registry),
        vec![
            ChannelState::On,
            ChannelState::Off,
            ChannelState::On,
            ChannelState::Off
        ]
    );
    assert_eq!(rig.backend.level(16), Some(Level::Low));
    assert_eq!(rig.backend.level(17), Some(Level::High));
    assert_eq!(rig.backend.level(18), Some(Level::Low));
    assert_eq!(rig.backend.level(19), Some(Level::High));
}

#[test]
fn state_survives_restart() {
    let rig = Rig::new();
    let config = sample_config();
    {
        let registry = rig.registry(&config);
        registry.set_state(0, ChannelState::On).unwrap();
        registry.set_state(2, ChannelState::On).unwrap();
        assert_eq!(registry.snapshot().mask(), 0b0101);
    }

    let restarted = ChannelRegistry::new(
        &config,
        Arc::new(MockGpioBackend::default()),
        rig.store(),
    )
    .unwrap();
    assert_eq!(restarted.snapshot().mask(), 0b0101);
    assert_eq!(
        rig.store.get("relay_ctrl", "relay_state").unwrap(),
        Some(vec![0b0101])
    );
}

#[test]
fn malformed_snapshot_falls_back_to_defaults() {
    let rig = Rig::new();
    rig.store
        .put("relay_ctrl", "relay_state", &[0xff, 0xff])
        .unwrap();

    let registry = rig.registry(&sample_config());
    assert_eq!(states(&registry), vec![ChannelState::Off; 4]);
}

#[test]
fn unreadable_store_falls_back_to_defaults() {
    let rig = Rig::new();
    rig.store.set_unavailable(true);

    let registry = rig.registry(&config_with(r#", "default_state": "on""#));
    assert_eq!(states(&registry), vec![ChannelState::On; 4]);
}

#[test]
fn failed_save_still_changes_state() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());
    rig.store.set_unavailable(true);

    assert_eq!(registry.toggle(3).unwrap(), ChannelState::On);
    assert_eq!(registry.get_state(3).unwrap(), ChannelState::On);
    assert_eq!(rig.backend.level(19), Some(Level::Low));

    registry.all_on();
    assert_eq!(states(&registry), vec![ChannelState::On; 4]);
}

#[test]
fn failed_gpio_write_still_changes_state() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());
    rig.backend.break_pin(18);

    assert_eq!(
        registry.set_state(2, ChannelState::On).unwrap(),
        ChannelState::Off
    );
    assert_eq!(registry.get_state(2).unwrap(), ChannelState::On);
}

#[test]
fn persistence_disabled_never_writes() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(r#", "persistence": { "enabled": false }"#));

    registry.toggle(0).unwrap();
    registry.all_on();
    assert_eq!(rig.store.write_count(), 0);
}

#[test]
fn persistence_enabled_without_store_is_rejected() {
    let result = ChannelRegistry::new(
        &sample_config(),
        Arc::new(MockGpioBackend::default()),
        None,
    );
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn pin_setup_failure_aborts_initialization() {
    let rig = Rig::new();
    rig.backend.break_pin(17);

    let result = ChannelRegistry::new(&sample_config(), rig.backend.clone(), rig.store());
    assert!(matches!(result, Err(AppError::GpioConfiguration(_))));
}

#[test]
fn unknown_ids_are_not_found() {
    let rig = Rig::new();
    let registry = rig.registry(&sample_config());

    assert!(matches!(registry.get_state(4), Err(AppError::ChannelNotFound(4))));
    assert!(matches!(registry.get_info(4), Err(AppError::ChannelNotFound(4))));
    assert!(matches!(registry.toggle(4), Err(AppError::ChannelNotFound(4))));
    assert!(matches!(
        registry.set_state(usize::MAX, ChannelState::On),
        Err(AppError::ChannelNotFound(_))
    ));
    assert_eq!(states(&registry), vec![ChannelState::Off; 4]);
}

#[test]
fn indicator_blinks_on_single_channel_changes_only() {
    let rig = Rig::new();
    let registry = rig.registry(&config_with(
        r#", "indicator": { "pin": 2, "blink_ms": 1, "blink_count": 2 }"#,
    ));
    assert_eq!(rig.backend.level(2), Some(Level::Low));

    registry.toggle(0).unwrap();
    assert_eq!(
        rig.backend.writes_to(2),
        vec![Level::High, Level::Low, Level::High, Level::Low]
    );

    registry.all_off();
    assert_eq!(rig.backend.writes_to(2).len(), 4);
}

#[test]
fn concurrent_toggles_are_not_lost() {
    let rig = Rig::new();
    let registry = Arc::new(rig.registry(&config_with(r#", "debounce_ms": 0"#)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                for _ in 0..101 {
                    registry.toggle(1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 808 flips from off
    assert_eq!(registry.get_state(1).unwrap(), ChannelState::Off);
    assert_eq!(rig.store.write_count(), 808);
    assert_eq!(
        rig.store.get("relay_ctrl", "relay_state").unwrap(),
        Some(vec![registry.snapshot().mask()])
    );
    assert_eq!(rig.backend.level(17), Some(Level::High));
}
