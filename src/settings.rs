// Settings persistence proxy.
//
// An in-memory settings object whose explicit per-field setters mirror each
// write to the key-value store. The JS original intercepted property writes
// with a Proxy; here every field gets a named setter plus a single-key
// persist, which keeps the write path visible.
//
// Phase machine: Uninitialized -> Loading -> Ready. Writes before Ready are
// suppressed from persistence, as is everything during a bulk operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::Error;
use crate::storage::SettingsBackend;

/// A chosen power plan, stored as a (display name, guid) pair.
/// Empty guid means "no selection".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PowerPlanChoice {
    pub name: String,
    pub guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub autostart_with_windows: bool,
    pub start_minimized: bool,
    pub minimize_to_tray: bool,
    pub polling_interval_ms: u64,
    pub processes_to_kill: Vec<String>,
    #[serde(rename = "powerPlanCS2")]
    pub power_plan_cs2: PowerPlanChoice,
    pub power_plan_default: PowerPlanChoice,
    pub power_plan_management_active: bool,
    pub process_management_active: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            autostart_with_windows: false,
            start_minimized: false,
            minimize_to_tray: true,
            polling_interval_ms: 5000,
            processes_to_kill: Vec::new(),
            power_plan_cs2: PowerPlanChoice::default(),
            power_plan_default: PowerPlanChoice::default(),
            power_plan_management_active: false,
            process_management_active: false,
        }
    }
}

/// Storage keys, matching the persisted camelCase document.
pub mod keys {
    pub const AUTOSTART_WITH_WINDOWS: &str = "autostartWithWindows";
    pub const START_MINIMIZED: &str = "startMinimized";
    pub const MINIMIZE_TO_TRAY: &str = "minimizeToTray";
    pub const POLLING_INTERVAL_MS: &str = "pollingIntervalMs";
    pub const PROCESSES_TO_KILL: &str = "processesToKill";
    pub const POWER_PLAN_CS2: &str = "powerPlanCS2";
    pub const POWER_PLAN_DEFAULT: &str = "powerPlanDefault";
    pub const POWER_PLAN_MANAGEMENT_ACTIVE: &str = "powerPlanManagementActive";
    pub const PROCESS_MANAGEMENT_ACTIVE: &str = "processManagementActive";
}

/// Every known settings field, in load order.
pub const SETTING_KEYS: &[&str] = &[
    keys::AUTOSTART_WITH_WINDOWS,
    keys::START_MINIMIZED,
    keys::MINIMIZE_TO_TRAY,
    keys::POLLING_INTERVAL_MS,
    keys::PROCESSES_TO_KILL,
    keys::POWER_PLAN_CS2,
    keys::POWER_PLAN_DEFAULT,
    keys::POWER_PLAN_MANAGEMENT_ACTIVE,
    keys::PROCESS_MANAGEMENT_ACTIVE,
];

fn field_value(settings: &AppSettings, key: &str) -> Value {
    let result = match key {
        keys::AUTOSTART_WITH_WINDOWS => serde_json::to_value(settings.autostart_with_windows),
        keys::START_MINIMIZED => serde_json::to_value(settings.start_minimized),
        keys::MINIMIZE_TO_TRAY => serde_json::to_value(settings.minimize_to_tray),
        keys::POLLING_INTERVAL_MS => serde_json::to_value(settings.polling_interval_ms),
        keys::PROCESSES_TO_KILL => serde_json::to_value(&settings.processes_to_kill),
        keys::POWER_PLAN_CS2 => serde_json::to_value(&settings.power_plan_cs2),
        keys::POWER_PLAN_DEFAULT => serde_json::to_value(&settings.power_plan_default),
        keys::POWER_PLAN_MANAGEMENT_ACTIVE => {
            serde_json::to_value(settings.power_plan_management_active)
        }
        keys::PROCESS_MANAGEMENT_ACTIVE => serde_json::to_value(settings.process_management_active),
        _ => unreachable!("unknown settings key {}", key),
    };
    result.expect("settings fields serialize to JSON")
}

/// Adopt a stored value into the given field. Returns false (and applies
/// the default) when the stored value has the wrong shape.
fn apply_field(settings: &mut AppSettings, key: &str, value: Value) -> bool {
    fn adopt<T: serde::de::DeserializeOwned>(slot: &mut T, value: Value, default: T) -> bool {
        match serde_json::from_value(value) {
            Ok(v) => {
                *slot = v;
                true
            }
            Err(_) => {
                *slot = default;
                false
            }
        }
    }

    let defaults = AppSettings::default();
    match key {
        keys::AUTOSTART_WITH_WINDOWS => adopt(
            &mut settings.autostart_with_windows,
            value,
            defaults.autostart_with_windows,
        ),
        keys::START_MINIMIZED => {
            adopt(&mut settings.start_minimized, value, defaults.start_minimized)
        }
        keys::MINIMIZE_TO_TRAY => {
            adopt(&mut settings.minimize_to_tray, value, defaults.minimize_to_tray)
        }
        keys::POLLING_INTERVAL_MS => adopt(
            &mut settings.polling_interval_ms,
            value,
            defaults.polling_interval_ms,
        ),
        keys::PROCESSES_TO_KILL => adopt(
            &mut settings.processes_to_kill,
            value,
            defaults.processes_to_kill,
        ),
        keys::POWER_PLAN_CS2 => adopt(&mut settings.power_plan_cs2, value, defaults.power_plan_cs2),
        keys::POWER_PLAN_DEFAULT => adopt(
            &mut settings.power_plan_default,
            value,
            defaults.power_plan_default,
        ),
        keys::POWER_PLAN_MANAGEMENT_ACTIVE => adopt(
            &mut settings.power_plan_management_active,
            value,
            defaults.power_plan_management_active,
        ),
        keys::PROCESS_MANAGEMENT_ACTIVE => adopt(
            &mut settings.process_management_active,
            value,
            defaults.process_management_active,
        ),
        _ => unreachable!("unknown settings key {}", key),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

pub struct SettingsStore {
    backend: Arc<dyn SettingsBackend>,
    values: RwLock<AppSettings>,
    phase: RwLock<Phase>,
    bulk_in_progress: AtomicBool,
}

impl SettingsStore {
    pub fn new(backend: Arc<dyn SettingsBackend>) -> Self {
        Self {
            backend,
            values: RwLock::new(AppSettings::default()),
            phase: RwLock::new(Phase::Uninitialized),
            bulk_in_progress: AtomicBool::new(false),
        }
    }

    /// Current in-memory snapshot.
    pub fn snapshot(&self) -> AppSettings {
        self.values.read().unwrap().clone()
    }

    pub fn set_autostart_with_windows(&self, value: bool) {
        self.update(keys::AUTOSTART_WITH_WINDOWS, |s| {
            s.autostart_with_windows = value
        });
    }

    pub fn set_start_minimized(&self, value: bool) {
        self.update(keys::START_MINIMIZED, |s| s.start_minimized = value);
    }

    pub fn set_minimize_to_tray(&self, value: bool) {
        self.update(keys::MINIMIZE_TO_TRAY, |s| s.minimize_to_tray = value);
    }

    pub fn set_polling_interval_ms(&self, value: u64) {
        self.update(keys::POLLING_INTERVAL_MS, |s| s.polling_interval_ms = value);
    }

    pub fn set_processes_to_kill(&self, value: Vec<String>) {
        self.update(keys::PROCESSES_TO_KILL, |s| s.processes_to_kill = value);
    }

    pub fn set_power_plan_cs2(&self, value: PowerPlanChoice) {
        self.update(keys::POWER_PLAN_CS2, |s| s.power_plan_cs2 = value);
    }

    pub fn set_power_plan_default(&self, value: PowerPlanChoice) {
        self.update(keys::POWER_PLAN_DEFAULT, |s| s.power_plan_default = value);
    }

    pub fn set_power_plan_management_active(&self, value: bool) {
        self.update(keys::POWER_PLAN_MANAGEMENT_ACTIVE, |s| {
            s.power_plan_management_active = value
        });
    }

    pub fn set_process_management_active(&self, value: bool) {
        self.update(keys::PROCESS_MANAGEMENT_ACTIVE, |s| {
            s.process_management_active = value
        });
    }

    /// Update memory synchronously, then mirror the single changed field to
    /// storage unless a bulk operation is in progress or the store is not
    /// ready yet. Persistence failures are logged, not thrown.
    fn update(&self, key: &str, mutate: impl FnOnce(&mut AppSettings)) {
        let value = {
            let mut values = self.values.write().unwrap();
            mutate(&mut values);
            field_value(&values, key)
        };

        if *self.phase.read().unwrap() != Phase::Ready {
            return;
        }
        if self.bulk_in_progress.load(Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.backend.set(key, value) {
            log::error!("Failed to save setting {}: {}", key, e);
        }
    }

    /// Walk every known field: adopt stored values (null or corrupt ones
    /// fall back to the default, persisted immediately), seed missing keys
    /// with defaults. Safe to call repeatedly.
    pub fn load_and_initialize(&self) -> Result<(), Error> {
        *self.phase.write().unwrap() = Phase::Loading;

        let defaults = AppSettings::default();
        let mut result = Ok(());

        for &key in SETTING_KEYS {
            let stored = if self.backend.has(key) {
                self.backend.get(key)
            } else {
                None
            };

            let needs_default = match stored {
                Some(value) if !value.is_null() => {
                    !apply_field(&mut self.values.write().unwrap(), key, value)
                }
                // Key missing, or present but null: use the default.
                _ => {
                    let mut values = self.values.write().unwrap();
                    apply_field(&mut values, key, field_value(&defaults, key));
                    true
                }
            };

            if needs_default {
                if let Err(e) = self.backend.set(key, field_value(&defaults, key)) {
                    log::error!("Failed to persist default for {}: {}", key, e);
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }

        // The store stays usable even if some defaults failed to persist.
        *self.phase.write().unwrap() = Phase::Ready;
        if result.is_ok() {
            log::info!("Settings loaded");
        }
        result
    }

    /// Overwrite every field with its default, both in memory and storage.
    /// The bulk flag suppresses the per-field persistence in `update` while
    /// the loop writes each key itself. Safe to call repeatedly.
    pub fn reset_to_defaults(&self) -> Result<(), Error> {
        self.bulk_in_progress.store(true, Ordering::SeqCst);

        let defaults = AppSettings::default();
        *self.values.write().unwrap() = defaults.clone();

        let mut result = Ok(());
        for &key in SETTING_KEYS {
            if let Err(e) = self.backend.set(key, field_value(&defaults, key)) {
                log::error!("Failed to reset setting {}: {}", key, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.bulk_in_progress.store(false, Ordering::SeqCst);
        if result.is_ok() {
            log::info!("Settings reset to defaults");
        }
        result
    }
}
