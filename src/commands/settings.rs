use std::sync::Arc;
use tauri::{AppHandle, State};
use tauri_plugin_autostart::ManagerExt;

use crate::settings::{AppSettings, PowerPlanChoice, SettingsStore};

#[tauri::command]
pub async fn get_settings(store: State<'_, Arc<SettingsStore>>) -> Result<AppSettings, String> {
    Ok(store.snapshot())
}

/// Reload settings from storage, seeding defaults for missing keys.
#[tauri::command]
pub async fn load_settings(store: State<'_, Arc<SettingsStore>>) -> Result<AppSettings, String> {
    store.load_and_initialize().map_err(|e| e.to_string())?;
    Ok(store.snapshot())
}

#[tauri::command]
pub async fn reset_settings(store: State<'_, Arc<SettingsStore>>) -> Result<AppSettings, String> {
    store.reset_to_defaults().map_err(|e| e.to_string())?;
    Ok(store.snapshot())
}

/// Persist the flag and toggle the OS autostart entry to match.
#[tauri::command]
pub async fn set_autostart_with_windows(
    app: AppHandle,
    store: State<'_, Arc<SettingsStore>>,
    enabled: bool,
) -> Result<(), String> {
    store.set_autostart_with_windows(enabled);

    let autolaunch = app.autolaunch();
    let result = if enabled {
        autolaunch.enable()
    } else {
        autolaunch.disable()
    };
    result.map_err(|e| format!("Failed to toggle autostart: {}", e))
}

#[tauri::command]
pub async fn set_start_minimized(
    store: State<'_, Arc<SettingsStore>>,
    enabled: bool,
) -> Result<(), String> {
    store.set_start_minimized(enabled);
    Ok(())
}

#[tauri::command]
pub async fn set_minimize_to_tray(
    store: State<'_, Arc<SettingsStore>>,
    enabled: bool,
) -> Result<(), String> {
    store.set_minimize_to_tray(enabled);
    Ok(())
}

#[tauri::command]
pub async fn set_polling_interval_ms(
    store: State<'_, Arc<SettingsStore>>,
    interval: u64,
) -> Result<(), String> {
    store.set_polling_interval_ms(interval);
    Ok(())
}

#[tauri::command]
pub async fn set_processes_to_kill(
    store: State<'_, Arc<SettingsStore>>,
    names: Vec<String>,
) -> Result<(), String> {
    store.set_processes_to_kill(names);
    Ok(())
}

#[tauri::command]
pub async fn set_power_plan_cs2(
    store: State<'_, Arc<SettingsStore>>,
    plan: PowerPlanChoice,
) -> Result<(), String> {
    store.set_power_plan_cs2(plan);
    Ok(())
}

#[tauri::command]
pub async fn set_power_plan_default(
    store: State<'_, Arc<SettingsStore>>,
    plan: PowerPlanChoice,
) -> Result<(), String> {
    store.set_power_plan_default(plan);
    Ok(())
}

#[tauri::command]
pub async fn set_power_plan_management_active(
    store: State<'_, Arc<SettingsStore>>,
    active: bool,
) -> Result<(), String> {
    store.set_power_plan_management_active(active);
    Ok(())
}

#[tauri::command]
pub async fn set_process_management_active(
    store: State<'_, Arc<SettingsStore>>,
    active: bool,
) -> Result<(), String> {
    store.set_process_management_active(active);
    Ok(())
}
