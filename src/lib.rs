use std::sync::Arc;
use std::time::Duration;
use tauri::{
    menu::{Menu, MenuItem},
    tray::{MouseButton, MouseButtonState, TrayIconBuilder, TrayIconEvent},
    AppHandle, Manager,
};
use tauri_plugin_store::StoreExt;

mod commands;
mod error;
mod exec;
mod guard;
mod monitor;
mod power;
mod processes;
mod settings;
mod state;
mod storage;
mod windows_fg;

use settings::SettingsStore;
use state::AppState;
use storage::TauriStoreBackend;

fn show_main_window(app: &AppHandle) {
    if let Some(window) = app.get_webview_window("main") {
        let _ = window.unminimize();
        let _ = window.show();
        let _ = window.set_focus();
    }
}

/// Watch the main window for being minimized and hide it to the tray when
/// the setting asks for it. A 1-second cooperative tick instead of a window
/// event hook: minimize events are unreliable across window states.
fn start_minimize_watcher(app: AppHandle, settings: Arc<SettingsStore>) {
    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_secs(1));

        if !settings.snapshot().minimize_to_tray {
            continue;
        }
        if let Some(window) = app.get_webview_window("main") {
            if let Ok(true) = window.is_minimized() {
                let _ = window.hide();
            }
        }
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_store::Builder::new().build())
        .plugin(tauri_plugin_autostart::init(
            tauri_plugin_autostart::MacosLauncher::LaunchAgent,
            Some(vec![]),
        ))
        .setup(|app| {
            // Settings must be ready before the monitor or any command
            // reads them.
            let store_file = app.store("settings.json")?;
            let backend = Arc::new(TauriStoreBackend::new(store_file));
            let settings = Arc::new(SettingsStore::new(backend));
            if let Err(e) = settings.load_and_initialize() {
                log::error!("Failed to initialize settings: {}", e);
            }

            let state = Arc::new(AppState::new());
            app.manage(state.clone());
            app.manage(settings.clone());

            monitor::start_sync_thread(state, settings.clone());

            let quit_i = MenuItem::with_id(app, "quit", "Quit", true, None::<&str>)?;
            let show_i = MenuItem::with_id(app, "show", "Show", true, None::<&str>)?;
            let menu = Menu::with_items(app, &[&show_i, &quit_i])?;

            let mut tray = TrayIconBuilder::with_id("tray")
                .menu(&menu)
                .show_menu_on_left_click(false)
                .on_menu_event(|app, event| match event.id().as_ref() {
                    "quit" => {
                        app.exit(0);
                    }
                    "show" => show_main_window(app),
                    _ => {}
                })
                .on_tray_icon_event(|tray, event| {
                    if let TrayIconEvent::Click {
                        button: MouseButton::Left,
                        button_state: MouseButtonState::Up,
                        ..
                    } = event
                    {
                        show_main_window(tray.app_handle());
                    }
                });
            if let Some(icon) = app.default_window_icon() {
                tray = tray.icon(icon.clone());
            }
            let _tray = tray.build(app)?;

            if settings.snapshot().start_minimized {
                if let Some(window) = app.get_webview_window("main") {
                    if settings.snapshot().minimize_to_tray {
                        let _ = window.hide();
                    } else {
                        let _ = window.minimize();
                    }
                }
            }

            start_minimize_watcher(app.handle().clone(), settings);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::processes::refresh_processes,
            commands::processes::get_processes,
            commands::processes::is_process_running,
            commands::processes::get_pids_for_name,
            commands::processes::terminate_process,
            commands::processes::get_cpu_count,
            commands::processes::set_process_affinity,
            commands::power::get_power_plans,
            commands::power::set_active_power_plan,
            commands::power::get_active_power_plan,
            commands::settings::get_settings,
            commands::settings::load_settings,
            commands::settings::reset_settings,
            commands::settings::set_autostart_with_windows,
            commands::settings::set_start_minimized,
            commands::settings::set_minimize_to_tray,
            commands::settings::set_polling_interval_ms,
            commands::settings::set_processes_to_kill,
            commands::settings::set_power_plan_cs2,
            commands::settings::set_power_plan_default,
            commands::settings::set_power_plan_management_active,
            commands::settings::set_process_management_active,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
