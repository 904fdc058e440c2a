// Game-aware synchronization loop.
//
// A background thread that ticks at the configured polling interval and,
// while the game owns the foreground window, applies the game power plan
// and sweeps the kill list. When the game is not in the foreground the
// default plan is restored. Runs against the shared stores so the command
// layer and this loop converge on the same snapshots.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::guard;
use crate::processes;
use crate::settings::{AppSettings, SettingsStore};
use crate::state::AppState;
use crate::windows_fg;

pub const GAME_PROCESS_NAME: &str = "cs2.exe";

/// Lower bound on the tick, whatever the setting says.
const MIN_POLL_INTERVAL_MS: u64 = 1000;

pub fn start_sync_thread(state: Arc<AppState>, settings: Arc<SettingsStore>) {
    thread::spawn(move || {
        // Last guid actually activated by this loop; skips redundant
        // powercfg calls across ticks.
        let mut last_applied_guid = String::new();

        loop {
            let interval = settings
                .snapshot()
                .polling_interval_ms
                .max(MIN_POLL_INTERVAL_MS);
            thread::sleep(Duration::from_millis(interval));

            let cfg = settings.snapshot();
            if !cfg.power_plan_management_active && !cfg.process_management_active {
                continue;
            }

            let in_game = windows_fg::foreground_process_name()
                .map(|name| name.eq_ignore_ascii_case(GAME_PROCESS_NAME))
                .unwrap_or(false);

            tick(&state, &cfg, in_game, &mut last_applied_guid);
        }
    });
}

/// One pass of the synchronization logic.
fn tick(state: &AppState, cfg: &AppSettings, in_game: bool, last_applied_guid: &mut String) {
    if cfg.power_plan_management_active {
        let target = if in_game {
            &cfg.power_plan_cs2
        } else {
            &cfg.power_plan_default
        };

        // Empty guid = no selection; set_active treats it as a no-op, but
        // skipping here also keeps last_applied_guid meaningful.
        if !target.guid.is_empty() && target.guid != *last_applied_guid {
            let mut power = state.power.lock().unwrap();
            match power.set_active(state.runner.as_ref(), &target.guid) {
                Ok(()) => {
                    log::info!(
                        "Activated power plan '{}' ({})",
                        target.name,
                        if in_game { "in game" } else { "default" }
                    );
                    *last_applied_guid = target.guid.clone();
                }
                Err(e) => {
                    log::error!("Power plan sync failed: {}", e);
                    // Retry on the next tick rather than assuming success.
                    last_applied_guid.clear();
                }
            }
        }
    }

    if cfg.process_management_active && in_game && !cfg.processes_to_kill.is_empty() {
        let mut procs = state.processes.lock().unwrap();
        procs.refresh(state.runner.as_ref());

        for name in &cfg.processes_to_kill {
            if guard::is_process_protected(name) {
                log::warn!("Kill list contains protected process '{}', skipping", name);
                continue;
            }
            for pid in procs.pids_for_name(name) {
                if let Err(e) = processes::terminate_process(state.runner.as_ref(), name, pid) {
                    log::warn!("Failed to terminate '{}' (pid {}): {}", name, pid, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::MockRunner;
    use crate::power::{PlanListFormat, PowerPlanStore};
    use crate::processes::{ListFormat, ProcessStore};
    use crate::settings::PowerPlanChoice;
    use std::sync::Mutex;

    const PLAN_LIST: &str =
        "Power Scheme GUID: 8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c  (High performance) *\n";

    fn test_state(runner: Arc<MockRunner>) -> AppState {
        AppState {
            processes: Mutex::new(ProcessStore::new(ListFormat::TasklistCsv)),
            power: Mutex::new(PowerPlanStore::new(PlanListFormat::LineGrammar)),
            runner,
        }
    }

    fn game_plan_settings() -> AppSettings {
        AppSettings {
            power_plan_management_active: true,
            power_plan_cs2: PowerPlanChoice {
                name: "High performance".into(),
                guid: "8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c".into(),
            },
            ..AppSettings::default()
        }
    }

    #[test]
    fn applies_game_plan_once_while_in_game() {
        let runner = Arc::new(MockRunner::new());
        runner.push_ok(""); // setactive
        runner.push_ok(PLAN_LIST); // reconciling list

        let state = test_state(runner.clone());
        let cfg = game_plan_settings();
        let mut last = String::new();

        tick(&state, &cfg, true, &mut last);
        assert_eq!(runner.invocation_count_with("powercfg", &["/setactive"]), 1);
        assert_eq!(last, cfg.power_plan_cs2.guid);

        // Same tick again: plan already applied, no further command.
        tick(&state, &cfg, true, &mut last);
        assert_eq!(runner.invocation_count_with("powercfg", &["/setactive"]), 1);
    }

    #[test]
    fn default_plan_with_empty_guid_is_skipped() {
        let runner = Arc::new(MockRunner::new());
        let state = test_state(runner.clone());
        let cfg = game_plan_settings(); // power_plan_default left empty
        let mut last = String::new();

        tick(&state, &cfg, false, &mut last);
        assert!(runner.invocations.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_activation_retries_on_next_tick() {
        let runner = Arc::new(MockRunner::new());
        runner.push_exit(1, "nope"); // setactive
        runner.push_ok(PLAN_LIST); // reconcile

        let state = test_state(runner.clone());
        let cfg = game_plan_settings();
        let mut last = String::new();

        tick(&state, &cfg, true, &mut last);
        assert!(last.is_empty());

        runner.push_ok(""); // setactive, this time fine
        runner.push_ok(PLAN_LIST);
        tick(&state, &cfg, true, &mut last);
        assert_eq!(last, cfg.power_plan_cs2.guid);
    }

    #[test]
    fn kill_sweep_spares_protected_names() {
        let runner = Arc::new(MockRunner::new());
        // tasklist refresh
        runner.push_ok(concat!(
            "\"discord.exe\",\"100\",\"Console\",\"1\",\"50,000 K\"\r\n",
            "\"explorer.exe\",\"200\",\"Console\",\"1\",\"80,000 K\"\r\n",
        ));
        runner.push_ok("SUCCESS"); // taskkill discord

        let state = test_state(runner.clone());
        let cfg = AppSettings {
            process_management_active: true,
            processes_to_kill: vec!["discord.exe".into(), "explorer.exe".into()],
            ..AppSettings::default()
        };
        let mut last = String::new();

        tick(&state, &cfg, true, &mut last);
        assert_eq!(runner.invocation_count_with("taskkill", &["/PID", "100", "/F"]), 1);
        assert_eq!(runner.invocation_count("taskkill"), 1);
    }

    #[test]
    fn kill_sweep_only_runs_in_game() {
        let runner = Arc::new(MockRunner::new());
        let state = test_state(runner.clone());
        let cfg = AppSettings {
            process_management_active: true,
            processes_to_kill: vec!["discord.exe".into()],
            ..AppSettings::default()
        };
        let mut last = String::new();

        tick(&state, &cfg, false, &mut last);
        assert!(runner.invocations.lock().unwrap().is_empty());
    }
}
