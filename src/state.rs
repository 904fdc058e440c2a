use std::sync::{Arc, Mutex};

use crate::exec::{CommandRunner, OsCommandRunner};
use crate::power::{PlanListFormat, PowerPlanStore};
use crate::processes::{ListFormat, ProcessStore};

/// Shared application state: the process and power plan snapshots plus the
/// command runner they go through. Managed by Tauri for the command layer
/// and cloned (as an `Arc`) into the monitor thread, so every caller
/// converges on the same snapshots.
pub struct AppState {
    pub processes: Mutex<ProcessStore>,
    pub power: Mutex<PowerPlanStore>,
    pub runner: Arc<dyn CommandRunner>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            // Defaults: the in-process snapshot (the variant the original
            // backend shipped) and the locale-tolerant line grammar.
            processes: Mutex::new(ProcessStore::new(ListFormat::SystemSnapshot)),
            power: Mutex::new(PowerPlanStore::new(PlanListFormat::LineGrammar)),
            runner: Arc::new(OsCommandRunner),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
