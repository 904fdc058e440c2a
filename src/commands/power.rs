use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

use crate::power::PowerPlan;
use crate::state::AppState;

/// Plan snapshot plus store status, as one payload for the UI.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerPlanListing {
    pub plans: Vec<PowerPlan>,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Re-run `powercfg /list` and return the fresh snapshot.
#[tauri::command]
pub async fn get_power_plans(state: State<'_, Arc<AppState>>) -> Result<PowerPlanListing, String> {
    let mut store = state.power.lock().map_err(|e| e.to_string())?;
    store.refresh(state.runner.as_ref());
    Ok(PowerPlanListing {
        plans: store.plans().to_vec(),
        error: store.error().map(String::from),
        last_updated: store.last_updated(),
    })
}

/// Activate a plan. The store refreshes itself afterwards either way; the
/// error is surfaced so the UI can show a notification.
#[tauri::command]
pub async fn set_active_power_plan(
    state: State<'_, Arc<AppState>>,
    guid: String,
) -> Result<(), String> {
    let mut store = state.power.lock().map_err(|e| e.to_string())?;
    store
        .set_active(state.runner.as_ref(), &guid)
        .map_err(|e| e.to_string())
}

/// Active plan of the current snapshot; never refreshes.
#[tauri::command]
pub async fn get_active_power_plan(
    state: State<'_, Arc<AppState>>,
) -> Result<Option<PowerPlan>, String> {
    let store = state.power.lock().map_err(|e| e.to_string())?;
    Ok(store.active_plan().cloned())
}
