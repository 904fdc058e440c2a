use serde::Serialize;
use std::sync::Arc;
use tauri::State;

use crate::processes::{self, FilterType, ProcessRecord, SortKey, SortOrder};
use crate::state::AppState;

/// Snapshot plus the last refresh error, as one payload for the UI.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessListing {
    pub processes: Vec<ProcessRecord>,
    pub error: Option<String>,
}

/// Re-run the collector and return the fresh snapshot.
#[tauri::command]
pub async fn refresh_processes(state: State<'_, Arc<AppState>>) -> Result<ProcessListing, String> {
    let mut store = state.processes.lock().map_err(|e| e.to_string())?;
    store.refresh(state.runner.as_ref());
    Ok(ProcessListing {
        processes: store.snapshot().to_vec(),
        error: store.error().map(String::from),
    })
}

/// Derived view over the current snapshot; never refreshes.
#[tauri::command]
pub async fn get_processes(
    state: State<'_, Arc<AppState>>,
    search: Option<String>,
    filter: Option<FilterType>,
    sort_key: Option<SortKey>,
    sort_order: Option<SortOrder>,
) -> Result<Vec<ProcessRecord>, String> {
    let store = state.processes.lock().map_err(|e| e.to_string())?;
    let filter = filter.unwrap_or(FilterType::All);
    let sort_key = Some(sort_key.unwrap_or(SortKey::Name));
    let sort_order = sort_order.unwrap_or(SortOrder::Asc);

    Ok(match search {
        Some(term) => store.get_by_search(&term, filter, sort_key, sort_order),
        None => store.get_filtered(filter, sort_key, sort_order),
    })
}

#[tauri::command]
pub async fn is_process_running(
    state: State<'_, Arc<AppState>>,
    name: String,
) -> Result<bool, String> {
    let store = state.processes.lock().map_err(|e| e.to_string())?;
    Ok(store.is_process_running(&name))
}

#[tauri::command]
pub async fn get_pids_for_name(
    state: State<'_, Arc<AppState>>,
    name: String,
) -> Result<Vec<u32>, String> {
    let store = state.processes.lock().map_err(|e| e.to_string())?;
    Ok(store.pids_for_name(&name))
}

/// Terminate a process. Protected names are refused (silently, logged).
#[tauri::command]
pub async fn terminate_process(
    state: State<'_, Arc<AppState>>,
    name: String,
    pid: u32,
) -> Result<(), String> {
    processes::terminate_process(state.runner.as_ref(), &name, pid).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_cpu_count() -> Result<usize, String> {
    Ok(processes::cpu_count())
}

/// Pin a process to a CPU set. The mask arrives as a decimal string since
/// JSON numbers cannot carry a full 64-bit mask.
#[tauri::command]
pub async fn set_process_affinity(pid: u32, mask: String) -> Result<(), String> {
    let mask = processes::parse_affinity_mask(&mask).map_err(|e| e.to_string())?;
    processes::set_process_affinity(pid, mask).map_err(|e| e.to_string())
}
