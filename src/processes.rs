// Process inventory collector.
//
// Holds the current snapshot of running processes and the derived
// filter/sort/search views the UI consumes. The snapshot is replaced
// wholesale on every refresh; nothing is mutated in place and no identity
// persists across refreshes beyond the (name, pid) pair.

use serde::{Deserialize, Serialize};
use sysinfo::{ProcessesToUpdate, System};

use crate::error::Error;
use crate::exec::CommandRunner;
use crate::guard;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub name: String,
    pub pid: u32,
    /// Resident memory in bytes.
    pub memory: u64,
    /// Session-based classification; `None` when the collector variant
    /// does not report a session (in-process snapshot).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_service: Option<bool>,
}

/// Collector strategy. The original tooling shipped incompatible variants,
/// so both are kept selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListFormat {
    /// `tasklist /FO CSV /NH` text output.
    TasklistCsv,
    /// In-process snapshot via sysinfo.
    SystemSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    All,
    Services,
    Apps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Name,
    Pid,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Split one tasklist CSV line into its quoted fields.
///
/// Fields are comma separated and individually double-quoted; commas inside
/// quotes (thousands separators in the memory column) must not split.
fn split_csv_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Strip thousands separators and the unit suffix, keep the integral part,
/// and normalize to bytes (tasklist reports kilobytes).
fn parse_memory_field(field: &str) -> u64 {
    let digits: String = field.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u64>().unwrap_or(0).saturating_mul(1024)
}

/// Parse `tasklist /FO CSV /NH` output.
///
/// Line grammar: `"name","pid","session name","session#","mem usage"`.
/// Lines with fewer than 5 fields, or a non-numeric pid column, are dropped
/// silently (covers blank lines and the "no tasks" message).
fn parse_tasklist_csv(stdout: &str) -> Vec<ProcessRecord> {
    let mut records = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields = split_csv_fields(line);
        if fields.len() < 5 {
            continue;
        }

        let Ok(pid) = fields[1].trim().parse::<u32>() else {
            continue;
        };

        let session = fields[2].trim();
        let is_service = Some(session.eq_ignore_ascii_case("services"));

        records.push(ProcessRecord {
            name: fields[0].trim().to_string(),
            pid,
            memory: parse_memory_field(&fields[4]),
            is_service,
        });
    }

    records
}

fn collect_system_snapshot() -> Vec<ProcessRecord> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    sys.processes()
        .iter()
        .map(|(pid, process)| ProcessRecord {
            name: process.name().to_string_lossy().into_owned(),
            pid: pid.as_u32(),
            memory: process.memory(),
            is_service: None,
        })
        .collect()
}

/// Owns the current process snapshot plus the last refresh error.
pub struct ProcessStore {
    format: ListFormat,
    processes: Vec<ProcessRecord>,
    error: Option<String>,
}

impl ProcessStore {
    pub fn new(format: ListFormat) -> Self {
        Self {
            format,
            processes: Vec::new(),
            error: None,
        }
    }

    pub fn snapshot(&self) -> &[ProcessRecord] {
        &self.processes
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the snapshot from the configured collector.
    ///
    /// Failures never propagate past this boundary: the snapshot is emptied
    /// and a human-readable error is stored instead.
    pub fn refresh(&mut self, runner: &dyn CommandRunner) {
        match self.collect(runner) {
            Ok(processes) => {
                self.processes = processes;
                self.error = None;
            }
            Err(e) => {
                log::error!("Failed to refresh process list: {}", e);
                self.processes = Vec::new();
                self.error = Some(format!("Failed to fetch process list: {}", e));
            }
        }
    }

    fn collect(&self, runner: &dyn CommandRunner) -> Result<Vec<ProcessRecord>, Error> {
        match self.format {
            ListFormat::TasklistCsv => {
                let output = runner.run("tasklist", &["/FO", "CSV", "/NH"])?;
                if !output.success() {
                    return Err(Error::Command(format!(
                        "tasklist exited with {:?}: {}",
                        output.exit_code,
                        output.error_text()
                    )));
                }
                Ok(parse_tasklist_csv(&output.stdout))
            }
            ListFormat::SystemSnapshot => Ok(collect_system_snapshot()),
        }
    }

    /// Derived copy of the snapshot: category filter plus a stable sort.
    /// Strings compare case-sensitively, numbers numerically; ties keep
    /// snapshot order.
    pub fn get_filtered(
        &self,
        filter: FilterType,
        sort_key: Option<SortKey>,
        sort_order: SortOrder,
    ) -> Vec<ProcessRecord> {
        let mut result: Vec<ProcessRecord> = self
            .processes
            .iter()
            .filter(|p| match filter {
                FilterType::All => true,
                FilterType::Services => p.is_service == Some(true),
                FilterType::Apps => p.is_service != Some(true),
            })
            .cloned()
            .collect();

        if let Some(key) = sort_key {
            result.sort_by(|a, b| {
                let ordering = match key {
                    SortKey::Name => a.name.cmp(&b.name),
                    SortKey::Pid => a.pid.cmp(&b.pid),
                    SortKey::Memory => a.memory.cmp(&b.memory),
                };
                match sort_order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        result
    }

    /// `get_filtered` narrowed further by a case-insensitive substring
    /// match on the process name. A blank term matches everything.
    pub fn get_by_search(
        &self,
        term: &str,
        filter: FilterType,
        sort_key: Option<SortKey>,
        sort_order: SortOrder,
    ) -> Vec<ProcessRecord> {
        let mut result = self.get_filtered(filter, sort_key, sort_order);

        let term = term.trim();
        if !term.is_empty() {
            let term = term.to_lowercase();
            result.retain(|p| p.name.to_lowercase().contains(&term));
        }
        result
    }

    /// Snapshot-only query; never triggers a refresh.
    pub fn is_process_running(&self, name: &str) -> bool {
        self.processes
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Snapshot-only query; never triggers a refresh.
    pub fn pids_for_name(&self, name: &str) -> Vec<u32> {
        self.processes
            .iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.pid)
            .collect()
    }
}

/// Forcefully terminate a process, consulting the guard first.
///
/// A protected target is refused silently: logged, and `Ok` returned so
/// bulk sweeps keep going. A failed `taskkill` is a command error.
pub fn terminate_process(runner: &dyn CommandRunner, name: &str, pid: u32) -> Result<(), Error> {
    if guard::is_process_protected(name) {
        log::warn!("Refusing to terminate protected process '{}' (pid {})", name, pid);
        return Ok(());
    }

    let pid_arg = pid.to_string();
    let output = runner.run("taskkill", &["/PID", &pid_arg, "/F"])?;
    if !output.success() {
        return Err(Error::Command(format!(
            "taskkill /PID {} failed: {}",
            pid,
            output.error_text()
        )));
    }

    log::info!("Terminated process '{}' (pid {})", name, pid);
    Ok(())
}

/// Number of logical CPUs, for building affinity masks in the UI.
pub fn cpu_count() -> usize {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.cpus().len()
}

/// Parse an affinity mask sent over IPC as a decimal string.
///
/// The mask crosses the IPC boundary as a string because JSON numbers lose
/// precision above 2^53 and a 64-core mask needs all 64 bits.
pub fn parse_affinity_mask(mask: &str) -> Result<u64, Error> {
    mask.trim()
        .parse::<u64>()
        .map_err(|e| Error::Parse(format!("affinity mask '{}': {}", mask, e)))
}

/// Pin a process to the CPUs set in `mask`.
#[cfg(target_os = "windows")]
pub fn set_process_affinity(pid: u32, mask: u64) -> Result<(), Error> {
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, SetProcessAffinityMask, PROCESS_SET_INFORMATION,
    };

    unsafe {
        let handle = OpenProcess(PROCESS_SET_INFORMATION, false, pid)
            .map_err(|e| Error::Command(format!("failed to open process {}: {}", pid, e)))?;

        let result = SetProcessAffinityMask(handle, mask as usize);
        let _ = CloseHandle(handle);

        result.map_err(|e| {
            Error::Command(format!("failed to set affinity for pid {}: {}", pid, e))
        })?;
    }

    log::info!("Set affinity mask {:#x} for pid {}", mask, pid);
    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn set_process_affinity(_pid: u32, _mask: u64) -> Result<(), Error> {
    Err(Error::Command(
        "process affinity is not supported on this OS".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::MockRunner;

    const TASKLIST_OUTPUT: &str = concat!(
        "\"explorer.exe\",\"4321\",\"Console\",\"1\",\"120,340 K\"\r\n",
        "\"svchost.exe\",\"1200\",\"Services\",\"0\",\"8,204 K\"\r\n",
        "\"cs2.exe\",\"9999\",\"Console\",\"1\",\"1.234 K\"\r\n",
        "\"broken line\"\r\n",
        "\r\n",
    );

    fn store_with(output: &str) -> ProcessStore {
        let runner = MockRunner::new();
        runner.push_ok(output);
        let mut store = ProcessStore::new(ListFormat::TasklistCsv);
        store.refresh(&runner);
        store
    }

    #[test]
    fn csv_memory_parses_to_kib_times_1024() {
        let store = store_with(TASKLIST_OUTPUT);
        let explorer = store
            .snapshot()
            .iter()
            .find(|p| p.name == "explorer.exe")
            .unwrap();
        assert_eq!(explorer.memory, 120_340 * 1024);

        // German locale uses '.' as the thousands separator.
        let cs2 = store.snapshot().iter().find(|p| p.name == "cs2.exe").unwrap();
        assert_eq!(cs2.memory, 1234 * 1024);
    }

    #[test]
    fn short_lines_are_dropped_silently() {
        let store = store_with(TASKLIST_OUTPUT);
        assert_eq!(store.snapshot().len(), 3);
        assert!(store.error().is_none());
    }

    #[test]
    fn session_name_classifies_services() {
        let store = store_with(TASKLIST_OUTPUT);
        let svchost = store
            .snapshot()
            .iter()
            .find(|p| p.name == "svchost.exe")
            .unwrap();
        assert_eq!(svchost.is_service, Some(true));

        let explorer = store
            .snapshot()
            .iter()
            .find(|p| p.name == "explorer.exe")
            .unwrap();
        assert_eq!(explorer.is_service, Some(false));
    }

    #[test]
    fn command_failure_yields_empty_snapshot_and_error() {
        let runner = MockRunner::new();
        runner.push_exit(1, "access denied");
        let mut store = ProcessStore::new(ListFormat::TasklistCsv);
        store.refresh(&runner);

        assert!(store.snapshot().is_empty());
        assert!(store.error().unwrap().contains("access denied"));

        // A later successful refresh clears the error.
        runner.push_ok(TASKLIST_OUTPUT);
        store.refresh(&runner);
        assert!(store.error().is_none());
        assert_eq!(store.snapshot().len(), 3);
    }

    #[test]
    fn spawn_failure_yields_empty_snapshot_and_error() {
        let runner = MockRunner::new();
        runner.push_err("tasklist: program not found");
        let mut store = ProcessStore::new(ListFormat::TasklistCsv);
        store.refresh(&runner);

        assert!(store.snapshot().is_empty());
        assert!(store.error().unwrap().contains("program not found"));
    }

    #[test]
    fn filter_narrows_by_classification() {
        let store = store_with(TASKLIST_OUTPUT);

        let services = store.get_filtered(FilterType::Services, None, SortOrder::Asc);
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "svchost.exe");

        let apps = store.get_filtered(FilterType::Apps, None, SortOrder::Asc);
        assert_eq!(apps.len(), 2);
    }

    #[test]
    fn sort_is_stable_and_directional() {
        let store = store_with(concat!(
            "\"b.exe\",\"2\",\"Console\",\"1\",\"10 K\"\r\n",
            "\"a.exe\",\"3\",\"Console\",\"1\",\"10 K\"\r\n",
            "\"c.exe\",\"1\",\"Console\",\"1\",\"10 K\"\r\n",
        ));

        let by_name = store.get_filtered(FilterType::All, Some(SortKey::Name), SortOrder::Asc);
        let names: Vec<&str> = by_name.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a.exe", "b.exe", "c.exe"]);

        let by_pid_desc = store.get_filtered(FilterType::All, Some(SortKey::Pid), SortOrder::Desc);
        let pids: Vec<u32> = by_pid_desc.iter().map(|p| p.pid).collect();
        assert_eq!(pids, [3, 2, 1]);

        // Equal memory: input order preserved.
        let by_mem = store.get_filtered(FilterType::All, Some(SortKey::Memory), SortOrder::Asc);
        let names: Vec<&str> = by_mem.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["b.exe", "a.exe", "c.exe"]);
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let store = store_with(TASKLIST_OUTPUT);
        let hits = store.get_by_search("expl", FilterType::All, None, SortOrder::Asc);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "explorer.exe");

        let hits = store.get_by_search("EXPL", FilterType::All, None, SortOrder::Asc);
        assert_eq!(hits.len(), 1);

        let all = store.get_by_search("   ", FilterType::All, None, SortOrder::Asc);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn snapshot_queries_never_refresh() {
        let runner = MockRunner::new();
        runner.push_ok(TASKLIST_OUTPUT);
        let mut store = ProcessStore::new(ListFormat::TasklistCsv);
        store.refresh(&runner);
        assert_eq!(runner.invocation_count("tasklist"), 1);

        assert!(store.is_process_running("EXPLORER.EXE"));
        assert_eq!(store.pids_for_name("cs2.exe"), vec![9999]);
        assert_eq!(runner.invocation_count("tasklist"), 1);
    }

    #[test]
    fn terminate_refuses_protected_target_silently() {
        let runner = MockRunner::new();
        let result = terminate_process(&runner, "explorer.exe", 4321);
        assert!(result.is_ok());
        assert_eq!(runner.invocation_count("taskkill"), 0);
    }

    #[test]
    fn terminate_invokes_taskkill_for_unprotected_target() {
        let runner = MockRunner::new();
        runner.push_ok("SUCCESS");
        assert!(terminate_process(&runner, "notepad.exe", 4242).is_ok());
        assert_eq!(runner.invocation_count_with("taskkill", &["/PID", "4242", "/F"]), 1);

        runner.push_exit(128, "not found");
        assert!(terminate_process(&runner, "notepad.exe", 4242).is_err());
    }

    #[test]
    fn cpu_count_reports_at_least_one_core() {
        assert!(cpu_count() >= 1);
    }

    #[test]
    fn affinity_mask_parses_decimal_strings() {
        assert_eq!(parse_affinity_mask("5").unwrap(), 0b101);
        assert_eq!(parse_affinity_mask(" 15 ").unwrap(), 0b1111);
        // Full 64-bit mask survives the string round trip.
        assert_eq!(parse_affinity_mask(&u64::MAX.to_string()).unwrap(), u64::MAX);

        assert!(parse_affinity_mask("").is_err());
        assert!(parse_affinity_mask("0xff").is_err());
        assert!(parse_affinity_mask("-1").is_err());
    }
}
