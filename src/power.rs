// Power plan synchronizer.
//
// Wraps `powercfg` invocations: list parsing into `PowerPlan` snapshots and
// activation with reconcile-on-failure. Activation refreshes synchronously
// so every caller converges on one snapshot after any mutation.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::Error;
use crate::exec::CommandRunner;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PowerPlan {
    pub guid: String,
    pub name: String,
    pub is_active: bool,
}

/// Parser strategy for the plan listing output. The original tooling shows
/// three incompatible formats, so all of them stay selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanListFormat {
    /// `powercfg /list` text, matched line by line with a UUID +
    /// parenthesized name + optional trailing `*` grammar. Tolerates any
    /// locale prefix before the UUID.
    LineGrammar,
    /// Whitespace-token variant: lines containing `GUID`, token 3 is the
    /// UUID, name between parentheses, trailing `*` marks the active plan.
    TokenSplit,
    /// A helper binary that emits the plan list as a JSON array.
    Json,
}

fn plan_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"([0-9a-fA-F]{8}-(?:[0-9a-fA-F]{4}-){3}[0-9a-fA-F]{12})[^(]*\((.*?)\)(?:\s*(\*))?",
        )
        .expect("plan line regex is valid")
    })
}

fn parse_line_grammar(stdout: &str) -> Vec<PowerPlan> {
    let re = plan_line_regex();
    stdout
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            Some(PowerPlan {
                guid: caps[1].to_string(),
                name: caps[2].to_string(),
                is_active: caps.get(3).is_some(),
            })
        })
        .collect()
}

fn parse_token_split(stdout: &str) -> Vec<PowerPlan> {
    let mut plans = Vec::new();

    for line in stdout.lines() {
        if !line.contains("GUID") {
            continue;
        }

        // "Power Scheme GUID: <uuid>  (<name>) *"
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        let guid = parts[3].to_string();
        let is_active = line.trim_end().ends_with('*');

        let start = line.find('(');
        let end = line.rfind(')');
        let name = match (start, end) {
            (Some(s), Some(e)) if s < e => line[s + 1..e].to_string(),
            _ => "Unknown".to_string(),
        };

        plans.push(PowerPlan {
            guid,
            name,
            is_active,
        });
    }

    plans
}

fn parse_plan_output(format: PlanListFormat, stdout: &str) -> Result<Vec<PowerPlan>, Error> {
    match format {
        PlanListFormat::LineGrammar => Ok(parse_line_grammar(stdout)),
        PlanListFormat::TokenSplit => Ok(parse_token_split(stdout)),
        PlanListFormat::Json => serde_json::from_str(stdout)
            .map_err(|e| Error::Parse(format!("plan list JSON: {}", e))),
    }
}

/// Owns the current plan snapshot plus loading/error state.
pub struct PowerPlanStore {
    format: PlanListFormat,
    plans: Vec<PowerPlan>,
    is_loading: bool,
    error: Option<String>,
    last_updated: Option<DateTime<Utc>>,
}

impl PowerPlanStore {
    pub fn new(format: PlanListFormat) -> Self {
        Self {
            format,
            plans: Vec::new(),
            is_loading: false,
            error: None,
            last_updated: None,
        }
    }

    pub fn plans(&self) -> &[PowerPlan] {
        &self.plans
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// First plan with the active flag set, or none.
    pub fn active_plan(&self) -> Option<&PowerPlan> {
        self.plans.iter().find(|p| p.is_active)
    }

    /// Replace the snapshot from `powercfg /list`.
    ///
    /// Non-zero exit or empty output is an error (empty snapshot + message).
    /// Zero plans parsed from non-empty output is only a soft warning: the
    /// command worked, the format just didn't match.
    pub fn refresh(&mut self, runner: &dyn CommandRunner) {
        self.is_loading = true;
        self.error = None;

        let result = self.fetch(runner);
        match result {
            Ok(plans) => {
                self.plans = plans;
                self.last_updated = Some(Utc::now());
            }
            Err(e) => {
                log::error!("Failed to refresh power plans: {}", e);
                self.plans = Vec::new();
                self.error = Some(e.to_string());
            }
        }
        self.is_loading = false;
    }

    fn fetch(&self, runner: &dyn CommandRunner) -> Result<Vec<PowerPlan>, Error> {
        let output = runner.run("powercfg", &["/list"])?;
        if !output.success() {
            return Err(Error::Command(format!(
                "'powercfg /list' exited with {:?}: {}",
                output.exit_code,
                output.error_text()
            )));
        }

        if output.stdout.trim().is_empty() {
            return Err(Error::Parse("'powercfg /list' returned empty output".into()));
        }

        let plans = parse_plan_output(self.format, &output.stdout)?;
        if plans.is_empty() {
            log::warn!(
                "Parsed no power plans from non-empty 'powercfg /list' output ({:?} format)",
                self.format
            );
        }
        Ok(plans)
    }

    /// Activate a plan and refresh to the actual system state.
    ///
    /// An empty guid means "no selection" and must not invoke the command.
    /// On failure the error is recorded, exactly one reconciling refresh
    /// runs (never assume the activation took effect), and the error is
    /// returned for the caller to surface.
    pub fn set_active(&mut self, runner: &dyn CommandRunner, guid: &str) -> Result<(), Error> {
        if guid.is_empty() {
            log::info!("set_active called with empty GUID, no action taken");
            return Ok(());
        }

        self.is_loading = true;
        self.error = None;

        let result = match runner.run("powercfg", &["/setactive", guid]) {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => Err(Error::Command(format!(
                "Failed to set active power plan {}: {}",
                guid,
                output.error_text()
            ))),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            log::error!("{}", e);
            self.error = Some(e.to_string());
            self.refresh(runner);
            // refresh() cleared the error field with the stale state gone;
            // keep the activation failure visible.
            if self.error.is_none() {
                self.error = Some(e.to_string());
            }
            return Err(e);
        }

        self.refresh(runner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::MockRunner;

    const POWERCFG_LIST: &str = concat!(
        "Existing Power Schemes (* Active)\n",
        "-----------------------------------\n",
        "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)\n",
        "Power Scheme GUID: 8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c  (High performance) *\n",
        "Power Scheme GUID: a1841308-3541-4fab-bc81-f71556f20b4a  (Power saver)\n",
    );

    #[test]
    fn line_grammar_extracts_guid_name_and_marker() {
        let plans = parse_line_grammar(POWERCFG_LIST);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].guid, "381b4222-f694-41f0-9685-ff5bb260df2e");
        assert_eq!(plans[0].name, "Balanced");
        assert!(!plans[0].is_active);
        assert!(plans[1].is_active);
    }

    #[test]
    fn line_grammar_tolerates_locale_prefix() {
        let german =
            "GUID des Energieschemas: 381b4222-f694-41f0-9685-ff5bb260df2e  (Ausbalanciert) *\n";
        let plans = parse_line_grammar(german);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].name, "Ausbalanciert");
        assert!(plans[0].is_active);
    }

    #[test]
    fn token_split_parses_the_same_listing() {
        let plans = parse_token_split(POWERCFG_LIST);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[2].guid, "a1841308-3541-4fab-bc81-f71556f20b4a");
        assert_eq!(plans[1].name, "High performance");
        assert!(plans[1].is_active);
    }

    #[test]
    fn json_variant_round_trips() {
        let json = r#"[{"guid":"A","name":"Balanced","isActive":true}]"#;
        let plans = parse_plan_output(PlanListFormat::Json, json).unwrap();
        assert_eq!(plans[0].guid, "A");
        assert!(plans[0].is_active);

        assert!(parse_plan_output(PlanListFormat::Json, "not json").is_err());
    }

    #[test]
    fn active_plan_is_first_flagged_record() {
        let runner = MockRunner::new();
        runner.push_ok(
            r#"[{"guid":"A","name":"Balanced","isActive":true},{"guid":"B","name":"Saver","isActive":false}]"#,
        );
        let mut store = PowerPlanStore::new(PlanListFormat::Json);
        store.refresh(&runner);

        assert_eq!(store.active_plan().unwrap().guid, "A");
        assert!(store.last_updated().is_some());
    }

    #[test]
    fn refresh_failure_empties_snapshot() {
        let runner = MockRunner::new();
        runner.push_exit(1, "powercfg blew up");
        let mut store = PowerPlanStore::new(PlanListFormat::LineGrammar);
        store.refresh(&runner);

        assert!(store.plans().is_empty());
        assert!(store.error().unwrap().contains("powercfg blew up"));
        assert!(!store.is_loading());
    }

    #[test]
    fn unparseable_output_is_soft() {
        let runner = MockRunner::new();
        runner.push_ok("no plans in here\n");
        let mut store = PowerPlanStore::new(PlanListFormat::LineGrammar);
        store.refresh(&runner);

        assert!(store.plans().is_empty());
        assert!(store.error().is_none());
    }

    #[test]
    fn set_active_with_empty_guid_is_a_no_op() {
        let runner = MockRunner::new();
        let mut store = PowerPlanStore::new(PlanListFormat::LineGrammar);

        assert!(store.set_active(&runner, "").is_ok());
        assert_eq!(runner.invocations.lock().unwrap().len(), 0);
        assert!(store.error().is_none());
    }

    #[test]
    fn failed_activation_reconciles_with_exactly_one_refresh() {
        let runner = MockRunner::new();
        runner.push_exit(1, "invalid parameter");
        runner.push_ok(POWERCFG_LIST);

        let mut store = PowerPlanStore::new(PlanListFormat::LineGrammar);
        let result = store.set_active(&runner, "not-a-guid");

        assert!(result.is_err());
        assert_eq!(runner.invocation_count_with("powercfg", &["/setactive"]), 1);
        assert_eq!(runner.invocation_count_with("powercfg", &["/list"]), 1);
        assert!(store.error().unwrap().contains("invalid parameter"));
        // Reconciled to the actual system state.
        assert_eq!(store.plans().len(), 3);
    }

    #[test]
    fn successful_activation_refreshes_synchronously() {
        let runner = MockRunner::new();
        runner.push_ok(""); // setactive
        runner.push_ok(POWERCFG_LIST);

        let mut store = PowerPlanStore::new(PlanListFormat::LineGrammar);
        let result = store.set_active(&runner, "8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c");

        assert!(result.is_ok());
        assert_eq!(runner.invocation_count_with("powercfg", &["/list"]), 1);
        assert_eq!(
            store.active_plan().unwrap().guid,
            "8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c"
        );
    }
}
