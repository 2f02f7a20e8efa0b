use std::str::FromStr;
use serde::Deserialize;

/// What happens to the rest of a cycle when a task fails.
///
/// - `SkipDependents`: every task downstream of the failed one is marked
///   `Skipped`; unrelated branches keep running (default behaviour).
/// - `FailFast`: additionally, nothing that is still pending anywhere in the
///   cycle gets started. Tasks already running are allowed to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    SkipDependents,
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "skip_dependents" => Ok(FailurePolicy::SkipDependents),
            "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"skip_dependents\" or \"fail_fast\")"
            )),
        }
    }
}
