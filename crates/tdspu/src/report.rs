//! Summary of a run.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Error;
use crate::inventory::{Inventory, Rejection};

/// A per-output failure or notice, attributed to what it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub target: String,
    pub kind: &'static str,
    pub reason: String,
}

impl Issue {
    fn new(target: &str, error: &Error) -> Self {
        Self {
            target: target.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        }
    }
}

/// Counts, written outputs and everything that went wrong without stopping the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub root: PathBuf,
    pub scanned: usize,
    pub accepted: usize,
    pub excluded: usize,
    pub rejected: Vec<Rejection>,
    pub groups: usize,
    pub fixed: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<Issue>,
    pub notices: Vec<Issue>,
}

impl RunReport {
    #[must_use]
    pub fn from_inventory(inventory: &Inventory) -> Self {
        Self {
            root: inventory.root.clone(),
            scanned: inventory.scanned,
            accepted: inventory.records.len(),
            excluded: inventory.excluded,
            rejected: inventory.rejected.clone(),
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, target: &str, error: &Error) {
        let reason = error.to_string();
        diagnostics::log_warn!("Failed {name}: {reason}", name: target, reason: reason);
        self.failures.push(Issue::new(target, error));
    }

    pub fn record_notice(&mut self, target: &str, error: &Error) {
        let reason = error.to_string();
        diagnostics::log_debug!("Notice for {name}: {reason}", name: target, reason: reason);
        self.notices.push(Issue::new(target, error));
    }

    /// True when every attempted output was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Scanned {} files under {}: {} accepted, {} rejected, {} excluded",
            self.scanned,
            self.root.display(),
            self.accepted,
            self.rejected.len(),
            self.excluded
        )?;
        writeln!(f, "Grouped into {} groups with {} fixed files", self.groups, self.fixed)?;
        writeln!(f, "Wrote {} documents", self.written.len())?;

        if !self.rejected.is_empty() {
            writeln!(f, "Rejected:")?;
            for r in &self.rejected {
                writeln!(f, "  {} {}: {}", r.kind, r.path.display(), r.reason)?;
            }
        }
        for (title, issues) in [("Failures", &self.failures), ("Notices", &self.notices)] {
            if !issues.is_empty() {
                writeln!(f, "{title}:")?;
                for issue in issues {
                    writeln!(f, "  {} {}: {}", issue.kind, issue.target, issue.reason)?;
                }
            }
        }
        Ok(())
    }
}
