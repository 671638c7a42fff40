//! Per-session build statistics.

use std::time::Duration;

use serde::Serialize;

/// Outcome of one build session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    /// Packages passed to the bundler successfully.
    pub compiled: Vec<String>,
    /// Packages served from the cache.
    pub reused: Vec<String>,
    /// Packages the bundler rejected (excluded from the aggregate).
    pub failed: Vec<FailedPackage>,
    /// Size of the published aggregate in bytes.
    pub bytes: usize,
    /// Whether a new aggregate was published (false when it was unchanged).
    pub published: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedPackage {
    pub name: String,
    pub diagnostics: Vec<String>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of packages in the aggregate.
    pub fn included(&self) -> usize {
        self.compiled.len() + self.reused.len()
    }

    /// One-line summary, e.g. `3 packages (1 compiled, 2 cached, 1 failed) in 240ms`.
    pub fn summary(&self) -> String {
        let included = self.included();
        let mut parts = vec![
            format!("{} compiled", self.compiled.len()),
            format!("{} cached", self.reused.len()),
        ];
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        format!(
            "{} package{} ({}) in {}ms",
            included,
            if included == 1 { "" } else { "s" },
            parts.join(", "),
            self.elapsed.as_millis()
        )
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
