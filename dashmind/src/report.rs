//! Report rendering and the fabricated-data check.
//!
//! ```rust
//! use dashmind::{ReportTarget, detect_fabrication, render_report};
//! use dbackend::BackendId;
//!
//! let target = ReportTarget::new("example.com", "2025-06-01", "2025-07-01", "UTC");
//! let report = render_report(&target, Some(BackendId::Ollama), "Pageviews: 812.");
//!
//! assert!(report.starts_with("DASHBOARD ANALYSIS (OLLAMA)"));
//! assert!(detect_fabrication("Pageviews: 812.").is_empty());
//! ```

use dbackend::BackendId;

use crate::context::ReportTarget;

pub const RULE_WIDTH: usize = 80;

/// Phrases that suggest the model invented data instead of using tool results.
pub const FABRICATION_INDICATORS: &[&str] = &[
    "1,234,567",
    "45,678",
    "12,345",
    "100,000",
    "50,000",
    "Total pageviews: 1",
    "Unique visitors: 1",
    "fictional",
    "example data",
    "placeholder",
    "sample data",
    "dummy data",
    "test data",
    "mock data",
    "peak hours",
    "busy periods",
    "high traffic times",
    "45% increase",
    "30% bounce rate",
    "25% growth",
];

pub fn render_report(target: &ReportTarget, backend: Option<BackendId>, body: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let backend = backend
        .map(|id| id.to_string().to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());

    format!(
        "DASHBOARD ANALYSIS ({backend})\n\
         Website: {website}\n\
         Period: {period} ({timezone})\n\
         {rule}\n\
         {body}\n\
         {rule}",
        website = target.website,
        period = target.period(),
        timezone = target.timezone,
        body = body.trim(),
    )
}

/// Returns the indicators found in `text`, compared case-insensitively.
pub fn detect_fabrication(text: &str) -> Vec<&'static str> {
    let haystack = text.to_lowercase();
    FABRICATION_INDICATORS
        .iter()
        .copied()
        .filter(|indicator| haystack.contains(&indicator.to_lowercase()))
        .collect()
}

pub fn fabrication_summary(found: &[&str]) -> String {
    if found.is_empty() {
        "Analysis appears to be based on real data".to_string()
    } else {
        format!("Potential data fabrication detected: {}", found.join(", "))
    }
}
