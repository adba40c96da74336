//! Context turn and dashboard request text for a report target.

use std::collections::BTreeMap;

/// Name of the server-side prompt that describes the dashboard layout.
pub const DASHBOARD_PROMPT: &str = "Create Dashboard";

/// The website and period a session reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    pub website: String,
    pub start_date: String,
    pub end_date: String,
    pub timezone: String,
}

impl ReportTarget {
    pub fn new(
        website: impl Into<String>,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            website: website.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            timezone: timezone.into(),
        }
    }

    pub fn period(&self) -> String {
        format!("{} to {}", self.start_date, self.end_date)
    }

    /// Arguments for the server's dashboard prompt, keyed by its argument names.
    pub fn prompt_arguments(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Website Name".to_string(), self.website.clone()),
            ("Start Date (YYYY-MM-DD)".to_string(), self.start_date.clone()),
            ("End Date (YYYY-MM-DD)".to_string(), self.end_date.clone()),
            ("Timezone".to_string(), self.timezone.clone()),
        ])
    }
}

/// Builds the context turn that opens every session.
pub fn context_turn(target: &ReportTarget) -> String {
    format!(
        "You are an expert analytics consultant answering questions about website analytics data.\n\
         \n\
         ANALYSIS TARGET:\n\
         - Website: {website}\n\
         - Period: {period}\n\
         - Timezone: {timezone}\n\
         \n\
         Use the available tools to fetch the data you need.\n\
         \n\
         RULES:\n\
         1. Only use data returned by the tools. Never fabricate numbers.\n\
         2. If data is missing or unavailable, say so clearly and explain why.\n\
         3. Refer to specific metrics and time periods from the data when relevant.\n\
         4. Suggest what additional data would help when a question cannot be fully answered.\n\
         5. Be transparent about data limitations.",
        website = target.website,
        period = target.period(),
        timezone = target.timezone,
    )
}

/// First user turn of a report session.
///
/// Uses the server's dashboard guide when one was rendered.
pub fn dashboard_request(target: &ReportTarget, server_guide: Option<&str>) -> String {
    let guide = server_guide
        .map(str::trim)
        .filter(|guide| !guide.is_empty())
        .map(|guide| format!("DASHBOARD CREATION GUIDE:\n{guide}\n\n"))
        .unwrap_or_default();

    format!(
        "{guide}Create a comprehensive dashboard analysis for {website} covering {period} ({timezone}).\n\
         Include traffic overview, top pages, referrers and visitor breakdowns where the tools \
         provide them, followed by actionable insights and next steps for any missing data.\n\
         Create visualizations only for data that actually exists.",
        website = target.website,
        period = target.period(),
        timezone = target.timezone,
    )
}
