use std::collections::HashMap;

/// Output of [`crate::evaluate::evaluate`] for one `(event, ResolvedProfile)`
/// pair. Pure data — no I/O, no mutation.
#[derive(Debug, Clone, Default)]
pub struct HeuristicResult {
    pub pre_score: f32,
    pub reasons: Vec<String>,
    /// `category -> matched keywords`.
    pub trigger_annotations: HashMap<String, Vec<String>>,
    pub content_hash: String,
    /// `require_forwarded` is a filter, not a score term: when a profile
    /// enables it and the event was not forwarded, the caller must drop the
    /// match entirely rather than add to `pre_score`.
    pub filtered_out: bool,
}

impl HeuristicResult {
    /// Comma-joined trigger list, for the persisted `triggers` column.
    pub fn triggers_csv(&self) -> String {
        self.reasons.join(",")
    }
}
