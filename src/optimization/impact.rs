use serde::{Deserialize, Serialize};

/// Cost/benefit preview of one optimization against one execution.
///
/// Pure output value: previewing twice with the same inputs yields an
/// equal value, and producing it never touches execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationImpactInfo {
    pub strategy_id: String,
    pub target_step: String,
    /// Human-readable account of what the optimization would do.
    pub description: String,
    /// Rows the pipeline would avoid producing, when an estimate exists.
    pub estimated_rows_saved: Option<u64>,
    pub applicable: bool,
}

impl OptimizationImpactInfo {
    pub fn not_applicable(
        strategy_id: impl Into<String>,
        target_step: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            target_step: target_step.into(),
            description: description.into(),
            estimated_rows_saved: None,
            applicable: false,
        }
    }
}
