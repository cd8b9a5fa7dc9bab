//! Arbitration between the two workers' independent verdicts.
//!
//! Rules are tried in order: executive override (high-confidence strategic
//! verdict that clearly dominates), operational efficiency, and finally a
//! weighted combination whose split depends on the decision's `strategic`
//! context flag.

use serde::{Deserialize, Serialize};

use super::worker::WorkerVerdict;

/// Margin by which strategic confidence must dominate for an override.
const OVERRIDE_MARGIN: f32 = 1.2;

/// Margin by which operational efficiency must dominate.
const EFFICIENCY_MARGIN: f32 = 1.1;

/// Which arbitration rule resolved the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrationMode {
    ExecutiveOverride,
    OperationalEfficiency,
    WeightedCombination,
}

impl ArbitrationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArbitrationMode::ExecutiveOverride => "executive_override",
            ArbitrationMode::OperationalEfficiency => "operational_efficiency",
            ArbitrationMode::WeightedCombination => "weighted_combination",
        }
    }
}

/// Resolved outcome of a dual-worker decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationOutcome {
    pub mode: ArbitrationMode,
    pub action: String,
    pub confidence: f32,
    pub reasoning: String,
}

/// Applies the arbitration rules in order. `favor_strategic` comes from the
/// decision's `strategic` context flag and selects the 0.7/0.3 (vs 0.3/0.7)
/// split for the weighted combination.
pub fn arbitrate(
    strategic: &WorkerVerdict,
    operational: &WorkerVerdict,
    decision_threshold: f32,
    favor_strategic: bool,
) -> ArbitrationOutcome {
    if strategic.confidence > decision_threshold
        && strategic.confidence > OVERRIDE_MARGIN * operational.confidence
    {
        return ArbitrationOutcome {
            mode: ArbitrationMode::ExecutiveOverride,
            action: strategic.action.clone(),
            confidence: strategic.confidence,
            reasoning: format!(
                "Executive override: strategic confidence {:.2} dominates operational {:.2}. {}",
                strategic.confidence, operational.confidence, strategic.reasoning
            ),
        };
    }

    if operational.efficiency > EFFICIENCY_MARGIN * strategic.efficiency {
        return ArbitrationOutcome {
            mode: ArbitrationMode::OperationalEfficiency,
            action: operational.action.clone(),
            confidence: operational.confidence,
            reasoning: format!(
                "Operational efficiency {:.2} beats strategic {:.2}. {}",
                operational.efficiency, strategic.efficiency, operational.reasoning
            ),
        };
    }

    let (ws, wo) = if favor_strategic { (0.7, 0.3) } else { (0.3, 0.7) };
    let confidence = ws * strategic.confidence + wo * operational.confidence;
    let action = if strategic.confidence >= operational.confidence {
        strategic.action.clone()
    } else {
        operational.action.clone()
    };
    ArbitrationOutcome {
        mode: ArbitrationMode::WeightedCombination,
        action,
        confidence,
        reasoning: format!(
            "Weighted combination ({ws:.1}/{wo:.1}): strategic {:.2} / operational {:.2}",
            strategic.confidence, operational.confidence
        ),
    }
}
