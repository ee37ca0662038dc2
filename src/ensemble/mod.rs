/// Signal ensemble: family-level consensus voting over alpha models
///
/// Models vote by thresholding their score. Votes are grouped by family;
/// a family whose own models disagree abstains. Two or more agreeing
/// families form a consensus, any cross-family disagreement is a hard veto,
/// and a lone family needs an exceptionally strong model to override.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::TradeDirection;
use crate::sizing::WinRateTracker;
use crate::strategy::{ModelFamily, StrategySignal};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub vote_threshold: f64,
    /// Missing families weigh 1.0
    pub family_weights: HashMap<ModelFamily, f64>,
    pub override_score: f64,
    pub override_confidence: f64,
    pub override_penalty: f64,
    pub override_cap: f64,
    pub min_history_trades: usize,
    pub win_rate_floor: f64,
    pub losing_streak_penalty: f64,
    pub min_confidence: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            vote_threshold: 0.2,
            family_weights: HashMap::new(),
            override_score: 0.5,
            override_confidence: 0.6,
            override_penalty: 0.75,
            override_cap: 0.6,
            min_history_trades: 10,
            win_rate_floor: 0.4,
            losing_streak_penalty: 0.5,
            min_confidence: 0.55,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleDecision {
    pub direction: TradeDirection,
    pub confidence: f64,
    pub rationale: String,
    pub contributing_models: Vec<String>,
}

impl EnsembleDecision {
    pub fn abstain(rationale: impl Into<String>) -> Self {
        Self {
            direction: TradeDirection::None,
            confidence: 0.0,
            rationale: rationale.into(),
            contributing_models: Vec::new(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction.is_directional()
    }
}

/// A family's collective vote
struct FamilyVote<'a> {
    family: ModelFamily,
    direction: TradeDirection,
    score: f64,
    confidence: f64,
    models: Vec<&'a StrategySignal>,
}

pub struct SignalEnsemble {
    config: EnsembleConfig,
    tracker: Arc<WinRateTracker>,
}

impl SignalEnsemble {
    pub fn new(config: EnsembleConfig, tracker: Arc<WinRateTracker>) -> Self {
        Self { config, tracker }
    }

    fn weight(&self, family: ModelFamily) -> f64 {
        self.config
            .family_weights
            .get(&family)
            .copied()
            .unwrap_or(1.0)
    }

    /// Combine model signals into a single directional decision
    pub fn combine(&self, signals: &[StrategySignal]) -> EnsembleDecision {
        let mut by_family: BTreeMap<ModelFamily, Vec<&StrategySignal>> = BTreeMap::new();
        for signal in signals {
            if signal.vote(self.config.vote_threshold).is_directional() {
                by_family.entry(signal.family).or_default().push(signal);
            }
        }

        let mut families = Vec::new();
        for (family, models) in by_family {
            let first = models[0].vote(self.config.vote_threshold);
            if models
                .iter()
                .any(|m| m.vote(self.config.vote_threshold) != first)
            {
                tracing::debug!(?family, "Family models disagree, family abstains");
                continue;
            }

            let n = models.len() as f64;
            families.push(FamilyVote {
                family,
                direction: first,
                score: models.iter().map(|m| m.score).sum::<f64>() / n,
                confidence: models.iter().map(|m| m.confidence).sum::<f64>() / n,
                models,
            });
        }

        if families.is_empty() {
            return EnsembleDecision::abstain("no model cleared the vote threshold");
        }

        let buys = families
            .iter()
            .filter(|f| f.direction == TradeDirection::Buy)
            .count();
        let sells = families.len() - buys;
        if buys > 0 && sells > 0 {
            let summary: Vec<String> = families
                .iter()
                .map(|f| format!("{:?}={:?}", f.family, f.direction))
                .collect();
            tracing::debug!("Ensemble veto: families disagree ({})", summary.join(", "));
            return EnsembleDecision::abstain(format!(
                "families disagree: {}",
                summary.join(", ")
            ));
        }

        let direction = families[0].direction;
        let (mut confidence, rationale, contributing_models) = if families.len() >= 2 {
            let (num, den) = families.iter().fold((0.0, 0.0), |(num, den), f| {
                let w = self.weight(f.family) * f.score.abs();
                (num + w * f.confidence, den + w)
            });
            let confidence = if den > 0.0 { num / den } else { 0.0 };
            let names: Vec<String> = families
                .iter()
                .flat_map(|f| f.models.iter().map(|m| m.model.clone()))
                .collect();
            (
                confidence,
                format!("{} families agree on {:?}", families.len(), direction),
                names,
            )
        } else {
            let family = &families[0];
            let strongest = family.models.iter().copied().filter(|m| {
                m.score.abs() > self.config.override_score
                    && m.confidence > self.config.override_confidence
            });
            match strongest.max_by(|a, b| a.confidence.total_cmp(&b.confidence)) {
                Some(model) => (
                    (model.confidence * self.config.override_penalty).min(self.config.override_cap),
                    format!("single-family override by {}", model.model),
                    vec![model.model.clone()],
                ),
                None => {
                    return EnsembleDecision::abstain(format!(
                        "only {:?} voted and no model is strong enough to override",
                        family.family
                    ));
                }
            }
        };

        let mut rationale = rationale;
        if self.tracker.len() >= self.config.min_history_trades {
            if let Some(rate) = self.tracker.win_rate() {
                if rate < self.config.win_rate_floor {
                    confidence *= self.config.losing_streak_penalty;
                    rationale.push_str(&format!(
                        "; win rate {:.0}% below floor, confidence penalized",
                        rate * 100.0
                    ));
                }
            }
        }

        if confidence < self.config.min_confidence {
            tracing::debug!(
                confidence,
                min = self.config.min_confidence,
                "Ensemble confidence below minimum"
            );
            return EnsembleDecision::abstain(format!(
                "{}; confidence {:.2} below minimum {:.2}",
                rationale, confidence, self.config.min_confidence
            ));
        }

        EnsembleDecision {
            direction,
            confidence,
            rationale,
            contributing_models,
        }
    }
}
