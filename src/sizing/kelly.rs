// Kelly criterion helpers
//
// f* = (p·b − q) / b with q = 1 − p: the bankroll fraction that maximizes
// long-run growth for win probability p and payoff ratio b.

/// Raw Kelly fraction. Negative means the bet has no edge.
/// Returns 0.0 for invalid inputs.
pub fn kelly_fraction(win_probability: f64, reward_risk: f64) -> f64 {
    if !win_probability.is_finite()
        || !reward_risk.is_finite()
        || reward_risk <= 0.0
        || !(0.0..=1.0).contains(&win_probability)
    {
        return 0.0;
    }

    let q = 1.0 - win_probability;
    (win_probability * reward_risk - q) / reward_risk
}

/// Reward:risk ratio of a trade plan, side inferred from the stop placement.
///
/// None when the stop and target are not on opposite sides of the entry.
pub fn reward_risk(entry: f64, stop_loss: f64, take_profit: f64) -> Option<f64> {
    if !(entry.is_finite() && stop_loss.is_finite() && take_profit.is_finite()) {
        return None;
    }

    let risk = (entry - stop_loss).abs();
    let reward = (take_profit - entry).abs();
    let opposite_sides = (stop_loss < entry && take_profit > entry)
        || (stop_loss > entry && take_profit < entry);

    if !opposite_sides || risk <= 0.0 {
        return None;
    }

    Some(reward / risk)
}
