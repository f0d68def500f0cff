use crate::config::StressScenario;
use crate::position::PositionRisk;

/// Applies the fixed scenario catalog to a position book snapshot. Not
/// "stress" in the sense of randomized shocks — each scenario is a deterministic,
/// pre-agreed set of multipliers replayed against the current book.
pub struct StressEngine {
    scenarios: Vec<StressScenario>,
}

impl StressEngine {
    pub fn new(scenarios: Vec<StressScenario>) -> Self {
        Self { scenarios }
    }

    pub fn scenarios(&self) -> &[StressScenario] {
        &self.scenarios
    }

    /// Loss for one position under one scenario. Sums the direct, gamma, and
    /// correlation terms with their signs intact, then takes one `.abs()` of
    /// the total — allowing intra-position cancellation, matching the
    /// original risk desk's model exactly (see DESIGN.md).
    fn position_loss(&self, scenario: &StressScenario, position: &PositionRisk) -> f64 {
        let symbol_shock = scenario
            .per_symbol_shocks
            .get(&position.symbol_id)
            .copied()
            .unwrap_or(scenario.market_shock);

        let direct = position.market_value * symbol_shock;
        let gamma_term = 0.5
            * position.gamma
            * position.market_value
            * symbol_shock
            * symbol_shock
            * scenario.volatility_multiplier;
        let correlation_term = position.var_contribution * scenario.correlation_shock;

        (direct + gamma_term + correlation_term).abs()
    }

    /// Total book loss under `scenario`.
    pub fn loss(&self, scenario: &StressScenario, positions: &[PositionRisk]) -> f64 {
        positions
            .iter()
            .map(|p| self.position_loss(scenario, p))
            .sum()
    }

    /// Loss of every bundled scenario against the book, in catalog order.
    pub fn run_all(&self, positions: &[PositionRisk]) -> Vec<(String, f64)> {
        self.scenarios
            .iter()
            .map(|s| (s.name.clone(), self.loss(s, positions)))
            .collect()
    }

    /// The single worst-case scenario loss, or 0 if there are no scenarios.
    pub fn worst_case(&self, positions: &[PositionRisk]) -> f64 {
        self.run_all(positions)
            .into_iter()
            .map(|(_, loss)| loss)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_scenarios;

    fn position(symbol_id: u32, market_value: f64, gamma: f64, var_contribution: f64) -> PositionRisk {
        PositionRisk {
            symbol_id,
            quantity: 100.0,
            market_value,
            delta: 0.0,
            gamma,
            vega: 0.0,
            theta: 0.0,
            beta: 0.0,
            var_contribution,
            stress_loss: 0.0,
            correlation_risk: 0.0,
            last_update_ns: 0,
        }
    }

    #[test]
    fn four_default_scenarios_run_against_an_empty_book() {
        let engine = StressEngine::new(default_scenarios());
        let results = engine.run_all(&[]);
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|(_, loss)| *loss == 0.0));
    }

    #[test]
    fn loss_is_never_negative_even_with_offsetting_terms() {
        let engine = StressEngine::new(default_scenarios());
        let positions = vec![position(1, -10_000.0, -0.01, -500.0)];
        for scenario in engine.scenarios() {
            assert!(engine.loss(scenario, &positions) >= 0.0);
        }
    }

    #[test]
    fn offsetting_terms_reduce_loss_below_the_direct_term_alone() {
        // A large negative correlation term (opposite sign to a positive direct
        // term) should cancel part of it, since the three terms are summed
        // before the single outer `.abs()`.
        let scenario = StressScenario::new("custom", 0.1, 0.0, 1.0);
        let engine = StressEngine::new(vec![scenario.clone()]);
        let hedged = position(1, 10_000.0, 0.0, -900.0);
        let unhedged = position(1, 10_000.0, 0.0, 0.0);
        assert!(engine.loss(&scenario, &[hedged]) < engine.loss(&scenario, &[unhedged]));
    }

    #[test]
    fn worst_case_is_the_max_of_all_scenarios() {
        let engine = StressEngine::new(default_scenarios());
        let positions = vec![position(1, 100_000.0, 0.02, 1_000.0)];
        let all = engine.run_all(&positions);
        let expected_max = all.iter().map(|(_, l)| *l).fold(0.0, f64::max);
        assert_eq!(engine.worst_case(&positions), expected_max);
    }

    #[test]
    fn per_symbol_shock_overrides_market_shock() {
        let scenario = StressScenario::new("custom", -0.1, 1.0, 0.0).with_symbol_shock(5, -0.9);
        let engine = StressEngine::new(vec![scenario.clone()]);
        let shocked = position(5, 1_000.0, 0.0, 0.0);
        let other = position(6, 1_000.0, 0.0, 0.0);
        assert!(engine.loss(&scenario, &[shocked]) > engine.loss(&scenario, &[other]));
    }
}
