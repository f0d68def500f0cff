use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::config::RiskEngineConfig;
use crate::correlation::CorrelationMatrix;
use crate::error::{CheckResult, RiskError};
use crate::gate::{PerformanceMetrics, RiskGate};
use crate::position::PositionBook;
use crate::returns::ReturnStore;
use crate::stress::StressEngine;
use crate::var::VaRCalculator;

/// Current wall clock in nanoseconds since the epoch. The only place in the
/// crate allowed to call `SystemTime::now` — everything downstream takes
/// `now_ns` as a parameter so the hot path stays free of syscalls and tests
/// stay deterministic.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Composes the return store, correlation matrix, VaR calculator, stress
/// engine, position book, and risk gate into the single synchronous
/// `check()` predicate described in the design. Every public method here is
/// non-blocking on the hot path: `check()` reads a cached portfolio VaR
/// rather than running the Monte-Carlo simulation inline, so that cost lands
/// on `refresh()`, which is intended to run off the async background task.
pub struct RiskEngine {
    config: RiskEngineConfig,
    returns: ReturnStore,
    correlations: CorrelationMatrix,
    var_calc: VaRCalculator,
    stress: StressEngine,
    positions: PositionBook,
    gate: RiskGate,
    cached_portfolio_var: AtomicU64,
}

impl RiskEngine {
    pub fn new(config: RiskEngineConfig) -> Result<Self, RiskError> {
        config.validate()?;
        let returns = ReturnStore::new(config.n_max, config.h);
        let correlations = CorrelationMatrix::new(config.n_max);
        let var_calc = VaRCalculator::new(config.n_max, config.var_ttl_ns);
        let stress = StressEngine::new(config.scenarios.clone());
        let positions = PositionBook::new();
        let gate = RiskGate::new(config.limits.clone(), config.n_stress);

        Ok(Self {
            config,
            returns,
            correlations,
            var_calc,
            stress,
            positions,
            gate,
            cached_portfolio_var: AtomicU64::new(0.0f64.to_bits()),
        })
    }

    /// The most recently computed portfolio Monte-Carlo VaR, as of the last
    /// `refresh()`. Cheap: a single relaxed atomic load, no simulation.
    pub fn current_portfolio_var(&self) -> f64 {
        f64::from_bits(self.cached_portfolio_var.load(Ordering::Relaxed))
    }

    fn check_symbol_range(&self, symbol_id: u32) -> Result<(), RiskError> {
        if symbol_id >= self.config.n_max {
            return Err(RiskError::OutOfRange {
                symbol_id,
                n_max: self.config.n_max,
            });
        }
        Ok(())
    }

    /// Appends a daily return for `symbol_id` and invalidates its cached VaR
    /// rate, per the design's cache-invalidation-on-append rule.
    pub fn ingest_return(&self, symbol_id: u32, r: f64) -> Result<(), RiskError> {
        self.check_symbol_range(symbol_id)?;
        self.returns.append(symbol_id, r);
        self.var_calc.invalidate(symbol_id);
        Ok(())
    }

    /// Upserts a position's quantity/market value/delta and recomputes its
    /// single-name VaR contribution from current return history.
    pub fn update_position(
        &self,
        symbol_id: u32,
        quantity: f64,
        market_value: f64,
        delta: f64,
    ) -> Result<(), RiskError> {
        self.check_symbol_range(symbol_id)?;
        let now = now_ns();
        let mut window = Vec::new();
        self.returns.snapshot(symbol_id, &mut window);
        let var_contribution = self.var_calc.single_name_var(symbol_id, &window, market_value, now);
        self.positions.update(symbol_id, quantity, market_value, delta, var_contribution, now);
        Ok(())
    }

    pub fn update_greeks(&self, symbol_id: u32, gamma: f64, vega: f64, theta: f64, beta: f64) -> Result<(), RiskError> {
        self.check_symbol_range(symbol_id)?;
        self.positions.update_greeks(symbol_id, gamma, vega, theta, beta);
        Ok(())
    }

    /// Recomputes a single correlation pair directly from caller-supplied
    /// return windows. Intended for a background sweep over pairs flagged
    /// dirty since the last pass, as an alternative to the blanket
    /// `refresh_correlations` below.
    pub fn update_correlation_pair(&self, a: u32, b: u32, returns_a: &[f64], returns_b: &[f64]) {
        self.correlations.update(a, b, returns_a, returns_b, self.config.w, now_ns());
    }

    /// Recomputes every pairwise correlation across currently held symbols
    /// using the configured window `w`. Returns the number of pairs updated.
    pub fn refresh_correlations(&self) -> usize {
        let held: Vec<u32> = self.positions.snapshot().iter().map(|p| p.symbol_id).collect();
        let now = now_ns();
        let mut updated = 0;

        let mut windows: Vec<Vec<f64>> = Vec::with_capacity(held.len());
        for &symbol_id in &held {
            let mut w = Vec::new();
            self.returns.snapshot(symbol_id, &mut w);
            windows.push(w);
        }

        for i in 0..held.len() {
            for j in (i + 1)..held.len() {
                self.correlations.update(held[i], held[j], &windows[i], &windows[j], self.config.w, now);
                updated += 1;
            }
        }

        trace!(updated, "refreshed correlation matrix");
        updated
    }

    /// Recomputes the portfolio Monte-Carlo VaR from the current book and
    /// correlation matrix and publishes it for `current_portfolio_var()`.
    /// This is the expensive leg of `refresh()` — `M` simulations over the
    /// whole book — and is expected to run off the hot path.
    pub fn refresh_portfolio_var(&self) -> f64 {
        let now = now_ns();
        let positions = self.positions.snapshot();
        let symbol_ids: Vec<u32> = positions.iter().map(|p| p.symbol_id).collect();
        let market_values: Vec<f64> = positions.iter().map(|p| p.market_value).collect();
        let mut returns_by_symbol = Vec::with_capacity(symbol_ids.len());
        for &symbol_id in &symbol_ids {
            let mut w = Vec::new();
            self.returns.snapshot(symbol_id, &mut w);
            returns_by_symbol.push(w);
        }

        let portfolio_var = self.var_calc.portfolio_var_monte_carlo(
            &symbol_ids,
            &market_values,
            &returns_by_symbol,
            &self.correlations,
            self.config.m_simulations,
            self.config.mc_seed,
            now,
        );

        self.cached_portfolio_var.store(portfolio_var.to_bits(), Ordering::Relaxed);
        portfolio_var
    }

    /// Runs both refresh legs: correlations, then the portfolio VaR that
    /// depends on them. Intended to be the background refresher's tick body.
    pub fn refresh(&self) -> usize {
        let updated = self.refresh_correlations();
        self.refresh_portfolio_var();
        updated
    }

    /// The single synchronous pass/fail predicate: cached portfolio VaR,
    /// per-position VaR, concentration, and (every `n_stress`th call) the
    /// worst-case stress loss, evaluated in that order. Never runs the
    /// Monte-Carlo simulation itself — that's `refresh_portfolio_var`'s job.
    pub fn check(&self) -> CheckResult {
        let now = now_ns();
        let positions = self.positions.snapshot();
        let total_market_value: f64 = positions.iter().map(|p| p.market_value.abs()).sum();
        let portfolio_var = self.current_portfolio_var();
        let worst_case_stress_loss = Some(self.stress.worst_case(&positions));

        self.gate.evaluate(portfolio_var, &positions, total_market_value, worst_case_stress_loss, now)
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        self.gate.metrics()
    }

    /// Alias for `metrics()` matching the external-interface naming used by
    /// dashboards and the service shell.
    pub fn performance_metrics(&self) -> &PerformanceMetrics {
        self.gate.metrics()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn config(&self) -> &RiskEngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskEngineConfig;

    fn small_engine() -> RiskEngine {
        let mut config = RiskEngineConfig::default();
        config.n_max = 8;
        config.h = 64;
        config.w = 16;
        config.m_simulations = 500;
        RiskEngine::new(config).unwrap()
    }

    #[test]
    fn out_of_range_symbol_is_rejected() {
        let engine = small_engine();
        assert!(matches!(
            engine.ingest_return(100, 0.01),
            Err(RiskError::OutOfRange { .. })
        ));
    }

    #[test]
    fn check_passes_on_an_empty_book() {
        let engine = small_engine();
        assert!(engine.check().is_pass());
    }

    #[test]
    fn ingest_then_update_position_produces_a_var_contribution() {
        let engine = small_engine();
        for _ in 0..20 {
            engine.ingest_return(0, -0.015).unwrap();
        }
        engine.update_position(0, 100.0, 10_000.0, 0.5).unwrap();
        assert_eq!(engine.position_count(), 1);
    }

    #[test]
    fn refresh_correlations_counts_unique_pairs() {
        let engine = small_engine();
        for sym in 0..3 {
            for _ in 0..20 {
                engine.ingest_return(sym, 0.001 * sym as f64).unwrap();
            }
            engine.update_position(sym, 10.0, 1_000.0, 0.1).unwrap();
        }
        assert_eq!(engine.refresh_correlations(), 3);
    }

    #[test]
    fn check_reads_a_cached_portfolio_var_not_a_live_recompute() {
        let engine = small_engine();
        for _ in 0..20 {
            engine.ingest_return(0, -0.03).unwrap();
        }
        engine.update_position(0, 100.0, 50_000.0, 0.5).unwrap();

        assert_eq!(engine.current_portfolio_var(), 0.0);
        assert!(engine.check().is_pass());

        let recomputed = engine.refresh_portfolio_var();
        assert_eq!(engine.current_portfolio_var(), recomputed);
    }
}
