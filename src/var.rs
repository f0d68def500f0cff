use std::sync::Mutex;

use nalgebra::{DMatrix, DVector};
use ordered_float::OrderedFloat;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::{CORRELATION_INJECTION_WEIGHT, MIN_HISTORY_FOR_VAR, VAR_CONFIDENCE, VAR_TO_SIGMA};
use crate::correlation::CorrelationMatrix;

/// Cached historical-VaR result for one symbol: the 99% quantile *rate*
/// (not a dollar amount) plus the wall-clock it was computed at.
#[derive(Debug, Clone, Copy, Default)]
struct VarCacheEntry {
    rate: f64,
    computed_at_ns: u64,
    valid: bool,
}

/// Historical-simulation and Monte-Carlo VaR, with a per-symbol TTL cache for
/// the historical leg. The original C++ kept `cached_var_` as a plain array of
/// rates guarded by the same shared mutex as the rest of the calculator; here
/// each slot gets its own `Mutex` so a refresh of one symbol never blocks a
/// read of another.
pub struct VaRCalculator {
    cache: Vec<Mutex<VarCacheEntry>>,
    ttl_ns: u64,
}

impl VaRCalculator {
    pub fn new(n_max: u32, ttl_ns: u64) -> Self {
        Self {
            cache: (0..n_max).map(|_| Mutex::new(VarCacheEntry::default())).collect(),
            ttl_ns,
        }
    }

    /// Invalidates the cached rate for `symbol_id`. Must be called on every
    /// return append for that symbol, per the design's cache-invalidation rule.
    pub fn invalidate(&self, symbol_id: u32) {
        if let Some(slot) = self.cache.get(symbol_id as usize) {
            slot.lock().unwrap().valid = false;
        }
    }

    /// 99% historical VaR rate for `symbol_id`, using `returns` (oldest to
    /// newest). Returns 0 if fewer than `MIN_HISTORY_FOR_VAR` samples are
    /// available. A cached rate younger than `ttl_ns` is reused instead of
    /// recomputing the quantile.
    fn historical_var_rate(&self, symbol_id: u32, returns: &[f64], now_ns: u64) -> f64 {
        let slot = match self.cache.get(symbol_id as usize) {
            Some(s) => s,
            None => return 0.0,
        };

        {
            let entry = slot.lock().unwrap();
            if entry.valid && now_ns.saturating_sub(entry.computed_at_ns) < self.ttl_ns {
                return entry.rate;
            }
        }

        if returns.len() < MIN_HISTORY_FOR_VAR {
            let mut entry = slot.lock().unwrap();
            *entry = VarCacheEntry {
                rate: 0.0,
                computed_at_ns: now_ns,
                valid: true,
            };
            return 0.0;
        }

        let mut sorted: Vec<f64> = returns.to_vec();
        let quantile_index = (((1.0 - VAR_CONFIDENCE) * sorted.len() as f64).floor() as usize)
            .min(sorted.len() - 1);
        let (_, pivot, _) = sorted.select_nth_unstable_by(quantile_index, |a, b| {
            OrderedFloat(*a).cmp(&OrderedFloat(*b))
        });
        let rate = (-*pivot).max(0.0);

        let mut entry = slot.lock().unwrap();
        *entry = VarCacheEntry {
            rate,
            computed_at_ns: now_ns,
            valid: true,
        };
        rate
    }

    /// Dollar single-name VaR: historical rate times current market value.
    pub fn single_name_var(&self, symbol_id: u32, returns: &[f64], market_value: f64, now_ns: u64) -> f64 {
        self.historical_var_rate(symbol_id, returns, now_ns) * market_value.abs()
    }

    /// The rate backing `single_name_var`, exposed directly because the
    /// Monte-Carlo shock step needs the per-unit sigma, not a dollar figure.
    pub fn cached_var_rate(&self, symbol_id: u32, returns: &[f64], now_ns: u64) -> f64 {
        self.historical_var_rate(symbol_id, returns, now_ns)
    }

    /// Portfolio 99% VaR via Monte Carlo. For each of `m` trials, draws an
    /// independent standard-normal shock per held symbol, then injects a
    /// nearby-name correlation effect (see module docs on why this isn't a
    /// Cholesky transform), scales each shocked factor by `var_rate * 2.33`,
    /// and sums `market_value * shocked_return` across the book. Returns the
    /// 99th-percentile loss across trials.
    #[allow(clippy::too_many_arguments)]
    pub fn portfolio_var_monte_carlo(
        &self,
        symbol_ids: &[u32],
        market_values: &[f64],
        returns_by_symbol: &[Vec<f64>],
        correlations: &CorrelationMatrix,
        m: usize,
        seed: u64,
        now_ns: u64,
    ) -> f64 {
        let k = symbol_ids.len();
        if k == 0 || m == 0 {
            return 0.0;
        }

        let sigmas: Vec<f64> = symbol_ids
            .iter()
            .zip(returns_by_symbol.iter())
            .map(|(&sid, rets)| self.cached_var_rate(sid, rets, now_ns) * VAR_TO_SIGMA)
            .collect();

        // Strictly lower-triangular injection matrix: row k picks up
        // `CORRELATION_INJECTION_WEIGHT * rho(k, j)` from every earlier factor j.
        let mut injection = DMatrix::<f64>::zeros(k, k);
        for row in 0..k {
            for col in 0..row {
                let rho = correlations.correlation(symbol_ids[row], symbol_ids[col]) as f64;
                injection[(row, col)] = CORRELATION_INJECTION_WEIGHT * rho;
            }
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut losses: Vec<f64> = Vec::with_capacity(m);
        let mut z = DVector::<f64>::zeros(k);

        for _ in 0..m {
            for slot in z.iter_mut() {
                *slot = StandardNormal.sample(&mut rng);
            }
            let correlated = &z + &injection * &z;

            let mut portfolio_return = 0.0;
            for idx in 0..k {
                let shocked = correlated[idx] * sigmas[idx];
                portfolio_return += market_values[idx] * shocked;
            }
            losses.push(-portfolio_return);
        }

        let quantile_index = (((1.0 - VAR_CONFIDENCE) * losses.len() as f64).floor() as usize)
            .min(losses.len() - 1);
        let (_, pivot, _) =
            losses.select_nth_unstable_by(losses.len() - 1 - quantile_index, |a, b| {
                OrderedFloat(*a).cmp(&OrderedFloat(*b))
            });
        pivot.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_returns(n: usize, value: f64) -> Vec<f64> {
        vec![value; n]
    }

    #[test]
    fn below_min_history_var_is_zero() {
        let calc = VaRCalculator::new(4, 1_000_000_000);
        let returns = flat_returns(5, -0.01);
        assert_eq!(calc.single_name_var(0, &returns, 1_000.0, 1), 0.0);
    }

    #[test]
    fn constant_negative_return_drives_a_positive_var_rate() {
        let calc = VaRCalculator::new(4, 1_000_000_000);
        let returns = flat_returns(40, -0.02);
        let var = calc.single_name_var(0, &returns, 1_000.0, 1);
        assert!((var - 20.0).abs() < 1e-9);
    }

    #[test]
    fn cache_is_reused_within_ttl() {
        let calc = VaRCalculator::new(4, 1_000_000_000);
        let returns = flat_returns(40, -0.02);
        let first = calc.cached_var_rate(0, &returns, 100);
        let stale_input = flat_returns(40, -0.9);
        let second = calc.cached_var_rate(0, &stale_input, 200);
        assert_eq!(first, second);
    }

    #[test]
    fn invalidate_forces_recompute_even_within_ttl() {
        let calc = VaRCalculator::new(4, 1_000_000_000);
        let returns = flat_returns(40, -0.02);
        calc.cached_var_rate(0, &returns, 100);
        calc.invalidate(0);
        let fresh_input = flat_returns(40, -0.05);
        let recomputed = calc.cached_var_rate(0, &fresh_input, 150);
        assert!((recomputed - 0.05).abs() < 1e-9);
    }

    #[test]
    fn ttl_expiry_forces_recompute() {
        let calc = VaRCalculator::new(4, 100);
        let returns = flat_returns(40, -0.02);
        calc.cached_var_rate(0, &returns, 0);
        let fresh_input = flat_returns(40, -0.07);
        let recomputed = calc.cached_var_rate(0, &fresh_input, 1_000);
        assert!((recomputed - 0.07).abs() < 1e-9);
    }

    #[test]
    fn monte_carlo_var_is_nonnegative_and_deterministic_for_fixed_seed() {
        let calc = VaRCalculator::new(4, 1_000_000_000);
        let correlations = CorrelationMatrix::new(4);
        let returns = vec![flat_returns(40, -0.02), flat_returns(40, -0.01)];
        let symbol_ids = vec![0u32, 1u32];
        let market_values = vec![10_000.0, 5_000.0];

        let a = calc.portfolio_var_monte_carlo(&symbol_ids, &market_values, &returns, &correlations, 2_000, 42, 1);
        let b = calc.portfolio_var_monte_carlo(&symbol_ids, &market_values, &returns, &correlations, 2_000, 42, 1);
        assert_eq!(a, b);
        assert!(a >= 0.0);
    }

    #[test]
    fn monte_carlo_var_with_zero_positions_is_zero() {
        let calc = VaRCalculator::new(4, 1_000_000_000);
        let correlations = CorrelationMatrix::new(4);
        let var = calc.portfolio_var_monte_carlo(&[], &[], &[], &correlations, 1_000, 1, 1);
        assert_eq!(var, 0.0);
    }
}
