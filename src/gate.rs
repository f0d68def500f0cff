use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam::utils::CachePadded;
use tracing::{debug, warn};

use crate::config::RiskLimits;
use crate::error::{CheckResult, LimitViolation};
use crate::position::PositionRisk;

/// Counters the gate updates on every `check()`. Each is in its own cache
/// line (`CachePadded`) so concurrent checks on different cores never
/// false-share, matching `CacheAlignedCounters` in the teacher's
/// `cache_optimized.rs`.
pub struct PerformanceMetrics {
    risk_checks_performed: CachePadded<AtomicU64>,
    risk_violations: CachePadded<AtomicU64>,
    stress_runs_total: CachePadded<AtomicU64>,
    total_calculation_time_ns: CachePadded<AtomicU64>,
}

impl PerformanceMetrics {
    fn new() -> Self {
        Self {
            risk_checks_performed: CachePadded::new(AtomicU64::new(0)),
            risk_violations: CachePadded::new(AtomicU64::new(0)),
            stress_runs_total: CachePadded::new(AtomicU64::new(0)),
            total_calculation_time_ns: CachePadded::new(AtomicU64::new(0)),
        }
    }

    pub fn risk_checks_performed(&self) -> u64 {
        self.risk_checks_performed.load(Ordering::Relaxed)
    }

    pub fn risk_violations(&self) -> u64 {
        self.risk_violations.load(Ordering::Relaxed)
    }

    pub fn stress_runs_total(&self) -> u64 {
        self.stress_runs_total.load(Ordering::Relaxed)
    }

    /// Mean wall-time spent inside `RiskGate::evaluate`, in nanoseconds. 0 if
    /// no checks have run yet.
    pub fn avg_latency_ns(&self) -> u64 {
        let total = self.risk_checks_performed();
        if total == 0 {
            0
        } else {
            self.total_calculation_time_ns.load(Ordering::Relaxed) / total
        }
    }

    /// Fraction of checks that failed, in `[0, 1]`. 0 if no checks have run yet.
    pub fn violation_rate(&self) -> f64 {
        let total = self.risk_checks_performed();
        if total == 0 {
            0.0
        } else {
            self.risk_violations() as f64 / total as f64
        }
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes portfolio VaR, per-position VaR, concentration, and (every
/// `n_stress`th call) worst-case stress loss into a single synchronous
/// pass/fail predicate. Fails fast on the first violation in that order,
/// mirroring `RealtimeRiskAnalytics::performRiskCheck` in the original.
pub struct RiskGate {
    limits: RiskLimits,
    n_stress: u64,
    metrics: PerformanceMetrics,
}

impl RiskGate {
    pub fn new(limits: RiskLimits, n_stress: u64) -> Self {
        Self {
            limits,
            n_stress: n_stress.max(1),
            metrics: PerformanceMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Runs the gate. `portfolio_var` and `worst_case_stress_loss` are
    /// pre-computed by the caller (`RiskEngine`); this function only applies
    /// the limit comparisons and updates counters.
    pub fn evaluate(
        &self,
        portfolio_var: f64,
        positions: &[PositionRisk],
        total_market_value: f64,
        worst_case_stress_loss: Option<f64>,
        _now_ns: u64,
    ) -> CheckResult {
        let started = Instant::now();
        let check_count = self.metrics.risk_checks_performed.fetch_add(1, Ordering::Relaxed) + 1;

        let result = self.evaluate_inner(portfolio_var, positions, total_market_value, worst_case_stress_loss, check_count);

        self.metrics
            .total_calculation_time_ns
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        result
    }

    fn evaluate_inner(
        &self,
        portfolio_var: f64,
        positions: &[PositionRisk],
        total_market_value: f64,
        worst_case_stress_loss: Option<f64>,
        check_count: u64,
    ) -> CheckResult {
        if portfolio_var > self.limits.max_portfolio_var {
            return self.fail(LimitViolation::PortfolioVar);
        }

        for position in positions {
            if position.var_contribution > self.limits.max_position_var {
                return self.fail(LimitViolation::PositionVar {
                    symbol_id: position.symbol_id,
                });
            }
        }

        if total_market_value > 0.0 {
            for position in positions {
                let concentration = position.market_value.abs() / total_market_value;
                if concentration > self.limits.max_concentration {
                    return self.fail(LimitViolation::Concentration {
                        symbol_id: position.symbol_id,
                    });
                }
            }
        }

        if check_count % self.n_stress == 0 {
            self.metrics.stress_runs_total.fetch_add(1, Ordering::Relaxed);
            if let Some(loss) = worst_case_stress_loss {
                if loss > self.limits.max_stress_loss {
                    return self.fail(LimitViolation::Stress);
                }
            }
        }

        debug!(portfolio_var, "risk check passed");
        CheckResult::Pass
    }

    fn fail(&self, violation: LimitViolation) -> CheckResult {
        self.metrics.risk_violations.fetch_add(1, Ordering::Relaxed);
        warn!(?violation, "risk check failed");
        CheckResult::Fail(violation)
    }
}
