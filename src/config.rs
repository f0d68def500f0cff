use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// 99% one-day VaR, matching the original risk desk's convention.
pub const VAR_CONFIDENCE: f64 = 0.99;
/// Below this many samples, single-name VaR is defined as 0 rather than estimated.
pub const MIN_HISTORY_FOR_VAR: usize = 30;
/// Converts a 99% historical VaR into an implied daily sigma for Monte-Carlo shocks.
pub const VAR_TO_SIGMA: f64 = 2.33;
/// Weight applied to a neighboring factor's correlation in the Monte-Carlo injection step.
/// Not a Cholesky transform — see DESIGN.md for why this stays as-is.
pub const CORRELATION_INJECTION_WEIGHT: f64 = 0.1;

pub const DEFAULT_N_MAX: u32 = 1000;
pub const DEFAULT_H: usize = 252;
pub const DEFAULT_W: usize = 60;
pub const DEFAULT_VAR_TTL_NS: u64 = 1_000_000_000;
pub const DEFAULT_M_SIMULATIONS: usize = 10_000;
pub const DEFAULT_N_STRESS: u64 = 100;
pub const DEFAULT_MC_SEED: u64 = 0x5EED_5EED_5EED_5EED;

/// Immutable-after-startup risk limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskLimits {
    pub max_portfolio_var: f64,
    pub max_position_var: f64,
    pub max_correlation: f64,
    pub max_stress_loss: f64,
    pub max_concentration: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_portfolio_var: 1_000_000.0,
            max_position_var: 100_000.0,
            max_correlation: 0.8,
            max_stress_loss: 2_000_000.0,
            max_concentration: 0.2,
        }
    }
}

/// A fixed shock applied to the book to estimate tail losses. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StressScenario {
    pub name: String,
    pub market_shock: f64,
    pub volatility_multiplier: f64,
    pub correlation_shock: f64,
    pub per_symbol_shocks: HashMap<u32, f64>,
}

impl StressScenario {
    pub fn new(
        name: impl Into<String>,
        market_shock: f64,
        volatility_multiplier: f64,
        correlation_shock: f64,
    ) -> Self {
        Self {
            name: name.into(),
            market_shock,
            volatility_multiplier,
            correlation_shock,
            per_symbol_shocks: HashMap::new(),
        }
    }

    pub fn with_symbol_shock(mut self, symbol_id: u32, shock: f64) -> Self {
        self.per_symbol_shocks.insert(symbol_id, shock);
        self
    }
}

/// The four scenarios bundled with the engine by default.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario::new("Financial Crisis 2008", -0.50, 4.0, 0.30),
        StressScenario::new("Flash Crash", -0.20, 10.0, 0.50),
        StressScenario::new("Interest-Rate Shock", -0.15, 2.0, 0.20),
        StressScenario::new("Liquidity Crisis", -0.30, 5.0, 0.40),
    ]
}

/// Everything the engine needs at construction time. Populated by an external
/// loader (config file, secret store, ...) and handed to `RiskEngine::new`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskEngineConfig {
    pub n_max: u32,
    pub h: usize,
    pub w: usize,
    pub var_ttl_ns: u64,
    pub m_simulations: usize,
    pub n_stress: u64,
    pub mc_seed: u64,
    pub limits: RiskLimits,
    pub scenarios: Vec<StressScenario>,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            n_max: DEFAULT_N_MAX,
            h: DEFAULT_H,
            w: DEFAULT_W,
            var_ttl_ns: DEFAULT_VAR_TTL_NS,
            m_simulations: DEFAULT_M_SIMULATIONS,
            n_stress: DEFAULT_N_STRESS,
            mc_seed: DEFAULT_MC_SEED,
            limits: RiskLimits::default(),
            scenarios: default_scenarios(),
        }
    }
}

impl RiskEngineConfig {
    /// Parses a config from a JSON document (a file, a secret store blob, ...)
    /// and validates it before handing it back to the caller.
    pub fn from_json(text: &str) -> Result<Self, RiskError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| RiskError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RiskError> {
        if self.n_max == 0 {
            return Err(RiskError::InvalidConfig("n_max must be > 0".into()));
        }
        if self.w == 0 || self.w > self.h {
            return Err(RiskError::InvalidConfig(format!(
                "correlation window w={} must be in 1..=h ({})",
                self.w, self.h
            )));
        }
        if self.n_stress == 0 {
            return Err(RiskError::InvalidConfig("n_stress must be > 0".into()));
        }
        if self.m_simulations == 0 {
            return Err(RiskError::InvalidConfig("m_simulations must be > 0".into()));
        }
        let l = &self.limits;
        if l.max_portfolio_var < 0.0
            || l.max_position_var < 0.0
            || l.max_stress_loss < 0.0
            || l.max_concentration < 0.0
            || l.max_correlation < 0.0
        {
            return Err(RiskError::InvalidConfig("limits must be non-negative".into()));
        }
        Ok(())
    }
}
