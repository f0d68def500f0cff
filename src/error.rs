use thiserror::Error;

/// Error surface of the risk engine's public boundary.
///
/// The hot path (`ingest_return`, `update_position`, `check`) never panics under
/// normal operation; every fallible call returns one of these instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskError {
    #[error("symbol id {symbol_id} is out of range (n_max = {n_max})")]
    OutOfRange { symbol_id: u32, n_max: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Which configured limit a failed `check()` violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitViolation {
    PortfolioVar,
    PositionVar { symbol_id: u32 },
    Concentration { symbol_id: u32 },
    Stress,
}

/// Outcome of `RiskEngine::check`. Not a `Result` — a failed check is not an
/// error, it's a classification the caller is expected to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Pass,
    Fail(LimitViolation),
}

impl CheckResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, CheckResult::Pass)
    }
}
