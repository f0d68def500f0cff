use std::collections::HashMap;
use std::sync::RwLock;

/// Per-symbol risk record. Cache-line aligned, following this crate's convention
/// for hot structures (see `CacheOptimizedMarketData` in the teacher's
/// `cache_optimized.rs`): one position fits in a single cache line's worth of
/// fetches even though the struct itself spans more than 64 bytes of fields.
#[repr(C)]
#[repr(align(64))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRisk {
    pub symbol_id: u32,
    pub quantity: f64,
    pub market_value: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub beta: f64,
    pub var_contribution: f64,
    pub stress_loss: f64,
    pub correlation_risk: f64,
    pub last_update_ns: u64,
}

/// Where a position sits in its quantity lifecycle. `Uninitialized` has no
/// representation here — the book simply has no entry for the symbol yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Long,
    Short,
    Flat,
}

impl PositionRisk {
    fn new(symbol_id: u32) -> Self {
        Self {
            symbol_id,
            quantity: 0.0,
            market_value: 0.0,
            delta: 0.0,
            gamma: 0.0,
            vega: 0.0,
            theta: 0.0,
            beta: 0.0,
            var_contribution: 0.0,
            stress_loss: 0.0,
            correlation_risk: 0.0,
            last_update_ns: 0,
        }
    }

    pub fn state(&self) -> PositionState {
        if self.quantity == 0.0 {
            PositionState::Flat
        } else if self.quantity > 0.0 {
            PositionState::Long
        } else {
            PositionState::Short
        }
    }
}

/// Keyed map of `symbol_id -> PositionRisk`, mutated by trade events. Positions
/// are created on first trade and retained after flattening — they are never
/// deleted, so their history contribution (e.g. `var_contribution`) survives.
pub struct PositionBook {
    positions: RwLock<HashMap<u32, PositionRisk>>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
        }
    }

    /// Upserts quantity/market value/delta and the freshly computed VaR
    /// contribution. Greeks are left at their last-supplied value (0 if never set).
    pub fn update(
        &self,
        symbol_id: u32,
        quantity: f64,
        market_value: f64,
        delta: f64,
        var_contribution: f64,
        now_ns: u64,
    ) {
        let mut guard = self.positions.write().unwrap();
        let position = guard.entry(symbol_id).or_insert_with(|| PositionRisk::new(symbol_id));
        position.quantity = quantity;
        position.market_value = market_value;
        position.delta = delta;
        position.var_contribution = var_contribution;
        position.last_update_ns = now_ns;
    }

    pub fn update_greeks(&self, symbol_id: u32, gamma: f64, vega: f64, theta: f64, beta: f64) {
        let mut guard = self.positions.write().unwrap();
        let position = guard.entry(symbol_id).or_insert_with(|| PositionRisk::new(symbol_id));
        position.gamma = gamma;
        position.vega = vega;
        position.theta = theta;
        position.beta = beta;
    }

    pub fn set_stress_and_correlation_risk(&self, symbol_id: u32, stress_loss: f64, correlation_risk: f64) {
        let mut guard = self.positions.write().unwrap();
        if let Some(position) = guard.get_mut(&symbol_id) {
            position.stress_loss = stress_loss;
            position.correlation_risk = correlation_risk;
        }
    }

    /// A consistent snapshot of all positions for downstream calculations. The
    /// read lock is released before any caller does further (possibly expensive)
    /// work with the copy.
    pub fn snapshot(&self) -> Vec<PositionRisk> {
        self.positions.read().unwrap().values().copied().collect()
    }

    pub fn get(&self, symbol_id: u32) -> Option<PositionRisk> {
        self.positions.read().unwrap().get(&symbol_id).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PositionBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_size_is_cache_line_aligned() {
        assert_eq!(std::mem::align_of::<PositionRisk>(), 64);
    }

    #[test]
    fn first_trade_creates_the_position() {
        let book = PositionBook::new();
        assert!(book.get(5).is_none());
        book.update(5, 100.0, 15_000.0, 0.5, 200.0, 1);
        let p = book.get(5).unwrap();
        assert_eq!(p.quantity, 100.0);
        assert_eq!(p.market_value, 15_000.0);
        assert_eq!(p.state(), PositionState::Long);
    }

    #[test]
    fn flattened_position_is_retained_not_deleted() {
        let book = PositionBook::new();
        book.update(5, 100.0, 15_000.0, 0.5, 200.0, 1);
        book.update(5, 0.0, 0.0, 0.0, 0.0, 2);
        let p = book.get(5).unwrap();
        assert_eq!(p.state(), PositionState::Flat);
        assert_eq!(p.market_value, 0.0);
    }

    #[test]
    fn repeated_identical_update_is_byte_identical_except_timestamp() {
        let book = PositionBook::new();
        book.update(7, 10.0, 1_000.0, 0.3, 50.0, 1);
        let first = book.get(7).unwrap();
        book.update(7, 10.0, 1_000.0, 0.3, 50.0, 2);
        let second = book.get(7).unwrap();
        assert_eq!(first.quantity, second.quantity);
        assert_eq!(first.market_value, second.market_value);
        assert_eq!(first.delta, second.delta);
        assert_eq!(first.var_contribution, second.var_contribution);
        assert_ne!(first.last_update_ns, second.last_update_ns);
    }

    #[test]
    fn greeks_default_to_zero_until_supplied() {
        let book = PositionBook::new();
        book.update(1, 1.0, 1.0, 1.0, 0.0, 1);
        assert_eq!(book.get(1).unwrap().gamma, 0.0);
        book.update_greeks(1, 0.02, 0.1, -0.01, 1.1);
        assert_eq!(book.get(1).unwrap().gamma, 0.02);
    }
}
