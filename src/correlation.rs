use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::position::PositionRisk;

/// Rolling pairwise Pearson correlation over the traded universe. Stored as a
/// flat row-major `N_MAX x N_MAX` matrix of atomic f32 bit patterns: the writer
/// publishes with release semantics, readers acquire. Torn reads across distinct
/// cells are acceptable — there is no read lock.
pub struct CorrelationMatrix {
    cells: Vec<AtomicU32>,
    last_update: Vec<AtomicU64>,
    n_max: u32,
}

impl CorrelationMatrix {
    pub fn new(n_max: u32) -> Self {
        let size = n_max as usize * n_max as usize;
        let cells = (0..size)
            .map(|idx| {
                let (i, j) = (idx / n_max as usize, idx % n_max as usize);
                let v = if i == j { 1.0f32 } else { 0.0f32 };
                AtomicU32::new(v.to_bits())
            })
            .collect();
        Self {
            cells,
            last_update: (0..n_max).map(|_| AtomicU64::new(0)).collect(),
            n_max,
        }
    }

    fn index(&self, i: u32, j: u32) -> usize {
        i as usize * self.n_max as usize + j as usize
    }

    /// O(1) read. Returns 0 for out-of-range ids.
    pub fn correlation(&self, i: u32, j: u32) -> f32 {
        if i >= self.n_max || j >= self.n_max {
            return 0.0;
        }
        f32::from_bits(self.cells[self.index(i, j)].load(Ordering::Acquire))
    }

    /// Pearson correlation over the most recent `w` aligned samples of `ret_i`
    /// and `ret_j`. A no-op if the two series don't have equal length or don't
    /// cover at least `w` samples.
    pub fn update(&self, i: u32, j: u32, ret_i: &[f64], ret_j: &[f64], w: usize, now_ns: u64) {
        if i >= self.n_max || j >= self.n_max {
            return;
        }
        if ret_i.len() != ret_j.len() || ret_i.len() < w {
            return;
        }

        let n = ret_i.len().min(w);
        let a = &ret_i[ret_i.len() - n..];
        let b = &ret_j[ret_j.len() - n..];

        let mean_a = a.iter().sum::<f64>() / n as f64;
        let mean_b = b.iter().sum::<f64>() / n as f64;

        let (mut cov, mut var_a, mut var_b) = (0.0_f64, 0.0_f64, 0.0_f64);
        for k in 0..n {
            let da = a[k] - mean_a;
            let db = b[k] - mean_b;
            cov += da * db;
            var_a += da * da;
            var_b += db * db;
        }

        let rho = if var_a > 0.0 && var_b > 0.0 {
            (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let rho_bits = (rho as f32).to_bits();

        self.cells[self.index(i, j)].store(rho_bits, Ordering::Release);
        self.cells[self.index(j, i)].store(rho_bits, Ordering::Release);
        self.last_update[i as usize].store(now_ns, Ordering::Relaxed);
        self.last_update[j as usize].store(now_ns, Ordering::Relaxed);
    }

    /// Diagnostic aggregate, not a VaR substitute: sums `2 * rho(i,j) * var_i * var_j`
    /// over unordered pairs of held positions.
    pub fn portfolio_correlation_risk(&self, positions: &[PositionRisk]) -> f64 {
        let mut total = 0.0;
        for a in 0..positions.len() {
            for b in (a + 1)..positions.len() {
                let rho = self.correlation(positions[a].symbol_id, positions[b].symbol_id) as f64;
                total += 2.0 * rho * positions[a].var_contribution * positions[b].var_contribution;
            }
        }
        total
    }

    pub fn last_update_ns(&self, symbol_id: u32) -> u64 {
        self.last_update
            .get(symbol_id as usize)
            .map(|a| a.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}
