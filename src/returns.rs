use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Bounded ring of daily log-returns for a single symbol. Single-writer,
/// many-reader: readers may observe a sample just before it becomes visible,
/// which is acceptable for a statistical window (see §5 of the design).
struct ReturnRing {
    buffer: Box<[AtomicU64]>,
    write_index: AtomicU32,
    length: AtomicU32,
    capacity: usize,
}

impl ReturnRing {
    fn new(capacity: usize) -> Self {
        let buffer = (0..capacity).map(|_| AtomicU64::new(0.0f64.to_bits())).collect();
        Self {
            buffer,
            write_index: AtomicU32::new(0),
            length: AtomicU32::new(0),
            capacity,
        }
    }

    fn append(&self, r: f64) {
        let idx = self.write_index.load(Ordering::Relaxed) as usize;
        self.buffer[idx].store(r.to_bits(), Ordering::Relaxed);

        let next = (idx + 1) % self.capacity;
        self.write_index.store(next as u32, Ordering::Release);

        let len = self.length.load(Ordering::Relaxed) as usize;
        if len < self.capacity {
            self.length.store((len + 1) as u32, Ordering::Relaxed);
        }
    }

    fn length(&self) -> usize {
        self.length.load(Ordering::Acquire) as usize
    }

    /// Copies the logical sequence (oldest -> newest) into `out`, returning its length.
    fn snapshot(&self, out: &mut Vec<f64>) -> usize {
        out.clear();
        let len = self.length();
        let write = self.write_index.load(Ordering::Acquire) as usize;
        let start = (write + self.capacity - len) % self.capacity;
        out.reserve(len);
        for i in 0..len {
            let idx = (start + i) % self.capacity;
            out.push(f64::from_bits(self.buffer[idx].load(Ordering::Relaxed)));
        }
        len
    }
}

/// Per-symbol bounded ring of daily returns, sized to `N_MAX` symbols at
/// construction and held for the process lifetime.
pub struct ReturnStore {
    rings: Vec<ReturnRing>,
    n_max: u32,
}

impl ReturnStore {
    pub fn new(n_max: u32, h: usize) -> Self {
        Self {
            rings: (0..n_max).map(|_| ReturnRing::new(h)).collect(),
            n_max,
        }
    }

    /// Writes `r` for `symbol_id`. Out-of-range ids are dropped silently, as stores
    /// never surface `OutOfRange` themselves — the gate-facing API does that.
    pub fn append(&self, symbol_id: u32, r: f64) -> bool {
        match self.rings.get(symbol_id as usize) {
            Some(ring) => {
                ring.append(r);
                true
            }
            None => false,
        }
    }

    pub fn length(&self, symbol_id: u32) -> usize {
        self.rings.get(symbol_id as usize).map(|r| r.length()).unwrap_or(0)
    }

    pub fn snapshot(&self, symbol_id: u32, out: &mut Vec<f64>) -> usize {
        match self.rings.get(symbol_id as usize) {
            Some(ring) => ring.snapshot(out),
            None => {
                out.clear();
                0
            }
        }
    }

    pub fn n_max(&self) -> u32 {
        self.n_max
    }
}
