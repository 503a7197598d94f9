//! Rolling fill-price statistics.
//!
//! No teacher equivalent exists — the teacher's `Orderbook` tracks no
//! statistics at all. Grounded on `pybroker/order_matching.py`'s
//! `_update_moving_averages`: a circular buffer of up to `capacity` recent
//! fill prices, with simple moving averages and standard deviations
//! computed over trailing windows, recomputed from scratch on every fill
//! (the Python source recomputes rather than maintaining incremental
//! sums, and a buffer capped at 100 makes that the right call in Rust
//! too — no need for Welford's algorithm at this scale).

const DEFAULT_WINDOWS: [usize; 4] = [5, 10, 50, 100];

#[derive(Clone, Debug)]
pub struct RollingStats {
    capacity: usize,
    windows: [usize; 4],
    buffer: Vec<f64>,
    tick: u64,
}

impl RollingStats {
    pub fn new(capacity: usize) -> RollingStats {
        RollingStats::with_windows(capacity, DEFAULT_WINDOWS)
    }

    pub fn with_windows(capacity: usize, windows: [usize; 4]) -> RollingStats {
        RollingStats {
            capacity,
            windows,
            buffer: Vec::with_capacity(capacity),
            tick: 0,
        }
    }

    /// Records a new fill price into the circular buffer. Only called on a
    /// successful match — never on limit placement or cancellation.
    pub fn record_fill(&mut self, price: f64) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(price);
        } else {
            let index = (self.tick as usize) % self.capacity;
            self.buffer[index] = price;
        }
        self.tick += 1;
    }

    fn moving_average(&self, window_size: usize) -> Option<f64> {
        let window = self.windowed_values(window_size);
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f64>() / window.len() as f64)
    }

    fn standard_deviation(&self, window_size: usize) -> Option<f64> {
        let window = self.windowed_values(window_size);
        if window.is_empty() {
            return None;
        }
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let variance =
            window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window.len() as f64;
        Some(variance.sqrt())
    }

    /// Materializes the trailing `window_size` samples in chronological
    /// order, handling the ring-buffer wraparound that `trailing_window`'s
    /// slice view can't express directly.
    fn windowed_values(&self, window_size: usize) -> Vec<f64> {
        let n = self.buffer.len().min(window_size);
        if n == 0 {
            return Vec::new();
        }
        if self.buffer.len() < self.capacity {
            return self.buffer[self.buffer.len() - n..].to_vec();
        }
        let mut out = Vec::with_capacity(n);
        let last = (self.tick as usize + self.capacity - 1) % self.capacity;
        for i in 0..n {
            let idx = (last + self.capacity - (n - 1 - i)) % self.capacity;
            out.push(self.buffer[idx]);
        }
        out
    }

    pub fn moving_averages(&self) -> [Option<f64>; 4] {
        let windows = self.windows;
        [
            self.moving_average(windows[0]),
            self.moving_average(windows[1]),
            self.moving_average(windows[2]),
            self.moving_average(windows[3]),
        ]
    }

    pub fn standard_deviations(&self) -> [Option<f64>; 4] {
        let windows = self.windows;
        [
            self.standard_deviation(windows[0]),
            self.standard_deviation(windows[1]),
            self.standard_deviation(windows[2]),
            self.standard_deviation(windows[3]),
        ]
    }
}
