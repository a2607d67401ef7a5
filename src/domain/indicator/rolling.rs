//! Fixed-width rolling aggregates with O(1) amortized updates.

use std::collections::VecDeque;

/// Simple moving average over the last `window` pushed values.
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
            sum: 0.0,
        }
    }

    /// Returns the mean once `window` values have been seen.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.window {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.current()
    }

    pub fn current(&self) -> Option<f64> {
        if self.window == 0 || self.values.len() < self.window {
            return None;
        }
        // Running sums can drift a hair below zero on all-zero windows.
        Some((self.sum / self.window as f64).max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

/// Rolling min or max over the last `window` values (monotonic deque).
#[derive(Debug, Clone)]
pub struct RollingExtreme {
    kind: Extreme,
    window: usize,
    seen: usize,
    deque: VecDeque<(usize, f64)>,
}

impl RollingExtreme {
    pub fn new(kind: Extreme, window: usize) -> Self {
        Self {
            kind,
            window,
            seen: 0,
            deque: VecDeque::new(),
        }
    }

    fn dominates(&self, candidate: f64, existing: f64) -> bool {
        match self.kind {
            Extreme::Min => candidate <= existing,
            Extreme::Max => candidate >= existing,
        }
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        let index = self.seen;
        self.seen += 1;

        while let Some(&(_, back)) = self.deque.back() {
            if self.dominates(value, back) {
                self.deque.pop_back();
            } else {
                break;
            }
        }
        self.deque.push_back((index, value));

        while let Some(&(front_index, _)) = self.deque.front() {
            if front_index + self.window <= index {
                self.deque.pop_front();
            } else {
                break;
            }
        }

        self.current()
    }

    pub fn current(&self) -> Option<f64> {
        if self.window == 0 || self.seen < self.window {
            return None;
        }
        self.deque.front().map(|&(_, v)| v)
    }
}
