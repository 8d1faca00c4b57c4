// Bounded per-resource time series for inline trend display

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples kept per resource.
pub const DEFAULT_SPARKLINE_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix time in seconds.
    pub timestamp: i64,
    pub value: f64,
}

/// FIFO ring of samples; the oldest sample is evicted once `capacity` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparklineSeries {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl Default for SparklineSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SPARKLINE_CAPACITY)
    }
}

impl SparklineSeries {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_SPARKLINE_CAPACITY)),
        }
    }

    /// Appends a sample, evicting the oldest first when full. Returns the evicted sample.
    pub fn push(&mut self, timestamp: i64, value: f64) -> Option<Sample> {
        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(Sample { timestamp, value });
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// `(timestamp, value)` pairs, oldest first.
    pub fn points(&self) -> Vec<(i64, f64)> {
        self.samples.iter().map(|s| (s.timestamp, s.value)).collect()
    }
}
