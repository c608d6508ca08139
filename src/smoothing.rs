//! Level smoothing over a fixed window of recent buffers

use crate::constants::smoothing::DEFAULT_HISTORY;

/// Ring of the most recent normalized levels plus the highest average seen
///
/// The mean always covers the whole ring, including slots that were never
/// written, so the display stays low until `capacity` buffers have arrived.
#[derive(Debug, Clone)]
pub struct LevelSmoother {
    history: Vec<f32>,
    write_index: usize,
    running_max: f32,
}

impl LevelSmoother {
    /// Create a smoother holding `capacity` levels, all starting at zero.
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![0.0; capacity.max(1)],
            write_index: 0,
            running_max: 0.0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.history.len()
    }

    /// Store a level, overwriting the oldest one once the ring is full
    pub fn insert(&mut self, level: f32) {
        self.history[self.write_index] = level;
        self.write_index = (self.write_index + 1) % self.history.len();
    }

    /// Mean of every slot in the ring
    pub fn mean(&self) -> f32 {
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    /// Mean as a percentage, the unit shown on screen
    pub fn scaled_mean(&self) -> f32 {
        self.mean() * 100.0
    }

    /// Raise the running maximum to the current scaled mean if it is higher
    pub fn update_running_maximum(&mut self) {
        let current = self.scaled_mean();
        if current > self.running_max {
            self.running_max = current;
        }
    }

    /// Highest scaled mean seen since creation or the last reset
    pub fn running_maximum(&self) -> f32 {
        self.running_max
    }

    /// Zero the ring and the running maximum
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.running_max = 0.0;
    }
}

impl Default for LevelSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
