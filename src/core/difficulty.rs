use crate::core::Block;
use log::info;

// Difficulty adjustment constants
const ADJUSTMENT_INTERVAL: usize = 10; // Re-evaluate every 10 blocks
const FAST_SPAN_SECS: f64 = 50.0; // Window sealed faster than this: harder
const SLOW_SPAN_SECS: f64 = 100.0; // Window sealed slower than this: easier
const INITIAL_DIFFICULTY: u32 = 4; // Starting difficulty
const MIN_DIFFICULTY: u32 = 1; // Minimum difficulty

/// Step controller keeping the mining cadence between two time spans.
///
/// Only chain lengths that are a multiple of the interval trigger a
/// re-evaluation, and each one moves difficulty by at most one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyAdjustment {
    interval: usize,
    fast_span: f64,
    slow_span: f64,
}

impl Default for DifficultyAdjustment {
    fn default() -> Self {
        DifficultyAdjustment {
            interval: ADJUSTMENT_INTERVAL,
            fast_span: FAST_SPAN_SECS,
            slow_span: SLOW_SPAN_SECS,
        }
    }
}

impl DifficultyAdjustment {
    pub fn new(interval: usize, fast_span: f64, slow_span: f64) -> DifficultyAdjustment {
        DifficultyAdjustment {
            interval: interval.max(1),
            fast_span,
            slow_span,
        }
    }

    /// Difficulty to use after `chain`'s newest block was appended
    pub fn calculate_next_difficulty(&self, chain: &[Block], current_difficulty: u32) -> u32 {
        let length = chain.len();
        if length == 0 || length % self.interval != 0 {
            return current_difficulty;
        }

        let window = &chain[length - self.interval..];
        let (oldest, newest) = match (window.first(), window.last()) {
            (Some(oldest), Some(newest)) => (oldest, newest),
            _ => return current_difficulty,
        };
        let span = newest.get_timestamp() - oldest.get_timestamp();
        let new_difficulty = self.adjust_difficulty(current_difficulty, span);

        if new_difficulty != current_difficulty {
            info!("Difficulty adjustment at length {length}: {current_difficulty} -> {new_difficulty} (window span: {span:.2}s)");
        }

        new_difficulty
    }

    fn adjust_difficulty(&self, current_difficulty: u32, span: f64) -> u32 {
        if span < self.fast_span {
            current_difficulty.saturating_add(1)
        } else if span > self.slow_span {
            current_difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
        } else {
            current_difficulty
        }
    }

    /// Replay the controller over an existing chain.
    ///
    /// Element `i` of the result is the difficulty in force when block `i`
    /// was sealed (element 0 belongs to genesis, which is never mined); the
    /// extra last element is the difficulty for the next block.
    pub fn replay(&self, chain: &[Block], initial_difficulty: u32) -> Vec<u32> {
        let mut schedule = Vec::with_capacity(chain.len() + 1);
        let mut difficulty = initial_difficulty;
        schedule.push(difficulty);
        for length in 2..=chain.len() {
            schedule.push(difficulty);
            difficulty = self.calculate_next_difficulty(&chain[..length], difficulty);
        }
        schedule.push(difficulty);
        schedule
    }

    pub fn get_initial_difficulty() -> u32 {
        INITIAL_DIFFICULTY
    }

    pub fn get_min_difficulty() -> u32 {
        MIN_DIFFICULTY
    }

    pub fn get_interval(&self) -> usize {
        self.interval
    }
}
