//! Test doubles for the session's hardware seams and clock.
//!
//! Each double is cheap to clone and clones share state, so a test can hand
//! one copy to the session builder and keep another for assertions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use palette_core::clock::Clock;
use palette_core::error::{Error, Result};
use palette_core::stages::{InputStage, OutputStage, StatusIndicator};
use palette_core::types::Sample;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`Clock`] that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_micros: u64) -> Self {
        Self {
            micros: Arc::new(AtomicU64::new(start_micros)),
        }
    }

    pub fn set(&self, micros: u64) {
        self.micros.store(micros, Ordering::SeqCst);
    }

    pub fn advance(&self, micros: u64) {
        self.micros.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

/// An [`OutputStage`] that remembers every Channel Set it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutputStage {
    applied: Arc<Mutex<Vec<Vec<Sample>>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl RecordingOutputStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All Channel Sets applied so far, oldest first.
    pub fn applied(&self) -> Vec<Vec<Sample>> {
        lock(&self.applied).clone()
    }

    /// Make every following `apply()` fail with [`Error::Hardware`].
    pub fn fail_with(&self, message: &str) {
        *lock(&self.fail_with) = Some(message.to_string());
    }
}

impl OutputStage for RecordingOutputStage {
    fn apply(&mut self, samples: &[Sample]) -> Result<()> {
        if let Some(message) = lock(&self.fail_with).clone() {
            return Err(Error::Hardware(message));
        }
        lock(&self.applied).push(samples.to_vec());
        Ok(())
    }
}

/// An [`InputStage`] that always reports the same values and records the
/// elapsed times it was called with.
#[derive(Debug, Clone)]
pub struct FixedInputStage {
    values: Vec<Sample>,
    elapsed: Arc<Mutex<Vec<u64>>>,
}

impl FixedInputStage {
    /// `values` is repeated or truncated to fit the session's channel count.
    pub fn new(values: &[Sample]) -> Self {
        Self {
            values: values.to_vec(),
            elapsed: Arc::default(),
        }
    }

    /// The `elapsed_micros` argument of every `sample()` call so far.
    pub fn elapsed_calls(&self) -> Vec<u64> {
        lock(&self.elapsed).clone()
    }
}

impl InputStage for FixedInputStage {
    fn sample(&mut self, elapsed_micros: u64, out: &mut [Sample]) -> Result<()> {
        lock(&self.elapsed).push(elapsed_micros);
        if self.values.is_empty() {
            out.fill(0);
        } else {
            for (slot, value) in out.iter_mut().zip(self.values.iter().cycle()) {
                *slot = *value;
            }
        }
        Ok(())
    }
}

/// A [`StatusIndicator`] that records every level it was driven to.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        lock(&self.levels).clone()
    }

    /// Number of complete low-then-high pulses.
    pub fn pulses(&self) -> usize {
        lock(&self.levels)
            .windows(2)
            .filter(|w| !w[0] && w[1])
            .count()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set(&mut self, high: bool) {
        lock(&self.levels).push(high);
    }
}
