//! Merge-state bookkeeping.
//!
//! Records, per latent-state label, the predictor ranges whose constraints
//! were built. A span uses it to decide which stretch owns an ordinate when
//! stretches overlap.

use std::collections::HashMap;

/// Predictor ranges touched per latent-state label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeState {
    ranges: HashMap<String, Vec<(f64, f64)>>,
}

impl MergeState {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `label` was calibrated over `[left, right]`.
    ///
    /// A range already recorded under any label is moved to `label`, so a
    /// recalibrated segment never appears twice.
    pub fn record(&mut self, label: &str, left: f64, right: f64) {
        for ranges in self.ranges.values_mut() {
            ranges.retain(|&(l, r)| !(l == left && r == right));
        }
        self.ranges.retain(|_, ranges| !ranges.is_empty());
        self.ranges
            .entry(label.to_string())
            .or_default()
            .push((left, right));
    }

    /// True when a range recorded under `label` contains `x`.
    pub fn is_merge_state(&self, x: f64, label: &str) -> bool {
        self.ranges
            .get(label)
            .is_some_and(|ranges| ranges.iter().any(|&(l, r)| x >= l && x <= r))
    }

    /// Ranges recorded under `label`.
    pub fn ranges(&self, label: &str) -> &[(f64, f64)] {
        self.ranges.get(label).map_or(&[], Vec::as_slice)
    }

    /// Labels with at least one recorded range, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.ranges.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
