//! Debounced driver state tracking
//!
//! Each frame with a measured eye openness extends exactly one run and
//! zeroes the other two, so at most one run counter is ever nonzero.
//! A status is only promoted once its run reaches the configured limit.

use serde::{Deserialize, Serialize};

use crate::config::{DebounceLimits, EyeThresholds};
use crate::status::Status;

/// Instantaneous per-frame eye classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EyeClass {
    Closed,
    HalfClosed,
    Open,
}

/// Run lengths carried across frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StabilizerState {
    /// Consecutive closed-eye frames
    pub sleep_run: u32,
    /// Consecutive half-closed frames
    pub drowsy_run: u32,
    /// Consecutive open-eye frames
    pub active_run: u32,
}

impl StabilizerState {
    pub fn classify(ratio: f32, thresholds: &EyeThresholds) -> EyeClass {
        if ratio < thresholds.closed {
            EyeClass::Closed
        } else if ratio < thresholds.drowsy_max {
            EyeClass::HalfClosed
        } else {
            EyeClass::Open
        }
    }

    /// Next state after observing `ratio`
    pub fn update(self, ratio: f32, thresholds: &EyeThresholds) -> (Self, EyeClass) {
        let class = Self::classify(ratio, thresholds);
        let next = match class {
            EyeClass::Closed => Self {
                sleep_run: self.sleep_run.saturating_add(1),
                ..Self::default()
            },
            EyeClass::HalfClosed => Self {
                drowsy_run: self.drowsy_run.saturating_add(1),
                ..Self::default()
            },
            EyeClass::Open => Self {
                active_run: self.active_run.saturating_add(1),
                ..Self::default()
            },
        };
        (next, class)
    }

    /// In-place form of [`StabilizerState::update`]
    pub fn apply(&mut self, ratio: f32, thresholds: &EyeThresholds) -> EyeClass {
        let (next, class) = self.update(ratio, thresholds);
        *self = next;
        class
    }

    /// Status a run has earned, checked in sleep, drowsy, active order
    pub fn debounced(&self, limits: &DebounceLimits) -> Option<Status> {
        if self.sleep_run >= limits.sleep {
            Some(Status::Sleeping)
        } else if self.drowsy_run >= limits.drowsy {
            Some(Status::Drowsy)
        } else if self.active_run >= limits.active {
            Some(Status::Active)
        } else {
            None
        }
    }

    pub fn is_exclusive(&self) -> bool {
        [self.sleep_run, self.drowsy_run, self.active_run]
            .iter()
            .filter(|&&run| run > 0)
            .count()
            <= 1
    }

    /// Reset state (on driver change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(ratios: &[f32]) -> (StabilizerState, Vec<Option<Status>>) {
        let thresholds = EyeThresholds::default();
        let limits = DebounceLimits::default();
        let mut state = StabilizerState::default();
        let statuses = ratios
            .iter()
            .map(|&r| {
                state.apply(r, &thresholds);
                state.debounced(&limits)
            })
            .collect();
        (state, statuses)
    }

    #[test]
    fn test_classification_boundaries() {
        let t = EyeThresholds::default();
        assert_eq!(StabilizerState::classify(0.10, &t), EyeClass::Closed);
        assert_eq!(StabilizerState::classify(0.22, &t), EyeClass::HalfClosed);
        assert_eq!(StabilizerState::classify(0.29, &t), EyeClass::HalfClosed);
        assert_eq!(StabilizerState::classify(0.30, &t), EyeClass::Open);
        assert_eq!(StabilizerState::classify(0.0, &t), EyeClass::Closed);
    }

    #[test]
    fn test_sleeping_on_sixth_closed_frame() {
        let (state, statuses) = run(&[0.10; 6]);
        assert!(statuses[..5].iter().all(|s| *s != Some(Status::Sleeping)));
        assert_eq!(statuses[5], Some(Status::Sleeping));
        assert_eq!(state.sleep_run, 6);
    }

    #[test]
    fn test_open_frame_breaks_sleep_run() {
        let (state, statuses) = run(&[0.10, 0.10, 0.10, 0.10, 0.10, 0.95]);
        assert_eq!(state, StabilizerState { sleep_run: 0, drowsy_run: 0, active_run: 1 });
        assert_eq!(statuses[5], None);
    }

    #[test]
    fn test_drowsy_and_active_promotion() {
        let (_, statuses) = run(&[0.25; 6]);
        assert_eq!(statuses[5], Some(Status::Drowsy));

        let (_, statuses) = run(&[0.5; 7]);
        assert_eq!(statuses[4], None);
        assert_eq!(statuses[5], Some(Status::Active));
        assert_eq!(statuses[6], Some(Status::Active));
    }

    #[test]
    fn test_update_is_pure() {
        let before = StabilizerState { sleep_run: 3, ..Default::default() };
        let (after, class) = before.update(0.25, &EyeThresholds::default());
        assert_eq!(before.sleep_run, 3);
        assert_eq!(class, EyeClass::HalfClosed);
        assert_eq!(after, StabilizerState { drowsy_run: 1, ..Default::default() });
    }

    #[test]
    fn test_reset() {
        let (mut state, _) = run(&[0.10; 3]);
        state.reset();
        assert_eq!(state, StabilizerState::default());
    }

    proptest! {
        #[test]
        fn prop_runs_mutually_exclusive(ratios in prop::collection::vec(0.0f32..1.5, 1..200)) {
            let thresholds = EyeThresholds::default();
            let mut state = StabilizerState::default();
            for r in ratios {
                state.apply(r, &thresholds);
                prop_assert!(state.is_exclusive());
                prop_assert!(state.sleep_run + state.drowsy_run + state.active_run >= 1);
            }
        }

        #[test]
        fn prop_no_promotion_before_limit(n in 1usize..6, r in 0.0f32..1.5) {
            let (_, statuses) = run(&vec![r; n]);
            prop_assert!(statuses.iter().all(Option::is_none));
        }
    }
}
