//! Edge detection over sampled control state.
//!
//! Samples say what a control looks like *now*; commands only want to hear
//! about changes. Boolean controls go `Unobserved -> On -> Off -> On ...`
//! (an unobserved control that reads false stays silent), analog controls
//! report every value that differs from the last one reported.

use std::collections::HashMap;
use std::hash::Hash;

/// New state of a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputState {
    On,
    Off,
    /// Analog position in percent of the control's range.
    Axis(f64),
}

impl InputState {
    /// Axis percentage, if this is an axis state.
    #[inline]
    pub fn axis_percent(&self) -> Option<f64> {
        match self {
            InputState::Axis(percent) => Some(*percent),
            _ => None,
        }
    }
}

/// Per-control memory of the last reported state.
#[derive(Debug)]
pub struct EdgeDetector<K> {
    buttons: HashMap<K, bool>,
    axes: HashMap<K, f64>,
}

impl<K: Eq + Hash> EdgeDetector<K> {
    pub fn new() -> Self {
        Self {
            buttons: HashMap::new(),
            axes: HashMap::new(),
        }
    }

    /// Feeds one boolean sample, returning the transition it causes.
    pub fn update_button(&mut self, key: K, pressed: bool) -> Option<InputState> {
        match self.buttons.get_mut(&key) {
            Some(last) if *last == pressed => None,
            Some(last) => {
                *last = pressed;
                Some(if pressed { InputState::On } else { InputState::Off })
            }
            None if pressed => {
                self.buttons.insert(key, true);
                Some(InputState::On)
            }
            None => None,
        }
    }

    /// Feeds one analog sample, returning an axis state when the value moved.
    pub fn update_axis(&mut self, key: K, percent: f64) -> Option<InputState> {
        match self.axes.insert(key, percent) {
            Some(last) if last == percent => None,
            _ => Some(InputState::Axis(percent)),
        }
    }

    /// Last boolean state seen for `key`, `None` while unobserved.
    #[inline]
    pub fn button_state(&self, key: &K) -> Option<bool> {
        self.buttons.get(key).copied()
    }

    /// Forgets every control.
    pub fn reset(&mut self) {
        self.buttons.clear();
        self.axes.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty() && self.axes.is_empty()
    }
}

impl<K: Eq + Hash> Default for EdgeDetector<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(samples: &[bool]) -> Vec<InputState> {
        let mut detector = EdgeDetector::new();
        samples
            .iter()
            .filter_map(|&pressed| detector.update_button("button", pressed))
            .collect()
    }

    #[test]
    fn test_single_press_interval() {
        let events = run(&[false, true, true, true, true, false]);
        assert_eq!(events, vec![InputState::On, InputState::Off]);
    }

    #[test]
    fn test_unobserved_false_is_silent() {
        assert!(run(&[false, false, false]).is_empty());
    }

    #[test]
    fn test_first_sample_pressed_fires_on() {
        assert_eq!(run(&[true]), vec![InputState::On]);
    }

    #[test]
    fn test_never_two_identical_edges_in_a_row() {
        let events = run(&[true, false, false, true, true, false, true, false]);
        assert_eq!(events.len(), 6);
        assert!(events.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_controls_are_tracked_independently() {
        let mut detector = EdgeDetector::new();
        assert_eq!(detector.update_button(1, true), Some(InputState::On));
        assert_eq!(detector.update_button(2, false), None);
        assert_eq!(detector.update_button(1, true), None);
        assert_eq!(detector.update_button(2, true), Some(InputState::On));
        assert_eq!(detector.button_state(&1), Some(true));
        assert_eq!(detector.button_state(&3), None);
    }

    #[test]
    fn test_axis_reports_only_changes() {
        let mut detector = EdgeDetector::new();
        assert_eq!(detector.update_axis("x", 50.0), Some(InputState::Axis(50.0)));
        assert_eq!(detector.update_axis("x", 50.0), None);
        assert_eq!(detector.update_axis("x", 75.0), Some(InputState::Axis(75.0)));
        assert_eq!(detector.update_axis("y", 75.0), Some(InputState::Axis(75.0)));
    }

    #[test]
    fn test_reset_forgets_state() {
        let mut detector = EdgeDetector::new();
        detector.update_button("b", true);
        detector.update_axis("a", 10.0);
        detector.reset();

        assert!(detector.is_empty());
        assert_eq!(detector.update_button("b", true), Some(InputState::On));
    }

    #[test]
    fn test_axis_percent_accessor() {
        assert_eq!(InputState::Axis(12.5).axis_percent(), Some(12.5));
        assert_eq!(InputState::On.axis_percent(), None);
    }
}
