use crate::input::Key;
use crate::trigger::TriggerCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row of a stimulus table after loading. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub index: usize,
    /// Asset identifier: file name, sound name or on-screen text.
    pub stimulus: String,
    pub condition: String,
    pub trigger: Option<TriggerCode>,
    pub duration: Duration,
}

/// The first qualifying key press of a response window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub key: Key,
    /// Measured from the window's first flip.
    pub reaction_time: Duration,
}

impl Response {
    pub fn rt_secs(&self) -> f64 {
        self.reaction_time.as_secs_f64()
    }
}

/// Recorded once per executed trial and never mutated afterwards.
/// A missing response means the participant did not press a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: usize,
    pub stimulus: String,
    pub condition: String,
    pub response: Option<Response>,
    pub correct: Option<bool>,
}

impl TrialResult {
    pub fn from_spec(spec: &TrialSpec, response: Option<Response>) -> Self {
        Self {
            trial: spec.index,
            stimulus: spec.stimulus.clone(),
            condition: spec.condition.clone(),
            response,
            correct: None,
        }
    }

    /// Scores the response against an expected key. Stays `None` without a response.
    pub fn scored(mut self, expected: &Key) -> Self {
        self.correct = self.response.as_ref().map(|r| &r.key == expected);
        self
    }

    pub fn response_key(&self) -> Option<String> {
        self.response.as_ref().map(|r| r.key.name())
    }

    pub fn reaction_time_secs(&self) -> Option<f64> {
        self.response.as_ref().map(Response::rt_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TrialSpec {
        TrialSpec {
            index: 3,
            stimulus: "kitchen.jpg".into(),
            condition: "indoor".into(),
            trigger: None,
            duration: Duration::from_secs(5),
        }
    }

    #[test]
    fn missing_response_is_not_scored() {
        let result = TrialResult::from_spec(&spec(), None).scored(&Key::Left);
        assert_eq!(result.correct, None);
        assert_eq!(result.reaction_time_secs(), None);
        assert_eq!(result.response_key(), None);
    }

    #[test]
    fn scoring_compares_keys() {
        let response = Response {
            key: Key::Right,
            reaction_time: Duration::from_millis(640),
        };
        let result = TrialResult::from_spec(&spec(), Some(response)).scored(&Key::Left);
        assert_eq!(result.correct, Some(false));
        assert_eq!(result.response_key().as_deref(), Some("right"));
        assert!((result.reaction_time_secs().unwrap() - 0.64).abs() < 1e-9);
    }
}
