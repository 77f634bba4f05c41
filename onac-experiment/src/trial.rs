//! The frame-locked trial loop.

use crate::session::Session;
use onac_audio::{AudioSink, Sound};
use onac_core::{Display, KeySet, Response, Result, Scene, TrialSpec, TriggerCode};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use std::sync::Arc;
use std::time::Duration;

/// Side effects applied right after a flip returns.
#[derive(Debug, Clone, Default)]
pub struct FrameIntent {
    pub trigger: Option<TriggerCode>,
    pub sound: Option<Arc<Sound>>,
}

impl FrameIntent {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn trigger(code: TriggerCode) -> Self {
        Self {
            trigger: Some(code),
            sound: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// The trial always lasts its full duration.
    RunFull,
    /// The trial ends on the frame a response is collected.
    EndOnResponse,
}

/// Keys accepted between `start` and `end`, both relative to trial onset.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseWindow {
    pub start: Duration,
    pub end: Duration,
    pub keys: KeySet,
}

impl ResponseWindow {
    pub fn new(start: Duration, end: Duration, keys: KeySet) -> Self {
        Self { start, end, keys }
    }

    pub fn whole(duration: Duration, keys: KeySet) -> Self {
        Self::new(Duration::ZERO, duration, keys)
    }

    fn contains(&self, t: Duration) -> bool {
        t >= self.start && t < self.end
    }
}

#[derive(Debug, Clone)]
pub struct TrialPlan {
    pub duration: Duration,
    /// Sent once, on the first flip.
    pub trigger: Option<TriggerCode>,
    /// Started once, on the first flip.
    pub sound: Option<Arc<Sound>>,
    pub windows: Vec<ResponseWindow>,
    pub exit: ExitPolicy,
}

impl TrialPlan {
    /// Runs for `duration` and collects nothing.
    pub fn passive(duration: Duration) -> Self {
        Self {
            duration,
            trigger: None,
            sound: None,
            windows: Vec::new(),
            exit: ExitPolicy::RunFull,
        }
    }

    /// Runs for the spec's nominal duration and sends its trigger.
    pub fn for_spec(spec: &TrialSpec) -> Self {
        Self::passive(spec.duration).with_trigger(spec.trigger)
    }

    pub fn with_trigger(mut self, trigger: Option<TriggerCode>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_sound(mut self, sound: Option<Arc<Sound>>) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_window(mut self, window: ResponseWindow) -> Self {
        self.windows.push(window);
        self
    }

    pub fn ending_on_response(mut self) -> Self {
        self.exit = ExitPolicy::EndOnResponse;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    /// One slot per window, in plan order.
    pub responses: Vec<Option<Response>>,
    /// Timestamp of the first flip.
    pub onset_ns: Option<u64>,
    pub elapsed: Duration,
    pub frames: usize,
    pub ended_early: bool,
}

impl TrialOutcome {
    pub fn response(&self, window: usize) -> Option<&Response> {
        self.responses.get(window).and_then(Option::as_ref)
    }

    pub fn first_response(&self) -> Option<&Response> {
        self.responses.iter().flatten().next()
    }
}

impl<D, T, P, A> Session<D, T, P, A>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    /// Presents one trial. `frame` is asked for the scene at each elapsed time;
    /// the trigger and sound go out with the first flip only.
    ///
    /// A window's reaction times count from its first flip. Keys stamped
    /// earlier than that are discarded, and only the first matching key of a
    /// window is kept.
    pub fn run_trial<F>(&mut self, plan: &TrialPlan, mut frame: F) -> Result<TrialOutcome>
    where
        F: FnMut(Duration) -> Scene,
    {
        self.poll_input();
        self.check_for_escape()?;
        self.keys.clear();

        let start = self.timer.now();
        let mut window_onsets: Vec<Option<u64>> = vec![None; plan.windows.len()];
        let mut responses: Vec<Option<Response>> = vec![None; plan.windows.len()];
        let mut onset_ns = None;
        let mut frames = 0;
        let mut ended_early = false;
        let mut elapsed = Duration::ZERO;

        while elapsed < plan.duration {
            let scene = frame(elapsed);
            let intent = if frames == 0 {
                FrameIntent {
                    trigger: plan.trigger,
                    sound: plan.sound.clone(),
                }
            } else {
                FrameIntent::none()
            };
            let flip_ns = self.publish_frame(&scene, intent)?;
            frames += 1;
            onset_ns.get_or_insert(flip_ns);

            for (i, window) in plan.windows.iter().enumerate() {
                if responses[i].is_some() || !window.contains(elapsed) {
                    continue;
                }
                let opened = *window_onsets[i].get_or_insert(flip_ns);
                let hit = self
                    .keys
                    .take_matching(&window.keys)
                    .into_iter()
                    .find(|e| e.timestamp_ns >= opened);
                if let Some(event) = hit {
                    responses[i] = Some(Response {
                        key: event.key,
                        reaction_time: Duration::from_nanos(event.timestamp_ns - opened),
                    });
                }
            }
            self.keys.clear();

            elapsed = self.timer.elapsed(start);
            if plan.exit == ExitPolicy::EndOnResponse && responses.iter().any(Option::is_some) {
                ended_early = elapsed < plan.duration;
                break;
            }
        }

        Ok(TrialOutcome {
            responses,
            onset_ns,
            elapsed,
            frames,
            ended_early,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onac_core::Key;

    #[test]
    fn plans_built_from_a_spec_carry_its_trigger_and_duration() {
        let spec = TrialSpec {
            index: 0,
            stimulus: "e1.jpg".into(),
            condition: "indoor".into(),
            trigger: Some(TriggerCode::ENCODING_BLOCK),
            duration: Duration::from_secs(5),
        };

        let plan = TrialPlan::for_spec(&spec)
            .with_window(ResponseWindow::whole(spec.duration, KeySet::only([Key::Left])));

        assert_eq!(plan.duration, Duration::from_secs(5));
        assert_eq!(plan.trigger, spec.trigger);
        assert_eq!(plan.exit, ExitPolicy::RunFull);
        assert!(plan.sound.is_none());
    }
}
