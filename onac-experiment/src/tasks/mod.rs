//! One module per experiment task. Each runs inside a bootstrapped
//! [`Session`] and leaves shutdown to the caller.

pub mod memory;
pub mod mmn;
pub mod motor;
pub mod resting;
pub mod visual;

use crate::session::Session;
use onac_audio::AudioSink;
use onac_core::{Display, Result};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Mmn,
    Motor,
    Resting,
    Memory,
    Visual,
    VisualBnirs,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::Mmn,
        Task::Motor,
        Task::Resting,
        Task::Memory,
        Task::Visual,
        Task::VisualBnirs,
    ];

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            Task::Mmn => "mmn",
            Task::Motor => "motor",
            Task::Resting => "resting",
            Task::Memory => "memory",
            Task::Visual => "visual",
            Task::VisualBnirs => "visual-bnirs",
        }
    }

    /// Script name recorded in the session info and the output stem.
    pub fn script(self) -> &'static str {
        match self {
            Task::Mmn => "MMN_task",
            Task::Motor => "NM_task",
            Task::Resting | Task::Memory => "frontal_tasks",
            Task::Visual => "visual_stim",
            Task::VisualBnirs => "visual_stim_bNIRS",
        }
    }

    /// Name used in the results file, `P{participant}_{data_name}_data_{date}.csv`.
    pub fn data_name(self) -> &'static str {
        match self {
            Task::Mmn => "mismatched_negativity_task",
            Task::Motor => "naturalistic_motor_task",
            Task::Resting => "resting_state",
            Task::Memory => "memory_task",
            Task::Visual => "visual_stim",
            Task::VisualBnirs => "visual_stim_bNIRS",
        }
    }

    pub fn run<D, T, P, A>(self, session: &mut Session<D, T, P, A>) -> Result<()>
    where
        D: Display,
        T: Timer<Timestamp = u64>,
        P: TriggerPort,
        A: AudioSink,
    {
        match self {
            Task::Mmn => mmn::run(session),
            Task::Motor => motor::run(session),
            Task::Resting => resting::run(session),
            Task::Memory => memory::run(session),
            Task::Visual => visual::run(session),
            Task::VisualBnirs => visual::run_bnirs(session),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown task `{s}`"))
    }
}

/// `1`/`0` for a present answer, empty otherwise.
pub(crate) fn flag(value: Option<bool>) -> Option<u8> {
    value.map(u8::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for task in Task::ALL {
            assert_eq!(task.name().parse::<Task>().unwrap(), task);
        }
        assert!("stroop".parse::<Task>().is_err());
    }

    #[test]
    fn data_names_are_distinct() {
        let mut names: Vec<_> = Task::ALL.iter().map(|t| t.data_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Task::ALL.len());
    }
}
