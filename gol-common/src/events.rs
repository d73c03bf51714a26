//! Events the controller publishes for its front-end.

use std::fmt;

use crate::grid::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Executing,
    Paused,
    Quitting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Executing => write!(f, "Executing"),
            State::Paused => write!(f, "Paused"),
            State::Quitting => write!(f, "Quitting"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    AliveCellsCount { completed_turns: u32, count: u64 },
    FinalTurnComplete { completed_turns: u32, alive: Vec<Cell> },
    StateChange { completed_turns: u32, state: State },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::AliveCellsCount {
                completed_turns,
                count,
            } => write!(f, "{count} cells alive after turn {completed_turns}"),
            Event::FinalTurnComplete {
                completed_turns,
                alive,
            } => write!(
                f,
                "final turn {completed_turns} complete, {} cells alive",
                alive.len()
            ),
            Event::StateChange {
                completed_turns,
                state,
            } => write!(f, "{state} on turn {completed_turns}"),
        }
    }
}
