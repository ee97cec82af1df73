//! Per filter bookkeeping of how far each phase got.
//!
//! A [`FilterRecord`] keeps one [`PhaseState`] per [`Phase`]. The iteration engine
//! consults it to decide whether a later phase reaching a filter resumes an earlier
//! stop, and to reject `ResumeIteration` statuses that have nothing to resume.

use std::fmt;

use micro_stream::protocol::{Phase, StreamError};

/// How far a single phase progressed through one filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PhaseState {
    /// The filter has not returned a status for this phase yet
    #[default]
    NotStarted,
    /// The payload was passed on to the next filter
    Forwarded,
    /// The filter stopped iteration, payload is parked at the filter
    Stopped,
    /// Iteration stopped by the filter was resumed
    Resumed,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseState::NotStarted => f.write_str("not started"),
            PhaseState::Forwarded => f.write_str("forwarded"),
            PhaseState::Stopped => f.write_str("stopped"),
            PhaseState::Resumed => f.write_str("resumed"),
        }
    }
}

/// The phase table of one filter.
///
/// At most one phase is [`PhaseState::Stopped`] at a time, the earliest one. A filter
/// that stops headers and later stops data is still recorded as stopped at headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRecord {
    phases: [PhaseState; 3],
}

impl FilterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, phase: Phase) -> PhaseState {
        self.phases[phase.index()]
    }

    /// Returns the phase this filter currently holds iteration at.
    pub fn stopped(&self) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| self.get(*phase) == PhaseState::Stopped)
    }

    /// Records that `phase` was passed on to the next filter.
    ///
    /// Headers and trailers are forwarded once; data carries many chunks and may be
    /// forwarded again, also after a resume.
    pub fn forward(&mut self, phase: Phase) -> Result<(), StreamError> {
        let next = match (phase, self.get(phase)) {
            (_, PhaseState::NotStarted) | (Phase::Data, PhaseState::Forwarded | PhaseState::Resumed) => {
                PhaseState::Forwarded
            }
            (_, state) => return Err(Self::illegal(phase, state, PhaseState::Forwarded)),
        };
        self.phases[phase.index()] = next;
        Ok(())
    }

    /// Records that the filter stopped iteration during `phase`.
    ///
    /// If an earlier phase is already stopped the record is left untouched.
    pub fn stop(&mut self, phase: Phase) -> Result<(), StreamError> {
        if self.stopped().is_some() {
            return Ok(());
        }

        let next = match (phase, self.get(phase)) {
            (_, PhaseState::NotStarted) | (Phase::Data, PhaseState::Forwarded | PhaseState::Resumed) => {
                PhaseState::Stopped
            }
            (_, state) => return Err(Self::illegal(phase, state, PhaseState::Stopped)),
        };
        self.phases[phase.index()] = next;
        Ok(())
    }

    /// Resumes the stopped phase and returns it.
    pub fn resume(&mut self) -> Result<Phase, StreamError> {
        let Some(phase) = self.stopped() else {
            return Err(StreamError::illegal_state("can not resume iteration, no phase is stopped"));
        };
        self.phases[phase.index()] = PhaseState::Resumed;
        Ok(phase)
    }

    fn illegal(phase: Phase, from: PhaseState, to: PhaseState) -> StreamError {
        StreamError::illegal_state(format!("{phase} phase can not move from {from} to {to}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_forwarded_once() {
        let mut record = FilterRecord::new();
        record.forward(Phase::Headers).unwrap();

        assert_eq!(record.get(Phase::Headers), PhaseState::Forwarded);
        assert!(record.forward(Phase::Headers).unwrap_err().is_illegal_state());
        assert!(record.stop(Phase::Headers).unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_data_may_be_forwarded_and_stopped_repeatedly() {
        let mut record = FilterRecord::new();
        record.forward(Phase::Data).unwrap();
        record.forward(Phase::Data).unwrap();
        record.stop(Phase::Data).unwrap();

        assert_eq!(record.stopped(), Some(Phase::Data));
        assert_eq!(record.resume().unwrap(), Phase::Data);
        assert_eq!(record.get(Phase::Data), PhaseState::Resumed);

        record.forward(Phase::Data).unwrap();
        record.stop(Phase::Data).unwrap();
        assert_eq!(record.get(Phase::Data), PhaseState::Stopped);
    }

    #[test]
    fn test_earliest_stop_wins() {
        let mut record = FilterRecord::new();
        record.stop(Phase::Headers).unwrap();
        record.stop(Phase::Data).unwrap();
        record.stop(Phase::Trailers).unwrap();

        assert_eq!(record.stopped(), Some(Phase::Headers));
        assert_eq!(record.get(Phase::Data), PhaseState::NotStarted);
        assert_eq!(record.get(Phase::Trailers), PhaseState::NotStarted);
    }

    #[test]
    fn test_resume_requires_a_stop() {
        let mut record = FilterRecord::new();
        assert!(record.resume().unwrap_err().is_illegal_state());

        record.stop(Phase::Trailers).unwrap();
        assert_eq!(record.resume().unwrap(), Phase::Trailers);
        assert!(record.resume().unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_resumed_headers_are_not_forwarded_again() {
        let mut record = FilterRecord::new();
        record.stop(Phase::Headers).unwrap();
        record.resume().unwrap();

        assert!(record.forward(Phase::Headers).unwrap_err().is_illegal_state());
        record.forward(Phase::Data).unwrap();
        record.forward(Phase::Trailers).unwrap();
    }
}
