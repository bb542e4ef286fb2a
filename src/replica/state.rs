use crate::replica::ReplicaError;
use std::convert::TryFrom;
use std::fmt;

/// The lifecycle and Raft role of a replica. Only the replica's own event loop changes it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum State {
    Stopped = 0,
    Initialized,
    Running,
    Follower,
    Candidate,
    Leader,
}

impl Default for State {
    fn default() -> Self {
        State::Stopped
    }
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Stopped => "stopped",
            State::Initialized => "initialized",
            State::Running => "running",
            State::Follower => "follower",
            State::Candidate => "candidate",
            State::Leader => "leader",
        }
    }

    /// Follower, Candidate or Leader.
    pub fn is_serving(&self) -> bool {
        matches!(self, State::Follower | State::Candidate | State::Leader)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for State {
    type Error = ReplicaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(State::Stopped),
            1 => Ok(State::Initialized),
            2 => Ok(State::Running),
            3 => Ok(State::Follower),
            4 => Ok(State::Candidate),
            5 => Ok(State::Leader),
            unknown => Err(ReplicaError::UnknownState(unknown)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_stopped() {
        assert_eq!(State::default(), State::Stopped);
    }

    #[test]
    fn codes_round_trip() {
        for code in 0..=5u8 {
            let state = State::try_from(code).unwrap();
            assert_eq!(state as u8, code);
        }

        let err = State::try_from(6).unwrap_err();
        assert!(matches!(err, ReplicaError::UnknownState(6)));
        assert_eq!(err.to_string(), "unknown replica state 6");
    }

    #[test]
    fn names() {
        assert_eq!(State::Leader.to_string(), "leader");
        assert_eq!(State::Initialized.to_string(), "initialized");
        assert!(State::Candidate.is_serving());
        assert!(!State::Running.is_serving());
    }
}
