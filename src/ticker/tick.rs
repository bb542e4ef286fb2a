use crate::events::{Event, EventType};

/// The two timeouts a replica runs on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Tick {
    /// Leader: time to send (possibly empty) append-entries to everyone.
    HeartbeatTimeout,
    /// Follower/Candidate: nobody has been heard from, start an election.
    ElectionTimeout,
}

impl Tick {
    pub fn event_type(&self) -> EventType {
        match self {
            Tick::HeartbeatTimeout => EventType::HeartbeatTimeout,
            Tick::ElectionTimeout => EventType::ElectionTimeout,
        }
    }
}

impl From<Tick> for Event {
    fn from(tick: Tick) -> Self {
        match tick {
            Tick::HeartbeatTimeout => Event::HeartbeatTimeout,
            Tick::ElectionTimeout => Event::ElectionTimeout,
        }
    }
}
