use crate::events::WriteAhead;
use crate::grpc::{AppendReply, AppendRequest, VoteReply, VoteRequest};
use std::fmt;
use tokio::sync::oneshot;

/// EventType lets a handler tell the kind of an event without matching on its payload. The names
/// are stable and meant for logs and telemetry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum EventType {
    Unknown = 0,
    Error,
    WriteAhead,
    AggregatedWriteAhead,
    HeartbeatTimeout,
    ElectionTimeout,
    VoteRequest,
    VoteReply,
    AppendRequest,
    AppendReply,
}

const EVENT_TYPE_NAMES: [&str; 10] = [
    "unknown",
    "error",
    "writeAhead",
    "aggregatedWriteAhead",
    "heartbeatTimeout",
    "electionTimeout",
    "voteRequest",
    "voteReply",
    "appendRequest",
    "appendReply",
];

impl EventType {
    pub fn as_str(&self) -> &'static str {
        EVENT_TYPE_NAMES[*self as usize]
    }
}

impl From<u8> for EventType {
    fn from(value: u8) -> Self {
        match value {
            1 => EventType::Error,
            2 => EventType::WriteAhead,
            3 => EventType::AggregatedWriteAhead,
            4 => EventType::HeartbeatTimeout,
            5 => EventType::ElectionTimeout,
            6 => EventType::VoteRequest,
            7 => EventType::VoteReply,
            8 => EventType::AppendRequest,
            9 => EventType::AppendReply,
            _ => EventType::Unknown,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Leader: append entry, acknowledge, replicate.
// Candidate/Follower: reject with the known leader.
//
// AggregatedWriteAhead is the same thing for a run of consecutive write-aheads, so the leader pays
// for one replication round instead of one per entry.
//
// Timeouts come from the replica's tickers. Requests carry a callback so the RPC layer can await
// the loop's answer; replies are the results of our own broadcasts.
#[derive(Debug)]
pub enum Event {
    Error(String),
    WriteAhead(WriteAhead),
    AggregatedWriteAhead(Vec<WriteAhead>),
    HeartbeatTimeout,
    ElectionTimeout,
    VoteRequest(VoteRequest, Callback<VoteReply>),
    VoteReply(VoteReply),
    AppendRequest(AppendRequest, Callback<AppendReply>),
    AppendReply(AppendReply),
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Error(_) => EventType::Error,
            Event::WriteAhead(_) => EventType::WriteAhead,
            Event::AggregatedWriteAhead(_) => EventType::AggregatedWriteAhead,
            Event::HeartbeatTimeout => EventType::HeartbeatTimeout,
            Event::ElectionTimeout => EventType::ElectionTimeout,
            Event::VoteRequest(..) => EventType::VoteRequest,
            Event::VoteReply(_) => EventType::VoteReply,
            Event::AppendRequest(..) => EventType::AppendRequest,
            Event::AppendReply(_) => EventType::AppendReply,
        }
    }
}

/// Callback answers whoever put a request event into the pipe.
#[derive(Debug)]
pub struct Callback<O>(oneshot::Sender<O>);

impl<O> Callback<O> {
    pub fn new() -> (Self, oneshot::Receiver<O>) {
        let (tx, rx) = oneshot::channel();
        (Callback(tx), rx)
    }

    pub fn send(self, message: O) {
        // The requester may have given up (e.g. RPC deadline); nothing to do about it.
        let _ = self.0.send(message);
    }
}
