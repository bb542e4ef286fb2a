mod events;
mod logging;
mod peers;
mod quorum;
mod replica;
mod sequence;
mod server;
mod ticker;
mod grpc {
    include!("../generated/raft.rs");
}

// The crate root only declares modules and re-exports; every `mod` is private and exposed through
// individual `pub use` statements.
pub use events::pipe;
pub use events::Callback;
pub use events::Event;
pub use events::EventReceiver;
pub use events::EventSender;
pub use events::EventType;
pub use events::PipeError;
pub use events::WeakEventSender;
pub use events::WriteAhead;
pub use events::WriteAheadError;
pub use events::WriteAheadReceipt;
pub use events::{aggregating_loop, event_loop, Handler, BUFFER_SIZE, MAX_AGGREGATION};
pub use grpc::AppendReply;
pub use grpc::AppendRequest;
pub use grpc::LogEntry;
pub use grpc::VoteReply;
pub use grpc::VoteRequest;
pub use logging::parse_level;
pub use logging::root_logger;
pub use logging::UnknownLogLevel;
pub use peers::Broadcast;
pub use peers::ConnectOptions;
pub use peers::Peer;
pub use peers::PeerError;
pub use peers::Peers;
pub use peers::RpcContext;
pub use quorum::Election;
pub use quorum::ElectionError;
pub use quorum::Quorum;
pub use quorum::VoteError;
pub use replica::create_commit_stream;
pub use replica::CommitStream;
pub use replica::CommitStreamPublisher;
pub use replica::CommittedEntry;
pub use replica::Health;
pub use replica::HealthStatus;
pub use replica::Replica;
pub use replica::ReplicaConfig;
pub use replica::ReplicaError;
pub use replica::ReplicaHandle;
pub use replica::ReplicaOptions;
pub use replica::State;
pub use replica::StateListener;
pub use replica::StateSnapshot;
pub use sequence::Sequence;
pub use sequence::SequenceError;
pub use server::shutdown_signal;
pub use server::RpcServer;
pub use server::RpcServerShutdownHandle;
pub use server::RpcServerShutdownSignal;
pub use ticker::Interval;
pub use ticker::IntervalError;
pub use ticker::Tick;
pub use ticker::TickStream;
pub use ticker::Ticker;
