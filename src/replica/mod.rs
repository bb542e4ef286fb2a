mod commit_stream;
mod error;
mod log;
mod options;
mod progress;
mod replica;
mod state;
mod state_listener;
mod status;

pub use commit_stream::create_commit_stream;
pub use commit_stream::CommitStream;
pub use commit_stream::CommitStreamPublisher;
pub use commit_stream::CommittedEntry;
pub use error::ReplicaError;
pub use options::ReplicaOptions;
pub use replica::Replica;
pub use replica::ReplicaConfig;
pub use replica::ReplicaHandle;
pub use state::State;
pub use state_listener::StateListener;
pub use state_listener::StateSnapshot;
pub use status::Health;
pub use status::HealthStatus;
