use crate::peers::PeerError;
use crate::quorum::ElectionError;

#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("replica is not listening for events")]
    NotListening,
    #[error("invalid replica options: {0}")]
    InvalidOptions(&'static str),
    #[error("unknown replica state {0}")]
    UnknownState(u8),
    #[error("could not reach peers: {0}")]
    Peers(#[from] PeerError),
    #[error("could not hold election: {0}")]
    Election(#[from] ElectionError),
    #[error("event loop aborted: {0}")]
    Aborted(String),
    #[error("replica task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
