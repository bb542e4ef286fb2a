//! Quorums are the named set of hosts that must agree for a decision to bind. None of the types
//! here are thread-safe; owners that share them across tasks must add their own synchronization.
mod election;
mod quorum;

pub use election::Election;
pub use election::ElectionError;
pub use election::VoteError;
pub use quorum::Quorum;
