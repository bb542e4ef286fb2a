mod error;
mod peer;
mod peers;

pub use error::PeerError;
pub use peer::ConnectOptions;
pub use peer::Peer;
pub use peer::RpcContext;
pub use peers::Broadcast;
pub use peers::Peers;
