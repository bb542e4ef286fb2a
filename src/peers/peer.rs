use crate::grpc::raft_client::RaftClient;
use crate::grpc::{AppendReply, AppendRequest, VoteReply, VoteRequest};
use crate::peers::PeerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::RwLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

/// Peer is a remote replica in the quorum, plus (once connected) the RPC client used to reach it.
///
/// The roster fields are what's persisted; the connection is runtime-only state.
#[derive(Serialize, Deserialize)]
pub struct Peer {
    /// Precedence id. Zero means "no seat assigned yet".
    pub pid: u16,
    pub name: String,
    /// Dial address including port, e.g. `localhost:2310`. A scheme may be given; plain
    /// addresses are dialed over insecure http/2 unless `ConnectOptions::tls` is set.
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip)]
    client: RwLock<Option<RaftClient<Channel>>>,
}

#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// Transport-level limit on every request over the channel, on top of the `RpcContext`.
    pub request_timeout: Option<Duration>,
    pub tcp_keepalive: Option<Duration>,
    /// Transport security for every peer channel. Without it, channels are plaintext.
    pub tls: Option<ClientTlsConfig>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            request_timeout: Some(Duration::from_secs(1)),
            tcp_keepalive: None,
            tls: None,
        }
    }
}

/// RpcContext bounds an outbound call: it fails once `timeout` elapses or `cancel` fires,
/// whichever is first.
#[derive(Clone, Debug)]
pub struct RpcContext {
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl RpcContext {
    pub fn new(timeout: Duration) -> Self {
        RpcContext {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// A context cancelled together with `self`, but which can also be cancelled on its own.
    pub fn child(&self) -> Self {
        RpcContext {
            timeout: self.timeout,
            cancel: self.cancel.child_token(),
        }
    }
}

impl Peer {
    pub fn new<N: Into<String>, A: Into<String>>(pid: u16, name: N, addr: A) -> Self {
        Peer {
            pid,
            name: name.into(),
            addr: addr.into(),
            region: None,
            client: RwLock::new(None),
        }
    }

    pub fn with_region<R: Into<String>>(mut self, region: R) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Bind an RPC client to the peer. The channel connects lazily on first use, so an unreachable
    /// peer surfaces as a failed RPC, not a failed connect.
    pub fn connect(&self, options: &ConnectOptions) -> Result<(), PeerError> {
        let mut client = self
            .client
            .write()
            .expect("Peer.connect() rwlock guard poison");

        if self.addr.is_empty() {
            return Err(PeerError::NoEndpoint);
        }

        if client.is_some() {
            return Err(PeerError::AlreadyConnected);
        }

        let uri = dial_uri(&self.addr, options.tls.is_some());
        let mut endpoint = Endpoint::from_shared(uri).map_err(|source| PeerError::InvalidAddress {
            name: self.name.clone(),
            source,
        })?;
        if let Some(tls) = &options.tls {
            endpoint = endpoint.tls_config(tls.clone()).map_err(|source| PeerError::Transport {
                name: self.name.clone(),
                source,
            })?;
        }
        if let Some(timeout) = options.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        endpoint = endpoint.tcp_keepalive(options.tcp_keepalive);

        let channel = endpoint.connect_lazy().map_err(|source| PeerError::Transport {
            name: self.name.clone(),
            source,
        })?;

        *client = Some(RaftClient::new(channel));
        Ok(())
    }

    /// Drop the client; in-flight calls finish on their own clone of the channel.
    pub fn close(&self) -> Result<(), PeerError> {
        self.client
            .write()
            .expect("Peer.close() rwlock guard poison")
            .take()
            .map(|_| ())
            .ok_or(PeerError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.client
            .read()
            .expect("Peer.is_connected() rwlock guard poison")
            .is_some()
    }

    pub async fn request_vote(
        &self,
        ctx: &RpcContext,
        request: VoteRequest,
    ) -> Result<VoteReply, PeerError> {
        let mut client = self.bound_client()?;
        self.call(ctx, client.request_vote(request)).await
    }

    pub async fn append_entries(
        &self,
        ctx: &RpcContext,
        request: AppendRequest,
    ) -> Result<AppendReply, PeerError> {
        let mut client = self.bound_client()?;
        self.call(ctx, client.append_entries(request)).await
    }

    fn bound_client(&self) -> Result<RaftClient<Channel>, PeerError> {
        self.client
            .read()
            .expect("Peer.bound_client() rwlock guard poison")
            .clone()
            .ok_or(PeerError::NotConnected)
    }

    async fn call<T, F>(&self, ctx: &RpcContext, rpc: F) -> Result<T, PeerError>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(PeerError::Cancelled(self.name.clone())),
            result = tokio::time::timeout(ctx.timeout, rpc) => match result {
                Ok(Ok(response)) => Ok(response.into_inner()),
                Ok(Err(status)) => Err(PeerError::Rpc {
                    name: self.name.clone(),
                    status,
                }),
                Err(_) => Err(PeerError::DeadlineExceeded(self.name.clone())),
            },
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
            && self.name == other.name
            && self.addr == other.addr
            && self.region == other.region
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("region", &self.region)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// An explicit scheme wins; otherwise the scheme follows whether the channel is secured.
fn dial_uri(addr: &str, secure: bool) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else if secure {
        format!("https://{}", addr)
    } else {
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RpcContext {
        RpcContext::new(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn rpcs_require_a_connection() {
        let peer = Peer::new(1, "opal", "localhost:2320");

        let err = peer.request_vote(&ctx(), VoteRequest::default()).await.unwrap_err();
        assert!(matches!(err, PeerError::NotConnected));
        assert_eq!(err.to_string(), "not connected to remote peer");

        let err = peer.append_entries(&ctx(), AppendRequest::default()).await.unwrap_err();
        assert!(matches!(err, PeerError::NotConnected));
    }

    #[tokio::test]
    async fn connect_guards() {
        let options = ConnectOptions::default();

        let nowhere = Peer::new(1, "nowhere", "");
        assert!(matches!(nowhere.connect(&options), Err(PeerError::NoEndpoint)));

        let peer = Peer::new(2, "jade", "localhost:2330");
        assert!(!peer.is_connected());
        peer.connect(&options).unwrap();
        assert!(peer.is_connected());
        assert!(matches!(peer.connect(&options), Err(PeerError::AlreadyConnected)));

        peer.close().unwrap();
        assert!(!peer.is_connected());
        assert!(matches!(peer.close(), Err(PeerError::NotConnected)));

        // Reconnecting after close is fine.
        peer.connect(&options).unwrap();
        assert!(peer.is_connected());
    }

    #[test]
    fn dial_scheme() {
        assert_eq!(dial_uri("localhost:2320", false), "http://localhost:2320");
        assert_eq!(dial_uri("localhost:2320", true), "https://localhost:2320");
        assert_eq!(dial_uri("http://localhost:2320", true), "http://localhost:2320");
        assert_eq!(dial_uri("https://opal.io:443", false), "https://opal.io:443");
    }

    #[tokio::test]
    async fn connect_with_and_without_tls() {
        let plain = Peer::new(1, "opal", "localhost:2320");
        plain.connect(&ConnectOptions::default()).unwrap();
        assert!(plain.is_connected());

        let secure = Peer::new(2, "jade", "jade.otter.local:2330");
        let options = ConnectOptions {
            tls: Some(ClientTlsConfig::new().domain_name("jade.otter.local")),
            ..Default::default()
        };
        secure.connect(&options).unwrap();
        assert!(secure.is_connected());

        // Nothing is dialed until the first call.
        let err = secure.request_vote(&ctx(), VoteRequest::default()).await.unwrap_err();
        assert!(!matches!(err, PeerError::NotConnected));
    }

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        // Nothing listens on port 9; the cancel must win regardless.
        let peer = Peer::new(3, "kira", "127.0.0.1:9");
        peer.connect(&ConnectOptions::default()).unwrap();

        let ctx = RpcContext::new(Duration::from_secs(30));
        ctx.cancel.cancel();

        let err = peer.request_vote(&ctx, VoteRequest::default()).await.unwrap_err();
        assert!(matches!(err, PeerError::Cancelled(name) if name == "kira"));
    }

    #[test]
    fn roster_json() {
        let peer = Peer::new(20, "opal", "opal.io:443").with_region("us-central1");
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(
            json,
            r#"{"pid":20,"name":"opal","addr":"opal.io:443","region":"us-central1"}"#
        );

        let peer: Peer = serde_json::from_str(r#"{"pid":10,"name":"kira","addr":"kira.com:443"}"#).unwrap();
        assert_eq!(peer, Peer::new(10, "kira", "kira.com:443"));
        assert!(!peer.is_connected());
    }
}
