use crate::grpc::{AppendReply, AppendRequest, VoteReply, VoteRequest};
use crate::peers::{ConnectOptions, Peer, PeerError, RpcContext};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::fs::File;
use std::future::Future;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Peers is the roster of remote replicas that, together with the local one, make up the quorum.
/// Cloning a roster (or filtering it) shares the underlying peer connections.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Peers(Vec<Arc<Peer>>);

/// Broadcast is an in-flight fan-out of one RPC to every peer of a roster.
pub struct Broadcast {
    joiner: JoinHandle<usize>,
}

impl Broadcast {
    /// Wait for every peer call to finish and return how many succeeded.
    pub async fn join(self) -> usize {
        self.joiner.await.unwrap_or(0)
    }
}

impl Peers {
    pub fn new(peers: Vec<Peer>) -> Self {
        Peers(peers.into_iter().map(Arc::new).collect())
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|peer| peer.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Peer>, PeerError> {
        self.0
            .iter()
            .find(|peer| peer.name == name)
            .ok_or_else(|| PeerError::NotFound(name.to_string()))
    }

    /// The peer with the lowest precedence id, ignoring peers without one (pid 0).
    pub fn presiding(&self) -> Option<&str> {
        self.0
            .iter()
            .filter(|peer| peer.pid > 0)
            .min_by_key(|peer| peer.pid)
            .map(|peer| peer.name.as_str())
    }

    pub fn filter<P: FnMut(&Peer) -> bool>(&self, mut predicate: P) -> Peers {
        Peers(
            self.0
                .iter()
                .filter(|peer| predicate(peer))
                .cloned()
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Peer>> {
        self.0.iter()
    }

    /// Connect every peer. A failure doesn't stop the remaining peers from being connected; all
    /// failures are reported together.
    pub fn connect(&self, options: &ConnectOptions) -> Result<(), PeerError> {
        PeerError::collect(
            self.0
                .iter()
                .filter_map(|peer| peer.connect(options).err())
                .collect(),
        )
    }

    pub fn close(&self) -> Result<(), PeerError> {
        PeerError::collect(self.0.iter().filter_map(|peer| peer.close().err()).collect())
    }

    /// Ask every peer for its vote. Replies arrive on `replies` in no particular order, one per
    /// successful call; failures are logged and dropped.
    pub fn request_vote(
        &self,
        logger: &Logger,
        ctx: &RpcContext,
        request: VoteRequest,
        replies: mpsc::Sender<VoteReply>,
    ) -> Broadcast {
        let ctx = ctx.clone();
        self.broadcast(logger, "request_vote", replies, move |peer| {
            let ctx = ctx.clone();
            let request = request.clone();
            async move { peer.request_vote(&ctx, request).await }
        })
    }

    /// Send `request` to every peer. Same delivery rules as `request_vote()`.
    pub fn append_entries(
        &self,
        logger: &Logger,
        ctx: &RpcContext,
        request: AppendRequest,
        replies: mpsc::Sender<AppendReply>,
    ) -> Broadcast {
        let ctx = ctx.clone();
        self.broadcast(logger, "append_entries", replies, move |peer| {
            let ctx = ctx.clone();
            let request = request.clone();
            async move { peer.append_entries(&ctx, request).await }
        })
    }

    fn broadcast<T, C, F>(
        &self,
        logger: &Logger,
        rpc: &'static str,
        replies: mpsc::Sender<T>,
        call: C,
    ) -> Broadcast
    where
        T: Send + 'static,
        C: Fn(Arc<Peer>) -> F,
        F: Future<Output = Result<T, PeerError>> + Send + 'static,
    {
        let mut calls = JoinSet::new();
        for peer in self.0.iter() {
            let logger = logger.new(slog::o!("peer" => peer.name.clone(), "rpc" => rpc));
            let replies = replies.clone();
            let call = call(peer.clone());

            calls.spawn(async move {
                match call.await {
                    Ok(reply) => replies.send(reply).await.is_ok(),
                    Err(e) => {
                        slog::warn!(logger, "rpc failed"; "error" => %e);
                        false
                    }
                }
            });
        }

        let joiner = tokio::spawn(async move {
            let mut succeeded = 0;
            while let Some(result) = calls.join_next().await {
                if let Ok(true) = result {
                    succeeded += 1;
                }
            }
            succeeded
        });

        Broadcast { joiner }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Peers, PeerError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write the roster to `path`, replacing whatever was there.
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<(), PeerError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl std::iter::FromIterator<Peer> for Peers {
    fn from_iter<I: IntoIterator<Item = Peer>>(iter: I) -> Self {
        Peers(iter.into_iter().map(Arc::new).collect())
    }
}
