use bytes::Bytes;
use tokio::sync::mpsc;

pub fn create_commit_stream() -> (CommitStreamPublisher, CommitStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    (CommitStreamPublisher { sender: tx }, CommitStream { receiver: rx })
}

pub struct CommitStreamPublisher {
    sender: mpsc::UnboundedSender<CommittedEntry>,
}

impl CommitStreamPublisher {
    pub(crate) fn notify_commit(&self, logger: &slog::Logger, entry: CommittedEntry) {
        if self.sender.send(entry).is_err() {
            slog::warn!(logger, "CommitStream has disconnected.");
        }
    }
}

/// CommitStream yields log entries, in index order, once a majority of the quorum has them.
pub struct CommitStream {
    receiver: mpsc::UnboundedReceiver<CommittedEntry>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommittedEntry {
    pub term: u64,
    pub index: u64,
    pub data: Bytes,
}

impl CommitStream {
    /// The next committed entry to apply, or `None` once the replica is gone.
    pub async fn recv(&mut self) -> Option<CommittedEntry> {
        self.receiver.recv().await
    }
}
