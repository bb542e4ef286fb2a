use crate::events::Callback;
use bytes::Bytes;

/// WriteAhead asks the leader to append an opaque entry to the replicated log.
#[derive(Debug)]
pub struct WriteAhead {
    pub data: Bytes,
    callback: Option<Callback<Result<WriteAheadReceipt, WriteAheadError>>>,
}

/// Where the entry landed in the leader's log. It is not committed yet; watch the commit stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WriteAheadReceipt {
    pub term: u64,
    pub index: u64,
}

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum WriteAheadError {
    #[error("replica is not the leader (leader: {leader:?})")]
    NotLeader { leader: Option<String> },
    #[error("replica stopped before the entry was handled")]
    Stopped,
}

impl WriteAhead {
    /// A fire-and-forget write-ahead nobody waits on.
    pub fn new<B: Into<Bytes>>(data: B) -> Self {
        WriteAhead {
            data: data.into(),
            callback: None,
        }
    }

    pub fn with_callback<B: Into<Bytes>>(
        data: B,
        callback: Callback<Result<WriteAheadReceipt, WriteAheadError>>,
    ) -> Self {
        WriteAhead {
            data: data.into(),
            callback: Some(callback),
        }
    }

    pub fn respond(self, result: Result<WriteAheadReceipt, WriteAheadError>) {
        if let Some(callback) = self.callback {
            callback.send(result);
        }
    }
}
