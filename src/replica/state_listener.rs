use crate::replica::State;
use tokio::sync::watch;

/// What the outside world may know about a replica at a point in time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StateSnapshot {
    pub state: State,
    pub term: u64,
    pub leader: Option<String>,
}

pub(super) fn new() -> StateNotifier {
    let (snd, rcv) = watch::channel(StateSnapshot::default());

    StateNotifier { snd, _rcv: rcv }
}

pub(super) struct StateNotifier {
    snd: watch::Sender<StateSnapshot>,
    // A watch channel without receivers drops updates; keep one so late subscribers see the latest.
    _rcv: watch::Receiver<StateSnapshot>,
}

impl StateNotifier {
    /// Publish only actual changes so listeners don't wake up for nothing.
    pub(super) fn notify(&self, snapshot: StateSnapshot) {
        if *self.snd.borrow() != snapshot {
            let _ = self.snd.send(snapshot);
        }
    }

    pub(super) fn subscribe(&self) -> StateListener {
        StateListener {
            rcv: self.snd.subscribe(),
        }
    }
}

#[derive(Clone)]
pub struct StateListener {
    rcv: watch::Receiver<StateSnapshot>,
}

impl StateListener {
    pub fn current(&self) -> StateSnapshot {
        self.rcv.borrow().clone()
    }

    /// Wait for the next change. `None` once the replica is gone.
    pub async fn next(&mut self) -> Option<StateSnapshot> {
        match self.rcv.changed().await {
            Ok(_) => Some(self.rcv.borrow().clone()),
            Err(_) => None,
        }
    }

    /// Wait until `predicate` holds for the current snapshot.
    pub async fn wait_for<P: Fn(&StateSnapshot) -> bool>(&mut self, predicate: P) -> Option<StateSnapshot> {
        loop {
            let current = self.current();
            if predicate(&current) {
                return Some(current);
            }
            self.next().await?;
        }
    }
}
