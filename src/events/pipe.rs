use crate::events::Event;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Default capacity of the "one big pipe".
pub const BUFFER_SIZE: usize = 1024;

/// `pipe()` creates the bounded, multi-producer single-consumer queue that carries every event to
/// the replica's loop task.
pub fn pipe(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);

    (EventSender { sender: tx }, EventReceiver { receiver: rx })
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum PipeError {
    #[error("event pipe is closed")]
    Closed,
    #[error("event pipe is full")]
    Full,
}

#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

/// WeakEventSender doesn't keep the pipe open. Background producers owned by the replica (ticker
/// forwarders, broadcast reply forwarders) hold these so the pipe closes once every external
/// producer is gone.
#[derive(Clone)]
pub struct WeakEventSender {
    sender: mpsc::WeakSender<Event>,
}

pub struct EventReceiver {
    receiver: mpsc::Receiver<Event>,
}

impl EventSender {
    /// Wait for room in the pipe, then enqueue.
    pub async fn send(&self, event: Event) -> Result<(), PipeError> {
        self.sender.send(event).await.map_err(|_| PipeError::Closed)
    }

    pub fn try_send(&self, event: Event) -> Result<(), PipeError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => PipeError::Full,
            TrySendError::Closed(_) => PipeError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn downgrade(&self) -> WeakEventSender {
        WeakEventSender {
            sender: self.sender.downgrade(),
        }
    }
}

impl WeakEventSender {
    pub fn upgrade(&self) -> Option<EventSender> {
        self.sender.upgrade().map(|sender| EventSender { sender })
    }

    /// Enqueue if the pipe is still open.
    pub async fn send(&self, event: Event) -> Result<(), PipeError> {
        match self.upgrade() {
            Some(sender) => sender.send(event).await,
            None => Err(PipeError::Closed),
        }
    }
}

impl EventReceiver {
    /// Suspend until an event arrives. `None` once the pipe is closed and drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take an event only if one is ready right now.
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn close(&mut self) {
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_and_close() {
        let (tx, mut rx) = pipe(4);
        tx.send(Event::HeartbeatTimeout).await.unwrap();
        tx.send(Event::ElectionTimeout).await.unwrap();
        drop(tx);

        assert!(matches!(rx.recv().await, Some(Event::HeartbeatTimeout)));
        assert!(matches!(rx.try_recv(), Some(Event::ElectionTimeout)));
        assert!(rx.try_recv().is_none());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn try_send_reports_full() {
        let (tx, mut rx) = pipe(1);
        tx.try_send(Event::HeartbeatTimeout).unwrap();
        assert_eq!(tx.try_send(Event::HeartbeatTimeout), Err(PipeError::Full));

        rx.close();
        while rx.try_recv().is_some() {}
        assert_eq!(tx.try_send(Event::HeartbeatTimeout), Err(PipeError::Closed));
    }

    #[tokio::test]
    async fn weak_sender_does_not_hold_pipe_open() {
        let (tx, mut rx) = pipe(4);
        let weak = tx.downgrade();

        weak.send(Event::ElectionTimeout).await.unwrap();
        drop(tx);

        assert!(matches!(rx.recv().await, Some(Event::ElectionTimeout)));
        assert!(rx.recv().await.is_none());
        assert_eq!(weak.send(Event::ElectionTimeout).await, Err(PipeError::Closed));
    }
}
