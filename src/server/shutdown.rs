use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// A handle/signal pair for stopping an `RpcServer`. The server drains when `shutdown()` is called
/// or the handle is dropped.
pub fn shutdown_signal() -> (RpcServerShutdownHandle, RpcServerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (RpcServerShutdownHandle { tx }, RpcServerShutdownSignal { rx })
}

pub struct RpcServerShutdownHandle {
    tx: oneshot::Sender<()>,
}

pub struct RpcServerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl RpcServerShutdownHandle {
    pub fn shutdown(self) {
        // The server may already be gone.
        let _ = self.tx.send(());
    }
}

impl Future for RpcServerShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // Sent or dropped, either way we're done.
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn fires_on_shutdown_or_drop() {
        let (handle, signal) = shutdown_signal();
        handle.shutdown();
        timeout(Duration::from_secs(1), signal).await.unwrap();

        let (handle, signal) = shutdown_signal();
        drop(handle);
        timeout(Duration::from_secs(1), signal).await.unwrap();
    }

    #[tokio::test]
    async fn pending_while_handle_lives() {
        let (_handle, signal) = shutdown_signal();
        assert!(timeout(Duration::from_millis(20), signal).await.is_err());
    }
}
