#[cfg(test)]
use tokio::sync::watch;
use tokio::time::Instant;

#[async_trait::async_trait]
pub(crate) trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    async fn sleep_until(&mut self, deadline: Instant);
}

#[derive(Copy, Clone)]
pub(crate) struct RealClock;

#[async_trait::async_trait]
impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// A clock that only moves when its controller says so.
#[cfg(test)]
pub(crate) fn mocked_clock() -> (MockClock, MockClockController) {
    let (tx, rx) = watch::channel(Instant::now());

    (MockClock { current_time: rx }, MockClockController { current_time: tx })
}

#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MockClock {
    current_time: watch::Receiver<Instant>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.borrow()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        while *self.current_time.borrow() < deadline {
            if self.current_time.changed().await.is_err() {
                // Time stopped for good.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) struct MockClockController {
    current_time: watch::Sender<Instant>,
}

#[cfg(test)]
impl MockClockController {
    /// Advance in steps smaller than the intervals under test. A sleeper only promises to wake at
    /// or after its deadline, so one large jump fires a periodic timer once, not once per period.
    pub(crate) fn advance(&mut self, duration: std::time::Duration) {
        let now = *self.current_time.borrow();
        let _ = self.current_time.send(now + duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn mock_clock_wakes_at_deadline() {
        let (mut clock, mut controller) = mocked_clock();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let deadline = clock.now() + Duration::from_millis(100);
        tokio::spawn(async move {
            clock.sleep_until(deadline).await;
            tx.send(()).unwrap();
        });

        controller.advance(Duration::from_millis(99));
        tokio::time::timeout(Duration::from_millis(10), rx.recv())
            .await
            .expect_err("woke before deadline");

        controller.advance(Duration::from_millis(1));
        rx.recv().await.unwrap();
    }
}
