use crate::events::{Event, WeakEventSender};
use crate::ticker::{Clock, Interval, RealClock, Tick};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Ticker emits a `Tick` every time its interval elapses without an interrupt.
///
/// Ticks are delivered through a channel with room for exactly one; if the consumer hasn't taken
/// the previous tick yet, the new one is dropped rather than queued. An interrupt restarts the
/// current wait with a fresh delay and emits nothing.
///
/// Dropping the ticker (or calling `stop()`) ends the background task, after which the
/// `TickStream` yields `None`.
pub struct Ticker {
    tick: Tick,
    interrupts: mpsc::UnboundedSender<()>,
    stop: CancellationToken,
}

pub struct TickStream {
    ticks: mpsc::Receiver<Event>,
}

impl Ticker {
    pub fn spawn(interval: Interval, tick: Tick) -> (Ticker, TickStream) {
        Self::spawn_with_clock(interval, tick, RealClock)
    }

    pub fn heartbeat(interval: Interval) -> (Ticker, TickStream) {
        Self::spawn(interval, Tick::HeartbeatTimeout)
    }

    pub fn election(interval: Interval) -> (Ticker, TickStream) {
        Self::spawn(interval, Tick::ElectionTimeout)
    }

    /// Like `spawn()`, but the ticker also stops once `parent` is cancelled.
    pub fn spawn_with_parent(interval: Interval, tick: Tick, parent: &CancellationToken) -> (Ticker, TickStream) {
        Self::start(interval, tick, RealClock, parent.child_token())
    }

    pub(crate) fn spawn_with_clock<C: Clock>(interval: Interval, tick: Tick, clock: C) -> (Ticker, TickStream) {
        Self::start(interval, tick, clock, CancellationToken::new())
    }

    fn start<C: Clock>(
        mut interval: Interval,
        tick: Tick,
        clock: C,
        stop: CancellationToken,
    ) -> (Ticker, TickStream) {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();

        let deadline = clock.now() + interval.delay();
        let task = TickerTask {
            interval,
            tick,
            clock,
            ticks: tick_tx,
            interrupts: interrupt_rx,
            stop: stop.clone(),
        };
        tokio::spawn(task.run(deadline));

        let ticker = Ticker {
            tick,
            interrupts: interrupt_tx,
            stop,
        };
        (ticker, TickStream { ticks: tick_rx })
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Restart the current wait. Interrupting a stopped ticker does nothing.
    pub fn interrupt(&self) {
        let _ = self.interrupts.send(());
    }

    pub fn stop(self) {
        self.stop.cancel();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl TickStream {
    pub async fn recv(&mut self) -> Option<Event> {
        self.ticks.recv().await
    }

    /// Move ticks into the event pipe until the ticker stops or the pipe closes.
    pub async fn forward(mut self, pipe: WeakEventSender) {
        while let Some(event) = self.recv().await {
            if pipe.send(event).await.is_err() {
                return;
            }
        }
    }
}

struct TickerTask<C> {
    interval: Interval,
    tick: Tick,
    clock: C,
    ticks: mpsc::Sender<Event>,
    interrupts: mpsc::UnboundedReceiver<()>,
    stop: CancellationToken,
}

impl<C: Clock> TickerTask<C> {
    async fn run(self, mut deadline: Instant) {
        let TickerTask {
            mut interval,
            tick,
            mut clock,
            ticks,
            mut interrupts,
            stop,
        } = self;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                interrupt = interrupts.recv() => match interrupt {
                    Some(()) => deadline = clock.now() + interval.delay(),
                    None => return,
                },
                _ = clock.sleep_until(deadline) => {
                    deadline = clock.now() + interval.delay();
                    // Full means the last tick hasn't been consumed; drop this one.
                    let _ = ticks.try_send(Event::from(tick));
                }
            }
        }
    }
}
