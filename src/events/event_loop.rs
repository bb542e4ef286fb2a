use crate::events::{Event, EventReceiver, WriteAhead};

/// Consecutive write-aheads are batched until the batch grows past this many entries.
pub const MAX_AGGREGATION: usize = 512;

/// Handler is the state machine sitting at the end of the pipe. Handling is synchronous; anything
/// slow (network I/O) must be spawned and report back through the pipe as a new event.
pub trait Handler {
    type Error;

    fn handle(&mut self, event: Event) -> Result<(), Self::Error>;
}

/// Handle events one at a time, in arrival order, until the pipe is closed and drained or the
/// handler fails.
pub async fn event_loop<H: Handler>(
    events: &mut EventReceiver,
    handler: &mut H,
) -> Result<(), H::Error> {
    while let Some(event) = events.recv().await {
        handler.handle(event)?;
    }

    Ok(())
}

/// Like `event_loop()`, but write-aheads that are already queued behind one another are delivered
/// as a single `AggregatedWriteAhead`. The event that interrupts a batch is handled right after it,
/// so ordering is preserved. A "batch" of one is delivered as a plain `WriteAhead`.
pub async fn aggregating_loop<H: Handler>(
    events: &mut EventReceiver,
    handler: &mut H,
) -> Result<(), H::Error> {
    while let Some(event) = events.recv().await {
        let first = match event {
            Event::WriteAhead(write_ahead) => write_ahead,
            other => {
                handler.handle(other)?;
                continue;
            }
        };

        let (batch, interrupted_by) = drain_write_aheads(events, first);
        let event = if batch.len() == 1 {
            let mut batch = batch;
            Event::WriteAhead(batch.swap_remove(0))
        } else {
            Event::AggregatedWriteAhead(batch)
        };
        handler.handle(event)?;

        if let Some(event) = interrupted_by {
            handler.handle(event)?;
        }
    }

    Ok(())
}

fn drain_write_aheads(
    events: &mut EventReceiver,
    first: WriteAhead,
) -> (Vec<WriteAhead>, Option<Event>) {
    let mut batch = vec![first];

    while let Some(event) = events.try_recv() {
        match event {
            Event::WriteAhead(write_ahead) => batch.push(write_ahead),
            other => return (batch, Some(other)),
        }

        if batch.len() > MAX_AGGREGATION {
            break;
        }
    }

    (batch, None)
}
