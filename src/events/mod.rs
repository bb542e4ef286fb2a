//! Every consensus-relevant happening flows through one buffered pipe as a typed `Event` and is
//! handled, one at a time, by a single loop task.
mod event;
mod event_loop;
mod pipe;
mod write_ahead;

pub use event::Callback;
pub use event::Event;
pub use event::EventType;
pub use event_loop::aggregating_loop;
pub use event_loop::event_loop;
pub use event_loop::Handler;
pub use event_loop::MAX_AGGREGATION;
pub use pipe::pipe;
pub use pipe::EventReceiver;
pub use pipe::EventSender;
pub use pipe::PipeError;
pub use pipe::WeakEventSender;
pub use pipe::BUFFER_SIZE;
pub use write_ahead::WriteAhead;
pub use write_ahead::WriteAheadError;
pub use write_ahead::WriteAheadReceipt;
