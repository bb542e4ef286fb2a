mod clock;
mod interval;
mod tick;
mod ticker;

pub(crate) use clock::Clock;
#[cfg(test)]
pub(crate) use clock::mocked_clock;
pub(crate) use clock::RealClock;
pub use interval::Interval;
pub use interval::IntervalError;
pub use tick::Tick;
pub use ticker::TickStream;
pub use ticker::Ticker;
