mod sequence;

pub use sequence::Sequence;
pub use sequence::SequenceError;
