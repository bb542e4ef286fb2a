use bytes::BytesMut;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::num::ParseIntError;
use std::sync::Mutex;

/// Sequence is a thread-safe monotonically increasing counter.
///
/// Overflow is not checked: after `u64::MAX` the counter wraps back to zero and the sequence
/// starts again. A sequence can be checkpointed in one of three forms (varint binary, lowercase
/// hex text, or a json number) and restored from any of them.
#[derive(Debug, Default)]
pub struct Sequence {
    counter: Mutex<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("{0} trailing byte(s) after sequence varint")]
    TrailingBytes(usize),
    #[error("malformed sequence varint: {0}")]
    MalformedBinary(#[from] prost::DecodeError),
    #[error("malformed sequence text: {0}")]
    MalformedText(#[from] ParseIntError),
}

impl Sequence {
    pub const fn new() -> Self {
        Self::start(0)
    }

    /// Create a sequence whose next value will be `at + 1`.
    pub const fn start(at: u64) -> Self {
        Sequence {
            counter: Mutex::new(at),
        }
    }

    pub fn next(&self) -> u64 {
        let mut counter = self.counter.lock().expect("Sequence.next() mutex guard poison");
        *counter = counter.wrapping_add(1);
        *counter
    }

    /// The most recently issued value (or the start value if nothing has been issued).
    pub fn current(&self) -> u64 {
        *self.counter.lock().expect("Sequence.current() mutex guard poison")
    }

    pub fn to_binary(&self) -> Vec<u8> {
        let counter = self.current();
        let mut buf = BytesMut::with_capacity(prost::encoding::encoded_len_varint(counter));
        prost::encoding::encode_varint(counter, &mut buf);
        buf.to_vec()
    }

    pub fn from_binary(data: &[u8]) -> Result<Self, SequenceError> {
        let mut buf = data;
        let counter = prost::encoding::decode_varint(&mut buf)?;
        // Every byte must belong to the varint; leftovers mean the input wasn't one of ours.
        if !buf.is_empty() {
            return Err(SequenceError::TrailingBytes(buf.len()));
        }

        Ok(Self::start(counter))
    }

    pub fn to_text(&self) -> String {
        format!("{:x}", self.current())
    }

    pub fn from_text(text: &str) -> Result<Self, SequenceError> {
        let counter = u64::from_str_radix(text, 16)?;
        Ok(Self::start(counter))
    }
}

impl Serialize for Sequence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.current())
    }
}

impl<'de> Deserialize<'de> for Sequence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Sequence::start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::Arc;

    #[test]
    fn concurrent_writers() {
        let seq = Arc::new(Sequence::new());

        let writers: Vec<_> = (0..16)
            .map(|_| {
                let seq = seq.clone();
                std::thread::spawn(move || {
                    for _ in 0..256 {
                        seq.next();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(seq.next(), 4097);
    }

    #[test]
    fn wraps_on_overflow() {
        let seq = Sequence::start(u64::MAX - 1);
        assert_eq!(seq.next(), u64::MAX);
        assert_eq!(seq.next(), 0);
        assert_eq!(seq.next(), 1);
    }

    #[test]
    fn binary_form() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let seq = Sequence::start(rng.gen());
            let data = seq.to_binary();
            assert!(data.len() <= 10);

            let restored = Sequence::from_binary(&data).unwrap();
            assert_eq!(seq.next(), restored.next());
        }

        assert_eq!(Sequence::start(0).to_binary(), vec![0]);
        assert_eq!(Sequence::start(300).to_binary(), vec![0xac, 0x02]);
    }

    #[test]
    fn binary_form_rejects_trailing_bytes() {
        let err = Sequence::from_binary(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, SequenceError::TrailingBytes(2)));
        assert_eq!(err.to_string(), "2 trailing byte(s) after sequence varint");

        let result = Sequence::from_binary(&[]);
        assert!(matches!(result, Err(SequenceError::MalformedBinary(_))));
    }

    #[test]
    fn text_form() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let seq = Sequence::start(rng.gen());
            let restored = Sequence::from_text(&seq.to_text()).unwrap();
            assert_eq!(seq.next(), restored.next());
        }

        assert_eq!(Sequence::start(255).to_text(), "ff");
        assert!(matches!(
            Sequence::from_text("not hex"),
            Err(SequenceError::MalformedText(_))
        ));
    }

    #[test]
    fn json_form() {
        let mut rng = rand::thread_rng();
        for _ in 0..256 {
            let seq = Sequence::start(rng.gen());
            let data = serde_json::to_string(&seq).unwrap();
            let restored: Sequence = serde_json::from_str(&data).unwrap();
            assert_eq!(seq.next(), restored.next());
        }

        assert_eq!(serde_json::to_string(&Sequence::start(42)).unwrap(), "42");
    }
}
