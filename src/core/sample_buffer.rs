/// Integers `0..side²` pushed to the engine during a transfer trial.
///
/// The buffer is flat: a `side`×`side` payload is stored as one row of
/// `side * side` elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBuffer {
    side: usize,
    values: Vec<i64>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refill the buffer for a payload of `side`×`side` elements.
    pub fn regenerate(&mut self, side: usize) {
        let len = side * side;
        self.values.clear();
        self.values.reserve(len);
        self.values.extend(0..len as i64);
        self.side = side;
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let buffer = SampleBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.side(), 0);
    }

    #[test]
    fn test_length_is_side_squared() {
        let mut buffer = SampleBuffer::new();
        for side in [1, 10, 100, 1000] {
            buffer.regenerate(side);
            assert_eq!(buffer.len(), side * side);
            assert_eq!(buffer.side(), side);
        }
        // Shrinking drops the old tail.
        buffer.regenerate(3);
        assert_eq!(buffer.values(), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
