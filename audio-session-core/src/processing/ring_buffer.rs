/// Circular sample buffer between a device callback and the drain thread.
///
/// Wrap in `Arc<parking_lot::Mutex<...>>` for cross-thread access; the
/// buffer itself carries no locking. Overflow drops the oldest samples so
/// a stalled drain thread degrades to a gap, never to unbounded memory.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<f32>,
    head: usize,
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Append samples, discarding the oldest on overflow. A slice larger
    /// than the whole buffer keeps only its tail.
    pub fn push(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let capacity = self.storage.len();
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let overflow = (self.len + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.head = (self.head + overflow) % capacity;
            self.len -= overflow;
        }

        let mut tail = (self.head + self.len) % capacity;
        for &sample in samples {
            self.storage[tail] = sample;
            tail = (tail + 1) % capacity;
        }
        self.len += samples.len();
    }

    /// Remove and return up to `count` samples, oldest first.
    pub fn pop(&mut self, count: usize) -> Vec<f32> {
        let take = count.min(self.len);
        let capacity = self.storage.len();
        let mut out = Vec::with_capacity(take);
        for i in 0..take {
            out.push(self.storage[(self.head + i) % capacity]);
        }
        self.head = (self.head + take) % capacity;
        self.len -= take;
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_in_order() {
        let mut buf = RingBuffer::new(8);
        buf.push(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.pop(3), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn pop_clamps_to_available() {
        let mut buf = RingBuffer::new(8);
        buf.push(&[1.0, 2.0]);
        assert_eq!(buf.pop(10), vec![1.0, 2.0]);
        assert!(buf.pop(1).is_empty());
    }

    #[test]
    fn overflow_keeps_newest() {
        let mut buf = RingBuffer::new(4);
        buf.push(&[1.0, 2.0, 3.0, 4.0]);
        buf.push(&[5.0, 6.0]);
        assert_eq!(buf.pop(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn oversized_push_keeps_tail() {
        let mut buf = RingBuffer::new(3);
        buf.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.pop(3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::new(4);
        buf.push(&[1.0, 2.0, 3.0]);
        buf.pop(2);
        buf.push(&[4.0, 5.0, 6.0]);
        assert_eq!(buf.pop(4), vec![3.0, 4.0, 5.0, 6.0]);
    }
}
