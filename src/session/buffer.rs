//! Rolling window of the most recent samples
//!
//! [`SampleBuffer`] is a fixed-capacity ring: the slot arena is allocated
//! once and `push` only overwrites slots, so the hot path never allocates.
//! When full, a push evicts exactly the oldest sample.
//!
//! Observers registered with [`SampleBuffer::subscribe`] run synchronously
//! after every push and see the buffer with that push applied.

use crate::types::{Sample, MAX_CHART_POINTS};

/// Receives a notification after every accepted push
pub trait BufferObserver: Send {
    fn on_push(&mut self, buffer: &SampleBuffer);
}

impl<F> BufferObserver for F
where
    F: FnMut(&SampleBuffer) + Send,
{
    fn on_push(&mut self, buffer: &SampleBuffer) {
        self(buffer)
    }
}

/// Bounded FIFO window of decoded samples
pub struct SampleBuffer {
    slots: Box<[Sample]>,
    /// Index of the oldest sample
    head: usize,
    len: usize,
    observers: Vec<Box<dyn BufferObserver>>,
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(MAX_CHART_POINTS)
    }
}

impl SampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Sample::default(); capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
            observers: Vec::new(),
        }
    }

    /// Register an observer notified after each push
    pub fn subscribe(&mut self, observer: impl BufferObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Append a sample, evicting the oldest one when the window is full
    pub fn push(&mut self, sample: Sample) {
        let capacity = self.capacity();
        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = sample;
            self.len += 1;
        } else {
            self.slots[self.head] = sample;
            self.head = (self.head + 1) % capacity;
        }

        // Observers borrow the buffer immutably, so detach them for the call
        let mut observers = std::mem::take(&mut self.observers);
        for observer in observers.iter_mut() {
            observer.on_push(self);
        }
        self.observers = observers;
    }

    /// Samples in push order, oldest first
    pub fn values(&self) -> impl ExactSizeIterator<Item = &Sample> + DoubleEndedIterator + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| &self.slots[(self.head + i) % capacity])
    }

    /// Owned copy of [`values`](Self::values)
    pub fn to_vec(&self) -> Vec<Sample> {
        self.values().copied().collect()
    }

    /// Most recently pushed sample
    pub fn last(&self) -> Option<&Sample> {
        self.values().next_back()
    }

    /// Largest `max` field in the window (missing values count as 0)
    pub fn peak_max(&self) -> Option<f64> {
        self.values().map(Sample::max_or_zero).reduce(f64::max)
    }

    /// Drop every sample; observers stay registered
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn sample(i: usize) -> Sample {
        Sample::new(i as f64, i as f64 * 2.0, 1.0).with_seq(i as u64)
    }

    #[test]
    fn test_push_below_capacity() {
        let mut buffer = SampleBuffer::new(50);
        buffer.push(sample(0));
        buffer.push(sample(1));

        assert_eq!(buffer.len(), 2);
        let seqs: Vec<u64> = buffer.values().map(|s| s.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(buffer.last().map(|s| s.seq), Some(1));
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut buffer = SampleBuffer::new(50);
        for i in 0..120 {
            buffer.push(sample(i));
        }

        assert_eq!(buffer.len(), 50);
        let seqs: Vec<u64> = buffer.values().map(|s| s.seq).collect();
        let expected: Vec<u64> = (70..120).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn test_clear_then_push() {
        let mut buffer = SampleBuffer::new(3);
        for i in 0..5 {
            buffer.push(sample(i));
        }
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.peak_max(), None);

        buffer.push(sample(9));
        assert_eq!(buffer.to_vec(), vec![sample(9)]);
    }

    #[test]
    fn test_peak_max_treats_missing_as_zero() {
        let mut buffer = SampleBuffer::new(4);
        buffer.push(Sample {
            rms: Some(0.2),
            ..Default::default()
        });
        assert_eq!(buffer.peak_max(), Some(0.0));

        buffer.push(Sample::new(0.1, 0.7, 1.0));
        assert_eq!(buffer.peak_max(), Some(0.7));
    }

    #[test]
    fn test_observer_sees_buffer_after_push() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let mut buffer = SampleBuffer::new(2);
        buffer.subscribe(move |b: &SampleBuffer| {
            let last = b.last().map(|s| s.seq).unwrap_or(u64::MAX);
            seen_clone.lock().unwrap().push((b.len(), last));
        });

        for i in 0..3 {
            buffer.push(sample(i));
        }

        assert_eq!(*seen.lock().unwrap(), vec![(1, 0), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_clear_keeps_observers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let mut buffer = SampleBuffer::default();
        buffer.subscribe(move |_: &SampleBuffer| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        buffer.push(sample(0));
        buffer.clear();
        buffer.push(sample(1));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // Property-based tests using proptest
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_window_holds_last_w_in_order(
            count in 0usize..300,
            capacity in 1usize..80
        ) {
            let mut buffer = SampleBuffer::new(capacity);
            for i in 0..count {
                buffer.push(sample(i));
            }

            // Property: length is min(N, W)
            prop_assert_eq!(buffer.len(), count.min(capacity));

            // Property: contents are the last W pushes, in push order
            let seqs: Vec<u64> = buffer.values().map(|s| s.seq).collect();
            let expected: Vec<u64> = (count.saturating_sub(capacity)..count)
                .map(|i| i as u64)
                .collect();
            prop_assert_eq!(seqs, expected);
        }
    }
}
