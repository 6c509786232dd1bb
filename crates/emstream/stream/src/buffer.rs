//! Capacity-bounded circular buffer over recent telemetry messages.

use emstream_types::StreamMessage;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Occupancy and throughput counters for a [`StreamBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Messages currently buffered.
    pub len: usize,
    /// Configured capacity.
    pub capacity: usize,
    /// Total messages ever accepted.
    pub total_messages: u64,
    /// Messages dropped to stay within capacity or age limits.
    pub evicted: u64,
}

struct BufferInner {
    buf: VecDeque<StreamMessage>,
    total_messages: u64,
    evicted: u64,
}

/// Thread-safe circular buffer holding the most recent telemetry messages.
///
/// Inserts are O(1) amortized; the oldest entry is evicted silently when the
/// buffer is at capacity. A single mutex guards the whole structure, which is
/// adequate for the expected thousands-per-second throughput.
pub struct StreamBuffer {
    capacity: usize,
    inner: Mutex<BufferInner>,
}

impl StreamBuffer {
    /// Default buffer capacity.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(BufferInner {
                buf: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
                total_messages: 0,
                evicted: 0,
            }),
        }
    }

    /// Append a message, evicting the oldest entry when at capacity.
    pub fn add(&self, message: StreamMessage) {
        let mut inner = self.inner.lock().expect("stream buffer lock poisoned");
        if inner.buf.len() >= self.capacity {
            inner.buf.pop_front();
            inner.evicted += 1;
        }
        inner.buf.push_back(message);
        inner.total_messages += 1;
    }

    /// All buffered messages with `timestamp >= now - window`, in insertion
    /// order.
    pub fn get_recent(&self, window: chrono::Duration) -> Vec<StreamMessage> {
        let cutoff = chrono::Utc::now() - window;
        let inner = self.inner.lock().expect("stream buffer lock poisoned");
        inner
            .buf
            .iter()
            .filter(|m| m.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Explicit eviction pass: drop messages older than `max_age` regardless
    /// of capacity pressure. Returns the number dropped.
    pub fn flush_older_than(&self, max_age: chrono::Duration) -> usize {
        let cutoff = chrono::Utc::now() - max_age;
        let mut inner = self.inner.lock().expect("stream buffer lock poisoned");
        let mut dropped = 0u64;
        while inner
            .buf
            .front()
            .map(|m| m.timestamp < cutoff)
            .unwrap_or(false)
        {
            inner.buf.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            inner.evicted += dropped;
            tracing::debug!(dropped, "flushed aged-out messages from stream buffer");
        }
        dropped as usize
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("stream buffer lock poisoned").buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock().expect("stream buffer lock poisoned");
        BufferStats {
            len: inner.buf.len(),
            capacity: self.capacity,
            total_messages: inner.total_messages,
            evicted: inner.evicted,
        }
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emstream_types::Quality;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn msg(device: &str, value: f64) -> StreamMessage {
        StreamMessage {
            timestamp: chrono::Utc::now(),
            device_id: device.to_string(),
            metric_type: "voltage".to_string(),
            value,
            unit: "V".to_string(),
            quality: Quality::Good,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let buffer = StreamBuffer::new(3);
        buffer.add(msg("a", 1.0));
        buffer.add(msg("b", 2.0));
        buffer.add(msg("c", 3.0));
        buffer.add(msg("d", 4.0));

        let recent = buffer.get_recent(chrono::Duration::days(365));
        let devices: Vec<_> = recent.iter().map(|m| m.device_id.as_str()).collect();
        assert_eq!(devices, vec!["b", "c", "d"]);
        assert_eq!(buffer.stats().evicted, 1);
        assert_eq!(buffer.stats().total_messages, 4);
    }

    #[test]
    fn get_recent_filters_by_window() {
        let buffer = StreamBuffer::new(10);
        let mut old = msg("a", 1.0);
        old.timestamp = chrono::Utc::now() - chrono::Duration::seconds(120);
        buffer.add(old);
        buffer.add(msg("b", 2.0));

        let recent = buffer.get_recent(chrono::Duration::seconds(60));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].device_id, "b");
    }

    #[test]
    fn flush_older_than_drops_aged_entries() {
        let buffer = StreamBuffer::new(10);
        let mut old = msg("a", 1.0);
        old.timestamp = chrono::Utc::now() - chrono::Duration::hours(2);
        buffer.add(old);
        buffer.add(msg("b", 2.0));

        assert_eq!(buffer.flush_older_than(chrono::Duration::hours(1)), 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.stats().evicted, 1);
    }

    proptest! {
        #[test]
        fn length_never_exceeds_capacity(capacity in 1usize..64, inserts in 0usize..256) {
            let buffer = StreamBuffer::new(capacity);
            for i in 0..inserts {
                buffer.add(msg("dev", i as f64));
                prop_assert!(buffer.len() <= capacity);
            }
            let stats = buffer.stats();
            prop_assert_eq!(stats.total_messages as usize, inserts);
            prop_assert_eq!(stats.len + stats.evicted as usize, inserts);
        }
    }
}
