//! Pending-audio byte buffer between the TTS source and the pacing tick

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::{Error, Result};

/// FIFO buffer of raw PCM bytes awaiting dispatch.
///
/// Inbound chunks of arbitrary length append to the tail; the pacing tick
/// removes fixed-size prefixes from the head. Arrival order is preserved and
/// no byte is ever returned twice.
pub struct PcmBuffer {
    buf: BytesMut,
    max_bytes: Option<usize>,
    sample_rate: u32,
    total_bytes_in: u64,
    total_bytes_out: u64,
}

impl PcmBuffer {
    /// Create an unbounded buffer.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_capacity(sample_rate, None)
    }

    /// Create a buffer with an optional byte cap.
    pub fn with_capacity(sample_rate: u32, max_bytes: Option<usize>) -> Self {
        Self {
            buf: BytesMut::new(),
            max_bytes,
            sample_rate,
            total_bytes_in: 0,
            total_bytes_out: 0,
        }
    }

    /// Append an inbound chunk to the tail.
    ///
    /// Fails with [`Error::BufferOverflow`] when a capacity bound is set and
    /// the chunk would exceed it; the buffer is left unchanged in that case.
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(max) = self.max_bytes {
            if self.buf.len() + chunk.len() > max {
                return Err(Error::BufferOverflow { capacity: max });
            }
        }
        self.buf.extend_from_slice(chunk);
        self.total_bytes_in += chunk.len() as u64;
        debug!("Buffered {} bytes ({} pending)", chunk.len(), self.buf.len());
        Ok(())
    }

    /// Remove exactly `n` bytes from the head.
    ///
    /// Callers must check [`len`](Self::len) first; asking for more than is
    /// buffered is a scheduler bug and fails with [`Error::InsufficientData`].
    pub fn take_chunk(&mut self, n: usize) -> Result<Bytes> {
        if self.buf.len() < n {
            return Err(Error::InsufficientData {
                requested: n,
                available: self.buf.len(),
            });
        }
        self.total_bytes_out += n as u64;
        Ok(self.buf.split_to(n).freeze())
    }

    /// Drain whatever remains and zero-pad it to `n` bytes.
    ///
    /// Used to flush a final partial chunk at stream end when the tail is
    /// configured to be sent rather than dropped.
    pub fn take_padded(&mut self, n: usize) -> Bytes {
        let residue = self.buf.len().min(n);
        let mut chunk = self.buf.split_to(residue);
        self.total_bytes_out += residue as u64;
        chunk.resize(n, 0);
        chunk.freeze()
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop all pending bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Current buffer statistics.
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            bytes_buffered: self.buf.len(),
            buffered_ms: self.buf.len() as f32 * 1000.0
                / (self.sample_rate as f32 * crate::config::BYTES_PER_SAMPLE as f32),
            total_bytes_in: self.total_bytes_in,
            total_bytes_out: self.total_bytes_out,
        }
    }
}

/// Buffer statistics snapshot
#[derive(Debug, Clone)]
pub struct BufferStats {
    pub bytes_buffered: usize,
    pub buffered_ms: f32,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_take_preserves_order() {
        let mut buf = PcmBuffer::new(8000);
        buf.append(&[1, 2, 3]).unwrap();
        buf.append(&[4, 5]).unwrap();
        let chunk = buf.take_chunk(4).unwrap();
        assert_eq!(&chunk[..], &[1, 2, 3, 4]);
        assert_eq!(buf.len(), 1);
        assert_eq!(&buf.take_chunk(1).unwrap()[..], &[5]);
    }

    #[test]
    fn take_more_than_buffered_is_an_error() {
        let mut buf = PcmBuffer::new(8000);
        buf.append(&[0u8; 10]).unwrap();
        match buf.take_chunk(11) {
            Err(Error::InsufficientData {
                requested,
                available,
            }) => {
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|b| b.len())),
        }
        // Failed take leaves the buffer intact
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn capacity_bound_rejects_whole_chunk() {
        let mut buf = PcmBuffer::with_capacity(8000, Some(8));
        buf.append(&[0u8; 6]).unwrap();
        assert!(matches!(
            buf.append(&[0u8; 3]),
            Err(Error::BufferOverflow { capacity: 8 })
        ));
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn take_padded_zero_fills_tail() {
        let mut buf = PcmBuffer::new(8000);
        buf.append(&[7, 7, 7]).unwrap();
        let chunk = buf.take_padded(6);
        assert_eq!(&chunk[..], &[7, 7, 7, 0, 0, 0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn take_padded_on_empty_buffer_is_all_silence() {
        let mut buf = PcmBuffer::new(8000);
        let chunk = buf.take_padded(4);
        assert_eq!(&chunk[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn stats_track_totals_and_duration() {
        let mut buf = PcmBuffer::new(8000);
        buf.append(&[0u8; 960]).unwrap();
        buf.take_chunk(320).unwrap();
        let stats = buf.stats();
        assert_eq!(stats.bytes_buffered, 640);
        assert_eq!(stats.total_bytes_in, 960);
        assert_eq!(stats.total_bytes_out, 320);
        // 640 bytes / 2 = 320 samples at 8 kHz = 40 ms
        assert!((stats.buffered_ms - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn clear_drops_pending_bytes() {
        let mut buf = PcmBuffer::new(8000);
        buf.append(&[1u8; 100]).unwrap();
        buf.clear();
        assert!(buf.is_empty());
    }
}
