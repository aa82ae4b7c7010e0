use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ConfigError, SequencerError};

/// Compare values played one per timer period. Shared and read-only, so the
/// pulse channel can hold it while the caller keeps its own handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulseWaveform {
    samples: Arc<[u16]>,
}

impl PulseWaveform {
    pub fn new(samples: impl Into<Vec<u16>>) -> Result<PulseWaveform, ConfigError> {
        let samples = samples.into();
        if samples.is_empty() {
            return Err(ConfigError::EmptyWaveform);
        }
        Ok(PulseWaveform {
            samples: samples.into(),
        })
    }

    /// `cycles` periods at `compare`, followed by one idle period so the
    /// output rests low after playback.
    pub fn burst(cycles: usize, compare: u16) -> Result<PulseWaveform, ConfigError> {
        if cycles == 0 {
            return Err(ConfigError::EmptyWaveform);
        }
        let mut samples = vec![compare; cycles];
        samples.push(0);
        PulseWaveform::new(samples)
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug)]
struct Shared {
    samples: Mutex<Vec<u16>>,
    filled: AtomicUsize,
    lent: AtomicBool,
    capacity: usize,
}

/// Fixed-capacity sample storage. While an acquisition holds the buffer's
/// [`BufferLease`] the samples cannot be read or lent again.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    shared: Arc<Shared>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> SampleBuffer {
        SampleBuffer {
            shared: Arc::new(Shared {
                samples: Mutex::new(vec![0; capacity]),
                filled: AtomicUsize::new(0),
                lent: AtomicBool::new(false),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.shared.filled.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_lent(&self) -> bool {
        self.shared.lent.load(Ordering::Acquire)
    }

    pub fn check_length(&self, length: usize) -> Result<(), SequencerError> {
        if length == 0 || length > self.capacity() {
            return Err(SequencerError::InvalidLength {
                requested: length,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u16]) -> R) -> Result<R, SequencerError> {
        if self.is_lent() {
            return Err(SequencerError::BufferLent);
        }
        let samples = self
            .shared
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(f(&samples[..self.len()]))
    }

    pub fn samples(&self) -> Result<Vec<u16>, SequencerError> {
        self.read(<[u16]>::to_vec)
    }

    /// Hands the first `length` slots to a transfer.
    pub fn lend(&self, length: usize) -> Result<BufferLease, SequencerError> {
        self.check_length(length)?;
        self.shared
            .lent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SequencerError::BufferLent)?;
        self.shared.filled.store(0, Ordering::Release);

        Ok(BufferLease {
            shared: self.shared.clone(),
            length,
            released: false,
        })
    }
}

/// Write access to a lent [`SampleBuffer`]. Dropping the lease without
/// filling it (an aborted transfer) releases the buffer empty.
#[derive(Debug)]
pub struct BufferLease {
    shared: Arc<Shared>,
    length: usize,
    released: bool,
}

impl BufferLease {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Copies up to `len()` samples into the buffer and releases it.
    /// Returns the number of samples written.
    pub fn fill(mut self, samples: &[u16]) -> usize {
        let count = samples.len().min(self.length);
        {
            let mut storage = self
                .shared
                .samples
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            storage[..count].copy_from_slice(&samples[..count]);
        }
        self.release(count);
        count
    }

    fn release(&mut self, filled: usize) {
        self.shared.filled.store(filled, Ordering::Release);
        self.shared.lent.store(false, Ordering::Release);
        self.released = true;
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if !self.released {
            self.release(0);
        }
    }
}
