use log::{debug, warn};

use super::SampleBuffer;
use crate::error::{Channel, SequencerError};
use crate::hardware::{Completion, SampleChannel};

/// Streams converter samples into caller buffers.
#[derive(Debug, Default)]
pub struct SampleAcquirer {
    completion: Completion,
}

impl SampleAcquirer {
    pub fn new() -> SampleAcquirer {
        SampleAcquirer::default()
    }

    /// Starts filling `length` samples into `buffer` and returns immediately.
    /// The buffer stays lent until the fill completes.
    pub fn start<S: SampleChannel>(
        &mut self,
        hw: &mut S,
        buffer: &SampleBuffer,
        length: usize,
    ) -> Result<(), SequencerError> {
        self.ensure_ready(buffer, length)?;

        let lease = buffer.lend(length)?;
        let done = self.completion.arm();
        if let Err(err) = hw.start_sampling(lease, done) {
            self.completion.reset();
            return Err(err.into());
        }
        debug!("sampling started, {length} samples");
        Ok(())
    }

    /// Checks everything `start` would reject, without side effects.
    pub fn ensure_ready(&self, buffer: &SampleBuffer, length: usize) -> Result<(), SequencerError> {
        if self.busy() {
            warn!("sampling requested while a fill is in flight");
            return Err(SequencerError::Busy(Channel::Sample));
        }
        if buffer.is_lent() {
            warn!("sampling requested into a buffer that is still lent");
            return Err(SequencerError::BufferLent);
        }
        buffer.check_length(length)
    }

    pub fn busy(&self) -> bool {
        self.completion.is_busy()
    }

    pub fn reset(&mut self) {
        self.completion.reset();
    }
}
