use log::{debug, warn};

use super::PulseWaveform;
use crate::error::{Channel, SequencerError};
use crate::hardware::{Completion, PulseChannel};

/// Plays pulse waveforms on the active transducer.
#[derive(Debug, Default)]
pub struct PulseEmitter {
    completion: Completion,
}

impl PulseEmitter {
    pub fn new() -> PulseEmitter {
        PulseEmitter::default()
    }

    /// Starts one-shot playback of `waveform` and returns immediately. The
    /// channel stops by itself once the last sample has been played.
    pub fn transmit<P: PulseChannel>(
        &mut self,
        hw: &mut P,
        waveform: &PulseWaveform,
    ) -> Result<(), SequencerError> {
        self.ensure_idle()?;

        let done = self.completion.arm();
        if let Err(err) = hw.start_pulse(waveform.clone(), done) {
            self.completion.reset();
            return Err(err.into());
        }
        debug!("pulse started, {} samples", waveform.len());
        Ok(())
    }

    pub fn ensure_idle(&self) -> Result<(), SequencerError> {
        if self.busy() {
            warn!("pulse requested while a transmission is in flight");
            return Err(SequencerError::Busy(Channel::Pulse));
        }
        Ok(())
    }

    pub fn busy(&self) -> bool {
        self.completion.is_busy()
    }

    pub fn reset(&mut self) {
        self.completion.reset();
    }
}
