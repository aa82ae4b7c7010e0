use log::debug;

use super::Direction;
use crate::hardware::Mux;

/// Routes one transducer to the shared transmit/receive path.
#[derive(Debug, Default)]
pub struct ChannelMux {
    active: Option<Direction>,
}

impl ChannelMux {
    pub fn new() -> ChannelMux {
        ChannelMux::default()
    }

    /// Commits `direction` on the switch select lines. Writing the same
    /// direction again leaves the lines unchanged.
    pub fn select<M: Mux>(&mut self, hw: &mut M, direction: Direction) {
        let (a, b) = direction.switch_lines();
        hw.set_lines(a, b);
        self.active = Some(direction);
        debug!("switch routed to {direction} (A={a:?}, B={b:?})");
    }

    pub fn active(&self) -> Option<Direction> {
        self.active
    }

    pub fn clear(&mut self) {
        // lines were already returned to reset by the power sequencer
        self.active = None;
    }
}
