//! # IR Device Echo - Loopback Device for Testing
//!
//! This module provides a minimal transceiver implementation that folds every
//! transmitted frame back into the local receiver. It exists for smoke testing
//! the link stack on a single node without a medium or hardware.
//!
//! ## Behavior
//!
//! - `send` places the transmitted frame into the one-slot capture buffer
//! - `decode` returns the buffered capture until `resume` is called
//! - A transmission while a capture is still buffered is dropped with a warning
//!
//! ## Limitations
//!
//! - The node hears only itself; no two-player exchange can be exercised
//! - No airtime simulation, no foreign-signal injection
//! - Single node only

use log::{Level, log};

use crate::{CarrierKind, RawCapture};

/// Loopback transceiver - echoes transmitted frames to the local receiver
///
/// The one-slot capture buffer models the real receiver's single pending
/// decode: a capture stays available to `decode` until `resume` re-arms the
/// receiver.
#[cfg_attr(feature = "std", derive(Debug))]
pub struct IrDevice {
    pending: Option<RawCapture>,
}

impl Default for IrDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl IrDevice {
    /// Creates a new echo device with an empty capture buffer
    pub const fn new() -> Self {
        IrDevice { pending: None }
    }

    /// Transmits a frame by echoing it into the local capture buffer
    ///
    /// If a previous capture has not been consumed yet the frame is dropped,
    /// matching a receiver that is still holding its one pending decode.
    pub async fn send(&mut self, value: u32, bit_count: u8) {
        if self.pending.is_some() {
            log!(Level::Warn, "Receiver busy, dropping echoed frame: {:#010x}", value);
            return;
        }
        log::trace!("Echoing frame: {:#010x}", value);
        self.pending = Some(RawCapture {
            kind: CarrierKind::Nec,
            value,
            bit_count,
        });
    }

    /// Returns the buffered capture, if any, without consuming it
    pub fn decode(&mut self) -> Option<RawCapture> {
        self.pending
    }

    /// Re-arms the receiver, discarding the buffered capture
    pub fn resume(&mut self) {
        self.pending = None;
    }
}

#[cfg(all(test, feature = "std", feature = "ir-device-echo"))]
mod tests {
    use super::*;
    use crate::IR_FRAME_BITS;
    use futures::executor::block_on;

    #[test]
    fn capture_stays_buffered_until_resume() {
        let mut device = IrDevice::new();
        block_on(device.send(0x1201_01FE, IR_FRAME_BITS));

        let first = device.decode().unwrap();
        let second = device.decode().unwrap();
        assert_eq!(first.value, 0x1201_01FE);
        assert_eq!(second.value, 0x1201_01FE);

        device.resume();
        assert!(device.decode().is_none());
    }

    #[test]
    fn transmission_while_buffered_is_dropped() {
        let mut device = IrDevice::new();
        block_on(device.send(0x1201_01FE, IR_FRAME_BITS));
        block_on(device.send(0x1202_02FD, IR_FRAME_BITS));

        assert_eq!(device.decode().unwrap().value, 0x1201_01FE);
        device.resume();
        assert!(device.decode().is_none());
    }
}
