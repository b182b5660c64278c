//! # IR Device Simulator - Testing and Development Mock
//!
//! This module provides a simulated transceiver for exercising the link stack
//! without hardware. The device talks to an external "IR medium" through a pair
//! of channels; the medium (a test harness or demo binary) owns topology,
//! delivery and noise injection.
//!
//! ## Architecture
//!
//! - **Output Queue**: frames transmitted by this node, for the medium to route
//! - **Input Queue**: captures the medium delivers to this node
//! - **Capture Buffer**: one pending decode, held until `resume` is called
//!
//! Frames in flight queue inside the input channel; the device pulls the next
//! one only after the previous capture has been consumed, so the one-pending-
//! decode contract of the real receiver is preserved.
//!
//! ## Noise Injection
//!
//! The medium can deliver captures with a foreign carrier kind to simulate
//! remote controls of other protocols; the link stack counts them as wrong
//! signals without any device involvement.
//!
//! ## Timing Simulation
//!
//! Transmitting awaits the airtime of one full carrier frame, so simulated
//! nodes occupy the medium for a realistic duration.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};
use log::{Level, log};

use crate::RawCapture;

/// Airtime of one full 32-bit carrier frame, leader pulse included
const FRAME_AIRTIME: Duration = Duration::from_millis(68);

/// Size of the transmit queue toward the medium
const IR_OUTPUT_QUEUE_SIZE: usize = 10;

/// Output queue type - frames from this node to the medium
pub type IrOutputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, IrOutputMessage, IR_OUTPUT_QUEUE_SIZE>;

/// Used by the medium to receive this node's transmissions
pub type IrOutputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, IrOutputMessage, IR_OUTPUT_QUEUE_SIZE>;

/// Used by the device to hand transmissions to the medium
pub type IrOutputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, IrOutputMessage, IR_OUTPUT_QUEUE_SIZE>;

/// Size of the receive queue from the medium
const IR_INPUT_QUEUE_SIZE: usize = 10;

/// Input queue type - captures from the medium to this node
pub type IrInputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, IrInputMessage, IR_INPUT_QUEUE_SIZE>;

/// Used by the device to receive deliveries from the medium
pub type IrInputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, IrInputMessage, IR_INPUT_QUEUE_SIZE>;

/// Used by the medium to deliver captures to the device
pub type IrInputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, IrInputMessage, IR_INPUT_QUEUE_SIZE>;

/// Messages from the simulated device to the medium
#[cfg_attr(feature = "std", derive(Debug))]
pub enum IrOutputMessage {
    /// One modulated frame leaving this node's transmitter
    TransmitFrame { value: u32, bit_count: u8 },
}

/// Messages from the medium to the simulated device
#[cfg_attr(feature = "std", derive(Debug))]
pub enum IrInputMessage {
    /// One demodulated capture arriving at this node's receiver
    ReceiveFrame(RawCapture),
}

/// Simulated transceiver wired to an external medium through channels
///
/// The medium decides which other nodes (if any) receive a transmitted frame
/// and with which carrier kind captures are delivered; the device itself only
/// models the transmitter occupancy and the receiver's one-slot decode buffer.
pub struct IrDevice {
    output_queue_sender: IrOutputQueueSender,
    input_queue_receiver: IrInputQueueReceiver,
    pending: Option<RawCapture>,
}

impl IrDevice {
    /// Creates a simulated device from the medium-facing queue endpoints
    ///
    /// # Example
    /// ```rust,ignore
    /// use partnerlink_ir_lib::ir_device_simulator::*;
    ///
    /// static OUTPUT_QUEUE: IrOutputQueue = embassy_sync::channel::Channel::new();
    /// static INPUT_QUEUE: IrInputQueue = embassy_sync::channel::Channel::new();
    ///
    /// let device = IrDevice::with(OUTPUT_QUEUE.sender(), INPUT_QUEUE.receiver());
    /// ```
    pub const fn with(output_queue_sender: IrOutputQueueSender, input_queue_receiver: IrInputQueueReceiver) -> Self {
        IrDevice {
            output_queue_sender,
            input_queue_receiver,
            pending: None,
        }
    }

    /// Transmits one frame into the medium and occupies it for the airtime
    ///
    /// If the medium queue is full the frame is dropped with a warning; a
    /// saturated medium behaves like a collision.
    pub async fn send(&mut self, value: u32, bit_count: u8) {
        match self.output_queue_sender.try_send(IrOutputMessage::TransmitFrame { value, bit_count }) {
            Ok(_) => {
                Timer::after(FRAME_AIRTIME).await;
            }
            Err(embassy_sync::channel::TrySendError::Full(_)) => {
                log!(Level::Warn, "IR medium queue full, dropping frame: {:#010x}", value);
            }
        }
    }

    /// Returns the pending capture, pulling the next delivery if none is held
    pub fn decode(&mut self) -> Option<RawCapture> {
        if self.pending.is_none() {
            if let Ok(IrInputMessage::ReceiveFrame(capture)) = self.input_queue_receiver.try_receive() {
                log::trace!("Capture ready: {:#010x}", capture.value);
                self.pending = Some(capture);
            }
        }
        self.pending
    }

    /// Re-arms the receiver, discarding the pending capture
    pub fn resume(&mut self) {
        self.pending = None;
    }
}

#[cfg(all(test, feature = "std", feature = "ir-device-simulator"))]
mod tests {
    use super::*;
    use crate::{CarrierKind, IR_FRAME_BITS};
    use futures::executor::block_on;

    fn wired_device() -> (IrDevice, IrOutputQueueReceiver, IrInputQueueSender) {
        let output_queue: &'static IrOutputQueue = Box::leak(Box::new(embassy_sync::channel::Channel::new()));
        let input_queue: &'static IrInputQueue = Box::leak(Box::new(embassy_sync::channel::Channel::new()));
        let device = IrDevice::with(output_queue.sender(), input_queue.receiver());
        (device, output_queue.receiver(), input_queue.sender())
    }

    #[test]
    fn transmitted_frame_reaches_the_medium_unchanged() {
        let (mut device, medium_rx, _medium_tx) = wired_device();
        block_on(device.send(0x1201_01FE, IR_FRAME_BITS));

        let IrOutputMessage::TransmitFrame { value, bit_count } = medium_rx.try_receive().unwrap();
        assert_eq!(value, 0x1201_01FE);
        assert_eq!(bit_count, IR_FRAME_BITS);
    }

    #[test]
    fn delivery_stays_buffered_until_resume() {
        let (mut device, _medium_rx, medium_tx) = wired_device();
        medium_tx
            .try_send(IrInputMessage::ReceiveFrame(RawCapture {
                kind: CarrierKind::Nec,
                value: 0x1202_02FD,
                bit_count: IR_FRAME_BITS,
            }))
            .unwrap();

        assert_eq!(device.decode().unwrap().value, 0x1202_02FD);
        assert_eq!(device.decode().unwrap().value, 0x1202_02FD);
        device.resume();
        assert!(device.decode().is_none());
    }

    #[test]
    fn deliveries_are_consumed_one_per_resume_cycle() {
        let (mut device, _medium_rx, medium_tx) = wired_device();
        for value in [0x1201_01FEu32, 0x1202_02FD] {
            medium_tx
                .try_send(IrInputMessage::ReceiveFrame(RawCapture {
                    kind: CarrierKind::Nec,
                    value,
                    bit_count: IR_FRAME_BITS,
                }))
                .unwrap();
        }

        assert_eq!(device.decode().unwrap().value, 0x1201_01FE);
        device.resume();
        assert_eq!(device.decode().unwrap().value, 0x1202_02FD);
        device.resume();
        assert!(device.decode().is_none());
    }
}
