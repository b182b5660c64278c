//! # IR Frame Codec
//!
//! Wire-level encoding and decoding of the 32-bit carrier frame.
//!
//! ## Frame Layout
//!
//! All frames share one layout (most significant bits first):
//! - Bits 31-16: 16-bit address field. The high byte is the fixed protocol
//!   address constant, the low byte is the sender's player id.
//! - Bits 15-8: command byte
//! - Bits 7-0: bitwise complement of the command byte (integrity check)
//!
//! The command field is overloaded for the second frame of a match request,
//! where it carries the one-byte target id instead of a command. The codec does
//! not distinguish the two cases; it hands the raw command byte upward and the
//! reassembly buffer decides.
//!
//! ## Rejection
//!
//! A capture is rejected when its carrier encoding is foreign, its bit count is
//! not a full frame, or the complement check fails. Rejected captures are the
//! primary source of wrong-signal streak increments in the link state machine.

use crate::{CarrierKind, IR_FRAME_BITS, IR_PROTOCOL_ADDRESS, RawCapture};

/// A structurally valid frame extracted from a raw capture
///
/// The command byte is raw on purpose: it may be an `IrCommand` discriminant or
/// the payload byte of a two-frame match request.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct DecodedFrame {
    /// Player id extracted from the address low byte
    pub sender_id: u8,
    /// Raw command byte (potential payload byte, see module docs)
    pub command_byte: u8,
}

/// Reasons a raw capture is rejected by the codec
///
/// Every variant counts as a "wrong" signal at the link layer.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum FrameDecodeError {
    /// The capture used a carrier encoding other than the expected one
    ForeignCarrier,

    /// The capture did not contain a full 32-bit frame
    TruncatedFrame,

    /// The check field was not the bitwise complement of the command byte
    ComplementMismatch,
}

impl FrameDecodeError {
    /// Human-readable rejection reason for log output
    pub fn name(&self) -> &'static str {
        match self {
            FrameDecodeError::ForeignCarrier => "foreign carrier",
            FrameDecodeError::TruncatedFrame => "truncated frame",
            FrameDecodeError::ComplementMismatch => "complement mismatch",
        }
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for FrameDecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameDecodeError::ForeignCarrier => write!(f, "foreign carrier encoding"),
            FrameDecodeError::TruncatedFrame => write!(f, "frame is not {} bits", IR_FRAME_BITS),
            FrameDecodeError::ComplementMismatch => write!(f, "command complement check failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameDecodeError {}

/// Builds the 32-bit wire frame for a command byte and sender id
///
/// The address field embeds the fixed protocol address high byte ORed with the
/// sender's player id. The same helper serves command frames and the payload
/// frame of a match request; both use the identical layout.
pub fn encode_frame(command_byte: u8, sender_id: u8) -> u32 {
    let address = (IR_PROTOCOL_ADDRESS & 0xFF00) | sender_id as u16;
    ((address as u32) << 16) | ((command_byte as u32) << 8) | ((!command_byte) as u32)
}

/// Validates a raw capture and extracts sender id and command byte
///
/// # Returns
/// * `Ok(DecodedFrame)` - the capture carried a structurally valid frame
/// * `Err(FrameDecodeError)` - the capture must be treated as a wrong signal
pub fn decode_capture(capture: &RawCapture) -> Result<DecodedFrame, FrameDecodeError> {
    if capture.kind != CarrierKind::Nec {
        return Err(FrameDecodeError::ForeignCarrier);
    }

    if capture.bit_count != IR_FRAME_BITS {
        return Err(FrameDecodeError::TruncatedFrame);
    }

    let command_byte = ((capture.value >> 8) & 0xFF) as u8;
    let complement = (capture.value & 0xFF) as u8;
    if complement != !command_byte {
        return Err(FrameDecodeError::ComplementMismatch);
    }

    Ok(DecodedFrame {
        sender_id: ((capture.value >> 16) & 0xFF) as u8,
        command_byte,
    })
}
