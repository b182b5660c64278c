//! # Link Message Module
//!
//! The decoded application message and the protocol command space.
//!
//! A `LinkMessage` is produced once a raw capture has passed the frame codec and
//! (where applicable) the reassembly buffer. It is immutable after production
//! and flows into the bounded message queue, from which the host drains it.

use embassy_time::Instant;

/// Commands of the link protocol
///
/// # Encoding
/// Each variant is encoded as a single byte in the command field of the wire
/// frame.
///
/// # Examples
/// ```rust
/// use partnerlink_ir_lib::frames::IrCommand;
///
/// assert_eq!(IrCommand::Handshake as u8, 0x01);
/// assert_eq!(IrCommand::from_raw(0x06), Some(IrCommand::Heartbeat));
/// assert_eq!(IrCommand::from_raw(0x40), None);
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum IrCommand {
    /// Announce presence and request a peer reply (0x01)
    Handshake = 0x01,

    /// Carry a player id in reply to a handshake (0x02)
    PlayerId = 0x02,

    /// First frame of a two-frame match request (0x03)
    MatchRequest = 0x03,

    /// Peer accepted the match request (0x04)
    MatchAck = 0x04,

    /// Peer rejected the match request (0x05)
    MatchFail = 0x05,

    /// Keepalive, refreshes the receive timestamp (0x06)
    Heartbeat = 0x06,

    /// Return the peer to the idle state (0x07)
    Reset = 0x07,
}

impl IrCommand {
    /// Maps a raw command byte to a command, if it is part of the protocol
    pub fn from_raw(byte: u8) -> Option<IrCommand> {
        match byte {
            0x01 => Some(IrCommand::Handshake),
            0x02 => Some(IrCommand::PlayerId),
            0x03 => Some(IrCommand::MatchRequest),
            0x04 => Some(IrCommand::MatchAck),
            0x05 => Some(IrCommand::MatchFail),
            0x06 => Some(IrCommand::Heartbeat),
            0x07 => Some(IrCommand::Reset),
            _ => None,
        }
    }

    /// Human-readable command name for log output
    pub fn name(&self) -> &'static str {
        match self {
            IrCommand::Handshake => "handshake",
            IrCommand::PlayerId => "player-id",
            IrCommand::MatchRequest => "match-request",
            IrCommand::MatchAck => "match-ack",
            IrCommand::MatchFail => "match-fail",
            IrCommand::Heartbeat => "heartbeat",
            IrCommand::Reset => "reset",
        }
    }
}

/// One decoded application message
///
/// Produced by the receive path, consumed by the link state machine and by
/// queue readers. A `LinkMessage` that exists is valid: every decode path
/// rejects malformed input before construction.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkMessage {
    /// Protocol command carried by the message
    pub command: IrCommand,

    /// Player id of the sender, from the address low byte
    pub sender_id: u8,

    /// One payload byte; only match requests carry a nonzero payload
    pub data: u8,

    /// Arrival time of the completing frame
    pub timestamp: Instant,
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn from_raw_round_trips_discriminants() {
        for byte in 0x01..=0x07u8 {
            let command = IrCommand::from_raw(byte).unwrap();
            assert_eq!(command as u8, byte);
        }
    }

    #[test]
    fn from_raw_rejects_bytes_outside_command_space() {
        assert_eq!(IrCommand::from_raw(0x00), None);
        assert_eq!(IrCommand::from_raw(0x08), None);
        assert_eq!(IrCommand::from_raw(0xFF), None);
    }
}
