use embassy_time::{Duration, Instant};
use log::{Level, log};

use crate::frames::{IrCommand, LinkMessage};

struct PendingReassembly {
    sender_id: u8,
    request_time: Instant,
}

/// Merges the two-frame match-request sequence into one logical message
///
/// At most one sequence can be pending at a time. A match-request header frame
/// arms the buffer; the next frame from the same sender inside the merge window
/// completes it, with that frame's command byte taken as the one-byte target id
/// payload. A second header overwrites the pending entry (last-writer-wins) and
/// the earlier request is silently lost. An entry older than the window is
/// treated as absent even before it is cleared.
///
/// Frames that complete no pending sequence fall through as standalone
/// single-packet messages.
pub(crate) struct ReassemblyBuffer {
    pending: Option<PendingReassembly>,
    window: Duration,
}

impl ReassemblyBuffer {
    pub(crate) const fn new(window: Duration) -> Self {
        Self { pending: None, window }
    }

    /// Feeds one decoded frame through the buffer
    ///
    /// # Returns
    /// * `Some(LinkMessage)` - a completed match request or a standalone message
    /// * `None` - the frame armed the buffer, or carried no known command
    pub(crate) fn observe(&mut self, sender_id: u8, command_byte: u8, now: Instant) -> Option<LinkMessage> {
        if command_byte == IrCommand::MatchRequest as u8 {
            if let Some(pending) = &self.pending {
                if pending.sender_id != sender_id {
                    log!(
                        Level::Debug,
                        "Match request from player {} replaces pending request from player {}",
                        sender_id,
                        pending.sender_id
                    );
                }
            }
            self.pending = Some(PendingReassembly {
                sender_id,
                request_time: now,
            });
            return None;
        }

        // An expired entry no longer participates in merging
        if let Some(pending) = &self.pending {
            if now.saturating_duration_since(pending.request_time) >= self.window {
                self.pending = None;
            }
        }

        if let Some(pending) = &self.pending {
            if pending.sender_id == sender_id {
                self.pending = None;
                return Some(LinkMessage {
                    command: IrCommand::MatchRequest,
                    sender_id,
                    data: command_byte,
                    timestamp: now,
                });
            }
        }

        let command = IrCommand::from_raw(command_byte)?;
        Some(LinkMessage {
            command,
            sender_id,
            data: 0,
            timestamp: now,
        })
    }

    pub(crate) fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::REASSEMBLY_WINDOW;

    fn buffer() -> ReassemblyBuffer {
        ReassemblyBuffer::new(REASSEMBLY_WINDOW)
    }

    #[test]
    fn header_and_payload_inside_window_merge() {
        let mut reassembly = buffer();
        let base = Instant::now();

        assert!(reassembly.observe(1, IrCommand::MatchRequest as u8, base).is_none());
        let merged = reassembly
            .observe(1, 0x00, base + Duration::from_millis(40))
            .expect("payload frame should complete the request");
        assert_eq!(merged.command, IrCommand::MatchRequest);
        assert_eq!(merged.sender_id, 1);
        assert_eq!(merged.data, 0x00);
    }

    #[test]
    fn payload_after_window_is_a_standalone_message() {
        let mut reassembly = buffer();
        let base = Instant::now();

        assert!(reassembly.observe(1, IrCommand::MatchRequest as u8, base).is_none());
        // 650ms later: no merge, the frame stands alone
        let standalone = reassembly
            .observe(1, IrCommand::Heartbeat as u8, base + Duration::from_millis(650))
            .expect("late frame should stand alone");
        assert_eq!(standalone.command, IrCommand::Heartbeat);
        assert_eq!(standalone.data, 0);
    }

    #[test]
    fn second_header_replaces_the_pending_request() {
        let mut reassembly = buffer();
        let base = Instant::now();

        assert!(reassembly.observe(1, IrCommand::MatchRequest as u8, base).is_none());
        assert!(
            reassembly
                .observe(2, IrCommand::MatchRequest as u8, base + Duration::from_millis(50))
                .is_none()
        );

        // Player 1's payload no longer merges; it resolves as a standalone command
        let standalone = reassembly
            .observe(1, IrCommand::Heartbeat as u8, base + Duration::from_millis(100))
            .unwrap();
        assert_eq!(standalone.command, IrCommand::Heartbeat);

        // Player 2's payload completes the replacing request
        let merged = reassembly.observe(2, 0x04, base + Duration::from_millis(150)).unwrap();
        assert_eq!(merged.command, IrCommand::MatchRequest);
        assert_eq!(merged.sender_id, 2);
        assert_eq!(merged.data, 0x04);
    }

    #[test]
    fn frame_from_other_sender_does_not_consume_pending_request() {
        let mut reassembly = buffer();
        let base = Instant::now();

        assert!(reassembly.observe(1, IrCommand::MatchRequest as u8, base).is_none());
        let other = reassembly
            .observe(3, IrCommand::Heartbeat as u8, base + Duration::from_millis(50))
            .unwrap();
        assert_eq!(other.command, IrCommand::Heartbeat);
        assert_eq!(other.sender_id, 3);

        // Player 1's request is still pending and merges
        let merged = reassembly.observe(1, 0x00, base + Duration::from_millis(100)).unwrap();
        assert_eq!(merged.command, IrCommand::MatchRequest);
        assert_eq!(merged.sender_id, 1);
    }

    #[test]
    fn unknown_command_without_pending_request_produces_nothing() {
        let mut reassembly = buffer();
        assert!(reassembly.observe(1, 0x40, Instant::now()).is_none());
    }
}
