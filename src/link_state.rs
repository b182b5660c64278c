//! # Link State Machine
//!
//! The protocol core of the infrared link. Owns the transceiver, the decoded
//! message queue, the reassembly buffer and the wrong-signal counter; drives
//! the handshake/matching lifecycle and emits outbound replies.
//!
//! ## Receive Path
//!
//! `update()` is the per-tick entry point. It attempts exactly one receive:
//! the transceiver holds a single pending decode, so the host must call
//! `update()` on every loop iteration to avoid missing frames. A produced
//! message is enqueued for the host and processed against the transition
//! table, then the link timeout is re-evaluated.
//!
//! ## Transmit Path
//!
//! Every outbound operation builds a frame through the codec, hands it to the
//! transceiver and then holds the transmit medium for a short minimum
//! inter-frame spacing so that two nodes sharing the air do not talk over each
//! other. Header-class frames use the longer gap, the payload frame of a match
//! request the shorter one; both come from the configuration.
//!
//! ## Timeout
//!
//! While Connecting or Matching, silence longer than the link timeout since
//! the last transmission moves the link to Error. Error is terminal until the
//! host calls reset.

use embassy_time::{Duration, Instant, Timer};
use log::{Level, log};

use crate::frames::{IrCommand, LinkMessage, decode_capture, encode_frame};
use crate::message_queue::MessageQueue;
use crate::reassembly::ReassemblyBuffer;
use crate::wrong_streak::WrongStreak;
use crate::{IR_FRAME_BITS, IrLinkConfig, MESSAGE_QUEUE_SIZE, MatchError, PartnerEvents};

#[cfg(feature = "ir-device-echo")]
use crate::ir_device_echo::IrDevice;

#[cfg(feature = "ir-device-simulator")]
use crate::ir_device_simulator::IrDevice;

/// Phase of the two-device handshake/matching protocol
///
/// Exactly one instance per device, mutated only by the link state machine.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkState {
    /// No link activity
    Idle,
    /// Announcing presence, waiting for a peer
    Scanning,
    /// Handshake exchanged, waiting for the peer's player id
    Connecting,
    /// Peer known, link established
    Connected,
    /// Match request sent, waiting for the peer's verdict
    Matching,
    /// Link timeout; terminal until reset
    Error,
}

impl LinkState {
    /// Human-readable state name for log output
    pub fn name(&self) -> &'static str {
        match self {
            LinkState::Idle => "idle",
            LinkState::Scanning => "scanning",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Matching => "matching",
            LinkState::Error => "error",
        }
    }
}

pub(crate) struct LinkStateMachine<E: PartnerEvents> {
    device: IrDevice,
    config: IrLinkConfig,
    events: E,
    my_player_id: u8,
    state: LinkState,
    peer_player_id: Option<u8>,
    last_send_time: Instant,
    last_receive_time: Instant,
    reassembly: ReassemblyBuffer,
    queue: MessageQueue<MESSAGE_QUEUE_SIZE>,
    wrong_streak: WrongStreak,
}

impl<E: PartnerEvents> LinkStateMachine<E> {
    pub(crate) fn new(config: IrLinkConfig, device: IrDevice, events: E, my_player_id: u8) -> Self {
        let reassembly = ReassemblyBuffer::new(config.reassembly_window);
        Self {
            device,
            config,
            events,
            my_player_id,
            state: LinkState::Idle,
            peer_player_id: None,
            last_send_time: Instant::now(),
            last_receive_time: Instant::now(),
            reassembly,
            queue: MessageQueue::new(),
            wrong_streak: WrongStreak::new(),
        }
    }

    /// Tears the link down and hands the transceiver back to the caller
    pub(crate) fn into_device(self) -> IrDevice {
        self.device
    }

    /// Per-tick entry point: one receive attempt, then timeout re-evaluation
    pub(crate) async fn update(&mut self) {
        if let Some(message) = self.poll_capture() {
            self.last_receive_time = message.timestamp;
            self.queue.enqueue(message);
            self.process_message(message).await;
        }

        if matches!(self.state, LinkState::Connecting | LinkState::Matching) && self.last_send_time.elapsed() > self.config.link_timeout {
            log!(
                Level::Warn,
                "Link timeout while {} (last receive {}ms ago)",
                self.state.name(),
                self.last_receive_time.elapsed().as_millis()
            );
            self.state = LinkState::Error;
        }
    }

    /// Attempts one receive from the transceiver
    ///
    /// Rejected captures feed the wrong-signal streak; structurally valid
    /// frames run through the reassembly buffer. The receiver is re-armed in
    /// every case.
    fn poll_capture(&mut self) -> Option<LinkMessage> {
        let capture = self.device.decode()?;

        let produced = match decode_capture(&capture) {
            Ok(frame) => self.reassembly.observe(frame.sender_id, frame.command_byte, Instant::now()),
            Err(reject) => {
                log!(Level::Debug, "Rejected capture {:#010x}: {}", capture.value, reject.name());
                self.wrong_streak.record_wrong();
                None
            }
        };

        self.device.resume();
        produced
    }

    async fn process_message(&mut self, message: LinkMessage) {
        log!(
            Level::Debug,
            "Received {} from player {} (data {})",
            message.command.name(),
            message.sender_id,
            message.data
        );

        match message.command {
            IrCommand::Handshake => {
                self.send_player_id(self.my_player_id).await;
                self.state = LinkState::Connecting;
                self.wrong_streak.reset();
            }
            IrCommand::PlayerId => {
                if matches!(self.state, LinkState::Scanning | LinkState::Connecting) {
                    self.peer_player_id = Some(message.sender_id);
                    self.state = LinkState::Connected;
                    log!(Level::Info, "Connected to player {}", message.sender_id);
                    self.wrong_streak.reset();
                }
            }
            IrCommand::MatchRequest => {
                if self.config.match_rule.is_winning(message.data, self.my_player_id) {
                    log!(Level::Info, "Match request from player {} succeeded (target {})", message.sender_id, message.data);
                    self.send_match_response(true).await;
                    self.wrong_streak.reset();
                } else {
                    log!(Level::Info, "Match request from player {} failed (target {})", message.sender_id, message.data);
                    self.send_match_response(false).await;
                    self.events.on_wrong_match();
                    self.wrong_streak.record_wrong();
                }
            }
            IrCommand::MatchAck => {
                if self.state == LinkState::Matching {
                    log!(Level::Info, "Peer confirmed the match");
                    self.state = LinkState::Connected;
                    self.wrong_streak.reset();
                }
            }
            IrCommand::MatchFail => {
                if self.state == LinkState::Matching {
                    log!(Level::Info, "Peer rejected the match");
                    self.state = LinkState::Connected;
                    self.wrong_streak.reset();
                }
            }
            IrCommand::Heartbeat => {
                self.last_receive_time = Instant::now();
                self.wrong_streak.reset();
            }
            IrCommand::Reset => {
                self.reset();
            }
        }
    }

    /// Transmits one frame and holds the medium for the inter-frame gap
    ///
    /// The command field carries either a protocol command or the payload byte
    /// of a match request; the wire layout is identical.
    async fn send_raw_command(&mut self, command_byte: u8, sender_id: u8, gap: Duration) {
        let frame = encode_frame(command_byte, sender_id);
        self.device.send(frame, IR_FRAME_BITS).await;
        self.last_send_time = Instant::now();
        Timer::after(gap).await;
    }

    pub(crate) async fn send_handshake(&mut self) {
        log!(Level::Debug, "Sending handshake");
        self.send_raw_command(IrCommand::Handshake as u8, self.my_player_id, self.config.header_frame_gap).await;
    }

    async fn send_player_id(&mut self, player_id: u8) {
        log!(Level::Debug, "Sending player id {}", player_id);
        self.send_raw_command(IrCommand::PlayerId as u8, player_id, self.config.header_frame_gap).await;
    }

    /// Transmits the two-frame match request sequence and enters Matching
    async fn send_match_request(&mut self, target_id: u8) {
        log!(Level::Info, "Sending match request for target {}", target_id);
        self.send_raw_command(IrCommand::MatchRequest as u8, self.my_player_id, self.config.header_frame_gap).await;
        self.send_raw_command(target_id, self.my_player_id, self.config.payload_frame_gap).await;
        self.state = LinkState::Matching;
    }

    async fn send_match_response(&mut self, success: bool) {
        let command = if success { IrCommand::MatchAck } else { IrCommand::MatchFail };
        log!(Level::Debug, "Sending match response: {}", command.name());
        self.send_raw_command(command as u8, self.my_player_id, self.config.header_frame_gap).await;
    }

    pub(crate) async fn send_heartbeat(&mut self) {
        log::trace!("Sending heartbeat");
        self.send_raw_command(IrCommand::Heartbeat as u8, self.my_player_id, self.config.header_frame_gap).await;
    }

    pub(crate) async fn start_scanning(&mut self) {
        self.state = LinkState::Scanning;
        self.queue.clear();
        log!(Level::Info, "Scanning for other players");
        self.send_handshake().await;
    }

    pub(crate) fn stop_scanning(&mut self) -> bool {
        if self.state == LinkState::Scanning {
            self.state = LinkState::Idle;
            log!(Level::Info, "Stopped scanning");
            return true;
        }
        false
    }

    pub(crate) async fn connect_to_player(&mut self, player_id: u8) {
        self.peer_player_id = Some(player_id);
        self.state = LinkState::Connecting;
        log!(Level::Info, "Connecting to player {}", player_id);
        self.send_handshake().await;
    }

    pub(crate) async fn perform_match(&mut self, target_id: u8) -> Result<(), MatchError> {
        if self.state != LinkState::Connected {
            log!(Level::Warn, "Cannot match while {}", self.state.name());
            return Err(MatchError::NotConnected);
        }
        self.send_match_request(target_id).await;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.state = LinkState::Idle;
        self.peer_player_id = None;
        self.queue.clear();
        self.reassembly.clear();
        self.wrong_streak.reset();
        self.wrong_streak.clear_event();
        log!(Level::Info, "IR link reset");
    }

    pub(crate) fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub(crate) fn has_new_message(&self) -> bool {
        !self.queue.is_empty()
    }

    pub(crate) fn connected_player_id(&self) -> Option<u8> {
        self.peer_player_id
    }

    pub(crate) fn next_message(&mut self) -> Option<LinkMessage> {
        self.queue.dequeue()
    }

    pub(crate) fn consume_unlock_event(&self) -> bool {
        self.wrong_streak.consume_unlock_event()
    }

    pub(crate) fn my_player_id(&self) -> u8 {
        self.my_player_id
    }

    pub(crate) fn set_my_player_id(&mut self, player_id: u8) {
        self.my_player_id = player_id;
    }

    #[cfg(test)]
    pub(crate) fn wrong_streak_value(&self) -> u8 {
        self.wrong_streak.value()
    }
}
