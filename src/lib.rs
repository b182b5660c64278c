//! # partnerlink-ir-lib
//!
//! Infrared link layer for a two-player "find your partner" party game:
//! frame codec, two-frame match-request reassembly, a bounded message queue,
//! the handshake/matching link state machine and the wrong-signal streak
//! heuristic, over a build-time selected transceiver backend.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(feature = "ir-device-echo", feature = "ir-device-simulator"))]
compile_error!("Only one IR device implementation feature can be enabled at a time");

#[cfg(all(not(test), not(any(feature = "ir-device-echo", feature = "ir-device-simulator"))))]
compile_error!("At least one IR device implementation feature must be enabled");

#[cfg(feature = "ir-device-echo")]
pub mod ir_device_echo;

#[cfg(feature = "ir-device-simulator")]
pub mod ir_device_simulator;

#[cfg(feature = "ir-device-echo")]
use crate::ir_device_echo::IrDevice;

#[cfg(feature = "ir-device-simulator")]
use crate::ir_device_simulator::IrDevice;

pub mod frames;
mod link_state;
mod message_queue;
mod reassembly;
mod wrong_streak;

use embassy_time::Duration;
use log::{Level, log};

use crate::link_state::LinkStateMachine;

// Re-export types from the frames and link_state modules
pub use frames::{IrCommand, LinkMessage};
pub use link_state::LinkState;

// Wire-format constants, shared by every compatible device
pub const IR_PROTOCOL_ADDRESS: u16 = 0x1234;
pub const IR_FRAME_BITS: u8 = 32;

// Protocol timing and policy constants; overridable through IrLinkConfig
pub const IR_LINK_TIMEOUT: Duration = Duration::from_millis(5000);
pub const REASSEMBLY_WINDOW: Duration = Duration::from_millis(600);
pub const HEADER_FRAME_GAP: Duration = Duration::from_millis(50);
pub const PAYLOAD_FRAME_GAP: Duration = Duration::from_millis(30);
pub const WINNING_TARGET_PLAYER_ID: u8 = 0;

pub(crate) const MESSAGE_QUEUE_SIZE: usize = 10;
pub(crate) const WRONG_STREAK_UNLOCK_THRESHOLD: u8 = 2;

/// One demodulated result handed up by a transceiver backend
///
/// The backend reports the carrier protocol it recognized alongside the raw
/// value; the frame codec decides whether the capture is part of this link's
/// protocol.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RawCapture {
    /// Carrier protocol the receiver demodulated
    pub kind: CarrierKind,
    /// Raw frame value, most significant bit first
    pub value: u32,
    /// Number of bits captured
    pub bit_count: u8,
}

/// Carrier protocol classification of a capture
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum CarrierKind {
    /// The consumer-IR encoding this link is built on
    Nec,
    /// Any other encoding (foreign remote controls, noise)
    Foreign,
}

/// Policy deciding which match-request target wins
///
/// The game rule differs between revisions of the original protocol; the link
/// never hardcodes one.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum MatchRule {
    /// A fixed target id wins (the classic rule: player 0)
    FixedTarget(u8),
    /// The receiver's own player id wins
    OwnPlayerId,
}

impl MatchRule {
    pub(crate) fn is_winning(&self, target_id: u8, own_player_id: u8) -> bool {
        match self {
            MatchRule::FixedTarget(winning_id) => target_id == *winning_id,
            MatchRule::OwnPlayerId => target_id == own_player_id,
        }
    }
}

/// Configuration for link timing and the matching policy
///
/// The inter-frame gaps are the minimum spacing the transmitter holds after a
/// frame so that two devices sharing the air do not talk over each other.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct IrLinkConfig {
    /// Silence tolerated since the last transmission while Connecting/Matching
    pub link_timeout: Duration,
    /// Window in which a match-request payload frame merges with its header
    pub reassembly_window: Duration,
    /// Post-send spacing after command frames
    pub header_frame_gap: Duration,
    /// Post-send spacing after the payload frame of a match request
    pub payload_frame_gap: Duration,
    /// Which match target counts as a win
    pub match_rule: MatchRule,
}

impl Default for IrLinkConfig {
    fn default() -> Self {
        Self {
            link_timeout: IR_LINK_TIMEOUT,
            reassembly_window: REASSEMBLY_WINDOW,
            header_frame_gap: HEADER_FRAME_GAP,
            payload_frame_gap: PAYLOAD_FRAME_GAP,
            match_rule: MatchRule::FixedTarget(WINNING_TARGET_PLAYER_ID),
        }
    }
}

/// Capability the game's trait subsystem exposes to the link
///
/// Injected at `begin`; the link holds the implementation instead of reaching
/// for a process-wide singleton.
pub trait PartnerEvents {
    /// Called once per confirmed wrong-target match request
    fn on_wrong_match(&mut self);
}

/// No-op events implementation for hosts without a trait subsystem
pub struct NullPartnerEvents;

impl PartnerEvents for NullPartnerEvents {
    fn on_wrong_match(&mut self) {}
}

/// Errors for control operations invoked before `begin`
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ControlError {
    NotInited,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ControlError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ControlError::NotInited => write!(f, "link is not initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ControlError {}

/// Errors for the match operation
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum MatchError {
    NotInited,
    NotConnected,
}

#[cfg(feature = "std")]
impl core::fmt::Display for MatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MatchError::NotInited => write!(f, "link is not initialized"),
            MatchError::NotConnected => write!(f, "link is not connected"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MatchError {}

enum IrLinkManagerState<E: PartnerEvents> {
    Uninitialized,
    Initialized { link: LinkStateMachine<E> },
}

/// Host-facing facade over the link state machine
///
/// Constructed `const`, armed with `begin`. Control operations before `begin`
/// fail with `NotInited`; queries return inert defaults. `update` must be
/// called on every host loop iteration - it performs at most one receive and
/// the transceiver buffers only one pending decode.
pub struct IrLinkManager<E: PartnerEvents> {
    state: IrLinkManagerState<E>,
}

impl<E: PartnerEvents> IrLinkManager<E> {
    pub const fn new() -> Self {
        IrLinkManager {
            state: IrLinkManagerState::Uninitialized,
        }
    }

    /// Arms the link with a transceiver, a configuration and the game hooks
    pub fn begin(&mut self, config: IrLinkConfig, device: IrDevice, events: E, player_id: u8) {
        log!(Level::Info, "IR link initialized, player id: {}", player_id);
        self.state = IrLinkManagerState::Initialized {
            link: LinkStateMachine::new(config, device, events, player_id),
        };
    }

    /// Tears the link down, handing the transceiver back to the caller
    pub fn end(&mut self) -> Option<IrDevice> {
        match core::mem::replace(&mut self.state, IrLinkManagerState::Uninitialized) {
            IrLinkManagerState::Uninitialized => None,
            IrLinkManagerState::Initialized { link } => {
                log!(Level::Info, "IR link ended");
                Some(link.into_device())
            }
        }
    }

    fn link_mut(&mut self) -> Result<&mut LinkStateMachine<E>, ControlError> {
        match &mut self.state {
            IrLinkManagerState::Uninitialized => Err(ControlError::NotInited),
            IrLinkManagerState::Initialized { link } => Ok(link),
        }
    }

    /// Per-tick entry point; call once per host loop iteration
    pub async fn update(&mut self) -> Result<(), ControlError> {
        self.link_mut()?.update().await;
        Ok(())
    }

    /// Returns the link to Idle, clearing the queue and all pending state
    pub fn reset(&mut self) -> Result<(), ControlError> {
        self.link_mut()?.reset();
        Ok(())
    }

    /// Enters Scanning and announces this player with a handshake
    pub async fn start_scanning(&mut self) -> Result<(), ControlError> {
        self.link_mut()?.start_scanning().await;
        Ok(())
    }

    /// Leaves Scanning; returns whether the link was scanning
    pub fn stop_scanning(&mut self) -> Result<bool, ControlError> {
        Ok(self.link_mut()?.stop_scanning())
    }

    /// Opens a connection attempt toward a known player
    pub async fn connect_to_player(&mut self, player_id: u8) -> Result<(), ControlError> {
        self.link_mut()?.connect_to_player(player_id).await;
        Ok(())
    }

    /// Sends the two-frame match request; requires the Connected state
    pub async fn perform_match(&mut self, target_id: u8) -> Result<(), MatchError> {
        match &mut self.state {
            IrLinkManagerState::Uninitialized => Err(MatchError::NotInited),
            IrLinkManagerState::Initialized { link } => link.perform_match(target_id).await,
        }
    }

    /// Sends an on-demand keepalive frame
    pub async fn send_heartbeat(&mut self) -> Result<(), ControlError> {
        self.link_mut()?.send_heartbeat().await;
        Ok(())
    }

    pub fn state(&self) -> LinkState {
        match &self.state {
            IrLinkManagerState::Uninitialized => LinkState::Idle,
            IrLinkManagerState::Initialized { link } => link.state(),
        }
    }

    pub fn is_connected(&self) -> bool {
        match &self.state {
            IrLinkManagerState::Uninitialized => false,
            IrLinkManagerState::Initialized { link } => link.is_connected(),
        }
    }

    pub fn has_new_message(&self) -> bool {
        match &self.state {
            IrLinkManagerState::Uninitialized => false,
            IrLinkManagerState::Initialized { link } => link.has_new_message(),
        }
    }

    pub fn connected_player_id(&self) -> Option<u8> {
        match &self.state {
            IrLinkManagerState::Uninitialized => None,
            IrLinkManagerState::Initialized { link } => link.connected_player_id(),
        }
    }

    /// Drains the next decoded message, oldest first
    pub fn next_message(&mut self) -> Option<LinkMessage> {
        match &mut self.state {
            IrLinkManagerState::Uninitialized => None,
            IrLinkManagerState::Initialized { link } => link.next_message(),
        }
    }

    /// Drains a pending wrong-streak unlock event (atomic read-and-clear)
    pub fn consume_unlock_event(&self) -> bool {
        match &self.state {
            IrLinkManagerState::Uninitialized => false,
            IrLinkManagerState::Initialized { link } => link.consume_unlock_event(),
        }
    }

    pub fn player_id(&self) -> Option<u8> {
        match &self.state {
            IrLinkManagerState::Uninitialized => None,
            IrLinkManagerState::Initialized { link } => Some(link.my_player_id()),
        }
    }

    pub fn set_player_id(&mut self, player_id: u8) -> Result<(), ControlError> {
        self.link_mut()?.set_my_player_id(player_id);
        Ok(())
    }
}

impl<E: PartnerEvents> Default for IrLinkManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn config_defaults_match_protocol_constants() {
        let config = IrLinkConfig::default();
        assert_eq!(config.link_timeout, Duration::from_millis(5000));
        assert_eq!(config.reassembly_window, Duration::from_millis(600));
        assert_eq!(config.header_frame_gap, Duration::from_millis(50));
        assert_eq!(config.payload_frame_gap, Duration::from_millis(30));
        assert!(config.match_rule.is_winning(WINNING_TARGET_PLAYER_ID, 42));
    }

    #[test]
    fn match_rules_evaluate_their_targets() {
        assert!(MatchRule::FixedTarget(0).is_winning(0, 7));
        assert!(!MatchRule::FixedTarget(0).is_winning(7, 7));
        assert!(MatchRule::OwnPlayerId.is_winning(7, 7));
        assert!(!MatchRule::OwnPlayerId.is_winning(0, 7));
    }

    #[test]
    fn control_operations_before_begin_are_not_inited() {
        let mut manager: IrLinkManager<NullPartnerEvents> = IrLinkManager::new();
        assert_eq!(block_on(manager.update()), Err(ControlError::NotInited));
        assert_eq!(manager.reset(), Err(ControlError::NotInited));
        assert_eq!(block_on(manager.start_scanning()), Err(ControlError::NotInited));
        assert_eq!(manager.stop_scanning(), Err(ControlError::NotInited));
        assert_eq!(block_on(manager.connect_to_player(2)), Err(ControlError::NotInited));
        assert_eq!(block_on(manager.perform_match(0)), Err(MatchError::NotInited));
        assert_eq!(block_on(manager.send_heartbeat()), Err(ControlError::NotInited));
        assert_eq!(manager.set_player_id(1), Err(ControlError::NotInited));
    }

    #[test]
    fn queries_before_begin_return_inert_defaults() {
        let mut manager: IrLinkManager<NullPartnerEvents> = IrLinkManager::new();
        assert_eq!(manager.state(), LinkState::Idle);
        assert!(!manager.is_connected());
        assert!(!manager.has_new_message());
        assert_eq!(manager.connected_player_id(), None);
        assert!(manager.next_message().is_none());
        assert!(!manager.consume_unlock_event());
        assert_eq!(manager.player_id(), None);
        assert!(manager.end().is_none());
    }

    #[cfg(feature = "ir-device-simulator")]
    #[test]
    fn begin_arms_the_link_and_end_returns_the_device() {
        use crate::ir_device_simulator::{IrDevice, IrInputQueue, IrOutputQueue};

        let output_queue: &'static IrOutputQueue = Box::leak(Box::new(embassy_sync::channel::Channel::new()));
        let input_queue: &'static IrInputQueue = Box::leak(Box::new(embassy_sync::channel::Channel::new()));
        let device = IrDevice::with(output_queue.sender(), input_queue.receiver());

        let mut manager: IrLinkManager<NullPartnerEvents> = IrLinkManager::new();
        manager.begin(IrLinkConfig::default(), device, NullPartnerEvents, 1);

        assert_eq!(manager.player_id(), Some(1));
        assert_eq!(manager.state(), LinkState::Idle);
        assert!(block_on(manager.update()).is_ok());

        assert!(manager.end().is_some());
        assert_eq!(manager.player_id(), None);
        assert_eq!(block_on(manager.update()), Err(ControlError::NotInited));
    }
}
