//! # Frames Module
//!
//! This module provides the wire-level codec and the application message type for
//! the infrared link.
//!
//! ## Architecture
//!
//! The frames module is organized into two main components:
//!
//! - **IrFrame codec**: Encoding and decoding of the 32-bit carrier frame
//! - **LinkMessage**: The decoded application-level message consumed by the link
//!   state machine and by queue readers
//!
//! ## Key Types
//!
//! - `IrCommand`: Enumeration of the protocol command space
//! - `LinkMessage`: One decoded application message (immutable once produced)
//! - `DecodedFrame` / `FrameDecodeError`: Result of inspecting a raw capture
//!
//! ## Two-Frame Match Requests
//!
//! The carrier frame carries a single byte of application payload beyond the
//! command itself, so a match request with a target id is transmitted as two
//! consecutive frames. The reassembly of the pair into one `LinkMessage` is
//! handled by the reassembly buffer, not here.

// Module declarations
pub mod ir_frame;
pub mod link_message;

// Re-export public types for convenient access
pub use ir_frame::{DecodedFrame, FrameDecodeError, decode_capture, encode_frame};
pub use link_message::{IrCommand, LinkMessage};
