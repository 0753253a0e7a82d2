//! Binary / BCD / bar-graph clock on two chained 8x8 LED panels
//!
//! Board-agnostic logic: field encoders, the debounced style button, the
//! time-sync scheduler and the per-second render loop. Hardware sits
//! behind the traits in [`display`], [`clock`], [`style`] and
//! [`timesync`]; `main.rs` wires them to an RP2040.

#![cfg_attr(not(test), no_std)]

pub mod button;
pub mod clock;
pub mod config;
pub mod display;
pub mod encoder;
pub mod link;
pub mod record;
pub mod render;
pub mod style;
pub mod timesync;

pub use button::{EdgeSlot, Poll, StyleController};
pub use clock::{DateTime, Field, Rtc, TimeSample};
pub use config::ClockConfig;
pub use display::{FrameBuffer, LedMatrix, MatrixDisplay, PanelSink};
pub use render::{RenderLoop, TickReport};
pub use style::{ClockStyle, ConfigSlot, StyleSelector, StyleStore};
pub use timesync::{SyncPolicy, TimePayload, TimeSource};
