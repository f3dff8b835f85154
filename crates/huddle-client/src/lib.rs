//! Huddle session wiring: peer directory, level tracking, and network
//! detection driven by call lifecycle events.

#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod session;

pub use diagnostics::{parse_tone, rank_tones, ToneSpec};
pub use session::{CallEvent, Session, SessionConfig};
