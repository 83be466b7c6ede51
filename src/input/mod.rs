//! Local input: rotary encoder and buttons.
//!
//! The producers (edge handlers or the console [`panel`]) only touch the
//! atomics in [`EncoderCounter`] and [`ButtonLevels`]; everything else runs on
//! the main loop.

pub mod chord;
pub mod encoder;
pub mod levels;
pub mod panel;

pub use chord::{ChordInput, KeyEvent};
pub use encoder::EncoderCounter;
pub use levels::{ButtonLevels, Key, Keys};
