//! Input event translation and virtual input device injection for
//! screenshare-agent.
//!
//! - [`event`]: coordinate rotation, multi-pointer DOWN/UP expansion, and
//!   mouse/touch source classification for wire `MotionEvent` messages.
//! - [`keymap`]: UTF-16 text to key-event translation for `TextInput`.
//! - [`uinput`]: kernel uinput virtual devices, the alternative injection
//!   path used when the peer requests `USE_UINPUT`.

pub mod error;
pub mod event;
pub mod keymap;
pub mod uinput;

pub use error::{InputError, Result};
