//! Where translated input events actually go.
//!
//! The platform's own input-injection service is an external collaborator
//! this agent only describes the contract of — the default path just logs
//! what would have been injected. When the peer requests `USE_UINPUT`,
//! events are instead driven through real kernel uinput virtual devices
//! (§10.5), created lazily on first use and torn down on drop.

use agent_input::event::{AdjustedPointer, InjectedMotion, MotionSource};
use agent_input::keymap::KeyStroke;
use agent_input::uinput::{VirtualKeyboard, VirtualMouse, VirtualTouchscreen};
use tracing::debug;

pub trait InputInjector: Send {
    fn inject_motion(&mut self, source: MotionSource, display_id: i32, event: &InjectedMotion);
    fn inject_key(&mut self, stroke: KeyStroke);
}

/// Default accessor-facade stub: logs the translated event at debug level,
/// standing in for the opaque platform input-injection RPC.
pub struct LoggingInjector;

impl InputInjector for LoggingInjector {
    fn inject_motion(&mut self, source: MotionSource, display_id: i32, event: &InjectedMotion) {
        debug!(
            ?source,
            display_id,
            action = event.action,
            pointer_count = event.pointers.len(),
            "platform input-injector: motion event"
        );
    }

    fn inject_key(&mut self, stroke: KeyStroke) {
        debug!(keycode = stroke.keycode, action = stroke.action, "platform input-injector: key event");
    }
}

/// Drives kernel uinput virtual devices instead of the platform injector.
/// Keyboard, mouse, and touchscreen nodes are created on first use against
/// the natural display size passed at construction.
pub struct UinputInjector {
    counter: u64,
    natural_size: (i32, i32),
    keyboard: Option<VirtualKeyboard>,
    mouse: Option<VirtualMouse>,
    touchscreen: Option<VirtualTouchscreen>,
}

impl UinputInjector {
    #[must_use]
    pub fn new(counter: u64, natural_size: (i32, i32)) -> Self {
        Self {
            counter,
            natural_size,
            keyboard: None,
            mouse: None,
            touchscreen: None,
        }
    }

    fn keyboard(&mut self) -> Option<&mut VirtualKeyboard> {
        if self.keyboard.is_none() {
            match VirtualKeyboard::new(self.counter) {
                Ok(kb) => self.keyboard = Some(kb),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to open uinput keyboard");
                    return None;
                }
            }
        }
        self.keyboard.as_mut()
    }

    fn mouse(&mut self) -> Option<&mut VirtualMouse> {
        if self.mouse.is_none() {
            match VirtualMouse::new(self.counter) {
                Ok(m) => self.mouse = Some(m),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to open uinput mouse");
                    return None;
                }
            }
        }
        self.mouse.as_mut()
    }

    fn touchscreen(&mut self) -> Option<&mut VirtualTouchscreen> {
        if self.touchscreen.is_none() {
            let (w, h) = self.natural_size;
            match VirtualTouchscreen::new(self.counter, w, h) {
                Ok(t) => self.touchscreen = Some(t),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to open uinput touchscreen");
                    return None;
                }
            }
        }
        self.touchscreen.as_mut()
    }

    fn inject_pointer(&mut self, action: i32, pointer: &AdjustedPointer) {
        if let Some(ts) = self.touchscreen() {
            if let Err(e) = ts.write_touch_event(
                pointer.pointer_id,
                action,
                pointer.x,
                pointer.y,
                (pointer.pressure * VirtualTouchscreen::MAX_PRESSURE as f32) as i32,
            ) {
                tracing::warn!(error = %e, "uinput touch injection failed");
            }
        }
    }
}

impl InputInjector for UinputInjector {
    fn inject_motion(&mut self, source: MotionSource, _display_id: i32, event: &InjectedMotion) {
        match source {
            MotionSource::Mouse => {
                if let (Some(first), Some(mouse)) = (event.pointers.first(), self.mouse()) {
                    let _ = mouse.write_relative_event(first.x, first.y);
                }
            }
            MotionSource::StylusOrTouch => {
                for pointer in &event.pointers {
                    self.inject_pointer(event.action, pointer);
                }
            }
        }
    }

    fn inject_key(&mut self, stroke: KeyStroke) {
        if let Some(kb) = self.keyboard() {
            if let Err(e) = kb.write_key_event(stroke.keycode, stroke.action) {
                tracing::warn!(error = %e, "uinput key injection failed");
            }
        }
    }
}
