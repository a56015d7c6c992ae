//! Motion/key event translation: coordinate rotation into the display's
//! current orientation, multi-pointer DOWN/UP expansion, and mouse-vs-touch
//! source classification.
//!
//! The platform input API this agent injects into rejects a single motion
//! event that carries a DOWN or UP action for more than one pointer at a
//! time, so a wire `MotionEvent` naming several pointers is expanded into a
//! sequence of per-pointer DOWN/POINTER_DOWN (or UP/POINTER_UP) events here,
//! before the accessor facade ever sees it.

use agent_wire::message::{ControlMessage, PointerEvent};

/// Motion action codes, matching the platform's motion-event action
/// encoding used on the wire (`ControlMessage::MotionEvent::action`).
pub mod action {
    pub const DOWN: i32 = 0;
    pub const UP: i32 = 1;
    pub const MOVE: i32 = 2;
    pub const CANCEL: i32 = 3;
    pub const HOVER_MOVE: i32 = 7;
    pub const SCROLL: i32 = 8;
    pub const POINTER_DOWN: i32 = 5;
    pub const POINTER_UP: i32 = 6;
    pub const BUTTON_PRESS: i32 = 11;
    pub const BUTTON_RELEASE: i32 = 12;

    pub const MASK: i32 = 0xff;
    pub const POINTER_INDEX_SHIFT: i32 = 8;
}

/// Where an injected motion event should appear to originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionSource {
    Mouse,
    StylusOrTouch,
}

/// One pointer position and pressure ready for injection, in the display's
/// *current* orientation (post-rotation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedPointer {
    pub pointer_id: i32,
    pub x: i32,
    pub y: i32,
    pub pressure: f32,
}

/// One motion event ready for injection: an action code plus the pointers
/// participating in it (a prefix of the full pointer list for expanded
/// DOWN/UP sequences).
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedMotion {
    pub action: i32,
    pub action_button: i32,
    pub pointers: Vec<AdjustedPointer>,
}

/// Rotates a point from the display's canonical (natural, rotation-0)
/// orientation into the orientation `rotation` quadrants counter-clockwise
/// from natural. `natural_size` is `(width, height)` in the natural
/// orientation.
#[must_use]
pub fn adjust_coordinates(x: i32, y: i32, rotation: i32, natural_size: (i32, i32)) -> (i32, i32) {
    let (w, h) = natural_size;
    match rotation.rem_euclid(4) {
        1 => (y, w - x),
        2 => (w - x, h - y),
        3 => (h - y, x),
        _ => (x, y),
    }
}

/// Inverse of [`adjust_coordinates`]: maps a point back from orientation
/// `rotation` to the display's natural orientation.
#[must_use]
pub fn unadjust_coordinates(x: i32, y: i32, rotation: i32, natural_size: (i32, i32)) -> (i32, i32) {
    let (w, h) = natural_size;
    match rotation.rem_euclid(4) {
        1 => (w - y, x),
        2 => (w - x, h - y),
        3 => (y, h - x),
        _ => (x, y),
    }
}

/// Picks the injection source for a `MotionEvent` message: mouse when the
/// peer reports a pressed/changed mouse button, stylus/touchscreen
/// otherwise (including plain finger drags).
#[must_use]
pub fn classify_source(action_button: i32, button_state: i32) -> MotionSource {
    if action_button != 0 || button_state != 0 {
        MotionSource::Mouse
    } else {
        MotionSource::StylusOrTouch
    }
}

fn adjusted(pointers: &[PointerEvent], rotation: i32, natural_size: (i32, i32)) -> Vec<AdjustedPointer> {
    pointers
        .iter()
        .map(|p| {
            let (x, y) = adjust_coordinates(p.x, p.y, rotation, natural_size);
            AdjustedPointer {
                pointer_id: p.pointer_id,
                x,
                y,
                pressure: 1.0,
            }
        })
        .collect()
}

/// Expands a wire `MotionEvent` message into the sequence of events the
/// platform input API will actually accept, rotating coordinates into
/// `rotation` along the way.
///
/// DOWN/UP with more than one pointer become one event per pointer
/// (POINTER_DOWN/POINTER_UP for all but the first/last); a non-zero
/// `action_button` routes DOWN/UP through BUTTON_PRESS/BUTTON_RELEASE
/// instead, matching the platform's special-cased mouse button handling.
#[must_use]
pub fn expand_motion_event(msg: &ControlMessage, rotation: i32, natural_size: (i32, i32)) -> Vec<InjectedMotion> {
    let ControlMessage::MotionEvent {
        pointers,
        action,
        action_button,
        ..
    } = msg
    else {
        return Vec::new();
    };

    let all = adjusted(pointers, rotation, natural_size);

    match *action {
        a if a == action::DOWN => {
            if *action_button != 0 {
                vec![
                    InjectedMotion {
                        action: action::DOWN,
                        action_button: 0,
                        pointers: all.clone(),
                    },
                    InjectedMotion {
                        action: action::BUTTON_PRESS,
                        action_button: *action_button,
                        pointers: all,
                    },
                ]
            } else {
                (1..=all.len())
                    .map(|count| {
                        let action = if count == 1 {
                            action::DOWN
                        } else {
                            action::POINTER_DOWN | ((count as i32 - 1) << action::POINTER_INDEX_SHIFT)
                        };
                        InjectedMotion {
                            action,
                            action_button: 0,
                            pointers: all[..count].to_vec(),
                        }
                    })
                    .collect()
            }
        }
        a if a == action::UP => {
            if *action_button != 0 {
                vec![
                    InjectedMotion {
                        action: action::BUTTON_RELEASE,
                        action_button: *action_button,
                        pointers: all.clone(),
                    },
                    InjectedMotion {
                        action: action::UP,
                        action_button: 0,
                        pointers: all,
                    },
                ]
            } else {
                let mut events = Vec::new();
                for count in (2..=all.len()).rev() {
                    let mut released = all[..count].to_vec();
                    released[count - 1].pressure = 0.0;
                    events.push(InjectedMotion {
                        action: action::POINTER_UP | ((count as i32 - 1) << action::POINTER_INDEX_SHIFT),
                        action_button: 0,
                        pointers: released,
                    });
                }
                events.push(InjectedMotion {
                    action: action::UP,
                    action_button: 0,
                    pointers: all,
                });
                events
            }
        }
        other => vec![InjectedMotion {
            action: other,
            action_button: *action_button,
            pointers: all,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rotation_round_trips() {
        let natural = (1080, 2400);
        for rotation in 0..4 {
            let (x, y) = (37, 912);
            let (ax, ay) = adjust_coordinates(x, y, rotation, natural);
            let (bx, by) = unadjust_coordinates(ax, ay, rotation, natural);
            assert_eq!((bx, by), (x, y), "rotation {rotation} did not round-trip");
        }
    }

    #[test]
    fn classify_source_prefers_mouse_when_button_active() {
        assert_eq!(classify_source(1, 0), MotionSource::Mouse);
        assert_eq!(classify_source(0, 1), MotionSource::Mouse);
        assert_eq!(classify_source(0, 0), MotionSource::StylusOrTouch);
    }

    fn pointer(id: i32, x: i32, y: i32) -> PointerEvent {
        PointerEvent {
            x,
            y,
            pointer_id: id,
            axes: vec![],
        }
    }

    #[test]
    fn multi_pointer_down_expands_to_one_event_per_pointer() {
        let msg = ControlMessage::MotionEvent {
            pointers: vec![pointer(0, 10, 10), pointer(1, 20, 20), pointer(2, 30, 30)],
            action: action::DOWN,
            button_state: 0,
            action_button: 0,
            display_id: 0,
        };
        let events = expand_motion_event(&msg, 0, (1080, 2400));
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].action, action::DOWN);
        assert_eq!(events[0].pointers.len(), 1);
        assert_eq!(events[2].pointers.len(), 3);
        assert_eq!(
            events[2].action,
            action::POINTER_DOWN | (2 << action::POINTER_INDEX_SHIFT)
        );
    }

    #[test]
    fn multi_pointer_up_expands_in_reverse_and_ends_on_plain_up() {
        let msg = ControlMessage::MotionEvent {
            pointers: vec![pointer(0, 10, 10), pointer(1, 20, 20)],
            action: action::UP,
            button_state: 0,
            action_button: 0,
            display_id: 0,
        };
        let events = expand_motion_event(&msg, 0, (1080, 2400));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, action::POINTER_UP | (1 << action::POINTER_INDEX_SHIFT));
        assert_eq!(events[1].action, action::UP);
    }

    #[test]
    fn single_pointer_down_is_a_plain_down_event() {
        let msg = ControlMessage::MotionEvent {
            pointers: vec![pointer(0, 10, 10)],
            action: action::DOWN,
            button_state: 0,
            action_button: 0,
            display_id: 0,
        };
        let events = expand_motion_event(&msg, 0, (1080, 2400));
        assert_eq!(events, vec![InjectedMotion {
            action: action::DOWN,
            action_button: 0,
            pointers: vec![AdjustedPointer { pointer_id: 0, x: 10, y: 10, pressure: 1.0 }],
        }]);
    }
}
