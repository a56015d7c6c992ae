//! The control-channel message catalog: a varint type tag followed by
//! fields in declaration order, one `ControlMessage` variant per tag.

use std::io::{Read, Write};

use crate::error::{Result, WireError};
use crate::varint::{Reader, Writer};

/// Numeric wire tag for each [`ControlMessage`] variant.
///
/// Ids 1-8 are the core set named explicitly by the protocol description;
/// ids 9-19 cover the remaining bidirectional messages, assigned densely so
/// every variant has a stable tag (the source left them unnumbered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum MessageType {
    MotionEvent = 1,
    KeyEvent = 2,
    TextInput = 3,
    SetDeviceOrientation = 4,
    SetMaxVideoResolution = 5,
    StartClipboardSync = 6,
    StopClipboardSync = 7,
    ClipboardChangedNotification = 8,
    StartVideoStream = 9,
    StopVideoStream = 10,
    StartAudioStream = 11,
    StopAudioStream = 12,
    RequestDeviceState = 13,
    DeviceStateNotification = 14,
    SupportedDeviceStatesNotification = 15,
    DisplayConfigurationRequest = 16,
    DisplayConfigurationResponse = 17,
    DisplayAddedNotification = 18,
    DisplayRemovedNotification = 19,
}

impl MessageType {
    fn from_tag(tag: u64) -> Result<Self> {
        Ok(match tag {
            1 => Self::MotionEvent,
            2 => Self::KeyEvent,
            3 => Self::TextInput,
            4 => Self::SetDeviceOrientation,
            5 => Self::SetMaxVideoResolution,
            6 => Self::StartClipboardSync,
            7 => Self::StopClipboardSync,
            8 => Self::ClipboardChangedNotification,
            9 => Self::StartVideoStream,
            10 => Self::StopVideoStream,
            11 => Self::StartAudioStream,
            12 => Self::StopAudioStream,
            13 => Self::RequestDeviceState,
            14 => Self::DeviceStateNotification,
            15 => Self::SupportedDeviceStatesNotification,
            16 => Self::DisplayConfigurationRequest,
            17 => Self::DisplayConfigurationResponse,
            18 => Self::DisplayAddedNotification,
            19 => Self::DisplayRemovedNotification,
            other => return Err(WireError::UnknownMessageType(other)),
        })
    }
}

/// One pointer's axis reading (`MotionEvent` carries zero or more per pointer,
/// e.g. pressure, tilt, scroll).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerAxis {
    pub axis: i32,
    pub value: f32,
}

/// A single pointer's position within a `MotionEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    pub pointer_id: i32,
    pub axes: Vec<PointerAxis>,
}

/// `{ identifier, name, system_properties: bitmask, physical_properties: bitmask }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub identifier: i32,
    pub name: String,
    pub system_properties: u32,
    pub physical_properties: u32,
}

/// `{ id, w, h, rotation, type }` — one entry of a `DisplayConfigurationResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfigEntry {
    pub id: i32,
    pub w: i32,
    pub h: i32,
    pub rotation: i32,
    pub display_type: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    MotionEvent {
        pointers: Vec<PointerEvent>,
        action: i32,
        button_state: i32,
        action_button: i32,
        display_id: i32,
    },
    KeyEvent {
        action: i32,
        keycode: i32,
        meta_state: u32,
    },
    TextInput {
        text: String,
    },
    SetDeviceOrientation {
        orientation: i32,
    },
    SetMaxVideoResolution {
        display_id: i32,
        w: i32,
        h: i32,
    },
    StartClipboardSync {
        max_sync_length: i32,
        text: Vec<u8>,
    },
    StopClipboardSync,
    ClipboardChangedNotification {
        text: Vec<u8>,
    },
    StartVideoStream {
        request_id: i32,
        display_id: i32,
        w: i32,
        h: i32,
    },
    StopVideoStream {
        display_id: i32,
    },
    StartAudioStream,
    StopAudioStream,
    RequestDeviceState {
        state_id: i32,
    },
    DeviceStateNotification {
        state_id: i32,
    },
    SupportedDeviceStatesNotification {
        states: Vec<DeviceState>,
    },
    DisplayConfigurationRequest {
        request_id: i32,
    },
    DisplayConfigurationResponse {
        request_id: i32,
        entries: Vec<DisplayConfigEntry>,
    },
    DisplayAddedNotification {
        display_id: i32,
    },
    DisplayRemovedNotification {
        display_id: i32,
    },
}

impl ControlMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::MotionEvent { .. } => MessageType::MotionEvent,
            Self::KeyEvent { .. } => MessageType::KeyEvent,
            Self::TextInput { .. } => MessageType::TextInput,
            Self::SetDeviceOrientation { .. } => MessageType::SetDeviceOrientation,
            Self::SetMaxVideoResolution { .. } => MessageType::SetMaxVideoResolution,
            Self::StartClipboardSync { .. } => MessageType::StartClipboardSync,
            Self::StopClipboardSync => MessageType::StopClipboardSync,
            Self::ClipboardChangedNotification { .. } => {
                MessageType::ClipboardChangedNotification
            }
            Self::StartVideoStream { .. } => MessageType::StartVideoStream,
            Self::StopVideoStream { .. } => MessageType::StopVideoStream,
            Self::StartAudioStream => MessageType::StartAudioStream,
            Self::StopAudioStream => MessageType::StopAudioStream,
            Self::RequestDeviceState { .. } => MessageType::RequestDeviceState,
            Self::DeviceStateNotification { .. } => MessageType::DeviceStateNotification,
            Self::SupportedDeviceStatesNotification { .. } => {
                MessageType::SupportedDeviceStatesNotification
            }
            Self::DisplayConfigurationRequest { .. } => {
                MessageType::DisplayConfigurationRequest
            }
            Self::DisplayConfigurationResponse { .. } => {
                MessageType::DisplayConfigurationResponse
            }
            Self::DisplayAddedNotification { .. } => MessageType::DisplayAddedNotification,
            Self::DisplayRemovedNotification { .. } => MessageType::DisplayRemovedNotification,
        }
    }

    /// Reads the type tag and the full message body.
    pub fn read<R: Read>(r: &mut Reader<R>) -> Result<Self> {
        let tag = r.read_u64()?;
        let ty = MessageType::from_tag(tag)?;
        Self::read_body(r, ty)
    }

    fn read_body<R: Read>(r: &mut Reader<R>, ty: MessageType) -> Result<Self> {
        Ok(match ty {
            MessageType::MotionEvent => {
                let pointer_count = r.read_u32()?;
                let mut pointers = Vec::with_capacity(pointer_count as usize);
                for _ in 0..pointer_count {
                    let x = r.read_i32()?;
                    let y = r.read_i32()?;
                    let pointer_id = r.read_i32()?;
                    let axis_count = r.read_u32()?;
                    let mut axes = Vec::with_capacity(axis_count as usize);
                    for _ in 0..axis_count {
                        let axis = r.read_i32()?;
                        let value = r.read_f32()?;
                        axes.push(PointerAxis { axis, value });
                    }
                    pointers.push(PointerEvent {
                        x,
                        y,
                        pointer_id,
                        axes,
                    });
                }
                let action = r.read_i32()?;
                let button_state = r.read_i32()?;
                let action_button = r.read_i32()?;
                let display_id = r.read_i32()?;
                Self::MotionEvent {
                    pointers,
                    action,
                    button_state,
                    action_button,
                    display_id,
                }
            }
            MessageType::KeyEvent => Self::KeyEvent {
                action: r.read_i32()?,
                keycode: r.read_i32()?,
                meta_state: r.read_u32()?,
            },
            MessageType::TextInput => {
                let text = r.read_utf16_string()?.ok_or(WireError::MalformedFormat(
                    "TextInput requires non-empty text",
                ))?;
                Self::TextInput { text }
            }
            MessageType::SetDeviceOrientation => Self::SetDeviceOrientation {
                orientation: r.read_i32()?,
            },
            MessageType::SetMaxVideoResolution => Self::SetMaxVideoResolution {
                display_id: r.read_i32()?,
                w: r.read_i32()?,
                h: r.read_i32()?,
            },
            MessageType::StartClipboardSync => Self::StartClipboardSync {
                max_sync_length: r.read_i32()?,
                text: r.read_bytes()?,
            },
            MessageType::StopClipboardSync => Self::StopClipboardSync,
            MessageType::ClipboardChangedNotification => Self::ClipboardChangedNotification {
                text: r.read_bytes()?,
            },
            MessageType::StartVideoStream => Self::StartVideoStream {
                request_id: r.read_i32()?,
                display_id: r.read_i32()?,
                w: r.read_i32()?,
                h: r.read_i32()?,
            },
            MessageType::StopVideoStream => Self::StopVideoStream {
                display_id: r.read_i32()?,
            },
            MessageType::StartAudioStream => Self::StartAudioStream,
            MessageType::StopAudioStream => Self::StopAudioStream,
            MessageType::RequestDeviceState => Self::RequestDeviceState {
                state_id: r.read_i32()?,
            },
            MessageType::DeviceStateNotification => Self::DeviceStateNotification {
                state_id: r.read_i32()?,
            },
            MessageType::SupportedDeviceStatesNotification => {
                let count = r.read_u32()?;
                let mut states = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    states.push(DeviceState {
                        identifier: r.read_i32()?,
                        name: r.read_utf16_string()?.unwrap_or_default(),
                        system_properties: r.read_u32()?,
                        physical_properties: r.read_u32()?,
                    });
                }
                Self::SupportedDeviceStatesNotification { states }
            }
            MessageType::DisplayConfigurationRequest => Self::DisplayConfigurationRequest {
                request_id: r.read_i32()?,
            },
            MessageType::DisplayConfigurationResponse => {
                let request_id = r.read_i32()?;
                let count = r.read_i32()?;
                if count < 0 {
                    return Err(WireError::MalformedFormat("negative display count"));
                }
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entries.push(DisplayConfigEntry {
                        id: r.read_i32()?,
                        w: r.read_i32()?,
                        h: r.read_i32()?,
                        rotation: r.read_i32()?,
                        display_type: r.read_i32()?,
                    });
                }
                Self::DisplayConfigurationResponse {
                    request_id,
                    entries,
                }
            }
            MessageType::DisplayAddedNotification => Self::DisplayAddedNotification {
                display_id: r.read_i32()?,
            },
            MessageType::DisplayRemovedNotification => Self::DisplayRemovedNotification {
                display_id: r.read_i32()?,
            },
        })
    }

    pub fn write<W: Write>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_u64(self.message_type() as u64);
        match self {
            Self::MotionEvent {
                pointers,
                action,
                button_state,
                action_button,
                display_id,
            } => {
                w.write_u32(pointers.len() as u32);
                for p in pointers {
                    w.write_i32(p.x);
                    w.write_i32(p.y);
                    w.write_i32(p.pointer_id);
                    w.write_u32(p.axes.len() as u32);
                    for axis in &p.axes {
                        w.write_i32(axis.axis);
                        w.write_f32(axis.value);
                    }
                }
                w.write_i32(*action);
                w.write_i32(*button_state);
                w.write_i32(*action_button);
                w.write_i32(*display_id);
            }
            Self::KeyEvent {
                action,
                keycode,
                meta_state,
            } => {
                w.write_i32(*action);
                w.write_i32(*keycode);
                w.write_u32(*meta_state);
            }
            Self::TextInput { text } => w.write_utf16_string(Some(text)),
            Self::SetDeviceOrientation { orientation } => w.write_i32(*orientation),
            Self::SetMaxVideoResolution { display_id, w: ww, h } => {
                w.write_i32(*display_id);
                w.write_i32(*ww);
                w.write_i32(*h);
            }
            Self::StartClipboardSync {
                max_sync_length,
                text,
            } => {
                w.write_i32(*max_sync_length);
                w.write_bytes(text);
            }
            Self::StopClipboardSync => {}
            Self::ClipboardChangedNotification { text } => w.write_bytes(text),
            Self::StartVideoStream {
                request_id,
                display_id,
                w: ww,
                h,
            } => {
                w.write_i32(*request_id);
                w.write_i32(*display_id);
                w.write_i32(*ww);
                w.write_i32(*h);
            }
            Self::StopVideoStream { display_id } => w.write_i32(*display_id),
            Self::StartAudioStream | Self::StopAudioStream => {}
            Self::RequestDeviceState { state_id } => w.write_i32(*state_id),
            Self::DeviceStateNotification { state_id } => w.write_i32(*state_id),
            Self::SupportedDeviceStatesNotification { states } => {
                w.write_u32(states.len() as u32);
                for s in states {
                    w.write_i32(s.identifier);
                    w.write_utf16_string(Some(&s.name));
                    w.write_u32(s.system_properties);
                    w.write_u32(s.physical_properties);
                }
            }
            Self::DisplayConfigurationRequest { request_id } => w.write_i32(*request_id),
            Self::DisplayConfigurationResponse {
                request_id,
                entries,
            } => {
                w.write_i32(*request_id);
                w.write_i32(entries.len() as i32);
                for e in entries {
                    w.write_i32(e.id);
                    w.write_i32(e.w);
                    w.write_i32(e.h);
                    w.write_i32(e.rotation);
                    w.write_i32(e.display_type);
                }
            }
            Self::DisplayAddedNotification { display_id } => w.write_i32(*display_id),
            Self::DisplayRemovedNotification { display_id } => w.write_i32(*display_id),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(msg: ControlMessage) -> ControlMessage {
        let mut w = Writer::new(Vec::new());
        msg.write(&mut w).unwrap();
        w.flush().unwrap();
        let mut r = Reader::new(Cursor::new(w.get_mut().clone()));
        ControlMessage::read(&mut r).unwrap()
    }

    #[test]
    fn motion_event_roundtrip() {
        let msg = ControlMessage::MotionEvent {
            pointers: vec![PointerEvent {
                x: 10,
                y: 20,
                pointer_id: 0,
                axes: vec![PointerAxis {
                    axis: 1,
                    value: 0.5,
                }],
            }],
            action: 0,
            button_state: 0,
            action_button: 0,
            display_id: 0,
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn text_input_rejects_empty_string() {
        let mut w = Writer::new(Vec::new());
        w.write_u64(MessageType::TextInput as u64);
        w.write_utf16_string(None);
        w.flush().unwrap();
        let mut r = Reader::new(Cursor::new(w.get_mut().clone()));
        assert!(ControlMessage::read(&mut r).is_err());
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut w = Writer::new(Vec::new());
        w.write_u64(255);
        w.flush().unwrap();
        let mut r = Reader::new(Cursor::new(w.get_mut().clone()));
        assert!(matches!(
            ControlMessage::read(&mut r),
            Err(WireError::UnknownMessageType(255))
        ));
    }

    #[test]
    fn clipboard_sync_roundtrip() {
        let msg = ControlMessage::StartClipboardSync {
            max_sync_length: 256,
            text: b"hello".to_vec(),
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }

    #[test]
    fn display_configuration_response_roundtrip() {
        let msg = ControlMessage::DisplayConfigurationResponse {
            request_id: 7,
            entries: vec![DisplayConfigEntry {
                id: 0,
                w: 1080,
                h: 2400,
                rotation: 1,
                display_type: 0,
            }],
        };
        assert_eq!(roundtrip(msg.clone()), msg);
    }
}
