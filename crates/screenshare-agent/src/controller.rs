//! Control-channel reader/dispatcher: a single-threaded loop that turns
//! `ControlMessage`s into `Agent` calls and, on its idle tick, drains
//! pending outbound notifications (clipboard, device state, display
//! topology).

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use agent_wire::message::{ControlMessage, DisplayConfigEntry};
use agent_wire::{Reader, WireError, Writer};

use crate::agent::Agent;
use crate::clipboard::within_sync_limit;
use crate::config::Cli;
use crate::error::{ExitCode, Fatal, Result};
use crate::input_injector::{InputInjector, LoggingInjector, UinputInjector};
use crate::session;

/// Idle-tick period: bounds both notification-emission latency and how
/// quickly a peer disconnect is noticed.
const TICK: Duration = Duration::from_millis(250);

/// `KeyEvent::action` values, distinct from the motion-event action
/// namespace in `agent_input::event::action`.
mod key_action {
    pub const DOWN: i32 = 0;
    pub const UP: i32 = 1;
    pub const DOWN_AND_UP: i32 = 2;
}

pub struct Controller {
    reader: Reader<UnixStream>,
    writer: Writer<UnixStream>,
    agent: Arc<Agent>,
    injector: Box<dyn InputInjector>,
    clipboard_listener: Option<crate::clipboard::ListenerId>,
    max_sync_length: i32,
    last_device_state_sent: i32,
}

impl Controller {
    pub fn new(cli: &Cli, control: UnixStream, agent: Arc<Agent>) -> Result<Self> {
        let read_half = control
            .try_clone()
            .map_err(|e| Fatal::new(ExitCode::SocketIo, format!("cloning control socket: {e}")))?;
        session::set_read_timeout(&read_half, Some(TICK))
            .map_err(|e| Fatal::new(ExitCode::SocketIo, format!("setting control read timeout: {e}")))?;

        let mut reader = Reader::new(read_half);
        reader.set_timeout_hint(Some(TICK));

        let injector: Box<dyn InputInjector> = if cli.has_flag(crate::config::FLAG_USE_UINPUT) {
            let natural_size = agent
                .display_manager()
                .get_display_info(0)
                .map(|info| info.natural_size())
                .unwrap_or((1080, 2400));
            Box::new(UinputInjector::new(0, natural_size))
        } else {
            Box::new(LoggingInjector)
        };

        Ok(Self {
            reader,
            writer: Writer::new(control),
            agent,
            injector,
            clipboard_listener: None,
            max_sync_length: 0,
            last_device_state_sent: 0,
        })
    }

    /// Runs until the peer disconnects (clean exit) or a protocol/IO error
    /// occurs (fatal exit).
    pub fn run(&mut self) -> Result<()> {
        let states = self.agent.device_state().get_supported_states().to_vec();
        self.send(ControlMessage::SupportedDeviceStatesNotification { states })?;
        self.last_device_state_sent = self.agent.device_state().get_state_identifier();
        self.send(ControlMessage::DeviceStateNotification {
            state_id: self.last_device_state_sent,
        })?;

        loop {
            match ControlMessage::read(&mut self.reader) {
                Ok(msg) => self.dispatch(msg)?,
                Err(WireError::Timeout(_)) => self.on_tick()?,
                Err(WireError::EndOfFile) => {
                    info!("control channel closed by peer");
                    self.agent.shutdown();
                    return Ok(());
                }
                Err(WireError::Io(e)) => {
                    return Err(Fatal::new(ExitCode::SocketIo, format!("control read: {e}")));
                }
                Err(e) => {
                    return Err(Fatal::new(ExitCode::InvalidControlMessage, e.to_string()));
                }
            }
        }
    }

    fn on_tick(&mut self) -> Result<()> {
        if self.clipboard_listener.is_some() {
            if let Some(text) = self.agent.clipboard().poll_changed() {
                if within_sync_limit(&text, self.max_sync_length) {
                    self.send(ControlMessage::ClipboardChangedNotification {
                        text: text.into_bytes(),
                    })?;
                }
            }
        }

        let effective_state = self.agent.device_state().get_state_identifier();
        if effective_state != self.last_device_state_sent {
            self.last_device_state_sent = effective_state;
            self.send(ControlMessage::DeviceStateNotification {
                state_id: effective_state,
            })?;
        }

        let (added, removed) = self.agent.poll_display_changes();
        for display_id in added {
            self.send(ControlMessage::DisplayAddedNotification { display_id })?;
        }
        for display_id in removed {
            self.send(ControlMessage::DisplayRemovedNotification { display_id })?;
        }

        Ok(())
    }

    fn send(&mut self, msg: ControlMessage) -> Result<()> {
        msg.write(&mut self.writer)
            .and_then(|()| self.writer.flush())
            .map_err(|e| Fatal::new(ExitCode::SocketIo, format!("control write: {e}")))
    }

    fn dispatch(&mut self, msg: ControlMessage) -> Result<()> {
        use agent_input::event::{classify_source, expand_motion_event};

        match msg {
            ControlMessage::MotionEvent { pointers, action, button_state, action_button, display_id } => {
                let display_info = self.agent.display_manager().get_display_info(display_id).ok();
                let (rotation, natural_size) = display_info
                    .map(|info| (info.rotation, info.natural_size()))
                    .unwrap_or((0, (1080, 2400)));

                if action == agent_input::event::action::DOWN {
                    if let Some(info) = display_info {
                        if !info.is_on() {
                            info!(display_id, "motion DOWN on an off display: would send wake-up key event");
                        }
                    }
                }

                let source = classify_source(action_button, button_state);
                let reconstructed = ControlMessage::MotionEvent {
                    pointers,
                    action,
                    button_state,
                    action_button,
                    display_id,
                };
                for event in expand_motion_event(&reconstructed, rotation, natural_size) {
                    self.injector.inject_motion(source, display_id, &event);
                }
            }
            ControlMessage::KeyEvent { action, keycode, .. } => {
                if action == key_action::DOWN_AND_UP {
                    self.injector.inject_key(agent_input::keymap::KeyStroke { keycode, action: key_action::DOWN });
                    self.injector.inject_key(agent_input::keymap::KeyStroke { keycode, action: key_action::UP });
                } else {
                    self.injector.inject_key(agent_input::keymap::KeyStroke { keycode, action });
                }
            }
            ControlMessage::TextInput { text } => {
                for stroke in agent_input::keymap::text_to_key_events(&text) {
                    self.injector.inject_key(stroke);
                }
            }
            ControlMessage::SetDeviceOrientation { orientation } => {
                self.agent.set_video_orientation(orientation);
            }
            ControlMessage::SetMaxVideoResolution { display_id, w, h } => {
                self.agent.set_max_video_resolution(display_id, w, h);
            }
            ControlMessage::StartClipboardSync { max_sync_length, text } => {
                self.agent.clipboard().set_text(&String::from_utf8_lossy(&text));
                if self.clipboard_listener.is_none() {
                    self.clipboard_listener = Some(self.agent.clipboard().add_listener());
                }
                self.max_sync_length = max_sync_length;
            }
            ControlMessage::StopClipboardSync => {
                if let Some(id) = self.clipboard_listener.take() {
                    self.agent.clipboard().remove_listener(id);
                }
            }
            ControlMessage::StartVideoStream { display_id, w, h, .. } => {
                self.agent.start_video_stream(display_id, w, h);
            }
            ControlMessage::StopVideoStream { display_id } => {
                self.agent.stop_video_stream(display_id);
            }
            ControlMessage::StartAudioStream => {
                info!("audio stream start requested (audio thread runs independently)");
            }
            ControlMessage::StopAudioStream => {
                info!("audio stream stop requested");
            }
            ControlMessage::RequestDeviceState { state_id } => {
                let effective = self.agent.request_device_state(state_id);
                self.last_device_state_sent = effective;
                self.send(ControlMessage::DeviceStateNotification { state_id: effective })?;
            }
            ControlMessage::DisplayConfigurationRequest { request_id } => {
                let entries: Vec<DisplayConfigEntry> = self
                    .agent
                    .display_manager()
                    .get_display_ids()
                    .into_iter()
                    .filter_map(|id| self.agent.display_manager().get_display_info(id).ok().map(|info| {
                        DisplayConfigEntry {
                            id,
                            w: info.logical_size.0,
                            h: info.logical_size.1,
                            rotation: info.rotation,
                            display_type: info.display_type,
                        }
                    }))
                    .collect();
                self.send(ControlMessage::DisplayConfigurationResponse { request_id, entries })?;
            }
            // Agent-to-peer-only notifications arriving from the peer are a
            // protocol violation.
            ControlMessage::ClipboardChangedNotification { .. }
            | ControlMessage::DeviceStateNotification { .. }
            | ControlMessage::SupportedDeviceStatesNotification { .. }
            | ControlMessage::DisplayConfigurationResponse { .. }
            | ControlMessage::DisplayAddedNotification { .. }
            | ControlMessage::DisplayRemovedNotification { .. } => {
                return Err(Fatal::new(
                    ExitCode::InvalidControlMessage,
                    format!("received agent-to-peer-only message {:?}", msg.message_type()),
                ));
            }
        }

        Ok(())
    }
}
