//! The consolidated agent: everything that used to be a handful of platform
//! singletons (display manager, window manager, clipboard manager, codec
//! handles, device-state manager) lives here as one owned struct, with
//! lazily-started per-display streamer threads as its only real
//! concurrency.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{info, warn};

use agent_display::accessors::{
    RotationWatcher, RotationWatcherId, SimulatedDisplay, WindowManagerAccessor,
};
use agent_display::concurrent::ConcurrentList;
use agent_display::{CodecInfo, DisplayManagerAccessor, DisplayStreamer, SimulatedDisplayManager};

use crate::clipboard::ClipboardManager;
use crate::config::Cli;
use crate::device_state::DeviceStateManager;
use crate::session::SharedSocket;

/// Rotation-lock accessor and per-display rotation-watcher multiplexer. A
/// display's orientation is normally whatever the physical hardware
/// reports; `freeze_rotation` pins it so the streamer's explicit
/// orientation override isn't immediately clobbered by the next hardware
/// rotation callback. `watch_rotation`/`remove_rotation_watcher` register
/// once per display and fan incoming rotation changes out to every
/// subscriber (§4.5).
pub struct SimulatedWindowManager {
    frozen: Mutex<HashMap<i32, i32>>,
    rotation_watchers: Mutex<HashMap<i32, ConcurrentList<RotationWatcher>>>,
    next_watcher_id: AtomicU64,
}

impl SimulatedWindowManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frozen: Mutex::new(HashMap::new()),
            rotation_watchers: Mutex::new(HashMap::new()),
            next_watcher_id: AtomicU64::new(1),
        }
    }

    /// Simulates the platform's rotation-change callback firing for
    /// `display_id`, fanning the new rotation out to every watcher
    /// currently registered on it. Real hardware rotation delivery is the
    /// opaque platform accessor this backend stands in for; nothing calls
    /// this on its own, but the registration/multiplex/dispatch path it
    /// exercises is the same one a real callback would drive.
    pub fn notify_rotation_changed(&self, display_id: i32, rotation: i32) {
        if let Some(list) = self.rotation_watchers.lock().unwrap().get(&display_id) {
            list.for_each(|watcher| (watcher.callback)(rotation));
        }
    }
}

impl Default for SimulatedWindowManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowManagerAccessor for SimulatedWindowManager {
    fn freeze_rotation(&self, display_id: i32, quadrant: i32) {
        self.frozen.lock().unwrap().insert(display_id, quadrant.rem_euclid(4));
    }

    fn thaw_rotation(&self, display_id: i32) {
        self.frozen.lock().unwrap().remove(&display_id);
    }

    fn is_rotation_frozen(&self, display_id: i32) -> bool {
        self.frozen.lock().unwrap().contains_key(&display_id)
    }

    fn watch_rotation(
        &self,
        display_id: i32,
        watcher: Arc<dyn Fn(i32) + Send + Sync>,
    ) -> RotationWatcherId {
        let id = self.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        let mut watchers = self.rotation_watchers.lock().unwrap();
        watchers
            .entry(display_id)
            .or_insert_with(ConcurrentList::new)
            .add(RotationWatcher { id, callback: watcher });
        id
    }

    fn remove_rotation_watcher(&self, display_id: i32, watcher_id: RotationWatcherId) {
        if let Some(list) = self.rotation_watchers.lock().unwrap().get(&display_id) {
            list.remove(&RotationWatcher {
                id: watcher_id,
                callback: Arc::new(|_| {}),
            });
        }
    }
}

struct StreamerHandle {
    streamer: Arc<DisplayStreamer<SharedSocket>>,
    thread: Option<JoinHandle<()>>,
    rotation_watcher_id: RotationWatcherId,
}

pub struct Agent {
    video: SharedSocket,
    display_manager: Arc<dyn DisplayManagerAccessor>,
    window_manager: Arc<SimulatedWindowManager>,
    clipboard: ClipboardManager,
    device_state: DeviceStateManager,
    codec_candidates: Vec<CodecInfo>,
    device_is_watch: bool,
    initial_bit_rate: i64,
    streamers: Mutex<HashMap<i32, StreamerHandle>>,
    known_display_ids: Mutex<HashSet<i32>>,
    default_orientation: Mutex<i32>,
    default_max_size: Mutex<(i32, i32)>,
}

impl Agent {
    #[must_use]
    pub fn new(
        cli: &Cli,
        video: SharedSocket,
        codec_candidates: Vec<CodecInfo>,
        display_manager: Arc<dyn DisplayManagerAccessor>,
    ) -> Self {
        let known_display_ids = display_manager.get_display_ids().into_iter().collect();
        Self {
            video,
            display_manager,
            window_manager: Arc::new(SimulatedWindowManager::new()),
            clipboard: ClipboardManager::new(),
            device_state: DeviceStateManager::new(Vec::new(), 0),
            codec_candidates,
            device_is_watch: false,
            initial_bit_rate: cli.effective_max_bit_rate(),
            streamers: Mutex::new(HashMap::new()),
            known_display_ids: Mutex::new(known_display_ids),
            default_orientation: Mutex::new(cli.orientation.rem_euclid(4)),
            default_max_size: Mutex::new(cli.effective_max_size()),
        }
    }

    pub fn display_manager(&self) -> &Arc<dyn DisplayManagerAccessor> {
        &self.display_manager
    }

    pub fn clipboard(&self) -> &ClipboardManager {
        &self.clipboard
    }

    pub fn device_state(&self) -> &DeviceStateManager {
        &self.device_state
    }

    /// Returns the display's cached orientation, if a streamer for it is
    /// currently running.
    #[must_use]
    pub fn display_rotation(&self, display_id: i32) -> Option<i32> {
        let streamers = self.streamers.lock().unwrap();
        streamers
            .get(&display_id)
            .and_then(|h| h.streamer.get_display_info())
            .map(|info| info.rotation)
    }

    /// Starts (or restarts, if already running) a streamer thread for
    /// `display_id`. `w`/`h` of `0` means "no explicit cap beyond the
    /// default".
    pub fn start_video_stream(&self, display_id: i32, w: i32, h: i32) {
        let mut streamers = self.streamers.lock().unwrap();
        if streamers.contains_key(&display_id) {
            info!(display_id, "start_video_stream: already running");
            return;
        }

        let max_size = if w > 0 && h > 0 {
            (w, h)
        } else {
            *self.default_max_size.lock().unwrap()
        };
        let orientation = *self.default_orientation.lock().unwrap();

        let writer = agent_wire::Writer::new(self.video.clone());
        let streamer = Arc::new(DisplayStreamer::new(
            display_id,
            self.device_is_watch,
            self.codec_candidates.clone(),
            Arc::clone(&self.display_manager),
            || -> Box<dyn agent_display::VirtualDisplayAccessor> { Box::new(SimulatedDisplay::new(0)) },
            |codec: &str| -> Box<dyn agent_codec::VideoEncoder> {
                Box::new(agent_codec::GStreamerEncoder::new(codec))
            },
            writer,
            self.initial_bit_rate,
        ));
        streamer.set_video_orientation(orientation);
        streamer.set_max_video_resolution(max_size);

        // Multiplex the window manager's per-display rotation feed into a
        // codec-only restart whenever the hardware rotation actually
        // changes (§4.3.3 "rotation watcher fires with a rotation value
        // different from the last one"); the streamer picks up the new
        // `DisplayInfo.rotation` itself on the next session.
        let initial_rotation = self
            .display_manager
            .get_display_info(display_id)
            .map(|info| info.rotation)
            .unwrap_or(0);
        let last_rotation = Arc::new(AtomicI32::new(initial_rotation));
        let restart_target = Arc::clone(&streamer);
        let rotation_watcher_id = self.window_manager.watch_rotation(
            display_id,
            Arc::new(move |rotation: i32| {
                if last_rotation.swap(rotation, Ordering::SeqCst) != rotation {
                    restart_target.restart();
                }
            }),
        );

        let run_handle = Arc::clone(&streamer);
        let thread = std::thread::Builder::new()
            .name(format!("video-streamer-{display_id}"))
            .spawn(move || run_handle.run())
            .expect("spawning display streamer thread");

        streamers.insert(
            display_id,
            StreamerHandle {
                streamer,
                thread: Some(thread),
                rotation_watcher_id,
            },
        );
        info!(display_id, w, h, "video stream started");
    }

    pub fn stop_video_stream(&self, display_id: i32) {
        let handle = self.streamers.lock().unwrap().remove(&display_id);
        if let Some(mut handle) = handle {
            self.window_manager
                .remove_rotation_watcher(display_id, handle.rotation_watcher_id);
            handle.streamer.stop();
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
            info!(display_id, "video stream stopped");
        }
    }

    /// Applies an orientation override to every active streamer (and
    /// freezes window-manager rotation so a stale hardware callback doesn't
    /// immediately undo it).
    pub fn set_video_orientation(&self, orientation: i32) {
        let orientation = orientation.rem_euclid(4);
        *self.default_orientation.lock().unwrap() = orientation;
        let streamers = self.streamers.lock().unwrap();
        for (display_id, handle) in streamers.iter() {
            self.window_manager.freeze_rotation(*display_id, orientation);
            handle.streamer.set_video_orientation(orientation);
        }
    }

    pub fn set_max_video_resolution(&self, display_id: i32, w: i32, h: i32) {
        if w <= 0 || h <= 0 {
            warn!(display_id, w, h, "ignoring non-positive max resolution");
            return;
        }
        *self.default_max_size.lock().unwrap() = (w, h);
        if let Some(handle) = self.streamers.lock().unwrap().get(&display_id) {
            handle.streamer.set_max_video_resolution((w, h));
        }
    }

    /// Forwards a device-state request, restarting every active video
    /// stream if the effective state actually changed (a posture change
    /// typically changes the natural display size).
    pub fn request_device_state(&self, state_id: i32) -> i32 {
        let previous = self.device_state.get_state_identifier();
        let effective = self.device_state.request_state(state_id);
        if effective != previous {
            let display_ids: Vec<i32> = self.streamers.lock().unwrap().keys().copied().collect();
            for display_id in display_ids {
                self.stop_video_stream(display_id);
                self.start_video_stream(display_id, 0, 0);
            }
        }
        effective
    }

    /// Diffs the display manager's current id set against the last
    /// observed one, synthesizing added/removed lists. Compensates for
    /// listener events the platform's `OnDisplayAdded/Removed` callback
    /// missed before a listener was registered.
    pub fn poll_display_changes(&self) -> (Vec<i32>, Vec<i32>) {
        let current: HashSet<i32> = self.display_manager.get_display_ids().into_iter().collect();
        let mut known = self.known_display_ids.lock().unwrap();

        let added: Vec<i32> = current.difference(&known).copied().collect();
        let removed: Vec<i32> = known.difference(&current).copied().collect();

        for id in &removed {
            self.stop_video_stream(*id);
        }
        *known = current;
        (added, removed)
    }

    /// Stops every active streamer and joins its thread. Intended for
    /// orderly shutdown on peer disconnect.
    pub fn shutdown(&self) {
        let ids: Vec<i32> = self.streamers.lock().unwrap().keys().copied().collect();
        for id in ids {
            self.stop_video_stream(id);
        }
    }
}

/// Builds a simulated display roster so the agent has something to stream
/// even with no real compositor behind it.
#[must_use]
pub fn default_display_manager() -> Arc<dyn DisplayManagerAccessor> {
    use agent_display::{DisplayInfo, PowerState};

    Arc::new(SimulatedDisplayManager::new(vec![DisplayInfo {
        display_id: 0,
        logical_size: (1080, 2400),
        density_dpi: 420,
        rotation: 0,
        layer_stack_id: 0,
        flags: 0,
        display_type: 0,
        power_state: PowerState::On,
    }]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_manager_tracks_freeze_state() {
        let wm = SimulatedWindowManager::new();
        assert!(!wm.is_rotation_frozen(0));
        wm.freeze_rotation(0, 2);
        assert!(wm.is_rotation_frozen(0));
        wm.thaw_rotation(0);
        assert!(!wm.is_rotation_frozen(0));
    }

    #[test]
    fn rotation_watcher_receives_notifications_until_removed() {
        let wm = SimulatedWindowManager::new();
        let seen = Arc::new(AtomicI32::new(-1));
        let seen_clone = Arc::clone(&seen);
        let id = wm.watch_rotation(
            0,
            Arc::new(move |rotation| seen_clone.store(rotation, Ordering::SeqCst)),
        );

        wm.notify_rotation_changed(0, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // A watcher on a different display must not hear this display's
        // notifications.
        wm.notify_rotation_changed(2, 3);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        wm.remove_rotation_watcher(0, id);
        wm.notify_rotation_changed(0, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 1, "removed watcher must not fire");
    }

    #[test]
    fn poll_display_changes_reports_additions() {
        let manager = default_display_manager();
        let cli = test_cli();
        let agent = Agent::new(&cli, SharedSocket::new_for_test(), vec![test_codec()], manager);
        let (added, removed) = agent.poll_display_changes();
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    fn test_codec() -> CodecInfo {
        CodecInfo {
            mime_type: "video/avc".into(),
            name: "h264".into(),
            max_resolution: (1920, 1920),
            size_alignment: (2, 2),
            max_frame_rate: 60,
        }
    }

    fn test_cli() -> Cli {
        Cli {
            socket: "test".into(),
            log: crate::config::LogLevel::Info,
            max_size: None,
            orientation: 0,
            flags: 0,
            max_bit_rate: 0,
            codec: "h264".into(),
        }
    }
}
