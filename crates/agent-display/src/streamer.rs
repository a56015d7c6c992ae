//! Per-display streaming state machine: own a dedicated thread, keep a
//! codec session alive against a virtual display, and pump encoded frames
//! out through a writer.
//!
//! This module implements the outer loop and frame loop described for the
//! display streamer: acquire display info, acquire an encoder and a virtual
//! display, compute the encoded video size, run the codec until it stops or
//! errors, and retry unless told to shut down.

use std::cell::RefCell;
use std::io::Write;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, error, info, warn};

use agent_codec::{EncoderConfig, RawFrame, VideoEncoder};
use agent_wire::video_packet::{FLAG_BIT_RATE_REDUCED, FLAG_DISPLAY_ROUND};
use agent_wire::{VideoPacketHeader, Writer};

use crate::accessors::{resolve_rotation_correction, DisplayManagerAccessor, VirtualDisplayAccessor};
use crate::codec_handle::CodecHandle;
use crate::error::{DisplayError, Result};
use crate::info::{CodecInfo, DisplayInfo};
use crate::video_size::{compute_video_size, reduce_bit_rate, MIN_BIT_RATE};

const MAX_CONSECUTIVE_ENCODER_ERRORS: u32 = 5;
const ORIENTATION_FOLLOW_DISPLAY: i32 = -2;

/// Why the outer loop stopped producing frames.
#[derive(Debug, PartialEq, Eq)]
enum LoopOutcome {
    /// Caller asked us to stop, or the display disappeared; don't retry.
    Stopped,
    /// Transient condition (weak encoder, rotation change, ...); the outer
    /// loop should reacquire everything and try again.
    Restart,
}

struct SharedState {
    video_orientation: i32,
    max_video_resolution: (i32, i32),
    bit_rate: i64,
    display_info: Option<DisplayInfo>,
    stop: bool,
}

/// One streaming session over one display, driving a [`CodecHandle`] and a
/// [`VirtualDisplayAccessor`] against a byte-oriented video writer.
pub struct DisplayStreamer<W: Write> {
    display_id: i32,
    device_is_watch: bool,
    codec_candidates: Vec<CodecInfo>,
    display_manager: Arc<dyn DisplayManagerAccessor>,
    make_virtual_display: Box<dyn Fn() -> Box<dyn VirtualDisplayAccessor> + Send + Sync>,
    make_encoder: Box<dyn Fn(&str) -> Box<dyn VideoEncoder> + Send + Sync>,
    writer: parking_lot::Mutex<Writer<W>>,
    codec: CodecHandle<Box<dyn VideoEncoder>>,
    state: ReentrantMutex<RefCell<SharedState>>,
}

impl<W: Write> DisplayStreamer<W> {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        display_id: i32,
        device_is_watch: bool,
        codec_candidates: Vec<CodecInfo>,
        display_manager: Arc<dyn DisplayManagerAccessor>,
        make_virtual_display: impl Fn() -> Box<dyn VirtualDisplayAccessor> + Send + Sync + 'static,
        make_encoder: impl Fn(&str) -> Box<dyn VideoEncoder> + Send + Sync + 'static,
        writer: Writer<W>,
        initial_bit_rate: i64,
    ) -> Self {
        Self {
            display_id,
            device_is_watch,
            codec_candidates,
            display_manager,
            make_virtual_display: Box::new(make_virtual_display),
            make_encoder: Box::new(make_encoder),
            writer: parking_lot::Mutex::new(writer),
            codec: CodecHandle::new(),
            state: ReentrantMutex::new(RefCell::new(SharedState {
                video_orientation: ORIENTATION_FOLLOW_DISPLAY,
                max_video_resolution: (i32::MAX, i32::MAX),
                bit_rate: initial_bit_rate,
                display_info: None,
                stop: false,
            })),
        }
    }

    pub fn get_display_info(&self) -> Option<DisplayInfo> {
        let guard = self.state.lock();
        guard.borrow().display_info
    }

    /// Updates the target orientation and, if it actually changed, stops
    /// the running codec so the outer loop rebuilds the header against the
    /// new value (§4.3.3). Per §4.3.2, a stop requested here is a restart
    /// trigger, not a shutdown: `run_one_session` picks it up and retries.
    pub fn set_video_orientation(&self, orientation: i32) {
        let changed = {
            let guard = self.state.lock();
            let mut s = guard.borrow_mut();
            if s.video_orientation == orientation {
                false
            } else {
                s.video_orientation = orientation;
                true
            }
        };
        if changed {
            self.codec.request_stop();
        }
    }

    /// Updates the max encoded resolution and, if it actually changed,
    /// stops the running codec so the outer loop recomputes the video size
    /// against the new cap (§4.3.3).
    pub fn set_max_video_resolution(&self, size: (i32, i32)) {
        let changed = {
            let guard = self.state.lock();
            let mut s = guard.borrow_mut();
            if s.max_video_resolution == size {
                false
            } else {
                s.max_video_resolution = size;
                true
            }
        };
        if changed {
            self.codec.request_stop();
        }
    }

    pub fn stop(&self) {
        let guard = self.state.lock();
        guard.borrow_mut().stop = true;
        self.codec.request_stop();
    }

    /// Requests a codec-only restart without changing any stored parameter.
    /// Used when a rotation watcher observes the display's own rotation
    /// changing (§4.3.3): the outer loop re-fetches `DisplayInfo` on its
    /// next pass and rebuilds the header against the new rotation.
    pub fn restart(&self) {
        self.codec.request_stop();
    }

    fn stop_requested(&self) -> bool {
        let guard = self.state.lock();
        guard.borrow().stop
    }

    /// Runs the outer loop until shutdown or a fatal condition. Intended to
    /// be the entire body of this streamer's dedicated thread.
    ///
    /// `header` is created once here, outside the loop, so `frame_number`
    /// (and any carried-forward flag such as `BIT_RATE_REDUCED`) survives a
    /// codec restart instead of resetting every session.
    pub fn run(&self) {
        let mut header = VideoPacketHeader::default();
        loop {
            if self.stop_requested() {
                info!(display_id = self.display_id, "streamer stopping");
                return;
            }

            let display_info = match self.display_manager.get_display_info(self.display_id) {
                Ok(info) if info.is_valid() => info,
                Ok(_) => {
                    info!(display_id = self.display_id, "display no longer valid");
                    return;
                }
                Err(e) => {
                    error!(display_id = self.display_id, error = %e, "display info fetch failed");
                    return;
                }
            };

            match self.run_one_session(display_info, &mut header) {
                Ok(LoopOutcome::Stopped) => return,
                Ok(LoopOutcome::Restart) => continue,
                Err(e) => {
                    error!(display_id = self.display_id, error = %e, "streamer session fatal error");
                    return;
                }
            }
        }
    }

    fn run_one_session(
        &self,
        display_info: DisplayInfo,
        header: &mut VideoPacketHeader,
    ) -> Result<LoopOutcome> {
        let codec_info = self
            .codec_candidates
            .first()
            .cloned()
            .ok_or(DisplayError::NoCodec)?;

        let (orientation, max_resolution) = {
            let guard = self.state.lock();
            let s = guard.borrow();
            (s.video_orientation, s.max_video_resolution)
        };

        let (base_rotation, correction) =
            resolve_rotation_correction(orientation, display_info.rotation);
        let mut normalized = display_info;
        normalized.rotation = base_rotation;

        let natural = normalized.natural_size();
        let clipped_max = (
            max_resolution.0.min(codec_info.max_resolution.0),
            max_resolution.1.min(codec_info.max_resolution.1),
        );
        let video_size = compute_video_size(natural, clipped_max, codec_info.size_alignment);

        let bit_rate = {
            let guard = self.state.lock();
            guard.borrow().bit_rate
        };
        let frame_rate = codec_info
            .max_frame_rate
            .min(if self.device_is_watch { 30 } else { 60 });

        let config = EncoderConfig {
            width: video_size.0,
            height: video_size.1,
            bit_rate,
            frame_rate,
            i_frame_interval_secs: 10,
            repeat_frame_after_ms: 100,
        };

        let mut virtual_display = (self.make_virtual_display)();
        virtual_display.acquire(video_size, normalized.layer_stack_id)?;

        let encoder = (self.make_encoder)(codec_info.short_name());
        self.codec.start(encoder, &config)?;

        {
            let guard = self.state.lock();
            let mut s = guard.borrow_mut();
            s.display_info = Some(normalized);
            // Deliberately not touching `s.stop` here: a concurrent
            // `stop()` call that lands in this exact window must still be
            // observed by `frame_loop`'s `self.stop_requested()` check, not
            // get silently cleared by this session starting successfully.
        }

        // Update this session's geometry/orientation/bit-rate in place
        // rather than rebuilding the header: `frame_number` and a pending
        // `BIT_RATE_REDUCED` flag (set just before this restart) must
        // survive across the session boundary.
        header.display_id = self.display_id;
        header.display_width = natural.0;
        header.display_height = natural.1;
        header.display_orientation = base_rotation as i16;
        header.orientation_correction = correction as i16;
        header.bit_rate = bit_rate as i32;
        let round_flag = if normalized.is_round() {
            FLAG_DISPLAY_ROUND
        } else {
            0
        };
        header.flags = (header.flags & FLAG_BIT_RATE_REDUCED) | round_flag;

        let outcome = self.frame_loop(&mut *virtual_display, &codec_info, header);
        self.codec.stop_and_take();
        virtual_display.release();
        outcome
    }

    fn frame_loop(
        &self,
        display: &mut dyn VirtualDisplayAccessor,
        codec_info: &CodecInfo,
        header: &mut VideoPacketHeader,
    ) -> Result<LoopOutcome> {
        let mut consecutive_errors: u32 = 0;
        let mut pts_offset: Option<i64> = None;
        let mut first_frame = true;

        loop {
            if self.stop_requested() {
                return Ok(LoopOutcome::Stopped);
            }
            if self.codec.stop_requested() {
                // A codec-only stop (orientation/resolution/rotation change,
                // or the bit-rate ladder) is a restart trigger, not a
                // shutdown: the outer loop reacquires everything and tries
                // again. `self.stop_requested()` above is the only path to
                // `Stopped`.
                return Ok(LoopOutcome::Restart);
            }

            let frame: RawFrame = match display.next_frame() {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, "virtual display frame read failed");
                    if let Some(outcome) = self.on_encoder_error(&mut consecutive_errors, header)? {
                        return Ok(outcome);
                    }
                    continue;
                }
            };

            if let Err(e) = self.codec.push_frame(&frame) {
                warn!(error = %e, "push_frame failed");
                if let Some(outcome) = self.on_encoder_error(&mut consecutive_errors, header)? {
                    return Ok(outcome);
                }
                continue;
            }

            let buffer = match self.codec.dequeue_output() {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "dequeue_output failed");
                    if let Some(outcome) = self.on_encoder_error(&mut consecutive_errors, header)? {
                        return Ok(outcome);
                    }
                    continue;
                }
            };

            if buffer.is_end_of_stream {
                return Ok(LoopOutcome::Stopped);
            }

            // AV1 side-data buffers (high bit set on the first byte) carry
            // no bitstream payload and are dropped outright.
            if codec_info.short_name() == "av01" {
                if let Some(&first) = buffer.data.first() {
                    if first & 0x80 != 0 {
                        continue;
                    }
                }
            }

            if buffer.is_config {
                header.presentation_ts_us = 0;
            } else {
                let offset = *pts_offset.get_or_insert(buffer.raw_pts_us - 1);
                header.presentation_ts_us = buffer.raw_pts_us - offset;
                header.frame_number += 1;
            }

            header.origination_ts_us = buffer.raw_pts_us;
            header.packet_size = buffer.data.len() as i32;

            if first_frame && !buffer.is_config {
                first_frame = false;
                // Workaround for a green-bar artifact some encoders produce
                // on their very first real frame: force a second sync frame.
                self.codec.request_sync_frame();
            }

            self.write_packet(header, &buffer.data)?;

            consecutive_errors = 0;
            header.flags &= !FLAG_BIT_RATE_REDUCED;
        }
    }

    /// Bumps the consecutive-error counter and, at the threshold, either
    /// halves the bit rate (returning `Restart`) or gives up (fatal error).
    /// Returns `Ok(None)` when the caller should just retry the current
    /// iteration.
    fn on_encoder_error(
        &self,
        consecutive_errors: &mut u32,
        header: &mut VideoPacketHeader,
    ) -> Result<Option<LoopOutcome>> {
        *consecutive_errors += 1;
        if *consecutive_errors < MAX_CONSECUTIVE_ENCODER_ERRORS {
            return Ok(None);
        }

        let current_bit_rate = {
            let guard = self.state.lock();
            guard.borrow().bit_rate
        };

        match reduce_bit_rate(current_bit_rate) {
            Some(reduced) => {
                warn!(from = current_bit_rate, to = reduced, "reducing bit rate after repeated encoder errors");
                {
                    let guard = self.state.lock();
                    guard.borrow_mut().bit_rate = reduced;
                }
                header.flags |= FLAG_BIT_RATE_REDUCED;
                self.codec.request_stop();
                Ok(Some(LoopOutcome::Restart))
            }
            None => {
                error!(bit_rate = current_bit_rate, floor = MIN_BIT_RATE, "encoder failing at minimum bit rate");
                Err(DisplayError::Accessor("weak-video-encoder".into()))
            }
        }
    }

    fn write_packet(&self, header: &VideoPacketHeader, payload: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock();
        header
            .write(&mut guard)
            .map_err(|e| DisplayError::Accessor(e.to_string()))?;
        guard.write_raw(payload);
        guard
            .flush()
            .map_err(|e| DisplayError::Accessor(e.to_string()))?;
        debug!(bytes = payload.len(), "wrote video packet");
        Ok(())
    }
}
