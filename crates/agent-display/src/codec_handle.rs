//! Lifecycle state machine wrapping a single [`agent_codec::VideoEncoder`]
//! session.
//!
//! `CodecHandle` is shared between the streamer's frame-producing thread and
//! whatever calls `request_stop` (the controller, on a display-removed or
//! stream-stop notification). Both sides take the same recursive mutex, so a
//! callback invoked from inside a locked section (e.g. a sync-frame request
//! triggered while tearing down) can re-enter without deadlocking.
//!
//! `ReentrantMutexGuard` only derefs to `&T`, so the guarded state lives in a
//! `RefCell` for interior mutability.

use std::cell::RefCell;

use parking_lot::ReentrantMutex;
use tracing::{debug, warn};

use agent_codec::{EncodedBuffer, EncoderConfig, RawFrame, VideoEncoder};

use crate::error::{DisplayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    NotStarted,
    Running,
    StopRequested,
    Stopped,
}

struct Inner<E> {
    state: CodecState,
    encoder: Option<E>,
    /// Set when `request_stop` arrives while `NotStarted` — the window
    /// between allocating the encoder and calling `start`. `start` consumes
    /// this flag and moves straight to `StopRequested` instead of `Running`
    /// so the outer loop bails immediately after starting.
    stop_pending: bool,
}

pub struct CodecHandle<E: VideoEncoder> {
    inner: ReentrantMutex<RefCell<Inner<E>>>,
}

impl<E: VideoEncoder> CodecHandle<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(Inner {
                state: CodecState::NotStarted,
                encoder: None,
                stop_pending: false,
            })),
        }
    }

    #[must_use]
    pub fn state(&self) -> CodecState {
        let guard = self.inner.lock();
        guard.borrow().state
    }

    /// Configures, creates the input surface, and starts `encoder`. Fails
    /// (leaving state at `NotStarted`) if a session is already active.
    pub fn start(&self, mut encoder: E, config: &EncoderConfig) -> Result<()> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if inner.state != CodecState::NotStarted && inner.state != CodecState::Stopped {
            return Err(DisplayError::Accessor(
                "codec session already active".into(),
            ));
        }

        encoder.configure(config)?;
        encoder.create_input_surface()?;
        encoder.start()?;

        inner.encoder = Some(encoder);
        if inner.stop_pending {
            inner.stop_pending = false;
            inner.state = CodecState::StopRequested;
            debug!("codec session started with a stop already pending; bailing immediately");
        } else {
            inner.state = CodecState::Running;
            debug!("codec session started");
        }
        Ok(())
    }

    /// Marks the session for teardown. The frame loop observes this on its
    /// next iteration and calls `stop_and_take`; `request_stop` itself does
    /// not block on the encoder.
    ///
    /// A stop requested in the `NotStarted` window (after the encoder is
    /// allocated but before `start` has run) is recorded as `stop_pending`
    /// rather than dropped, so `start` can honor it as soon as it completes.
    pub fn request_stop(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.state {
            CodecState::Running => inner.state = CodecState::StopRequested,
            CodecState::NotStarted => inner.stop_pending = true,
            CodecState::StopRequested | CodecState::Stopped => {}
        }
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.state() == CodecState::StopRequested
    }

    pub fn push_frame(&self, frame: &RawFrame) -> Result<()> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.encoder.as_mut() {
            Some(encoder) => Ok(encoder.push_frame(frame)?),
            None => Err(DisplayError::Accessor("no active codec session".into())),
        }
    }

    pub fn dequeue_output(&self) -> Result<EncodedBuffer> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.encoder.as_mut() {
            Some(encoder) => Ok(encoder.dequeue_output()?),
            None => Err(DisplayError::Accessor("no active codec session".into())),
        }
    }

    pub fn request_sync_frame(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Some(encoder) = inner.encoder.as_mut() {
            encoder.request_sync_frame();
        } else {
            warn!("request_sync_frame with no active codec session");
        }
    }

    /// Stops and releases the encoder, moving to `Stopped`. Idempotent.
    pub fn stop_and_take(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Some(mut encoder) = inner.encoder.take() {
            encoder.stop();
            encoder.release();
        }
        inner.state = CodecState::Stopped;
        inner.stop_pending = false;
        debug!("codec session stopped");
    }
}

impl<E: VideoEncoder> Default for CodecHandle<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_codec::EncoderError;

    #[derive(Default)]
    struct FakeEncoder {
        started: bool,
        sync_requested: bool,
    }

    impl VideoEncoder for FakeEncoder {
        fn configure(&mut self, _config: &EncoderConfig) -> std::result::Result<(), EncoderError> {
            Ok(())
        }
        fn create_input_surface(&mut self) -> std::result::Result<(), EncoderError> {
            Ok(())
        }
        fn start(&mut self) -> std::result::Result<(), EncoderError> {
            self.started = true;
            Ok(())
        }
        fn push_frame(&mut self, _frame: &RawFrame) -> std::result::Result<(), EncoderError> {
            Ok(())
        }
        fn dequeue_output(&mut self) -> std::result::Result<EncodedBuffer, EncoderError> {
            Ok(EncodedBuffer {
                data: vec![],
                raw_pts_us: 0,
                is_config: false,
                is_end_of_stream: false,
            })
        }
        fn request_sync_frame(&mut self) {
            self.sync_requested = true;
        }
        fn stop(&mut self) {
            self.started = false;
        }
        fn release(&mut self) {}
    }

    fn test_config() -> EncoderConfig {
        EncoderConfig {
            width: 720,
            height: 1600,
            bit_rate: 4_000_000,
            frame_rate: 30,
            i_frame_interval_secs: 2,
            repeat_frame_after_ms: 100,
        }
    }

    #[test]
    fn starts_runs_and_stops() {
        let handle: CodecHandle<FakeEncoder> = CodecHandle::new();
        assert_eq!(handle.state(), CodecState::NotStarted);
        handle.start(FakeEncoder::default(), &test_config()).unwrap();
        assert_eq!(handle.state(), CodecState::Running);

        handle.request_sync_frame();
        handle.request_stop();
        assert!(handle.stop_requested());

        handle.stop_and_take();
        assert_eq!(handle.state(), CodecState::Stopped);
    }

    #[test]
    fn cannot_start_twice_without_stopping() {
        let handle: CodecHandle<FakeEncoder> = CodecHandle::new();
        handle.start(FakeEncoder::default(), &test_config()).unwrap();
        assert!(handle.start(FakeEncoder::default(), &test_config()).is_err());
    }

    #[test]
    fn stop_requested_before_start_bails_immediately_after_starting() {
        let handle: CodecHandle<FakeEncoder> = CodecHandle::new();
        assert_eq!(handle.state(), CodecState::NotStarted);
        handle.request_stop();
        assert!(!handle.stop_requested(), "pending stop isn't Running yet");

        handle.start(FakeEncoder::default(), &test_config()).unwrap();
        assert_eq!(handle.state(), CodecState::StopRequested);
        assert!(handle.stop_requested());
    }

    #[test]
    fn can_restart_after_stop() {
        let handle: CodecHandle<FakeEncoder> = CodecHandle::new();
        handle.start(FakeEncoder::default(), &test_config()).unwrap();
        handle.stop_and_take();
        assert!(handle.start(FakeEncoder::default(), &test_config()).is_ok());
        assert_eq!(handle.state(), CodecState::Running);
    }
}
