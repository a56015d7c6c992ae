//! GStreamer-backed [`VideoEncoder`]: `appsrc ! videoconvert ! <encoder> !
//! appsink`, with the encoder element chosen by codec name.
//!
//! Frames are pushed into `appsrc` as they arrive from a display's virtual
//! surface; coded buffers are pulled from `appsink` by the streamer's frame
//! loop. `appsink` runs `sync=false` so dequeue never waits on a
//! presentation clock — the streamer, not GStreamer, owns backpressure.

use gstreamer::prelude::*;
use gstreamer::{Caps, ClockTime, ElementFactory, Pipeline, State};
use gstreamer_app::{AppSink, AppSrc};
use gstreamer_video::VideoFormat;

use crate::encoder::{EncodedBuffer, EncoderConfig, RawFrame, VideoEncoder};
use crate::error::EncoderError;

/// Picks the GStreamer encoder element name for a codec short name.
fn encoder_element_name(codec: &str) -> Result<&'static str, EncoderError> {
    Ok(match codec {
        "h264" => "x264enc",
        "vp8" => "vp8enc",
        "vp9" => "vp9enc",
        "av01" => "av1enc",
        other => return Err(EncoderError::NoEncoder(other.to_string())),
    })
}

pub struct GStreamerEncoder {
    codec: String,
    pipeline: Option<Pipeline>,
    appsrc: Option<AppSrc>,
    appsink: Option<AppSink>,
    config: Option<EncoderConfig>,
    frame_counter: u64,
}

impl GStreamerEncoder {
    #[must_use]
    pub fn new(codec: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            pipeline: None,
            appsrc: None,
            appsink: None,
            config: None,
            frame_counter: 0,
        }
    }
}

impl VideoEncoder for GStreamerEncoder {
    fn configure(&mut self, config: &EncoderConfig) -> Result<(), EncoderError> {
        gstreamer::init().map_err(|e| EncoderError::Init(e.to_string()))?;

        let encoder_name = encoder_element_name(&self.codec)?;
        let pipeline = Pipeline::new();

        let appsrc = ElementFactory::make("appsrc")
            .name("src")
            .build()
            .map_err(|e| EncoderError::Init(e.to_string()))?
            .dynamic_cast::<AppSrc>()
            .expect("appsrc factory returns an AppSrc");

        let convert = ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| EncoderError::Init(e.to_string()))?;

        let encoder = ElementFactory::make(encoder_name)
            .name("enc")
            .build()
            .map_err(|e| EncoderError::Configure(format!("{encoder_name}: {e}")))?;

        // One keyframe per i_frame_interval_secs at the configured frame
        // rate; otherwise defer to each element's default rate-control
        // knobs. kbit/s is the common unit across x264enc/vp8enc/vp9enc/
        // av1enc's "bitrate" property.
        let key_int_max =
            (config.i_frame_interval_secs.max(1) as i64 * i64::from(config.frame_rate.max(1)))
                as u32;
        encoder.set_property("bitrate", (config.bit_rate / 1000) as u32);
        if encoder.has_property("key-int-max") {
            encoder.set_property("key-int-max", key_int_max);
        }

        let appsink = ElementFactory::make("appsink")
            .name("sink")
            .build()
            .map_err(|e| EncoderError::Init(e.to_string()))?
            .dynamic_cast::<AppSink>()
            .expect("appsink factory returns an AppSink");
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", 4u32);
        appsink.set_property("drop", false);

        pipeline
            .add_many([
                appsrc.upcast_ref(),
                &convert,
                &encoder,
                appsink.upcast_ref(),
            ])
            .map_err(|e| EncoderError::Init(e.to_string()))?;
        gstreamer::Element::link_many([
            appsrc.upcast_ref(),
            &convert,
            &encoder,
            appsink.upcast_ref(),
        ])
        .map_err(|e| EncoderError::Init(e.to_string()))?;

        let caps = Caps::builder("video/x-raw")
            .field("format", VideoFormat::Rgba.to_str())
            .field("width", config.width)
            .field("height", config.height)
            .field(
                "framerate",
                gstreamer::Fraction::new(config.frame_rate.max(1), 1),
            )
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_is_live(true);
        appsrc.set_format(gstreamer::Format::Time);

        self.pipeline = Some(pipeline);
        self.appsrc = Some(appsrc);
        self.appsink = Some(appsink);
        self.config = Some(*config);
        Ok(())
    }

    fn create_input_surface(&mut self) -> Result<(), EncoderError> {
        // appsrc *is* the input surface in this backend; nothing further
        // to allocate.
        if self.appsrc.is_none() {
            return Err(EncoderError::InputSurface(
                "configure() must run before create_input_surface()".into(),
            ));
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| EncoderError::Init("not configured".into()))?;
        pipeline
            .set_state(State::Playing)
            .map_err(|e| EncoderError::Init(e.to_string()))?;
        self.frame_counter = 0;
        Ok(())
    }

    fn push_frame(&mut self, frame: &RawFrame) -> Result<(), EncoderError> {
        let appsrc = self
            .appsrc
            .as_ref()
            .ok_or_else(|| EncoderError::Dequeue("not started".into()))?;

        let mut buffer = gstreamer::Buffer::with_size(frame.data.len())
            .map_err(|e| EncoderError::Dequeue(e.to_string()))?;
        {
            let buffer_ref = buffer.get_mut().expect("uniquely owned buffer");
            let frame_rate = self.config.map_or(30, |c| c.frame_rate.max(1) as u64);
            let pts = ClockTime::from_useconds(self.frame_counter * 1_000_000 / frame_rate);
            buffer_ref.set_pts(pts);
            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| EncoderError::Dequeue(e.to_string()))?;
            map.copy_from_slice(&frame.data);
        }
        self.frame_counter += 1;

        appsrc
            .push_buffer(buffer)
            .map_err(|e| EncoderError::Dequeue(format!("appsrc push failed: {e:?}")))?;
        Ok(())
    }

    fn dequeue_output(&mut self) -> Result<EncodedBuffer, EncoderError> {
        let appsink = self
            .appsink
            .as_ref()
            .ok_or_else(|| EncoderError::Dequeue("not started".into()))?;

        let sample = appsink
            .pull_sample()
            .map_err(|_| EncoderError::EndOfStream)?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| EncoderError::Dequeue("sample had no buffer".into()))?;
        let map = buffer
            .map_readable()
            .map_err(|e| EncoderError::Dequeue(e.to_string()))?;

        let is_config = buffer.flags().contains(gstreamer::BufferFlags::HEADER);
        let raw_pts_us = buffer.pts().map(|t| t.useconds() as i64).unwrap_or_default();

        Ok(EncodedBuffer {
            data: map.to_vec(),
            raw_pts_us: if is_config { 0 } else { raw_pts_us },
            is_config,
            is_end_of_stream: false,
        })
    }

    fn request_sync_frame(&mut self) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        let Some(encoder) = pipeline.by_name("enc") else {
            return;
        };
        let event = gstreamer_video::UpstreamForceKeyUnitEvent::builder()
            .all_headers(true)
            .build();
        encoder.send_event(event);
    }

    fn stop(&mut self) {
        if let Some(pipeline) = &self.pipeline {
            let _ = pipeline.set_state(State::Null);
        }
    }

    fn release(&mut self) {
        self.stop();
        self.pipeline = None;
        self.appsrc = None;
        self.appsink = None;
        self.config = None;
    }
}

impl Drop for GStreamerEncoder {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_codec_names_to_known_encoder_elements() {
        assert_eq!(encoder_element_name("h264").unwrap(), "x264enc");
        assert_eq!(encoder_element_name("vp8").unwrap(), "vp8enc");
        assert_eq!(encoder_element_name("vp9").unwrap(), "vp9enc");
        assert_eq!(encoder_element_name("av01").unwrap(), "av1enc");
        assert!(encoder_element_name("mpeg2").is_err());
    }
}
