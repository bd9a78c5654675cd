// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer pipeline for the outbound depth stream
//!
//! ```text
//! appsrc (RGBA) -> videoconvert -> sink
//! ```
//!
//! The default sink is `pipewiresink` in provide mode, which publishes the
//! stream as a PipeWire video source named after the sender. Any other
//! GStreamer bin description can replace it.

use super::super::{BackendError, BackendResult, FrameSink};
use crate::config::SenderSettings;
use crate::constants::SINK_START_TIMEOUT;
use crate::pipeline::OutboundFrame;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use gstreamer_video::{VideoFormat, VideoInfo};
use tracing::{debug, error, info, warn};

/// Outbound stream backed by a GStreamer pipeline
pub struct StreamSink {
    pipeline: gstreamer::Pipeline,
    appsrc: AppSrc,
    width: u32,
    height: u32,
    frames_pushed: u64,
    failed: bool,
}

impl StreamSink {
    /// Build the pipeline for `sender`; call [`start`](Self::start) before use
    pub fn new(sender: &SenderSettings) -> BackendResult<Self> {
        let (width, height) = (sender.width, sender.height);
        info!(width, height, name = %sender.name, "Creating stream pipeline (RGBA)");

        gstreamer::init().map_err(|e| {
            BackendError::InitializationFailed(format!("GStreamer init failed: {}", e))
        })?;

        let pipeline = gstreamer::Pipeline::with_name(&sender.name);

        let appsrc = gstreamer::ElementFactory::make("appsrc")
            .name("depth_src")
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create appsrc: {}", e))
            })?
            .downcast::<AppSrc>()
            .map_err(|_| {
                BackendError::InitializationFailed("Failed to downcast to AppSrc".into())
            })?;

        let videoconvert = gstreamer::ElementFactory::make("videoconvert")
            .name("depth_convert")
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create videoconvert: {}", e))
            })?;

        let sink = match &sender.sink {
            Some(description) => custom_sink(description)?,
            None => pipewire_sink(&sender.name)?,
        };

        let video_info = VideoInfo::builder(VideoFormat::Rgba, width, height)
            .fps(gstreamer::Fraction::new(sender.frame_rate.max(1) as i32, 1))
            .build()
            .map_err(|e| {
                BackendError::FormatNotSupported(format!("Invalid stream format: {}", e))
            })?;
        let caps = video_info.to_caps().map_err(|e| {
            BackendError::FormatNotSupported(format!("Failed to build caps: {}", e))
        })?;

        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gstreamer::Format::Time);
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(true);

        pipeline
            .add_many([appsrc.upcast_ref(), &videoconvert, &sink])
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to add elements: {}", e))
            })?;

        gstreamer::Element::link_many([appsrc.upcast_ref(), &videoconvert, &sink]).map_err(
            |e| BackendError::InitializationFailed(format!("Failed to link elements: {}", e)),
        )?;

        debug!(caps = %caps, "Stream pipeline created");

        Ok(Self {
            pipeline,
            appsrc,
            width,
            height,
            frames_pushed: 0,
            failed: false,
        })
    }

    pub fn start(&self) -> BackendResult<()> {
        debug!("Starting stream pipeline");

        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to start pipeline: {}", e))
            })?;

        let timeout = gstreamer::ClockTime::from_mseconds(SINK_START_TIMEOUT.as_millis() as u64);
        let (result, _state, _pending) = self.pipeline.state(timeout);
        if result.is_err() {
            return Err(BackendError::InitializationFailed(
                "Pipeline failed to reach Playing state".into(),
            ));
        }

        info!("Stream pipeline started");
        Ok(())
    }

    pub fn stop(&self) -> BackendResult<()> {
        debug!("Stopping stream pipeline");

        self.appsrc
            .end_of_stream()
            .map_err(|e| BackendError::Other(format!("Failed to send EOS: {}", e)))?;

        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| BackendError::Other(format!("Failed to stop pipeline: {}", e)))?;

        info!(frames = self.frames_pushed, "Stream pipeline stopped");
        Ok(())
    }

    /// Push one RGBA frame
    pub fn push_frame(&mut self, frame: &OutboundFrame) -> BackendResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(BackendError::FormatNotSupported(format!(
                "Frame size {}x{} doesn't match pipeline {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let buffer = gstreamer::Buffer::from_slice(frame.as_bytes().to_vec());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| BackendError::Other(format!("Failed to push frame: {:?}", e)))?;

        self.frames_pushed += 1;
        if self.frames_pushed % 300 == 0 {
            debug!(frames = self.frames_pushed, "Stream frames pushed");
        }
        Ok(())
    }

    /// Log any error or EOS posted on the pipeline bus since the last call
    fn drain_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(msg) = bus.pop_filtered(&[
            gstreamer::MessageType::Error,
            gstreamer::MessageType::Warning,
            gstreamer::MessageType::Eos,
        ]) {
            match msg.view() {
                gstreamer::MessageView::Error(err) => {
                    error!(
                        source = ?err.src().map(|s| s.path_string()),
                        error = %err.error(),
                        debug = ?err.debug(),
                        "Stream pipeline error"
                    );
                    self.failed = true;
                }
                gstreamer::MessageView::Warning(w) => {
                    warn!(error = %w.error(), "Stream pipeline warning");
                }
                gstreamer::MessageView::Eos(_) => {
                    debug!("Stream pipeline reached EOS");
                }
                _ => {}
            }
        }
    }
}

impl FrameSink for StreamSink {
    fn send_frame(&mut self, frame: &OutboundFrame) {
        self.drain_bus();
        if self.failed {
            return;
        }
        if let Err(e) = self.push_frame(frame) {
            warn!(error = %e, "Dropping outbound frame");
        }
    }
}

impl Drop for StreamSink {
    fn drop(&mut self) {
        debug!("Dropping stream pipeline");
        if let Err(e) = self.stop() {
            debug!(error = %e, "Stream pipeline did not stop cleanly");
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                error!(?e, "Failed to set pipeline to Null on drop");
            }
        }
    }
}

fn pipewire_sink(node_name: &str) -> BackendResult<gstreamer::Element> {
    let sink = gstreamer::ElementFactory::make("pipewiresink")
        .name("depth_sink")
        .build()
        .map_err(|e| {
            BackendError::NotAvailable(format!("Failed to create pipewiresink: {}", e))
        })?;

    // Provide mode publishes a source node other applications can consume
    sink.set_property_from_str("mode", "provide");
    let stream_props = gstreamer::Structure::builder("props")
        .field("media.class", "Video/Source")
        .field("node.name", node_name)
        .field("node.description", node_name)
        .build();
    sink.set_property("stream-properties", &stream_props);

    Ok(sink)
}

fn custom_sink(description: &str) -> BackendResult<gstreamer::Element> {
    debug!(description, "Using custom stream sink");
    let bin = gstreamer::parse::bin_from_description(description, true).map_err(|e| {
        BackendError::InitializationFailed(format!("Invalid sink description: {}", e))
    })?;
    Ok(bin.upcast())
}
