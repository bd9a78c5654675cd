// SPDX-License-Identifier: GPL-3.0-only

//! Outbound frame transports

mod pipeline;

pub use pipeline::StreamSink;

use super::FrameSink;
use crate::pipeline::OutboundFrame;
use tracing::trace;

/// Keeps every frame it receives, up to an optional limit
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Vec<OutboundFrame>,
    limit: Option<usize>,
    received: u64,
}

impl MemorySink {
    /// Sink that only retains the most recent `limit` frames
    pub fn with_limit(limit: usize) -> Self {
        Self {
            frames: Vec::new(),
            limit: Some(limit),
            received: 0,
        }
    }

    pub fn frames(&self) -> &[OutboundFrame] {
        &self.frames
    }

    pub fn last(&self) -> Option<&OutboundFrame> {
        self.frames.last()
    }

    /// Total frames handed over, including discarded ones
    pub fn received(&self) -> u64 {
        self.received
    }
}

impl FrameSink for MemorySink {
    fn send_frame(&mut self, frame: &OutboundFrame) {
        self.received += 1;
        self.frames.push(frame.clone());
        if let Some(limit) = self.limit
            && self.frames.len() > limit
        {
            let excess = self.frames.len() - limit;
            self.frames.drain(..excess);
        }
    }
}

/// Discards frames (streaming disabled)
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn send_frame(&mut self, frame: &OutboundFrame) {
        trace!(width = frame.width(), height = frame.height(), "Frame discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_limit() {
        let mut sink = MemorySink::with_limit(2);
        for _ in 0..5 {
            sink.send_frame(&OutboundFrame::new(2, 2));
        }
        assert_eq!(sink.frames().len(), 2);
        assert_eq!(sink.received(), 5);
    }
}
