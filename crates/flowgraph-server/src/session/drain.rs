//! Output draining state: the shared stdout buffer with its exactly-once
//! graph latch, and incremental UTF-8 decoding of raw stream chunks.

use flowgraph_core::{extract_frame, strip_frames, FrameKind, FrameScanner, PipelineGraph};

/// Accumulated stdout of one session plus the graph latch.
///
/// Callers hold the session's lock only around [`append`](Self::append);
/// persisting and notifying happen after the lock is released.
#[derive(Debug)]
pub struct OutputAccumulator {
    buffer: String,
    graph_emitted: bool,
    /// `None` when the program cannot print a graph frame.
    scanner: Option<FrameScanner>,
}

impl Default for OutputAccumulator {
    fn default() -> Self {
        OutputAccumulator {
            buffer: String::new(),
            graph_emitted: false,
            scanner: Some(FrameScanner::new(FrameKind::Graph)),
        }
    }
}

impl OutputAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accumulator that never looks for a graph frame, for languages
    /// without graph extraction.
    pub fn without_graph() -> Self {
        OutputAccumulator {
            scanner: None,
            ..Self::default()
        }
    }

    /// Appends a stdout chunk. Returns the graph the first time a complete,
    /// decodable graph frame is present, and `None` on every other call.
    ///
    /// Only text appended since the previous call is scanned.
    pub fn append(&mut self, chunk: &str) -> Option<PipelineGraph> {
        self.buffer.push_str(chunk);
        if self.graph_emitted {
            return None;
        }
        let graph = self.scanner.as_mut()?.poll::<PipelineGraph>(&self.buffer)?;
        self.graph_emitted = true;
        Some(graph)
    }

    /// Sets the latch without a frame, for graphs obtained another way.
    pub fn mark_graph_emitted(&mut self) {
        self.graph_emitted = true;
    }

    pub fn graph_emitted(&self) -> bool {
        self.graph_emitted
    }

    /// The run output with graph and timings frames removed and trimmed,
    /// plus the decoded timings report if one was printed.
    pub fn finish(&self) -> (String, Option<serde_json::Value>) {
        let timings = extract_frame::<serde_json::Value>(&self.buffer, FrameKind::Timings);
        let output = strip_frames(&self.buffer, FrameKind::Graph);
        let output = strip_frames(&output, FrameKind::Timings);
        (output.trim().to_string(), timings)
    }
}

/// Decodes a byte stream chunk by chunk, carrying an incomplete trailing
/// UTF-8 sequence over to the next chunk. Invalid bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // incomplete sequence at the end; wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Flushes whatever is left at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
