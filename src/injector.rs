//! Streaming Body Injector
//!
//! The driver loop around [`StreamReplacer`]: it owns the buffers the
//! replacer itself refuses to hold. Chunks go in as the proxy delivers
//! them; rewritten bytes come out, possibly a little later than they went
//! in (a tail that might begin a match is carried to the next chunk) but
//! never buffered beyond that. Memory stays O(pattern + scratch)
//! regardless of body size.

use crate::streaming::{Outcome, StreamReplacer};

/// Per-response driver that feeds body chunks through a [`StreamReplacer`].
pub struct StreamingBodyInjector {
    replacer: StreamReplacer,
    /// Withheld tail from previous chunks, re-presented ahead of new input.
    /// Never grows past one pattern-length while the stream is live.
    carry: Vec<u8>,
    /// Fixed-size destination for each transform step.
    scratch: Vec<u8>,
    bytes_in: usize,
    bytes_out: usize,
}

impl StreamingBodyInjector {
    /// Create an injector for one response body. `scratch_size` caps how
    /// much output a single transform step may produce before a flush.
    pub fn new(pattern: &[u8], replacement: &[u8], scratch_size: usize) -> Self {
        Self {
            replacer: StreamReplacer::new(pattern, replacement),
            carry: Vec::new(),
            scratch: vec![0u8; scratch_size.max(1)],
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Rewrite one body chunk, returning the bytes to forward downstream.
    ///
    /// The output may be shorter than the input (tail withheld until the
    /// next chunk proves it safe) or longer (a previously withheld tail
    /// and the substitution flushing through). With `end_of_stream` set
    /// the carry drains completely; nothing is ever left behind.
    pub fn write_chunk(&mut self, chunk: &[u8], end_of_stream: bool) -> Vec<u8> {
        self.bytes_in += chunk.len();
        self.carry.extend_from_slice(chunk);

        let mut out = Vec::with_capacity(self.carry.len());
        let mut offset = 0;
        loop {
            let step = self
                .replacer
                .transform(&mut self.scratch, &self.carry[offset..], end_of_stream);
            out.extend_from_slice(&self.scratch[..step.produced]);
            offset += step.consumed;
            match step.outcome {
                // `out` is unbounded here, so a "flush" is just a retry.
                Outcome::DestinationFull => continue,
                Outcome::Done if offset < self.carry.len() => continue,
                Outcome::Done => break,
                Outcome::NeedMoreSource => break,
            }
        }
        self.carry.drain(..offset);

        self.bytes_out += out.len();
        out
    }

    /// Whether the snippet made it into the body.
    pub fn injected(&self) -> bool {
        self.replacer.is_matched()
    }

    /// Total body bytes received so far.
    pub fn bytes_in(&self) -> usize {
        self.bytes_in
    }

    /// Total rewritten bytes handed back so far.
    pub fn bytes_out(&self) -> usize {
        self.bytes_out
    }
}
