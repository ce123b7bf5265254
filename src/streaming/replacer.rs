//! Streaming first-occurrence replacement.
//!
//! A `StreamReplacer` rewrites exactly one occurrence of a fixed byte
//! pattern in a chunked stream without ever seeing the whole stream. The
//! caller owns all buffers and the I/O loop; the replacer is a synchronous
//! step function that reports, per call, how many source bytes it consumed,
//! how many destination bytes it produced, and which of three flow-control
//! outcomes applies. A match that straddles a chunk boundary is handled by
//! withholding the trailing `pattern.len() - 1` bytes of each chunk until
//! the next chunk proves them safe.

use memchr::memmem;

/// Flow-control outcome of one `transform` step. None of these is an
/// error; the driver loop reacts and calls again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything presented to this call was handled. More input may still
    /// follow, and unconsumed source (after a substitution) should be
    /// re-presented.
    Done,
    /// The trailing bytes of `src` might begin a match that only the next
    /// chunk can confirm. They were not consumed; re-present them in front
    /// of the next chunk.
    NeedMoreSource,
    /// `dst` filled up mid-step. Flush it and call again with the
    /// unconsumed remainder of `src`; the step resumes where it stopped.
    DestinationFull,
}

/// Byte accounting for one `transform` step.
///
/// `consumed` leading bytes of `src` are fully processed and may be
/// discarded by the caller; `produced` bytes were written to the front of
/// `dst`. Both are exact even when the step was cut short by a full
/// destination, so a retry never skips or duplicates a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformResult {
    pub consumed: usize,
    pub produced: usize,
    pub outcome: Outcome,
}

/// Incremental matcher/rewriter for a single stream.
///
/// Replaces the first occurrence of `pattern` with `replacement`; every
/// other byte passes through verbatim. One instance serves exactly one
/// stream: the match state is monotonic and never resets, so reusing an
/// instance would suppress the replacement on the second stream. Not
/// `Clone`: a copied instance would carry a duplicate of the match state.
#[derive(Debug)]
pub struct StreamReplacer {
    finder: memmem::Finder<'static>,
    replacement: Vec<u8>,
    matched: bool,
    /// Replacement bytes still owed after a substitution was cut short by
    /// a full destination. Emitted before anything else on the next call.
    pending: usize,
}

impl StreamReplacer {
    /// Build a replacer for one stream. An empty `pattern` degrades to
    /// pure passthrough (it never matches anything); the replacement may
    /// be empty, shorter, equal, or longer than the pattern.
    pub fn new(pattern: &[u8], replacement: &[u8]) -> Self {
        Self {
            finder: memmem::Finder::new(pattern).into_owned(),
            replacement: replacement.to_vec(),
            matched: false,
            pending: 0,
        }
    }

    /// Whether the single substitution has already happened.
    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// Process the next slice of input.
    ///
    /// `src` is the unconsumed input currently available; `at_eof` promises
    /// that no input follows it, ever. The stream is fully drained once a
    /// call with `at_eof` consumes all of `src` and returns
    /// [`Outcome::Done`].
    pub fn transform(&mut self, dst: &mut [u8], src: &[u8], at_eof: bool) -> TransformResult {
        let mut consumed = 0;
        let mut produced = 0;

        // A substitution cut short by a full destination resumes here.
        // These bytes were paid for by `consumed` on the call that found
        // the match, so they cost no source now.
        if self.pending > 0 {
            let start = self.replacement.len() - self.pending;
            let n = copy_into(&mut dst[produced..], &self.replacement[start..]);
            produced += n;
            self.pending -= n;
            if self.pending > 0 {
                return TransformResult {
                    consumed,
                    produced,
                    outcome: Outcome::DestinationFull,
                };
            }
        }

        // After the first match, and for the degenerate empty pattern, the
        // rest of the stream is verbatim passthrough.
        if self.matched || self.finder.needle().is_empty() {
            let n = copy_into(&mut dst[produced..], src);
            consumed += n;
            produced += n;
            let outcome = if n < src.len() {
                Outcome::DestinationFull
            } else {
                Outcome::Done
            };
            return TransformResult {
                consumed,
                produced,
                outcome,
            };
        }

        let pattern_len = self.finder.needle().len();

        match self.finder.find(src) {
            Some(i) => {
                // Literal bytes ahead of the match. If they don't all fit,
                // the retry re-searches the shorter remainder and finds the
                // same match at a smaller offset.
                let n = copy_into(&mut dst[produced..], &src[..i]);
                consumed += n;
                produced += n;
                if n < i {
                    return TransformResult {
                        consumed,
                        produced,
                        outcome: Outcome::DestinationFull,
                    };
                }

                // Swallow the pattern and substitute. The pattern is
                // consumed in full here even if the replacement doesn't
                // fit; the unwritten remainder becomes `pending`.
                self.matched = true;
                consumed += pattern_len;
                let n = copy_into(&mut dst[produced..], &self.replacement);
                produced += n;
                if n < self.replacement.len() {
                    self.pending = self.replacement.len() - n;
                    return TransformResult {
                        consumed,
                        produced,
                        outcome: Outcome::DestinationFull,
                    };
                }
                TransformResult {
                    consumed,
                    produced,
                    outcome: Outcome::Done,
                }
            }
            None if at_eof => {
                // Nothing more is coming; nothing need be withheld.
                let n = copy_into(&mut dst[produced..], src);
                consumed += n;
                produced += n;
                let outcome = if n < src.len() {
                    Outcome::DestinationFull
                } else {
                    Outcome::Done
                };
                TransformResult {
                    consumed,
                    produced,
                    outcome,
                }
            }
            None => {
                // The last `pattern_len - 1` bytes could begin a match
                // that completes in the next chunk; hold them back.
                let withheld = (pattern_len - 1).min(src.len());
                let safe = src.len() - withheld;
                let n = copy_into(&mut dst[produced..], &src[..safe]);
                consumed += n;
                produced += n;
                if n < safe {
                    return TransformResult {
                        consumed,
                        produced,
                        outcome: Outcome::DestinationFull,
                    };
                }
                TransformResult {
                    consumed,
                    produced,
                    outcome: Outcome::NeedMoreSource,
                }
            }
        }
    }
}

/// Copy as much of `src` into `dst` as fits, returning the count.
fn copy_into(dst: &mut [u8], src: &[u8]) -> usize {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference semantics: replace the first occurrence in a fully
    /// buffered input.
    fn replace_first(input: &[u8], pattern: &[u8], replacement: &[u8]) -> Vec<u8> {
        if pattern.is_empty() {
            return input.to_vec();
        }
        match memmem::find(input, pattern) {
            Some(i) => {
                let mut out = Vec::with_capacity(input.len());
                out.extend_from_slice(&input[..i]);
                out.extend_from_slice(replacement);
                out.extend_from_slice(&input[i + pattern.len()..]);
                out
            }
            None => input.to_vec(),
        }
    }

    /// Drive a replacer over `chunks` exactly as the I/O loop contract
    /// prescribes: retain withheld tails, flush on a full destination,
    /// re-present unconsumed input.
    fn drive(replacer: &mut StreamReplacer, chunks: &[&[u8]], dst_capacity: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut carry: Vec<u8> = Vec::new();
        let mut dst = vec![0u8; dst_capacity];

        for (idx, chunk) in chunks.iter().enumerate() {
            let at_eof = idx == chunks.len() - 1;
            carry.extend_from_slice(chunk);
            let mut offset = 0;
            loop {
                let step = replacer.transform(&mut dst, &carry[offset..], at_eof);
                out.extend_from_slice(&dst[..step.produced]);
                offset += step.consumed;
                match step.outcome {
                    Outcome::DestinationFull => continue,
                    Outcome::Done if offset < carry.len() => continue,
                    Outcome::Done => break,
                    Outcome::NeedMoreSource => break,
                }
            }
            carry.drain(..offset);
        }

        assert!(carry.is_empty(), "withheld bytes survived end of stream");
        out
    }

    #[test]
    fn single_chunk_replacement() {
        let mut r = StreamReplacer::new(b"world", b"rust");
        let out = drive(&mut r, &[b"hello world!"], 64);
        assert_eq!(out, b"hello rust!");
        assert!(r.is_matched());
    }

    #[test]
    fn no_match_passthrough() {
        let mut r = StreamReplacer::new(b"absent", b"never");
        let out = drive(&mut r, &[b"some ", b"chunked ", b"body"], 64);
        assert_eq!(out, b"some chunked body");
        assert!(!r.is_matched());
    }

    #[test]
    fn only_first_occurrence_replaced() {
        let mut r = StreamReplacer::new(b"AB", b"");
        let out = drive(&mut r, &[b"xABxAB"], 64);
        assert_eq!(out, b"xxAB");
    }

    #[test]
    fn repeated_occurrences_keep_later_ones() {
        let mut r = StreamReplacer::new(b"na", b"NA");
        let out = drive(&mut r, &[b"banana"], 64);
        assert_eq!(out, b"baNAna");
    }

    #[test]
    fn head_tag_straddles_two_chunks() {
        let mut r = StreamReplacer::new(b"<head>", b"<head>X");
        let out = drive(&mut r, &[b"<he", b"ad>body"], 64);
        assert_eq!(out, b"<head>Xbody");
    }

    #[test]
    fn every_split_point_inside_the_pattern() {
        let input = b"stuff before<head>stuff after";
        for split in 0..=input.len() {
            let mut r = StreamReplacer::new(b"<head>", b"<head><script/>");
            let out = drive(&mut r, &[&input[..split], &input[split..]], 64);
            assert_eq!(
                out,
                replace_first(input, b"<head>", b"<head><script/>"),
                "split at {split}"
            );
        }
    }

    #[test]
    fn every_three_way_chunking_of_a_small_input() {
        let input = b"xxAByABz";
        for i in 0..=input.len() {
            for j in i..=input.len() {
                let mut r = StreamReplacer::new(b"AB", b"##");
                let out = drive(&mut r, &[&input[..i], &input[i..j], &input[j..]], 64);
                assert_eq!(
                    out,
                    replace_first(input, b"AB", b"##"),
                    "chunked at {i}/{j}"
                );
            }
        }
    }

    #[test]
    fn one_byte_destination_matches_unbounded() {
        let cases: &[(&[u8], &[u8], &[u8])] = &[
            (b"hello world, hello again", b"hello", b"goodbye"),
            (b"abcdef", b"cd", b""),
            (b"<head>tail", b"<head>", b"<head><script defer></script>"),
            (b"no match here", b"zzz", b"yyy"),
        ];
        for &(input, pattern, replacement) in cases {
            let mut wide = StreamReplacer::new(pattern, replacement);
            let expected = drive(&mut wide, &[input], input.len() + replacement.len() + 1);

            let mut narrow = StreamReplacer::new(pattern, replacement);
            let out = drive(&mut narrow, &[input], 1);
            assert_eq!(out, expected);
            assert_eq!(out, replace_first(input, pattern, replacement));
        }
    }

    #[test]
    fn empty_pattern_is_pure_passthrough() {
        let mut r = StreamReplacer::new(b"", b"ignored");
        let out = drive(&mut r, &[b"abc", b"", b"def"], 2);
        assert_eq!(out, b"abcdef");
        assert!(!r.is_matched());
    }

    #[test]
    fn empty_input_at_eof_is_terminal() {
        let mut r = StreamReplacer::new(b"pat", b"sub");
        let mut dst = [0u8; 8];
        let step = r.transform(&mut dst, b"", true);
        assert_eq!(step.consumed, 0);
        assert_eq!(step.produced, 0);
        assert_eq!(step.outcome, Outcome::Done);
    }

    #[test]
    fn withholds_exactly_pattern_minus_one() {
        let mut r = StreamReplacer::new(b"<head>", b"<head>X");
        let mut dst = [0u8; 64];
        // 6 input bytes, 5 withheld, 1 safe to emit.
        let step = r.transform(&mut dst, b"a<head", false);
        assert_eq!(step.outcome, Outcome::NeedMoreSource);
        assert_eq!(step.consumed, 1);
        assert_eq!(step.produced, 1);
        assert_eq!(&dst[..1], b"a");
    }

    #[test]
    fn short_chunk_is_withheld_entirely() {
        let mut r = StreamReplacer::new(b"<head>", b"<head>X");
        let mut dst = [0u8; 64];
        let step = r.transform(&mut dst, b"<he", false);
        assert_eq!(step.outcome, Outcome::NeedMoreSource);
        assert_eq!(step.consumed, 0);
        assert_eq!(step.produced, 0);
    }

    #[test]
    fn full_destination_reports_exact_partial_counts() {
        let mut r = StreamReplacer::new(b"XY", b"Z");
        let mut dst = [0u8; 2];

        let step = r.transform(&mut dst, b"abcdXYe", true);
        assert_eq!(step.outcome, Outcome::DestinationFull);
        assert_eq!(step.consumed, 2);
        assert_eq!(step.produced, 2);
        assert_eq!(&dst[..2], b"ab");

        let step = r.transform(&mut dst, b"cdXYe", true);
        assert_eq!(step.outcome, Outcome::DestinationFull);
        assert_eq!(step.consumed, 2);
        assert_eq!(&dst[..2], b"cd");

        let step = r.transform(&mut dst, b"XYe", true);
        assert_eq!(step.consumed, 2);
        assert_eq!(step.produced, 1);
        assert_eq!(step.outcome, Outcome::Done);
        assert_eq!(&dst[..1], b"Z");

        let step = r.transform(&mut dst, b"e", true);
        assert_eq!(step.consumed, 1);
        assert_eq!(step.produced, 1);
        assert_eq!(step.outcome, Outcome::Done);
        assert_eq!(&dst[..1], b"e");
    }

    #[test]
    fn interrupted_substitution_resumes_without_duplication() {
        let mut r = StreamReplacer::new(b"AB", b"0123456789");
        let mut dst = [0u8; 4];

        // The match is found and the pattern consumed, but only 4 of the
        // 10 replacement bytes fit.
        let step = r.transform(&mut dst, b"ABtail", false);
        assert_eq!(step.outcome, Outcome::DestinationFull);
        assert_eq!(step.consumed, 2);
        assert_eq!(step.produced, 4);
        assert_eq!(&dst[..4], b"0123");
        assert!(r.is_matched());

        // The owed bytes come out first, then passthrough resumes.
        let step = r.transform(&mut dst, b"tail", false);
        assert_eq!(step.outcome, Outcome::DestinationFull);
        assert_eq!(step.consumed, 0);
        assert_eq!(step.produced, 4);
        assert_eq!(&dst[..4], b"4567");

        let step = r.transform(&mut dst, b"tail", false);
        assert_eq!(step.outcome, Outcome::DestinationFull);
        assert_eq!(step.consumed, 2);
        assert_eq!(step.produced, 4);
        assert_eq!(&dst[..4], b"89ta");

        let step = r.transform(&mut dst, b"il", false);
        assert_eq!(step.outcome, Outcome::Done);
        assert_eq!(step.consumed, 2);
        assert_eq!(step.produced, 2);
        assert_eq!(&dst[..2], b"il");
    }

    #[test]
    fn match_in_final_withheld_tail() {
        // The pattern only completes at EOF, inside bytes a non-final call
        // had to withhold.
        let mut r = StreamReplacer::new(b"end.", b"END!");
        let out = drive(&mut r, &[b"the en", b"d."], 64);
        assert_eq!(out, b"the END!");
    }

    #[test]
    fn replacement_longer_shorter_and_empty() {
        let input: &[u8] = b"one two three two";
        for replacement in [&b""[..], &b"2"[..], &b"a-much-longer-replacement"[..]] {
            let mut r = StreamReplacer::new(b"two", replacement);
            let out = drive(&mut r, &[&input[..5], &input[5..9], &input[9..]], 8);
            assert_eq!(out, replace_first(input, b"two", replacement));
        }
    }

    #[test]
    fn single_byte_pattern_never_withholds() {
        let mut r = StreamReplacer::new(b"x", b"y");
        let mut dst = [0u8; 64];
        let step = r.transform(&mut dst, b"abc", false);
        // pattern_len - 1 == 0: the whole chunk is searchable.
        assert_eq!(step.outcome, Outcome::NeedMoreSource);
        assert_eq!(step.consumed, 3);
        assert_eq!(step.produced, 3);

        let out = drive(&mut StreamReplacer::new(b"x", b"y"), &[b"axbxc"], 64);
        assert_eq!(out, b"aybxc");
    }
}
