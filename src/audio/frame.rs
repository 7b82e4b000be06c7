// Frame-decode primitive interface
// The session drives any implementation of this trait over its refill buffer

/// Largest number of interleaved i16 samples a single MP3 frame can produce.
///
/// This is the Layer III limit: 1152 samples per channel, two channels.
pub const MAX_SAMPLES_PER_FRAME: usize = 1152 * 2;

/// Metadata reported for the most recent call into a frame decoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub sample_rate_hz: u32,
    /// 1 or 2 once a frame has been decoded, 0 before
    pub channel_count: u16,
    pub bitrate_kbps: u32,
    /// Bytes consumed from the input window by this call
    pub frame_byte_length: usize,
}

/// Outcome of one `decode_frame` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Zero when the call only skipped metadata, garbage or a bad sync
    pub samples_per_channel: usize,
    pub info: FrameInfo,
}

impl DecodedFrame {
    /// A non-audio span of `len` bytes was consumed
    pub fn skipped(len: usize) -> Self {
        Self {
            samples_per_channel: 0,
            info: FrameInfo {
                frame_byte_length: len,
                ..FrameInfo::default()
            },
        }
    }

    pub fn has_audio(&self) -> bool {
        self.samples_per_channel > 0
    }
}

/// Black-box MP3 frame decoder.
///
/// Implementations decode at most one frame from the front of `input`, writing
/// interleaved samples to `pcm`. Returning zero samples with a positive
/// `frame_byte_length` reports a skipped span; zero for both means no sync was
/// found and the caller must force progress itself.
///
/// `pcm` is sized for [`MAX_SAMPLES_PER_FRAME`], the Layer III bound.
/// Implementations must not report more samples than that; a session
/// truncates any frame that overruns its output buffer.
pub trait FrameDecoder {
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame;

    /// Drop sync state and any bit reservoir after a discontinuity
    fn reset(&mut self);

    /// Remember the skip state at the start of a session call
    fn checkpoint(&mut self) {}

    /// Return to the last checkpoint after the input skipped since then was handed back
    fn rollback(&mut self) {}
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for Box<D> {
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame {
        (**self).decode_frame(input, pcm)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn checkpoint(&mut self) {
        (**self).checkpoint()
    }

    fn rollback(&mut self) {
        (**self).rollback()
    }
}
