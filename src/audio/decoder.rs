// MP3 frame decoder using Symphonia
// Decodes one frame at a time from a caller-owned byte window

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CodecParameters, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, trace, warn};

use super::frame::{DecodedFrame, FrameDecoder, FrameInfo};
use super::header::{self, FrameHeader, Scan};
use crate::error::{Error, Result};

/// Frame-decode primitive backed by Symphonia's MP3 codec.
///
/// Sync search, ID3v2 skipping and encoder info frames are handled here so the
/// codec only ever sees complete Layer III frames.
pub struct Mp3FrameDecoder {
    codec: Box<dyn Decoder>,
    sample_buf: Option<(SignalSpec, SampleBuffer<i16>)>,
    /// Bytes of an oversized ID3v2 tag still to be skipped
    pending_skip: usize,
    /// `pending_skip` as of the last checkpoint
    saved_skip: usize,
    next_ts: u64,
}

impl Mp3FrameDecoder {
    pub fn new() -> Result<Self> {
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_MP3);

        let codec = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Codec(format!("Failed to create MP3 decoder: {}", e)))?;

        Ok(Self {
            codec,
            sample_buf: None,
            pending_skip: 0,
            saved_skip: 0,
            next_ts: 0,
        })
    }

    fn decode_audio(&mut self, header: &FrameHeader, data: &[u8], pcm: &mut [i16]) -> DecodedFrame {
        let mut frame = DecodedFrame {
            samples_per_channel: 0,
            info: FrameInfo {
                sample_rate_hz: header.sample_rate_hz,
                channel_count: header.channels,
                bitrate_kbps: header.bitrate_kbps,
                frame_byte_length: header.frame_len,
            },
        };

        if header.layer != 3 {
            debug!("Skipping MPEG layer {} frame", header.layer);
            return frame;
        }
        if header.is_info_frame(data) {
            debug!("Skipping encoder info frame ({} bytes)", data.len());
            return frame;
        }

        let packet = Packet::new_from_slice(0, self.next_ts, header.samples_per_frame as u64, data);
        let decoded = match self.codec.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                self.codec.reset();
                return frame;
            }
            Err(e) => {
                // Corrupt frames are dropped, the next sync is tried on the following call
                warn!("Decode error (skipping frame): {}", e);
                return frame;
            }
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if decoded.frames() == 0 || channels == 0 {
            return frame;
        }

        let needed = decoded.capacity() * channels;
        let stale = match &self.sample_buf {
            Some((cached, buf)) => *cached != spec || buf.capacity() < needed,
            None => true,
        };
        if stale {
            self.sample_buf = Some((spec, SampleBuffer::<i16>::new(decoded.capacity() as u64, spec)));
        }
        let Some((_, sample_buf)) = self.sample_buf.as_mut() else {
            return frame;
        };
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();
        let written = samples.len().min(pcm.len() - pcm.len() % channels);
        pcm[..written].copy_from_slice(&samples[..written]);

        frame.samples_per_channel = written / channels;
        frame.info.sample_rate_hz = spec.rate;
        frame.info.channel_count = channels as u16;
        self.next_ts += frame.samples_per_channel as u64;
        frame
    }
}

impl FrameDecoder for Mp3FrameDecoder {
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame {
        if self.pending_skip > 0 {
            let n = self.pending_skip.min(input.len());
            self.pending_skip -= n;
            return DecodedFrame::skipped(n);
        }

        match header::scan(input) {
            Scan::Frame(h) => self.decode_audio(&h, &input[..h.frame_len], pcm),
            Scan::Tag(len) => {
                let n = len.min(input.len());
                self.pending_skip = len - n;
                debug!("Skipping ID3v2 tag ({} bytes)", len);
                DecodedFrame::skipped(n)
            }
            Scan::Skip(n) => {
                trace!("Skipping {} non-audio bytes", n);
                DecodedFrame::skipped(n)
            }
            Scan::Incomplete => DecodedFrame::default(),
        }
    }

    fn reset(&mut self) {
        self.codec.reset();
        self.pending_skip = 0;
        self.saved_skip = 0;
        self.next_ts = 0;
    }

    fn checkpoint(&mut self) {
        self.saved_skip = self.pending_skip;
    }

    fn rollback(&mut self) {
        self.pending_skip = self.saved_skip;
    }
}
