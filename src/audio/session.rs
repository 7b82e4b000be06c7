// Streaming MP3 decode session
// Pulls bytes from a stream into a bounded refill buffer and decodes one frame per call

use tracing::{debug, trace, warn};

use super::decoder::Mp3FrameDecoder;
use super::frame::{DecodedFrame, FrameDecoder, FrameInfo, MAX_SAMPLES_PER_FRAME};
use super::pcm::{self, FULL_VOLUME};
use crate::error::{Error, Result};
use crate::io::ByteStream;
use crate::settings::SessionSettings;

/// Refill buffer size used when none is requested
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Smallest refill buffer a session will allocate
pub const MIN_BUFFER_CAPACITY: usize = 1024;

/// Free space kept in reserve before a refill is skipped
pub const DEFAULT_LOW_WATER_MARGIN: usize = 512;

/// Estimate where `time_seconds` falls in a constant-bitrate stream.
///
/// `data_start` is the offset of the first audio frame (after any ID3v2 tag).
/// VBR streams only get an approximation.
pub fn estimate_seek_offset(time_seconds: f64, bitrate_kbps: u32, data_start: u64) -> u64 {
    if bitrate_kbps == 0 || time_seconds.is_nan() || time_seconds <= 0.0 {
        return data_start;
    }
    // kbps * 1000 / 8 bytes per second
    data_start + (time_seconds * bitrate_kbps as f64 * 125.0) as u64
}

/// An incremental MP3 decoder over a byte stream.
///
/// Each `decode` call yields one frame of interleaved 16-bit PCM. The session
/// is a single-consumer object: every operation takes `&mut self` and nothing
/// is synchronized internally.
pub struct Session<S, D> {
    stream: S,
    decoder: D,
    buffer: Box<[u8]>,
    /// Between calls `buffer[..valid_len]` holds unconsumed input starting at offset 0
    valid_len: usize,
    low_water_margin: usize,
    frame_info: FrameInfo,
    volume_percent: u8,
    force_mono: bool,
    elapsed_seconds: f64,
    /// Stream offset of `buffer[0]`
    position: u64,
    at_eof: bool,
}

impl<S: ByteStream> Session<S, Mp3FrameDecoder> {
    /// Open a session over `stream` with the bundled Symphonia frame decoder
    pub fn open(stream: S) -> Result<Self> {
        Ok(Self::new(stream, Mp3FrameDecoder::new()?))
    }
}

impl<S: ByteStream, D: FrameDecoder> Session<S, D> {
    /// Open a session over `stream` with a custom frame decoder and the default buffer size
    pub fn new(stream: S, decoder: D) -> Self {
        Self::with_capacity(stream, decoder, DEFAULT_BUFFER_CAPACITY)
    }

    /// Open a session with a specific refill buffer size (raised to the minimum if smaller)
    pub fn with_capacity(stream: S, decoder: D, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_BUFFER_CAPACITY);
        Self {
            stream,
            decoder,
            buffer: vec![0u8; capacity].into_boxed_slice(),
            valid_len: 0,
            low_water_margin: DEFAULT_LOW_WATER_MARGIN,
            frame_info: FrameInfo::default(),
            volume_percent: FULL_VOLUME,
            force_mono: false,
            elapsed_seconds: 0.0,
            position: 0,
            at_eof: false,
        }
    }

    /// Open a session configured from persisted settings
    pub fn with_settings(stream: S, decoder: D, settings: &SessionSettings) -> Self {
        let mut session = Self::with_capacity(stream, decoder, settings.buffer_capacity);
        session.set_low_water_margin(settings.low_water_margin);
        session.set_volume(settings.volume_percent);
        session.set_mono(settings.force_mono);
        session
    }

    /// Decode the next audio frame into `output`.
    ///
    /// Returns the number of bytes written, or `0` once the stream and the
    /// internal buffer are both exhausted. Metadata and corrupt spans are
    /// skipped without returning. `output` must hold at least
    /// [`MAX_SAMPLES_PER_FRAME`] samples.
    ///
    /// On a read error the buffer, stream offset and frame info are left as
    /// they were at entry. The one exception is a full buffer whose skipped
    /// front has to be dropped to make room for the read; that skip stays.
    pub fn decode(&mut self, output: &mut [i16]) -> Result<usize> {
        if output.len() < MAX_SAMPLES_PER_FRAME {
            return Err(Error::OutputTooSmall {
                required: MAX_SAMPLES_PER_FRAME,
                actual: output.len(),
            });
        }

        // Bytes skipped this call stay in the buffer until the call succeeds
        self.decoder.checkpoint();
        let mut skipped = 0;
        let mut last_skip = 0;

        // Each pass reads or consumes input; a dry read forces consumption next pass
        let mut need_more = false;
        let mut stream_dry = false;
        loop {
            if self.at_eof {
                return Ok(0);
            }

            if need_more || self.valid_len - skipped < self.low_water_mark() {
                if self.valid_len == self.buffer.len() && skipped > 0 {
                    // No room left to read behind the skipped span
                    self.commit(skipped, last_skip);
                    skipped = 0;
                    self.decoder.checkpoint();
                }
                let read = match self.refill() {
                    Ok(read) => read,
                    Err(e) => {
                        self.decoder.rollback();
                        return Err(e);
                    }
                };
                if read == 0 && self.valid_len == skipped {
                    self.commit(skipped, last_skip);
                    debug!("End of stream at offset {}", self.position);
                    self.at_eof = true;
                    return Ok(0);
                }
                stream_dry = read == 0;
            }

            let window = &self.buffer[skipped..self.valid_len];
            let window_len = window.len();
            let frame = self.decoder.decode_frame(window, output);

            // A partial frame at the front: top up before giving up on it
            need_more = !frame.has_audio()
                && frame.info.frame_byte_length == 0
                && !stream_dry
                && window_len < self.buffer.len();
            if need_more {
                continue;
            }

            let used = Self::progress(&frame, window_len);

            if frame.has_audio() {
                self.commit(skipped + used, used);
                self.frame_info = FrameInfo {
                    frame_byte_length: used,
                    ..frame.info
                };
                return Ok(self.finish_frame(output, frame.samples_per_channel));
            }
            skipped += used;
            last_skip = used;
        }
    }

    /// Reposition the stream to `byte_offset` and restart the clock at `time_seconds`.
    ///
    /// The caller maps time to offset; for VBR streams the reported time is
    /// only as accurate as that mapping until decoding accumulates from it.
    /// A failed stream seek leaves the session untouched.
    pub fn seek(&mut self, byte_offset: u64, time_seconds: f64) -> Result<()> {
        self.stream.seek_absolute(byte_offset)?;

        self.valid_len = 0;
        self.decoder.reset();
        self.elapsed_seconds = time_seconds.max(0.0);
        self.position = byte_offset;
        self.at_eof = false;

        debug!("Seeked to byte {} ({:.3}s)", byte_offset, self.elapsed_seconds);
        Ok(())
    }

    /// Seconds of audio decoded since open or the last seek baseline
    pub fn tell(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Set output volume in percent, clamped to 0..=100
    pub fn set_volume(&mut self, percent: i32) {
        self.volume_percent = percent.clamp(0, FULL_VOLUME as i32) as u8;
    }

    /// Current output volume in percent
    pub fn volume(&self) -> u8 {
        self.volume_percent
    }

    /// Downmix stereo frames to mono from the next decode on
    pub fn set_mono(&mut self, enabled: bool) {
        self.force_mono = enabled;
    }

    /// Whether stereo frames are downmixed
    pub fn is_mono(&self) -> bool {
        self.force_mono
    }

    /// Change the refill reserve; kept strictly below the buffer capacity
    pub fn set_low_water_margin(&mut self, margin: usize) {
        self.low_water_margin = margin.min(self.buffer.len() - 1);
    }

    /// Sample rate of the last decoded frame (0 before the first frame)
    pub fn sample_rate(&self) -> u32 {
        self.frame_info.sample_rate_hz
    }

    /// Bitrate of the last decoded frame in kbps (0 before the first frame)
    pub fn bitrate_kbps(&self) -> u32 {
        self.frame_info.bitrate_kbps
    }

    /// Source channel count of the last decoded frame, before any downmix
    pub fn channel_count(&self) -> u16 {
        self.frame_info.channel_count
    }

    /// Metadata of the last decoded frame
    pub fn frame_info(&self) -> FrameInfo {
        self.frame_info
    }

    /// Size of the refill buffer in bytes
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes read from the stream but not yet consumed
    pub fn buffered_len(&self) -> usize {
        self.valid_len
    }

    /// Stream offset of the next unconsumed byte
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn stream_ref(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Close the session and hand the stream back
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn low_water_mark(&self) -> usize {
        self.buffer.len() - self.low_water_margin
    }

    /// Top up the buffer with one read into the free space behind `valid_len`
    fn refill(&mut self) -> Result<usize> {
        let free = self.buffer.len() - self.valid_len;
        let read = self.stream.read_into(&mut self.buffer[self.valid_len..])?;
        let read = read.min(free);
        self.valid_len += read;
        trace!("Refill read {} bytes, {} buffered", read, self.valid_len);
        Ok(read)
    }

    /// Bytes a frame call used, guaranteeing at least one byte of progress
    fn progress(frame: &DecodedFrame, window_len: usize) -> usize {
        let reported = frame.info.frame_byte_length;
        if reported == 0 && frame.has_audio() {
            warn!("Frame decoder returned audio without consuming input");
        }
        reported.max(1).min(window_len)
    }

    /// Drop `consumed` bytes from the front of the buffer and advance the stream offset
    fn commit(&mut self, consumed: usize, last_frame_len: usize) {
        if consumed == 0 {
            return;
        }
        self.buffer.copy_within(consumed..self.valid_len, 0);
        self.valid_len -= consumed;
        self.position += consumed as u64;
        self.frame_info.frame_byte_length = last_frame_len;
    }

    fn finish_frame(&mut self, output: &mut [i16], samples_per_channel: usize) -> usize {
        let channels = usize::from(self.frame_info.channel_count.max(1));
        let fits = output.len() / channels;
        if samples_per_channel > fits {
            warn!(
                "Frame decoder reported {} samples per channel, output holds {}",
                samples_per_channel, fits
            );
        }
        let samples = samples_per_channel.min(fits);

        if self.frame_info.sample_rate_hz > 0 {
            self.elapsed_seconds += samples as f64 / self.frame_info.sample_rate_hz as f64;
        }

        let out_channels = pcm::process(output, samples, channels, self.force_mono, self.volume_percent);
        out_channels * samples * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{self, Cursor, Read, Seek, SeekFrom};

    /// Stream that counts reads and can fail on demand
    struct MockStream {
        inner: Cursor<Vec<u8>>,
        reads: usize,
        max_read: usize,
        fail_reads: bool,
        /// Fail only the read with this 1-based index
        fail_on_read: Option<usize>,
        fail_seeks: bool,
    }

    impl MockStream {
        fn new(data: Vec<u8>) -> Self {
            Self {
                inner: Cursor::new(data),
                reads: 0,
                max_read: usize::MAX,
                fail_reads: false,
                fail_on_read: None,
                fail_seeks: false,
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            if self.fail_reads || self.fail_on_read == Some(self.reads) {
                return Err(io::Error::new(io::ErrorKind::Other, "read failed"));
            }
            let len = buf.len().min(self.max_read);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for MockStream {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if self.fail_seeks {
                return Err(io::Error::new(io::ErrorKind::Other, "seek failed"));
            }
            self.inner.seek(pos)
        }
    }

    /// Frame decoder that treats `0xAA` as a 4-byte audio frame marker and
    /// everything else as one byte of garbage. Audio frames carry the byte
    /// after the marker as the sample value for every channel; a marker too
    /// close to the end of the window reports no progress.
    struct ScriptedDecoder {
        samples_per_channel: usize,
        sample_rate_hz: u32,
        channels: u16,
        resets: usize,
        seen: Vec<u8>,
        overrides: VecDeque<DecodedFrame>,
    }

    impl ScriptedDecoder {
        fn new(samples_per_channel: usize, channels: u16) -> Self {
            Self {
                samples_per_channel,
                sample_rate_hz: 44100,
                channels,
                resets: 0,
                seen: Vec::new(),
                overrides: VecDeque::new(),
            }
        }
    }

    impl FrameDecoder for ScriptedDecoder {
        fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame {
            if let Some(result) = self.overrides.pop_front() {
                return result;
            }
            if input.first() == Some(&0xAA) && input.len() < 4 {
                return DecodedFrame::default();
            }
            if input.len() >= 4 && input[0] == 0xAA {
                self.seen.push(input[1]);
                let value = input[1] as i16 * 100;
                let n = self.samples_per_channel * self.channels as usize;
                pcm[..n].iter_mut().for_each(|s| *s = value);
                return DecodedFrame {
                    samples_per_channel: self.samples_per_channel,
                    info: FrameInfo {
                        sample_rate_hz: self.sample_rate_hz,
                        channel_count: self.channels,
                        bitrate_kbps: 128,
                        frame_byte_length: 4,
                    },
                };
            }
            DecodedFrame::skipped(1)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn frames(values: &[u8]) -> Vec<u8> {
        values.iter().flat_map(|&v| [0xAA, v, 0, 0]).collect()
    }

    fn output() -> Vec<i16> {
        vec![0i16; MAX_SAMPLES_PER_FRAME]
    }

    #[test]
    fn test_capacity_is_clamped() {
        let session = Session::with_capacity(MockStream::new(vec![]), ScriptedDecoder::new(1, 2), 0);
        assert_eq!(session.capacity(), MIN_BUFFER_CAPACITY);

        let session = Session::new(MockStream::new(vec![]), ScriptedDecoder::new(1, 2));
        assert_eq!(session.capacity(), DEFAULT_BUFFER_CAPACITY);
        assert_eq!(session.volume(), 100);
        assert!(!session.is_mono());
        assert_eq!(session.tell(), 0.0);
        assert_eq!(session.stream_ref().reads, 0);
    }

    #[test]
    fn test_decodes_frames_then_eof() {
        let mut session = Session::new(MockStream::new(frames(&[1, 2, 3])), ScriptedDecoder::new(10, 2));
        let mut out = output();

        for expected in [1i16, 2, 3] {
            assert_eq!(session.decode(&mut out).unwrap(), 10 * 2 * 2);
            assert_eq!(out[0], expected * 100);
        }
        assert_eq!(session.decode(&mut out).unwrap(), 0);
        assert_eq!(session.sample_rate(), 44100);
        assert_eq!(session.channel_count(), 2);
        assert_eq!(session.bitrate_kbps(), 128);
    }

    #[test]
    fn test_garbage_between_frames_is_skipped() {
        let mut data = vec![0u8; 700];
        data.extend(frames(&[5]));
        data.extend(vec![0x13u8; 3000]);
        data.extend(frames(&[6]));

        let mut session = Session::with_capacity(MockStream::new(data), ScriptedDecoder::new(4, 2), 1024);
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(out[0], 500);
        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(out[0], 600);
        assert_eq!(session.decode(&mut out).unwrap(), 0);
        assert_eq!(session.decoder.seen, vec![5, 6]);
    }

    #[test]
    fn test_all_garbage_terminates() {
        let mut session = Session::new(MockStream::new(vec![0u8; 20_000]), ScriptedDecoder::new(4, 2));
        let mut out = output();
        assert_eq!(session.decode(&mut out).unwrap(), 0);
        assert_eq!(session.position(), 20_000);
    }

    #[test]
    fn test_zero_length_report_still_progresses() {
        let mut decoder = ScriptedDecoder::new(4, 2);
        // No sync found: neither samples nor consumption
        decoder.overrides.extend(std::iter::repeat(DecodedFrame::default()).take(50));
        let mut session = Session::new(MockStream::new(vec![0xAA; 50]), decoder);
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 0);
        assert_eq!(session.buffered_len(), 0);
    }

    #[test]
    fn test_audio_without_consumption_forces_one_byte() {
        let mut decoder = ScriptedDecoder::new(4, 2);
        decoder.overrides.push_back(DecodedFrame {
            samples_per_channel: 4,
            info: FrameInfo {
                sample_rate_hz: 44100,
                channel_count: 2,
                bitrate_kbps: 128,
                frame_byte_length: 0,
            },
        });
        let mut session = Session::new(MockStream::new(vec![0x01; 10]), decoder);
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(session.buffered_len(), 9);
        assert_eq!(session.frame_info().frame_byte_length, 1);
    }

    #[test]
    fn test_oversized_consumption_is_clamped() {
        let mut decoder = ScriptedDecoder::new(4, 2);
        decoder.overrides.push_back(DecodedFrame::skipped(1_000_000));
        let mut session = Session::new(MockStream::new(vec![0x01; 100]), decoder);
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 0);
        assert_eq!(session.position(), 100);
    }

    #[test]
    fn test_eof_is_sticky_without_reads() {
        let mut session = Session::new(MockStream::new(frames(&[1])), ScriptedDecoder::new(4, 2));
        let mut out = output();

        assert!(session.decode(&mut out).unwrap() > 0);
        assert_eq!(session.decode(&mut out).unwrap(), 0);
        let reads = session.stream_ref().reads;

        for _ in 0..5 {
            assert_eq!(session.decode(&mut out).unwrap(), 0);
        }
        assert_eq!(session.stream_ref().reads, reads);
    }

    #[test]
    fn test_short_reads_are_accumulated() {
        let mut stream = MockStream::new(frames(&[1, 2, 3, 4]));
        stream.max_read = 3;
        let mut session = Session::new(stream, ScriptedDecoder::new(4, 1));
        let mut out = output();

        let mut decoded = 0;
        while session.decode(&mut out).unwrap() > 0 {
            decoded += 1;
        }
        assert_eq!(session.decoder.seen, vec![1, 2, 3, 4]);
        assert_eq!(decoded, 4);
    }

    #[test]
    fn test_truncated_final_frame_is_dropped() {
        let mut data = frames(&[1]);
        data.extend([0xAA, 0x02]);
        let mut session = Session::new(MockStream::new(data), ScriptedDecoder::new(4, 2));
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(session.decode(&mut out).unwrap(), 0);
        assert_eq!(session.position(), 6);
    }

    #[test]
    fn test_volume_clamp() {
        let mut session = Session::new(MockStream::new(frames(&[10, 10])), ScriptedDecoder::new(4, 2));
        let mut out = output();

        session.set_volume(-5);
        assert_eq!(session.volume(), 0);
        session.decode(&mut out).unwrap();
        assert!(out[..8].iter().all(|&s| s == 0));

        session.set_volume(500);
        assert_eq!(session.volume(), 100);
        session.decode(&mut out).unwrap();
        assert!(out[..8].iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_mono_halves_byte_count() {
        let mut decoder = ScriptedDecoder::new(6, 2);
        decoder.overrides.push_back(DecodedFrame::default());
        let mut session = Session::new(MockStream::new(frames(&[10])), decoder);
        session.set_mono(true);
        session.set_volume(50);
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 6 * 2);
        assert!(out[..6].iter().all(|&s| s == 500));
        assert_eq!(session.channel_count(), 2);
    }

    #[test]
    fn test_output_too_small_is_rejected_before_reading() {
        let mut session = Session::new(MockStream::new(frames(&[1])), ScriptedDecoder::new(4, 2));
        let mut out = vec![0i16; 16];

        let err = session.decode(&mut out).unwrap_err();
        assert!(matches!(err, Error::OutputTooSmall { required: MAX_SAMPLES_PER_FRAME, actual: 16 }));
        assert_eq!(session.stream_ref().reads, 0);
    }

    #[test]
    fn test_read_error_propagates_and_preserves_state() {
        let mut stream = MockStream::new(frames(&[1, 2]));
        stream.max_read = 4;
        let mut session = Session::new(stream, ScriptedDecoder::new(4, 2));
        let mut out = output();

        session.decode(&mut out).unwrap();
        let before = (session.buffered_len(), session.tell(), session.position());

        session.stream_mut().fail_reads = true;
        assert!(matches!(session.decode(&mut out), Err(Error::Io(_))));
        assert_eq!((session.buffered_len(), session.tell(), session.position()), before);

        session.stream_mut().fail_reads = false;
        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(out[0], 200);
    }

    #[test]
    fn test_failed_read_hands_back_skipped_garbage() {
        let mut data = frames(&[1]);
        data.extend(vec![0x13u8; 5000]);
        data.extend(frames(&[2]));
        let mut stream = MockStream::new(data);
        stream.fail_on_read = Some(2);
        let mut session = Session::new(stream, ScriptedDecoder::new(4, 2));
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 16);
        let before = (session.buffered_len(), session.position(), session.frame_info());
        assert_eq!((before.0, before.1), (4092, 4));

        // Garbage is skipped down to the low-water mark before the second read fails
        assert!(matches!(session.decode(&mut out), Err(Error::Io(_))));
        assert_eq!((session.buffered_len(), session.position(), session.frame_info()), before);
        assert_eq!(session.stream_ref().reads, 2);

        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(out[0], 200);
        assert_eq!(session.position(), 5008);
        assert_eq!(session.decoder.seen, vec![1, 2]);
    }

    #[test]
    fn test_failed_read_after_compaction_keeps_committed_skip() {
        let mut data = frames(&[1]);
        data.extend(vec![0x13u8; 5000]);
        let mut stream = MockStream::new(data);
        stream.max_read = 4096;
        stream.fail_on_read = Some(3);
        let mut session = Session::new(stream, ScriptedDecoder::new(4, 2));
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), 16);
        // The second read fills the last 4 free bytes; the third needs room
        // that only dropping the skipped span can provide
        assert!(session.decode(&mut out).is_err());
        assert_eq!(session.position(), 4 + 513);
        assert_eq!(session.buffered_len(), 4096 - 513);
        assert_eq!(session.frame_info().frame_byte_length, 1);
    }

    #[test]
    fn test_over_reported_frame_is_truncated_to_output() {
        let mut decoder = ScriptedDecoder::new(4, 2);
        decoder.overrides.push_back(DecodedFrame {
            samples_per_channel: 5000,
            info: FrameInfo {
                sample_rate_hz: 44100,
                channel_count: 2,
                bitrate_kbps: 128,
                frame_byte_length: 4,
            },
        });
        let mut session = Session::new(MockStream::new(frames(&[1])), decoder);
        let mut out = output();

        assert_eq!(session.decode(&mut out).unwrap(), MAX_SAMPLES_PER_FRAME * 2);
        let expected = (MAX_SAMPLES_PER_FRAME / 2) as f64 / 44100.0;
        assert!((session.tell() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_seek_discards_stale_bytes() {
        let mut data = frames(&[1, 2, 3, 4]);
        let after_seek = data.len() as u64;
        data.extend(frames(&[9, 9]));

        let mut session = Session::new(MockStream::new(data), ScriptedDecoder::new(4, 2));
        let mut out = output();

        session.decode(&mut out).unwrap();
        session.decode(&mut out).unwrap();
        assert!(session.buffered_len() > 0);

        session.seek(after_seek, 3.0).unwrap();
        assert_eq!(session.buffered_len(), 0);
        assert_eq!(session.decoder.resets, 1);
        assert_eq!(session.position(), after_seek);

        session.decode(&mut out).unwrap();
        assert_eq!(out[0], 900);
        assert_eq!(session.decoder.seen, vec![1, 2, 9]);
    }

    #[test]
    fn test_seek_clears_eof() {
        let mut session = Session::new(MockStream::new(frames(&[7])), ScriptedDecoder::new(4, 2));
        let mut out = output();

        while session.decode(&mut out).unwrap() > 0 {}
        session.seek(0, 0.0).unwrap();
        assert_eq!(session.decode(&mut out).unwrap(), 16);
        assert_eq!(out[0], 700);
    }

    #[test]
    fn test_failed_seek_keeps_state() {
        let mut session = Session::new(MockStream::new(frames(&[1, 2, 3])), ScriptedDecoder::new(4, 2));
        let mut out = output();
        session.decode(&mut out).unwrap();
        let buffered = session.buffered_len();
        let elapsed = session.tell();

        session.stream_mut().fail_seeks = true;
        assert!(session.seek(0, 42.0).is_err());
        assert_eq!(session.buffered_len(), buffered);
        assert_eq!(session.tell(), elapsed);
        assert_eq!(session.decoder.resets, 0);
    }

    #[test]
    fn test_tell_reflects_seek_then_accumulates() {
        let mut session = Session::new(MockStream::new(frames(&[1, 2])), ScriptedDecoder::new(1152, 2));
        let mut out = output();

        session.seek(0, 10.0).unwrap();
        assert_eq!(session.tell(), 10.0);

        session.decode(&mut out).unwrap();
        let expected = 10.0 + 1152.0 / 44100.0;
        assert!((session.tell() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_low_water_margin_is_bounded() {
        let mut session = Session::with_capacity(MockStream::new(vec![]), ScriptedDecoder::new(1, 1), 2048);
        session.set_low_water_margin(10_000);
        assert_eq!(session.low_water_mark(), 1);
    }

    #[test]
    fn test_settings_are_applied() {
        let settings = SessionSettings {
            buffer_capacity: 8192,
            low_water_margin: 256,
            volume_percent: 150,
            force_mono: true,
        };
        let session = Session::with_settings(MockStream::new(vec![]), ScriptedDecoder::new(1, 2), &settings);
        assert_eq!(session.capacity(), 8192);
        assert_eq!(session.low_water_mark(), 8192 - 256);
        assert_eq!(session.volume(), 100);
        assert!(session.is_mono());
    }

    #[test]
    fn test_estimate_seek_offset() {
        assert_eq!(estimate_seek_offset(10.0, 128, 0), 160_000);
        assert_eq!(estimate_seek_offset(1.5, 320, 1000), 1000 + 60_000);
        assert_eq!(estimate_seek_offset(5.0, 0, 42), 42);
        assert_eq!(estimate_seek_offset(-1.0, 128, 42), 42);
    }
}
