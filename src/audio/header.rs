// MPEG audio frame header parsing and sync scanning
// Finds where the next decodable frame starts inside a refill window

/// MPEG audio version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    /// Unofficial low-sample-rate extension
    Mpeg25,
}

impl MpegVersion {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b11 => Some(MpegVersion::Mpeg1),
            0b10 => Some(MpegVersion::Mpeg2),
            0b00 => Some(MpegVersion::Mpeg25),
            _ => None, // 0b01 is reserved
        }
    }
}

const BITRATES_V1_L1: [u32; 15] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const BITRATES_V1_L2: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const BITRATES_V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L1: [u32; 15] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const BITRATES_V2_L23: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V25: [u32; 3] = [11025, 12000, 8000];

/// Size of the fixed ID3v2 tag header
const ID3V2_HEADER_LEN: usize = 10;

/// Decoded 4-byte MPEG audio frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    /// 1, 2 or 3
    pub layer: u8,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub padding: bool,
    /// 0=stereo, 1=joint stereo, 2=dual channel, 3=mono
    pub channel_mode: u8,
    pub channels: u16,
    /// Whole frame length in bytes, header included
    pub frame_len: usize,
    pub samples_per_frame: usize,
}

impl FrameHeader {
    /// Parse a header from the first four bytes of `data`.
    ///
    /// Returns `None` for anything that is not a usable frame sync, including
    /// reserved fields and free-format bitrates.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 || data[0] != 0xFF || (data[1] & 0xE0) != 0xE0 {
            return None;
        }

        let version = MpegVersion::from_bits((data[1] >> 3) & 0x03)?;
        let layer = match (data[1] >> 1) & 0x03 {
            0b01 => 3,
            0b10 => 2,
            0b11 => 1,
            _ => return None,
        };

        let bitrate_index = (data[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let bitrate_kbps = match (version, layer) {
            (MpegVersion::Mpeg1, 1) => BITRATES_V1_L1[bitrate_index],
            (MpegVersion::Mpeg1, 2) => BITRATES_V1_L2[bitrate_index],
            (MpegVersion::Mpeg1, _) => BITRATES_V1_L3[bitrate_index],
            (_, 1) => BITRATES_V2_L1[bitrate_index],
            _ => BITRATES_V2_L23[bitrate_index],
        };

        let rate_index = ((data[2] >> 2) & 0x03) as usize;
        if rate_index == 3 {
            return None;
        }
        let sample_rate_hz = match version {
            MpegVersion::Mpeg1 => SAMPLE_RATES_V1[rate_index],
            MpegVersion::Mpeg2 => SAMPLE_RATES_V2[rate_index],
            MpegVersion::Mpeg25 => SAMPLE_RATES_V25[rate_index],
        };

        let padding = (data[2] & 0x02) != 0;
        let channel_mode = (data[3] >> 6) & 0x03;
        let channels = if channel_mode == 3 { 1 } else { 2 };

        let bitrate_bps = bitrate_kbps as usize * 1000;
        let rate = sample_rate_hz as usize;
        let pad = padding as usize;
        let (frame_len, samples_per_frame) = match (layer, version) {
            (1, _) => ((12 * bitrate_bps / rate + pad) * 4, 384),
            (2, _) => (144 * bitrate_bps / rate + pad, 1152),
            (_, MpegVersion::Mpeg1) => (144 * bitrate_bps / rate + pad, 1152),
            _ => (72 * bitrate_bps / rate + pad, 576),
        };

        Some(Self {
            version,
            layer,
            bitrate_kbps,
            sample_rate_hz,
            padding,
            channel_mode,
            channels,
            frame_len,
            samples_per_frame,
        })
    }

    /// True when `other` could be the next frame of the same stream
    pub fn is_compatible(&self, other: &FrameHeader) -> bool {
        self.version == other.version
            && self.layer == other.layer
            && self.sample_rate_hz == other.sample_rate_hz
    }

    /// Layer III side information length, which is where Xing/Info tags sit
    fn side_info_len(&self) -> usize {
        match (self.version, self.channels) {
            (MpegVersion::Mpeg1, 1) => 17,
            (MpegVersion::Mpeg1, _) => 32,
            (_, 1) => 9,
            _ => 17,
        }
    }

    /// Detect an encoder info frame (Xing, Info or VBRI) that carries no audio
    pub fn is_info_frame(&self, frame: &[u8]) -> bool {
        if self.layer != 3 {
            return false;
        }
        let xing_at = 4 + self.side_info_len();
        let tag_at = |offset: usize, tag: &[u8]| {
            frame.get(offset..offset + tag.len()).map_or(false, |b| b == tag)
        };
        tag_at(xing_at, b"Xing") || tag_at(xing_at, b"Info") || tag_at(36, b"VBRI")
    }
}

/// Total length of an ID3v2 tag whose header starts `data`, footer included
pub fn id3v2_len(data: &[u8]) -> Option<usize> {
    if data.len() < ID3V2_HEADER_LEN || &data[..3] != b"ID3" {
        return None;
    }
    // Size bytes are syncsafe: 7 significant bits each
    if data[6..10].iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    let footer = if data[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };
    Some(ID3V2_HEADER_LEN + size + footer)
}

/// What lies at the front of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A complete frame starts at offset 0
    Frame(FrameHeader),
    /// An ID3v2 tag of this total length starts at offset 0
    Tag(usize),
    /// This many leading bytes are not audio
    Skip(usize),
    /// A frame or tag starts at offset 0 but the window is too short to use it
    Incomplete,
}

/// Locate the next frame in `window`.
///
/// A candidate sync is trusted only when the header after it agrees (or the
/// window ends before it). With no sync at all, everything but the last three
/// bytes is skipped since a header may straddle the refill boundary.
pub fn scan(window: &[u8]) -> Scan {
    if window.len() < 4 {
        return Scan::Incomplete;
    }
    if window.starts_with(b"ID3") {
        return match id3v2_len(window) {
            Some(len) => Scan::Tag(len),
            None if window.len() < ID3V2_HEADER_LEN => Scan::Incomplete,
            None => Scan::Skip(3),
        };
    }

    for offset in 0..=window.len() - 4 {
        let rest = &window[offset..];
        if offset > 0 && rest.starts_with(b"ID3") {
            return Scan::Skip(offset);
        }
        let Some(header) = FrameHeader::parse(rest) else {
            continue;
        };
        if !follower_agrees(&header, rest) {
            continue;
        }
        if offset > 0 {
            return Scan::Skip(offset);
        }
        if header.frame_len > window.len() {
            return Scan::Incomplete;
        }
        return Scan::Frame(header);
    }

    Scan::Skip(window.len() - 3)
}

fn follower_agrees(header: &FrameHeader, rest: &[u8]) -> bool {
    let Some(next) = rest.get(header.frame_len..) else {
        return true;
    };
    if next.len() < 4 {
        return true;
    }
    // ID3v1 trailer or a new tag after the last frame
    if next.starts_with(b"TAG") || next.starts_with(b"ID3") {
        return true;
    }
    FrameHeader::parse(next).map_or(false, |n| header.is_compatible(&n))
}
