// Audio decoding module
// Frame sync and decode via Symphonia, driven by a streaming session

pub mod decoder;
pub mod frame;
pub mod header;
pub mod pcm;
pub mod session;

pub use decoder::Mp3FrameDecoder;
pub use frame::{DecodedFrame, FrameDecoder, FrameInfo, MAX_SAMPLES_PER_FRAME};
pub use session::{estimate_seek_offset, Session};
