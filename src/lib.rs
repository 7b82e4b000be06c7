// mp3session - Streaming MP3 decode session
// Module declarations
pub mod audio;
pub mod error;
pub mod io;
pub mod settings;

pub use audio::{FrameDecoder, FrameInfo, Mp3FrameDecoder, Session, MAX_SAMPLES_PER_FRAME};
pub use error::{Error, Result};
pub use io::ByteStream;
pub use settings::SessionSettings;
