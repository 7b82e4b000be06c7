// Input side of the decoder: byte sources

pub mod stream;

pub use stream::ByteStream;
