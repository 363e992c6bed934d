//! Streaming response decoding
//!
//! Bytes from the transport become framed records ([`decoder`]) and records
//! become typed events ([`interpreter`]). Neither stage fails the stream: a
//! bad record is reported and the next one is processed.

mod decoder;
mod interpreter;

#[cfg(test)]
mod proptests;

pub use decoder::FrameDecoder;
pub use interpreter::interpret;
