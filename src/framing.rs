//! Length-prefixed message framing.
//!
//! Each framed message is a 4-byte big-endian payload size followed by the
//! bincode-serialised payload. The format carries no message type
//! information; reader and writer must agree on the message schema per
//! stream.

use std::io::{self, Read, Write};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
}

fn invalid_data(error: bincode::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}

/// Writes framed messages to an output stream.
pub struct MessageWriter<W: Write> {
    output: W,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Write one message. Returns the serialised message size in bytes,
    /// which does not include the 4-byte length prefix.
    pub fn write_message<T: Serialize>(&mut self, message: &T) -> io::Result<u32> {
        let payload = codec().serialize(message).map_err(invalid_data)?;
        let size = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "message too large"))?;

        self.output.write_all(&size.to_be_bytes())?;
        self.output.write_all(&payload)?;
        Ok(size)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

/// Reads framed messages from an input stream.
pub struct MessageReader<R: Read> {
    input: R,
}

impl<R: Read> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Read the next message off the stream.
    pub fn read_message<T: DeserializeOwned>(&mut self) -> io::Result<T> {
        let mut prefix = [0u8; 4];
        self.input.read_exact(&mut prefix)?;
        let size = u32::from_be_bytes(prefix) as usize;

        let mut payload = vec![0u8; size];
        self.input.read_exact(&mut payload)?;
        codec().deserialize(&payload).map_err(invalid_data)
    }
}
