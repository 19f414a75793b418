//! A reader that replays canned bulk-IN frames and records bulk-OUT writes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use ccid_bulk::{BulkTransport, TransportError};

pub const TOKEN_ATR: [u8; 17] = [
    0x3B, 0x8C, 0x80, 0x01, 0x80, 0x73, 0xC0, 0x21, 0xC0, 0x56, 0x53, 0x6F, 0x6C, 0x6F, 0x20, 0x42,
    0xD4,
];

#[derive(Default)]
pub struct ScriptedReader {
    pub written: Vec<Vec<u8>>,
    pub timeouts: Vec<Duration>,
    replies: VecDeque<Result<Vec<u8>, TransportError>>,
    write_limit: Option<usize>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reply(mut self, frame: Vec<u8>) -> Self {
        self.replies.push_back(Ok(frame));
        self
    }

    pub fn fail(mut self, error: TransportError) -> Self {
        self.replies.push_back(Err(error));
        self
    }

    /// Accepts at most `limit` octets per write.
    pub fn write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }
}

impl BulkTransport for ScriptedReader {
    fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<usize, TransportError> {
        self.timeouts.push(timeout);
        self.written.push(data.to_vec());

        Ok(self.write_limit.map_or(data.len(), |l| l.min(data.len())))
    }

    fn read_bulk(&mut self, max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        self.timeouts.push(timeout);

        // An empty script behaves like a silent reader.
        let mut frame = self.replies.pop_front().unwrap_or(Err(TransportError::Timeout))?;
        frame.truncate(max_len);

        Ok(frame)
    }
}

/// Builds a raw response frame whose `dwLength` matches the payload.
pub fn frame(message_type: u8, sequence: u8, status: u8, error: u8, payload: &[u8]) -> Vec<u8> {
    let mut raw = vec![message_type];
    raw.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    raw.extend_from_slice(&[0x00, sequence, status, error, 0x00]);
    raw.extend_from_slice(payload);
    raw
}

pub fn data_block(sequence: u8, payload: &[u8]) -> Vec<u8> {
    frame(0x80, sequence, 0x00, 0x00, payload)
}

pub fn slot_status(sequence: u8, status: u8) -> Vec<u8> {
    frame(0x81, sequence, status, 0x00, &[])
}
