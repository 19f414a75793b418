//! The `bSeq` counter correlating a command with its response.

/// Issues sequence numbers `0, 1, ..., 255, 0, ...` for one session.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    next: u8,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the sequence number for a new command and advances the counter.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u8 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }

    /// Returns the sequence number issued last.
    ///
    /// Before anything was issued this is 255, the number that precedes 0.
    pub fn current(&self) -> u8 {
        self.next.wrapping_sub(1)
    }

    /// Returns the sequence number the next command will carry.
    pub fn upcoming(&self) -> u8 {
        self.next
    }
}
