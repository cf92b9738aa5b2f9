//! Chunk sequence tracking.

/// Verdict for an inbound chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// The next expected part.
    Next,
    /// Identical re-delivery of the last accepted part, within the retry budget.
    Duplicate,
    /// Anything else. Never retried.
    Violation { expected: u32, received: u32 },
}

/// Tracks accepted parts of a chunked transfer.
///
/// `last_accepted` starts at 0 and moves by exactly one per accepted part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    expected_parts: u32,
    last_accepted: u32,
    retries: u32,
    last_digest: Option<String>,
}

impl SequenceTracker {
    pub fn new(expected_parts: u32) -> Self {
        Self {
            expected_parts,
            ..Default::default()
        }
    }

    pub fn expected_parts(&self) -> u32 {
        self.expected_parts
    }

    pub fn last_accepted(&self) -> u32 {
        self.last_accepted
    }

    pub fn expected_next(&self) -> u32 {
        self.last_accepted + 1
    }

    /// Re-deliveries absorbed for the current part.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_complete(&self) -> bool {
        self.expected_parts > 0 && self.last_accepted == self.expected_parts
    }

    /// Classify `part_index`. `digest` identifies the encoded payload.
    pub fn check(
        &mut self,
        part_index: u32,
        total_parts: u32,
        digest: &str,
        max_retries: u32,
    ) -> SequenceCheck {
        let violation = SequenceCheck::Violation {
            expected: self.expected_next(),
            received: part_index,
        };
        if total_parts != self.expected_parts || part_index > self.expected_parts {
            return violation;
        }
        if part_index == self.expected_next() {
            return SequenceCheck::Next;
        }
        let same_payload = self.last_digest.as_deref() == Some(digest);
        if part_index == self.last_accepted && same_payload && self.retries < max_retries {
            self.retries += 1;
            return SequenceCheck::Duplicate;
        }
        violation
    }

    /// Record `part_index` as accepted.
    pub fn accept(&mut self, part_index: u32, digest: String) {
        debug_assert_eq!(part_index, self.expected_next());
        self.last_accepted = part_index;
        self.retries = 0;
        self.last_digest = Some(digest);
    }
}
