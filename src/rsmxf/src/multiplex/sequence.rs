use crate::error::{MxfError, Result};

/// 25 Hz PAL audio: one sample count per frame, no rotation.
pub const SEQUENCE_25HZ: &[u32] = &[1920];

/// 29.97 Hz NTSC audio: the canonical 5-frame rotation of samples per
/// video frame at 48 kHz.
pub const SEQUENCE_29_97HZ: &[u32] = &[1602, 1601, 1602, 1601, 1602];

/// Infers which rotation of a non-trivial sample-per-frame sequence the
/// caller's writes follow, from a short prefix of observed counts.
/// Trivial (length-1) sequences need no inference.
pub struct SequenceTracker {
    sequence: Vec<u32>,
    observed: Vec<u32>,
    phase: Option<usize>,
}

impl SequenceTracker {
    pub fn new(sequence: Vec<u32>) -> Self {
        SequenceTracker { sequence, observed: Vec::new(), phase: None }
    }

    pub fn is_trivial(&self) -> bool {
        self.sequence.len() <= 1
    }

    /// The expected count for `position`, once the phase is known (or
    /// immediately, for a trivial sequence).
    pub fn expected_at(&self, position: i64) -> Option<u32> {
        if self.is_trivial() {
            return self.sequence.first().copied();
        }
        let phase = self.phase?;
        let len = self.sequence.len();
        let idx = (phase + position as usize) % len;
        Some(self.sequence[idx])
    }

    /// Records one observed samples-per-frame count at `position`. Once
    /// `len(sequence)` consecutive counts have been observed, resolves
    /// the unique rotation that matches all of them; returns the
    /// resolved phase if this observation completed resolution.
    pub fn observe(&mut self, position: i64, samples: u32) -> Result<()> {
        if self.is_trivial() {
            if samples != self.sequence[0] {
                return Err(MxfError::sequence(format!(
                    "expected {} samples at position {position}, got {samples}",
                    self.sequence[0]
                )));
            }
            return Ok(());
        }
        if let Some(expected) = self.expected_at(position) {
            if samples != expected {
                return Err(MxfError::sequence(format!(
                    "sample count {samples} at position {position} does not match resolved phase"
                )));
            }
            return Ok(());
        }
        self.observed.push(samples);
        if self.observed.len() >= self.sequence.len() {
            self.phase = Some(self.resolve_phase()?);
        }
        Ok(())
    }

    fn resolve_phase(&self) -> Result<usize> {
        let len = self.sequence.len();
        let mut candidates = Vec::new();
        for phase in 0..len {
            let matches = self
                .observed
                .iter()
                .enumerate()
                .all(|(i, &count)| count == self.sequence[(phase + i) % len]);
            if matches {
                candidates.push(phase);
            }
        }
        match candidates.len() {
            1 => Ok(candidates[0]),
            0 => Err(MxfError::sequence("no sample-sequence rotation fits observed counts")),
            _ => Err(MxfError::sequence("ambiguous sample-sequence rotation")),
        }
    }

    /// Called at final flush: if the phase was never resolved because
    /// fewer than `len(sequence)` edit units were ever written, commits
    /// the best (first exactly matching) rotation seen so far.
    pub fn commit_best_match(&mut self) -> Result<()> {
        if self.is_trivial() || self.phase.is_some() {
            return Ok(());
        }
        if self.observed.is_empty() {
            return Ok(());
        }
        let len = self.sequence.len();
        for phase in 0..len {
            let matches = self
                .observed
                .iter()
                .enumerate()
                .all(|(i, &count)| count == self.sequence[(phase + i) % len]);
            if matches {
                self.phase = Some(phase);
                return Ok(());
            }
        }
        Err(MxfError::sequence("no sample-sequence rotation fits observed counts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_sequence_rejects_wrong_count() {
        let mut t = SequenceTracker::new(SEQUENCE_25HZ.to_vec());
        assert!(t.observe(0, 1920).is_ok());
        assert!(t.observe(1, 1921).is_err());
    }

    #[test]
    fn ntsc_rotation_resolves_after_full_period() {
        let mut t = SequenceTracker::new(SEQUENCE_29_97HZ.to_vec());
        // Start mid-rotation: phase 2.
        let counts = [1602, 1601, 1602, 1602, 1601];
        for (i, &c) in counts.iter().enumerate() {
            t.observe(i as i64, c).unwrap();
        }
        assert_eq!(t.phase, Some(2));
    }

    #[test]
    fn mismatched_rotation_errors_at_commit() {
        let mut t = SequenceTracker::new(SEQUENCE_29_97HZ.to_vec());
        t.observe(0, 1601).unwrap();
        t.observe(1, 1601).unwrap();
        assert!(t.commit_best_match().is_err());
    }
}
