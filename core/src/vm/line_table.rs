//! Debug line table mapping instruction byte ranges to source lines.
//!
//! The table is a sequence of runs. Run *i* covers `bytes` instruction bytes
//! starting where run *i - 1* ended, and its source line is the previous
//! run's line plus `line_delta` (the code object's first line for run 0).
//!
//! ```text
//! first_line = 10
//! runs:   (6, +1)      (4, +1)      (9, +2)
//! bytes:  [0 .. 6)     [6 .. 10)    [10 .. 19)
//! line:   11           12           14
//! ```
//!
//! Invariant: the run lengths of a code object's table sum to the length of
//! its instruction stream.

use super::instruction_set::DecodeError;

/// One contiguous range of instruction bytes sharing a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRun {
    pub bytes: u32,
    pub line_delta: i32,
}

impl LineRun {
    /// Unreachable trailing run used while scanning a stream, so that the
    /// last real run always has a successor.
    pub const SENTINEL: LineRun = LineRun {
        bytes: u32::MAX,
        line_delta: 1,
    };

    pub const fn new(bytes: u32, line_delta: i32) -> Self {
        Self { bytes, line_delta }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTable {
    runs: Vec<LineRun>,
}

impl LineTable {
    pub fn new(runs: Vec<LineRun>) -> Self {
        Self { runs }
    }

    pub fn runs(&self) -> &[LineRun] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<LineRun> {
        self.runs
    }

    /// Total number of instruction bytes covered by the table.
    pub fn total_bytes(&self) -> u64 {
        self.runs.iter().map(|run| u64::from(run.bytes)).sum()
    }

    /// Source line of the instruction at `offset`.
    ///
    /// Offsets past the covered range resolve to the last run's line.
    pub fn line_for_offset(&self, first_line: u32, offset: usize) -> u32 {
        let offset = offset as u64;
        let mut line = i64::from(first_line);
        let mut start = 0u64;
        for run in &self.runs {
            line += i64::from(run.line_delta);
            let end = start + u64::from(run.bytes);
            if offset < end {
                break;
            }
            start = end;
        }
        line.clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Compact encoding: `(u8 bytes, i8 line_delta)` pairs.
    ///
    /// Large line deltas are carried by leading zero-length pairs; long runs
    /// are split into 255-byte chunks, only the first of which carries the
    /// remaining delta.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.runs.len() * 2);
        for run in &self.runs {
            let mut delta = run.line_delta;
            while delta > i32::from(i8::MAX) {
                out.extend_from_slice(&[0, i8::MAX as u8]);
                delta -= i32::from(i8::MAX);
            }
            while delta < i32::from(i8::MIN) {
                out.extend_from_slice(&[0, i8::MIN as u8]);
                delta -= i32::from(i8::MIN);
            }
            let mut bytes = run.bytes;
            while bytes > u32::from(u8::MAX) {
                out.extend_from_slice(&[u8::MAX, delta as i8 as u8]);
                delta = 0;
                bytes -= u32::from(u8::MAX);
            }
            out.extend_from_slice(&[bytes as u8, delta as i8 as u8]);
        }
        out
    }

    /// Inverse of [`encode`](Self::encode). Chunks are kept as separate runs;
    /// line lookups are unaffected.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() % 2 != 0 {
            return Err(DecodeError::OddLineTable { len: bytes.len() });
        }
        let runs = bytes
            .chunks_exact(2)
            .map(|pair| LineRun::new(u32::from(pair[0]), i32::from(pair[1] as i8)))
            .collect();
        Ok(Self { runs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> LineTable {
        LineTable::new(vec![LineRun::new(6, 1), LineRun::new(4, 1), LineRun::new(9, 2)])
    }

    #[test]
    fn test_line_lookup() {
        let t = table();
        assert_eq!(t.total_bytes(), 19);
        assert_eq!(t.line_for_offset(10, 0), 11);
        assert_eq!(t.line_for_offset(10, 5), 11);
        assert_eq!(t.line_for_offset(10, 6), 12);
        assert_eq!(t.line_for_offset(10, 10), 14);
        assert_eq!(t.line_for_offset(10, 18), 14);
        assert_eq!(t.line_for_offset(10, 100), 14);
    }

    #[test]
    fn test_zero_length_runs_are_transparent() {
        let t = LineTable::new(vec![LineRun::new(3, 0), LineRun::new(0, 5), LineRun::new(3, 1)]);
        assert_eq!(t.line_for_offset(1, 2), 1);
        assert_eq!(t.line_for_offset(1, 3), 7);
    }

    #[test]
    fn test_compact_encoding_preserves_lookups() {
        let t = LineTable::new(vec![
            LineRun::new(600, 300),
            LineRun::new(2, -200),
            LineRun::new(7, 1),
        ]);
        let decoded = LineTable::decode(&t.encode()).unwrap();
        assert_eq!(decoded.total_bytes(), t.total_bytes());
        for offset in [0, 254, 255, 599, 600, 601, 602, 608] {
            assert_eq!(
                decoded.line_for_offset(1, offset),
                t.line_for_offset(1, offset),
                "offset {}",
                offset
            );
        }
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        assert_eq!(
            LineTable::decode(&[1, 2, 3]),
            Err(DecodeError::OddLineTable { len: 3 })
        );
    }
}
