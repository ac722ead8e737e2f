/// Maps raw character offsets within one compilation unit to 1-based line
/// and column numbers.
///
/// Implementations return 0 for offsets with no line information; callers
/// treat a non-positive line as "unknown position".
pub trait LineMap {
    fn line_number(&self, offset: u32) -> u32;
    fn column_number(&self, offset: u32) -> u32;
}

/// Line-starts table over a unit's source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self {
            line_starts,
            len: src.len() as u32,
        }
    }

    // Offsets up to and including `len` are addressable: `len` is the
    // position one past the final character, which span arithmetic produces
    // for a token ending the unit.
    fn line_index_of(&self, offset: u32) -> Option<usize> {
        if offset > self.len {
            return None;
        }
        Some(match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        })
    }
}

impl LineMap for LineIndex {
    fn line_number(&self, offset: u32) -> u32 {
        self.line_index_of(offset).map_or(0, |i| i as u32 + 1)
    }

    fn column_number(&self, offset: u32) -> u32 {
        self.line_index_of(offset)
            .map_or(0, |i| offset - self.line_starts[i] + 1)
    }
}
