//! Wrapping cursor shared by every image set.

/// Position in a fixed-length sequence, wrapping on both ends.
///
/// An empty sequence is valid: the cursor stays at 0 and every move is a
/// no-op returning `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    position: usize,
    len: usize,
}

impl Cursor {
    /// Creates a cursor at `position`, falling back to 0 when out of range.
    pub(crate) fn new(len: usize, position: usize) -> Self {
        let position = if position < len { position } else { 0 };
        Self { position, len }
    }

    pub(crate) fn position(self) -> usize {
        self.position
    }

    pub(crate) fn len(self) -> usize {
        self.len
    }

    /// The current position, or `None` for an empty sequence.
    pub(crate) fn get(self) -> Option<usize> {
        (self.len > 0).then_some(self.position)
    }

    /// Moves forward one step, wrapping to 0 after the last item.
    pub(crate) fn advance(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.position = (self.position + 1) % self.len;
        Some(self.position)
    }

    /// Moves back one step, wrapping to the last item before 0.
    pub(crate) fn retreat(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.position = (self.position + self.len - 1) % self.len;
        Some(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_both_ways() {
        let mut cursor = Cursor::new(3, 0);
        assert_eq!(cursor.retreat(), Some(2));
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), Some(1));
        assert_eq!(cursor.advance(), Some(2));
        assert_eq!(cursor.advance(), Some(0));
    }

    #[test]
    fn test_full_cycle_returns_to_start() {
        for len in 1..8 {
            for start in 0..len {
                let mut cursor = Cursor::new(len, start);
                for _ in 0..len {
                    cursor.advance();
                }
                assert_eq!(cursor.position(), start);
                for _ in 0..len {
                    cursor.retreat();
                }
                assert_eq!(cursor.position(), start);
            }
        }
    }

    #[test]
    fn test_empty_is_inert() {
        let mut cursor = Cursor::new(0, 0);
        assert_eq!(cursor.get(), None);
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.retreat(), None);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.len(), 0);
    }

    #[test]
    fn test_out_of_range_start_falls_back_to_zero() {
        assert_eq!(Cursor::new(2, 5).position(), 0);
        assert_eq!(Cursor::new(1, 0).get(), Some(0));
    }
}
