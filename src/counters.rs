use crate::config::ByteEncoding;

/// The position counters maintained in lockstep with the state machine
/// (C6): total code units consumed, raw source lines seen, logical
/// records delivered, and (optionally) encoded byte count.
#[derive(Clone, Debug, Default)]
pub(crate) struct Counters {
    char_count: u64,
    byte_count: u64,
    row: u64,
    raw_row: u64,
}

impl Counters {
    pub(crate) fn new() -> Counters {
        Counters::default()
    }

    #[inline]
    pub(crate) fn char_count(&self) -> u64 {
        self.char_count
    }

    #[inline]
    pub(crate) fn byte_count(&self) -> u64 {
        self.byte_count
    }

    #[inline]
    pub(crate) fn row(&self) -> u64 {
        self.row
    }

    #[inline]
    pub(crate) fn raw_row(&self) -> u64 {
        self.raw_row
    }

    /// Called once per code unit consumed by the state machine, including
    /// code units inside quoted fields.
    #[inline]
    pub(crate) fn consume_char(
        &mut self,
        code_unit: u8,
        count_bytes: bool,
        encoding: &dyn ByteEncoding,
    ) {
        self.char_count += 1;
        if count_bytes {
            self.byte_count += u64::from(encoding.byte_length_of(code_unit));
        }
    }

    /// Called once per CR, and once per LF not immediately preceded by a
    /// CR, anywhere in the input including inside quotes.
    #[inline]
    pub(crate) fn bump_raw_row(&mut self) {
        self.raw_row += 1;
    }

    /// Called once per record actually emitted to the caller (blank and
    /// comment lines never call this).
    #[inline]
    pub(crate) fn bump_row(&mut self) {
        self.row += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Utf8Encoding;

    #[test]
    fn counters_start_at_zero() {
        let c = Counters::new();
        assert_eq!(c.char_count(), 0);
        assert_eq!(c.byte_count(), 0);
        assert_eq!(c.row(), 0);
        assert_eq!(c.raw_row(), 0);
    }

    #[test]
    fn byte_count_tracks_only_when_enabled() {
        let mut c = Counters::new();
        let enc = Utf8Encoding;
        c.consume_char(b'a', false, &enc);
        assert_eq!(c.char_count(), 1);
        assert_eq!(c.byte_count(), 0);

        c.consume_char(b'b', true, &enc);
        assert_eq!(c.char_count(), 2);
        assert_eq!(c.byte_count(), 1);
    }

    #[test]
    fn monotonic_bumps() {
        let mut c = Counters::new();
        c.bump_raw_row();
        c.bump_raw_row();
        c.bump_row();
        assert_eq!(c.raw_row(), 2);
        assert_eq!(c.row(), 1);
    }
}
