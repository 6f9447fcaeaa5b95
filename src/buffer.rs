use log::trace;

use crate::error::{Error, Result};
use crate::source::CharSource;

/// The outcome of a single [`CharBuffer::refill`] call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Refill {
    /// How much every buffer-relative position the caller is tracking
    /// (`buffer_pos`, `field_start`, any committed-but-unprocessed field
    /// descriptor starts) must be reduced by, because the buffer was
    /// compacted to offset zero. Zero if no compaction occurred.
    pub(crate) rebase: usize,
    /// Whether there is at least one more unread byte at the (rebased)
    /// cursor position.
    pub(crate) available: bool,
}

/// The growable, contiguous character buffer (C2).
///
/// At all times holds `[0, filled)` valid bytes. The state machine tracks
/// `row_start` (the offset of the current record's first byte) and
/// `buffer_pos` (the scan cursor) itself and passes them in on each
/// refill, since they also drive the field index's rebasing.
#[derive(Debug)]
pub(crate) struct CharBuffer {
    data: Vec<u8>,
    filled: usize,
}

impl CharBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> CharBuffer {
        CharBuffer { data: vec![0u8; capacity.max(1)], filled: 0 }
    }

    #[inline]
    #[allow(dead_code)]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub(crate) fn filled(&self) -> usize {
        self.filled
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    #[inline]
    pub(crate) fn byte_at(&self, pos: usize) -> u8 {
        self.data[pos]
    }

    /// Implements the C2 `ensure_next_char` compaction procedure.
    ///
    /// If `buffer_pos < filled`, there is already at least one unread byte
    /// and this is a no-op. Otherwise: grow if the buffer is both full and
    /// not compactable (`row_start == 0`), slide `[row_start, filled)` down
    /// to offset zero, and issue a single read to top the buffer back up.
    pub(crate) fn refill<S: CharSource>(
        &mut self,
        source: &mut S,
        row_start: usize,
        buffer_pos: usize,
    ) -> Result<Refill> {
        if buffer_pos < self.filled {
            return Ok(Refill { rebase: 0, available: true });
        }

        if row_start == 0 && self.filled >= self.data.len() {
            self.grow()?;
        }

        let carry = self.filled - row_start;
        if row_start > 0 {
            self.data.copy_within(row_start..self.filled, 0);
        }
        if carry >= self.data.len() {
            self.grow()?;
        }

        let n = source.read(&mut self.data[carry..])?;
        self.filled = carry + n;
        Ok(Refill { rebase: row_start, available: n > 0 })
    }

    fn grow(&mut self) -> Result<()> {
        let old_cap = self.data.len();
        let new_cap = old_cap.checked_mul(2).unwrap_or(usize::MAX);
        if new_cap == old_cap {
            return Err(Error::buffer_overflow(new_cap));
        }
        let additional = new_cap - old_cap;
        if self.data.try_reserve_exact(additional).is_err() {
            return Err(Error::buffer_overflow(new_cap));
        }
        self.data.resize(new_cap, 0);
        trace!("dsv-core: grew character buffer {} -> {} bytes", old_cap, new_cap);
        Ok(())
    }
}
