use std::borrow::Cow;

use log::trace;

use crate::config::Config;
use crate::error::{Error, Result};

/// The result of running a raw field through the five-stage processing
/// pipeline (C5).
pub(crate) struct ProcessedField<'a> {
    pub(crate) value: Cow<'a, [u8]>,
    /// Whether the bad-data callback should fire for this field.
    pub(crate) bad_data: bool,
}

/// A reusable, doubling-on-demand scratch buffer for escape unfolding.
///
/// Owned by the `Parser` and passed into `process_field` by mutable
/// reference so that fields requiring escape unfolding don't each force a
/// fresh heap allocation; the buffer's capacity persists and only grows
/// when a field's unfolded content doesn't fit in what's already there.
#[derive(Debug)]
pub(crate) struct ScratchBuffer {
    data: Vec<u8>,
    len: usize,
}

impl ScratchBuffer {
    pub(crate) fn new() -> ScratchBuffer {
        ScratchBuffer { data: vec![0u8; 64], len: 0 }
    }

    #[inline]
    fn clear(&mut self) {
        self.len = 0;
    }

    #[inline]
    fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    fn push(&mut self, b: u8) -> Result<()> {
        if self.len == self.data.len() {
            self.grow()?;
        }
        self.data[self.len] = b;
        self.len += 1;
        Ok(())
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
        trace!(
            "dsv-core: grew field-processing scratch buffer {} -> {} bytes",
            old_cap, new_cap
        );
        Ok(())
    }
}

/// Runs the field-processing pipeline over `raw`: outer trim, quote strip,
/// inner trim, embedded-line-terminator check, then escape unfolding.
///
/// `quote_count` and `unterminated_quote` come from the state machine (C4)
/// and describe what it saw while scanning `raw`, so this function never
/// has to re-scan for quote characters itself except when it must actually
/// unfold escapes, in which case it writes into `scratch` rather than
/// allocating its own buffer.
///
/// This is a pure function over its inputs; it reports whether bad data was
/// seen rather than invoking a callback directly, so the caller (the
/// `Parser`) decides what "bad data" means for its own bookkeeping (firing
/// the user's callback, possibly aborting) without this function needing to
/// know about either.
pub(crate) fn process_field<'a>(
    raw: &'a [u8],
    quote_count: u32,
    unterminated_quote: bool,
    scratch: &'a mut ScratchBuffer,
    config: &Config,
) -> Result<ProcessedField<'a>> {
    let mut slice = raw;
    if config.trim.trims_outside() {
        slice = trim(slice, config);
    }

    if quote_count == 0 || config.ignore_quotes {
        return Ok(ProcessedField { value: Cow::Borrowed(slice), bad_data: false });
    }

    if unterminated_quote {
        // The state machine never found a closing quote before the input
        // ended. The leading byte is still the quote marker, not content;
        // strip it and report the rest as the best-effort value.
        let content = &slice[1.min(slice.len())..];
        return Ok(ProcessedField { value: Cow::Borrowed(content), bad_data: true });
    }

    let quoted = slice.len() >= 2
        && slice[0] == config.quote
        && slice[slice.len() - 1] == config.quote;
    if !quoted {
        return Ok(ProcessedField { value: Cow::Borrowed(slice), bad_data: true });
    }
    slice = &slice[1..slice.len() - 1];

    if config.trim.trims_inside() {
        slice = trim(slice, config);
    }

    let mut bad_data = false;
    if config.line_break_in_quoted_field_is_bad_data
        && slice.iter().any(|&b| b == b'\r' || b == b'\n')
    {
        bad_data = true;
    }

    if quote_count == 2 {
        // Only the bounding quotes were ever seen; nothing to unfold.
        return Ok(ProcessedField { value: Cow::Borrowed(slice), bad_data });
    }

    let (unfolded, escape_bad_data) = unfold_escapes(slice, config, scratch)?;
    Ok(ProcessedField { value: Cow::Borrowed(unfolded), bad_data: bad_data || escape_bad_data })
}

fn trim<'a>(slice: &'a [u8], config: &Config) -> &'a [u8] {
    let mut start = 0;
    let mut end = slice.len();
    while start < end && config.is_whitespace(slice[start]) {
        start += 1;
    }
    while end > start && config.is_whitespace(slice[end - 1]) {
        end -= 1;
    }
    &slice[start..end]
}

/// Walks `slice`, replacing every `escape` immediately followed by `quote`
/// with a single `quote`, writing the result into `scratch`. An `escape`
/// not followed by `quote` is left in place and reported as bad data.
fn unfold_escapes<'a>(
    slice: &[u8],
    config: &Config,
    scratch: &'a mut ScratchBuffer,
) -> Result<(&'a [u8], bool)> {
    scratch.clear();
    let mut bad_data = false;
    let mut i = 0;
    while i < slice.len() {
        let b = slice[i];
        if b == config.escape && i + 1 < slice.len() && slice[i + 1] == config.quote {
            scratch.push(config.quote)?;
            i += 2;
            continue;
        }
        if b == config.escape {
            bad_data = true;
        }
        scratch.push(b)?;
        i += 1;
    }
    Ok((scratch.as_slice(), bad_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::default()
    }

    #[test]
    fn unquoted_field_passes_through() {
        let c = cfg();
        let mut s = ScratchBuffer::new();
        let p = process_field(b"hello", 0, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"hello");
        assert!(!p.bad_data);
    }

    #[test]
    fn quoted_field_with_no_escapes_is_zero_copy() {
        let c = cfg();
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"one\"", 2, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"one");
        assert!(!p.bad_data);
        assert!(matches!(p.value, Cow::Borrowed(_)));
    }

    #[test]
    fn quoted_field_unfolds_doubled_quote() {
        let c = cfg();
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"two \"\" 2\"", 4, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"two \" 2");
        assert!(!p.bad_data);
    }

    #[test]
    fn stray_quote_in_unquoted_field_is_bad_data() {
        let c = cfg();
        let mut s = ScratchBuffer::new();
        let p = process_field(b" a\"bc\",", 2, false, &mut s, &c).unwrap();
        assert!(p.bad_data);
        assert_eq!(&*p.value, b" a\"bc\",");
    }

    #[test]
    fn unterminated_quote_strips_leading_marker() {
        let c = cfg();
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"c\r\nd,e,f\r\n", 1, true, &mut s, &c).unwrap();
        assert!(p.bad_data);
        assert_eq!(&*p.value, b"c\r\nd,e,f\r\n");
    }

    #[test]
    fn zero_length_unterminated_quote_is_bad_data_empty_string() {
        let c = cfg();
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"", 1, true, &mut s, &c).unwrap();
        assert!(p.bad_data);
        assert_eq!(&*p.value, b"");
    }

    #[test]
    fn custom_escape_char_unfolds() {
        let mut c = cfg();
        c.escape = b'\\';
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"a\\\"b\"", 3, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"a\"b");
        assert!(!p.bad_data);
    }

    #[test]
    fn dangling_escape_is_bad_data() {
        let mut c = cfg();
        c.escape = b'\\';
        let mut s = ScratchBuffer::new();
        // quote_count is forced above 2 so the walk path actually runs;
        // the state machine would only ever produce this when more than
        // the two bounding quotes were seen.
        let p = process_field(b"\"a\\b\"\"\"", 4, false, &mut s, &c).unwrap();
        assert!(p.bad_data);
    }

    #[test]
    fn quote_count_two_skips_the_walk_entirely() {
        let mut c = cfg();
        c.escape = b'\\';
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"a\\b\"", 2, false, &mut s, &c).unwrap();
        assert!(!p.bad_data);
        assert_eq!(&*p.value, b"a\\b");
    }

    #[test]
    fn outer_trim_runs_before_quote_detection() {
        let mut c = cfg();
        c.trim = crate::config::Trim::Outside;
        let mut s = ScratchBuffer::new();
        let p = process_field(b"  \"one\"  ", 2, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"one");
    }

    #[test]
    fn inner_trim_only_applies_to_quoted_fields() {
        let mut c = cfg();
        c.trim = crate::config::Trim::Inside;
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\" one \"", 2, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"one");

        let p = process_field(b" one ", 0, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b" one ");
    }

    #[test]
    fn line_break_in_quoted_field_flagged_when_configured() {
        let mut c = cfg();
        c.line_break_in_quoted_field_is_bad_data = true;
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"a\nb\"", 2, false, &mut s, &c).unwrap();
        assert!(p.bad_data);
        assert_eq!(&*p.value, b"a\nb");
    }

    #[test]
    fn ignore_quotes_passes_quote_bytes_through_untouched() {
        let mut c = cfg();
        c.ignore_quotes = true;
        let mut s = ScratchBuffer::new();
        let p = process_field(b"\"one\"", 0, false, &mut s, &c).unwrap();
        assert_eq!(&*p.value, b"\"one\"");
        assert!(!p.bad_data);
    }

    #[test]
    fn scratch_buffer_capacity_is_reused_and_grows_on_demand() {
        let mut s = ScratchBuffer::new();
        assert_eq!(s.data.len(), 64);
        let c = cfg();

        // 40 repetitions of `xx""`, bounded by the opening/closing quote:
        // 160 interior bytes, unfolding to 120 bytes (past the buffer's
        // starting 64-byte capacity), with quote_count = 2 (bounding) + 2
        // per repetition.
        let mut raw = vec![b'"'];
        for _ in 0..40 {
            raw.extend_from_slice(b"xx\"\"");
        }
        raw.push(b'"');
        let p = process_field(&raw, 2 + 40 * 2, false, &mut s, &c).unwrap();
        assert_eq!(p.value.len(), 120);
        assert!(!p.bad_data);
        assert!(s.data.len() >= 120);
        let first_cap = s.data.len();

        // Reusing the same scratch buffer for a second, shorter field
        // should not need to grow it again.
        let p2 = process_field(b"\"a\"\"b\"", 4, false, &mut s, &c).unwrap();
        assert_eq!(&*p2.value, b"a\"b");
        assert_eq!(s.data.len(), first_cap);
    }
}
