use log::debug;
use memchr::{memchr, memchr3};

use crate::config::{BadDataAction, BadDataContext, ByteEncoding, Config, ReaderBuilder, Utf8Encoding};
use crate::buffer::CharBuffer;
use crate::counters::Counters;
use crate::error::{Error, Result};
use crate::field_index::FieldIndex;
use crate::processor::{self, ScratchBuffer};
use crate::source::CharSource;

use std::borrow::Cow;

impl ReaderBuilder {
    /// Build a [`Parser`] over `source` with the trivial one-byte-per-code-unit
    /// byte encoding.
    pub fn build<S: CharSource>(&self, source: S) -> Result<Parser<S, Utf8Encoding>> {
        self.build_with_encoding(source, Utf8Encoding)
    }

    /// Build a [`Parser`] over `source`, using `encoding` to compute
    /// `byte_count` when it is enabled.
    pub fn build_with_encoding<S: CharSource, E: ByteEncoding>(
        &self,
        source: S,
        encoding: E,
    ) -> Result<Parser<S, E>> {
        let config = self.build_config().map_err(Error::config)?;
        Ok(Parser::with_config(config, source, encoding))
    }
}

/// How a single field's scan ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FieldEnd {
    Delimiter,
    Terminator,
    Eof,
}

/// Whether `scan_quoted` found a genuine, unescaped closing quote before
/// running out of input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum QuotedExit {
    Closed,
    Eof,
}

/// The streaming, single-pass record tokenizer (C4), tying together the
/// character source (C1), character buffer (C2), field index (C3), field
/// processor (C5) and position counters (C6).
///
/// `E` is the byte-count encoding; most callers never need anything other
/// than the default [`Utf8Encoding`].
pub struct Parser<S, E = Utf8Encoding> {
    source: S,
    config: Config,
    encoding: E,
    buffer: CharBuffer,
    field_index: FieldIndex,
    scratch: ScratchBuffer,
    counters: Counters,
    bad_data: Option<Box<dyn FnMut(BadDataContext) -> BadDataAction>>,

    /// Offset of the current record's first byte. Constant while fields of
    /// the current record are being scanned; advances to `pos` once a
    /// record is finalized (or a blank/comment line is skipped).
    row_start: usize,
    /// The scan cursor. Always `>= row_start`.
    pos: usize,
    /// Start of the field currently being scanned.
    field_start: usize,
    /// Number of quote bytes seen so far in the field currently being
    /// scanned.
    quote_count: u32,
    /// Nonzero while a multi-byte delimiter match is in progress; counts
    /// how many delimiter bytes have matched so far.
    delim_match: usize,
    /// Where the in-progress delimiter match started (valid only while
    /// `delim_match > 0`).
    match_start: usize,
    /// Where the field currently being scanned actually ends (excludes any
    /// delimiter/terminator bytes), set just before a scan function
    /// returns.
    content_end: usize,
    /// Whether the field currently being scanned opened a quote that was
    /// never closed before the input ended.
    unterminated_quote: bool,
    /// Whether the previous byte consumed anywhere in the stream was CR,
    /// for CRLF-as-one-raw-row bookkeeping.
    prev_was_cr: bool,

    /// Absolute buffer bounds of the most recently completed record's raw
    /// view (`[record_base, record_end)`), valid until the next call to
    /// [`next_record`](Parser::next_record).
    record_base: usize,
    record_end: usize,

    disposed: bool,
}

impl<S: CharSource> Parser<S, Utf8Encoding> {
    /// Create a parser over `source` with default configuration. Equivalent
    /// to `ReaderBuilder::new().build(source)`.
    pub fn new(source: S) -> Result<Parser<S, Utf8Encoding>> {
        ReaderBuilder::new().build(source)
    }
}

impl<S: CharSource, E: ByteEncoding> Parser<S, E> {
    fn with_config(config: Config, source: S, encoding: E) -> Parser<S, E> {
        let buffer = CharBuffer::with_capacity(config.buffer_capacity);
        Parser {
            source,
            config,
            encoding,
            buffer,
            field_index: FieldIndex::new(),
            scratch: ScratchBuffer::new(),
            counters: Counters::new(),
            bad_data: None,
            row_start: 0,
            pos: 0,
            field_start: 0,
            quote_count: 0,
            delim_match: 0,
            match_start: 0,
            content_end: 0,
            unterminated_quote: false,
            prev_was_cr: false,
            record_base: 0,
            record_end: 0,
            disposed: false,
        }
    }

    /// Install a sink invoked whenever field processing detects malformed
    /// quoting or (when configured) a line terminator inside a quoted
    /// field.
    pub fn on_bad_data<F>(&mut self, sink: F)
    where
        F: FnMut(BadDataContext) -> BadDataAction + 'static,
    {
        self.bad_data = Some(Box::new(sink));
    }

    /// The total number of code units consumed so far.
    pub fn char_count(&self) -> u64 {
        self.counters.char_count()
    }

    /// The encoded byte count consumed so far, if `count_bytes` was enabled.
    pub fn byte_count(&self) -> u64 {
        self.counters.byte_count()
    }

    /// The number of records delivered so far (including the current one,
    /// once `next_record` has returned `true`).
    pub fn row(&self) -> u64 {
        self.counters.row()
    }

    /// The number of source line terminators seen so far, including those
    /// inside quoted fields and in skipped blank/comment lines.
    pub fn raw_row(&self) -> u64 {
        self.counters.raw_row()
    }

    /// The number of fields in the current record.
    pub fn field_count(&self) -> usize {
        self.field_index.len()
    }

    /// The raw, unprocessed bytes of field `i` of the current record.
    pub fn field_raw(&self, i: usize) -> Option<&[u8]> {
        let d = self.field_index.get(i)?;
        let start = self.record_base + d.start;
        Some(&self.buffer.as_slice()[start..start + d.length])
    }

    /// The raw bytes of the current record, including its trailing line
    /// terminator if one was read. Valid only until the next call to
    /// `next_record`.
    pub fn raw_record(&self) -> &[u8] {
        &self.buffer.as_slice()[self.record_base..self.record_end]
    }

    /// The processed value of field `i`: trimmed, unquoted and
    /// escape-unfolded according to the parser's configuration.
    ///
    /// Returns `Err` only if a bad-data callback is installed and chooses
    /// to abort.
    pub fn field(&mut self, i: usize) -> Result<Option<Cow<'_, [u8]>>> {
        let d = match self.field_index.get(i) {
            Some(d) => *d,
            None => return Ok(None),
        };
        let start = self.record_base + d.start;
        let raw = &self.buffer.as_slice()[start..start + d.length];
        let processed = processor::process_field(
            raw,
            d.quote_count,
            d.unterminated_quote,
            &mut self.scratch,
            &self.config,
        )?;
        if processed.bad_data {
            fire_bad_data(
                &mut self.bad_data,
                &self.buffer.as_slice()[self.record_base..self.record_end],
                self.counters.row(),
                self.counters.raw_row(),
            )?;
        }
        Ok(Some(processed.value))
    }

    /// The processed value of every field in the current record, in order.
    ///
    /// Every field's value is independently owned (not borrowed from the
    /// internal buffer or scratch space), since escape-unfolded fields
    /// share the same reusable scratch buffer across iterations and can't
    /// all stay borrowed from it at once; use [`field`](Parser::field) for
    /// a single field to avoid that copy.
    pub fn record(&mut self) -> Result<Vec<Cow<'_, [u8]>>> {
        let n = self.field_count();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let d = *self.field_index.get(i).expect("index in bounds");
            let start = self.record_base + d.start;
            let raw = &self.buffer.as_slice()[start..start + d.length];
            let processed = processor::process_field(
                raw,
                d.quote_count,
                d.unterminated_quote,
                &mut self.scratch,
                &self.config,
            )?;
            if processed.bad_data {
                fire_bad_data(
                    &mut self.bad_data,
                    &self.buffer.as_slice()[self.record_base..self.record_end],
                    self.counters.row(),
                    self.counters.raw_row(),
                )?;
            }
            out.push(Cow::Owned(processed.value.into_owned()));
        }
        Ok(out)
    }

    /// Release the parser's internal buffers. Safe to call any number of
    /// times; only the first call has any effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.field_index.clear();
    }

    // ---- C4: the state machine -------------------------------------

    /// Advance to the next record. Returns `Ok(false)` when the input is
    /// exhausted and no further record can be produced.
    pub fn next_record(&mut self) -> Result<bool> {
        self.field_index.clear();
        self.pos = self.row_start;
        self.field_start = self.row_start;
        self.match_start = self.row_start;
        self.delim_match = 0;

        loop {
            if !self.ensure_byte()? {
                return Ok(false);
            }
            let b0 = self.buffer.byte_at(self.pos);
            if self.config.allow_comments && b0 == self.config.comment {
                self.skip_comment_line()?;
                self.row_start = self.pos;
                self.field_start = self.row_start;
                self.match_start = self.row_start;
                continue;
            }
            if self.config.ignore_blank_lines && (b0 == b'\r' || b0 == b'\n') {
                self.skip_blank_line(b0)?;
                self.row_start = self.pos;
                self.field_start = self.row_start;
                self.match_start = self.row_start;
                continue;
            }
            break;
        }

        let record_base = self.row_start;
        loop {
            self.field_start = self.pos;
            self.quote_count = 0;
            let end = self.parse_one_field()?;
            let content_end = self.content_end;

            if end == FieldEnd::Eof
                && content_end == self.field_start
                && self.field_index.is_empty()
            {
                return Ok(false);
            }

            let length = content_end - self.field_start;
            self.field_index.add(
                self.field_start - record_base,
                length,
                self.quote_count,
                self.unterminated_quote,
            );
            self.unterminated_quote = false;

            match end {
                FieldEnd::Delimiter => continue,
                FieldEnd::Terminator | FieldEnd::Eof => {
                    self.counters.bump_row();
                    self.record_base = record_base;
                    self.record_end = self.pos;
                    self.row_start = self.pos;
                    return Ok(true);
                }
            }
        }
    }

    fn parse_one_field(&mut self) -> Result<FieldEnd> {
        if !self.ensure_byte()? {
            self.content_end = self.pos;
            return Ok(FieldEnd::Eof);
        }
        let first = self.buffer.byte_at(self.pos);
        if !self.config.ignore_quotes && first == self.config.quote {
            self.quote_count += 1;
            self.advance_byte(first);
            match self.scan_quoted()? {
                QuotedExit::Closed => self.scan_plain(),
                QuotedExit::Eof => {
                    self.unterminated_quote = true;
                    self.content_end = self.pos;
                    Ok(FieldEnd::Eof)
                }
            }
        } else {
            self.scan_plain()
        }
    }

    fn scan_quoted(&mut self) -> Result<QuotedExit> {
        let doubled = self.config.escape == self.config.quote;
        let mut pending_escape = false;
        loop {
            if !self.ensure_byte()? {
                return Ok(QuotedExit::Eof);
            }
            let b = self.buffer.byte_at(self.pos);

            if !doubled {
                if pending_escape {
                    if b == self.config.quote {
                        self.quote_count += 1;
                    }
                    self.advance_byte(b);
                    pending_escape = false;
                    continue;
                }
                if b == self.config.escape {
                    self.advance_byte(b);
                    pending_escape = true;
                    continue;
                }
                if b == self.config.quote {
                    self.quote_count += 1;
                    self.advance_byte(b);
                    return Ok(QuotedExit::Closed);
                }
                self.advance_byte(b);
                continue;
            }

            if b == self.config.quote {
                self.quote_count += 1;
                self.advance_byte(b);
                if self.ensure_byte()? && self.buffer.byte_at(self.pos) == self.config.quote {
                    self.quote_count += 1;
                    self.advance_byte(self.config.quote);
                    continue;
                }
                return Ok(QuotedExit::Closed);
            }
            self.advance_byte(b);
        }
    }

    fn scan_plain(&mut self) -> Result<FieldEnd> {
        loop {
            if self.delim_match == 0 {
                if let Some(consumed) = self.fast_forward_plain()? {
                    if consumed {
                        continue;
                    }
                } else {
                    self.content_end = self.pos;
                    return Ok(FieldEnd::Eof);
                }
            }
            if !self.ensure_byte()? {
                self.content_end = self.pos;
                return Ok(FieldEnd::Eof);
            }
            let b = self.buffer.byte_at(self.pos);

            if self.delim_match > 0 {
                if b == self.config.delimiter[self.delim_match] {
                    self.delim_match += 1;
                    if self.delim_match == self.config.delimiter.len() {
                        self.advance_byte(b);
                        self.content_end = self.match_start;
                        self.delim_match = 0;
                        return Ok(FieldEnd::Delimiter);
                    }
                    self.advance_byte(b);
                    continue;
                }
                self.delim_match = 0;
                continue;
            }

            if b == self.config.delimiter[0] {
                self.match_start = self.pos;
                self.delim_match = 1;
                self.advance_byte(b);
                if self.delim_match == self.config.delimiter.len() {
                    self.content_end = self.match_start;
                    self.delim_match = 0;
                    return Ok(FieldEnd::Delimiter);
                }
                continue;
            }
            if b == b'\r' {
                self.content_end = self.pos;
                self.advance_byte(b);
                if self.ensure_byte()? && self.buffer.byte_at(self.pos) == b'\n' {
                    self.advance_byte(b'\n');
                }
                return Ok(FieldEnd::Terminator);
            }
            if b == b'\n' {
                self.content_end = self.pos;
                self.advance_byte(b);
                return Ok(FieldEnd::Terminator);
            }
            if !self.config.ignore_quotes && b == self.config.quote {
                self.quote_count += 1;
            }
            self.advance_byte(b);
        }
    }

    /// Batches ordinary-content bytes up to the next byte that could
    /// possibly change state (the delimiter's first byte, CR, LF, or, when
    /// quotes are tracked, the quote byte), using `memchr` to locate that
    /// boundary. Returns `Some(true)` if it advanced `pos` and the caller
    /// should re-check for more fast-forwardable input, `Some(false)` if it
    /// made no progress (nothing interesting buffered right now — fall
    /// through to the byte-at-a-time path to refill), or `None` at true
    /// end-of-stream.
    fn fast_forward_plain(&mut self) -> Result<Option<bool>> {
        if !self.ensure_byte()? {
            return Ok(None);
        }
        let filled = self.buffer.filled();
        let hay = &self.buffer.as_slice()[self.pos..filled];
        if hay.is_empty() {
            return Ok(Some(false));
        }
        let delim0 = self.config.delimiter[0];
        let bound = memchr3(delim0, b'\r', b'\n', hay).unwrap_or(hay.len());
        let hit = if !self.config.ignore_quotes {
            match memchr(self.config.quote, &hay[..bound]) {
                Some(q) => q,
                None => bound,
            }
        } else {
            bound
        };
        if hit == 0 {
            return Ok(Some(false));
        }
        for _ in 0..hit {
            let b = self.buffer.byte_at(self.pos);
            self.advance_byte(b);
        }
        Ok(Some(true))
    }

    fn skip_comment_line(&mut self) -> Result<()> {
        loop {
            if !self.ensure_byte()? {
                return Ok(());
            }
            let b = self.buffer.byte_at(self.pos);
            if b == b'\r' {
                self.advance_byte(b);
                if self.ensure_byte()? && self.buffer.byte_at(self.pos) == b'\n' {
                    self.advance_byte(b'\n');
                }
                return Ok(());
            }
            if b == b'\n' {
                self.advance_byte(b);
                return Ok(());
            }
            self.advance_byte(b);
        }
    }

    fn skip_blank_line(&mut self, first: u8) -> Result<()> {
        self.advance_byte(first);
        if first == b'\r' && self.ensure_byte()? && self.buffer.byte_at(self.pos) == b'\n' {
            self.advance_byte(b'\n');
        }
        Ok(())
    }

    /// Implements the C2 `ensure_next_char` contract, rebasing every
    /// position this parser holds when the buffer compacts.
    fn ensure_byte(&mut self) -> Result<bool> {
        let refill = self.buffer.refill(&mut self.source, self.row_start, self.pos)?;
        if refill.rebase > 0 {
            self.row_start -= refill.rebase;
            self.pos -= refill.rebase;
            self.field_start -= refill.rebase;
            if self.delim_match > 0 {
                self.match_start -= refill.rebase;
            }
        }
        Ok(refill.available)
    }

    #[inline]
    fn advance_byte(&mut self, b: u8) {
        self.counters.consume_char(b, self.config.count_bytes, &self.encoding);
        if b == b'\r' {
            self.counters.bump_raw_row();
            self.prev_was_cr = true;
        } else if b == b'\n' {
            if !self.prev_was_cr {
                self.counters.bump_raw_row();
            }
            self.prev_was_cr = false;
        } else {
            self.prev_was_cr = false;
        }
        self.pos += 1;
    }
}

/// Fires the bad-data callback, if one is installed, and translates its
/// verdict into a `Result`.
///
/// Takes its inputs as disjoint parameters rather than `&mut self` so that
/// `field` and `record` can call it while still holding a borrow of
/// `self.buffer` for the `Cow` they're about to return.
fn fire_bad_data(
    bad_data: &mut Option<Box<dyn FnMut(BadDataContext) -> BadDataAction>>,
    raw_record: &[u8],
    row: u64,
    raw_row: u64,
) -> Result<()> {
    let action = match bad_data.as_mut() {
        Some(sink) => sink(BadDataContext::new(raw_record, row, raw_row)),
        None => BadDataAction::Continue,
    };
    debug!(
        "dsv-core: bad data at row {} (raw_row {}): {:?}",
        row, raw_row, action
    );
    match action {
        BadDataAction::Continue => Ok(()),
        BadDataAction::Abort => Err(Error::aborted()),
    }
}
