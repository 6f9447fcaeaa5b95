use std::fmt;

use bstr::ByteSlice;

use crate::error::ConfigError;

/// Controls whether, and where, whitespace is trimmed from a field during
/// processing (see the field processor, C5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Trim {
    /// Do not trim whitespace.
    None,
    /// Trim leading/trailing whitespace before quote-stripping is
    /// considered.
    Outside,
    /// Trim leading/trailing whitespace found just inside the bounding
    /// quotes of a quoted field.
    Inside,
    /// Both `Outside` and `Inside`.
    Both,
}

impl Default for Trim {
    fn default() -> Trim {
        Trim::None
    }
}

impl Trim {
    pub(crate) fn trims_outside(self) -> bool {
        matches!(self, Trim::Outside | Trim::Both)
    }

    pub(crate) fn trims_inside(self) -> bool {
        matches!(self, Trim::Inside | Trim::Both)
    }
}

/// Computes the byte length that a single code unit contributes under some
/// target encoding.
///
/// This is the pluggable hook named in the spec as C6's "byte-count
/// encoding". The default implementation, [`Utf8Encoding`], assumes the
/// source bytes already *are* UTF-8 bytes, so each code unit contributes
/// exactly one byte; it exists so callers who never need anything fancier
/// don't have to supply their own.
pub trait ByteEncoding {
    /// Returns the number of encoded bytes that `code_unit` contributes.
    fn byte_length_of(&self, code_unit: u8) -> u32;
}

/// The trivial byte encoding: every code unit counts as one byte.
///
/// This is correct both for raw bytes and for UTF-8 input, since UTF-8
/// continuation and leading bytes are all still individual `u8` code
/// units in this tokenizer's model of "code unit" (see the GLOSSARY).
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8Encoding;

impl ByteEncoding for Utf8Encoding {
    #[inline]
    fn byte_length_of(&self, _code_unit: u8) -> u32 {
        1
    }
}

/// Configuration for a [`Parser`](crate::Parser), built via [`ReaderBuilder`].
#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) delimiter: Vec<u8>,
    pub(crate) quote: u8,
    pub(crate) escape: u8,
    pub(crate) comment: u8,
    pub(crate) allow_comments: bool,
    pub(crate) ignore_blank_lines: bool,
    pub(crate) ignore_quotes: bool,
    pub(crate) line_break_in_quoted_field_is_bad_data: bool,
    pub(crate) count_bytes: bool,
    pub(crate) buffer_capacity: usize,
    pub(crate) whitespace: Vec<u8>,
    pub(crate) trim: Trim,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            delimiter: vec![b','],
            quote: b'"',
            escape: b'"',
            comment: b'#',
            allow_comments: false,
            ignore_blank_lines: false,
            ignore_quotes: false,
            line_break_in_quoted_field_is_bad_data: false,
            count_bytes: false,
            buffer_capacity: 8 * (1 << 10),
            whitespace: vec![b' ', b'\t'],
            trim: Trim::None,
        }
    }
}

impl Config {
    pub(crate) fn is_whitespace(&self, b: u8) -> bool {
        self.whitespace.contains(&b)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        if self.delimiter == b"\r" || self.delimiter == b"\n" {
            return Err(ConfigError::DelimiterIsTerminator);
        }
        if self.delimiter.len() == 1 && self.delimiter[0] == self.quote {
            return Err(ConfigError::DelimiterIsQuote);
        }
        if self.quote == b'\r' || self.quote == b'\n' || self.quote == 0 {
            return Err(ConfigError::QuoteIsControl);
        }
        // Distinct from the DelimiterIsQuote check above: that one catches
        // a single-byte delimiter equal to the quote, this one catches a
        // multi-byte delimiter whose first byte is the quote, which would
        // make the state machine always read it as a quote-open instead.
        if self.delimiter.len() > 1 && self.delimiter[0] == self.quote {
            return Err(ConfigError::QuoteIsDelimiter);
        }
        if self.escape == b'\r' || self.escape == b'\n' {
            return Err(ConfigError::EscapeIsControl);
        }
        if self.delimiter.len() == 1 && self.delimiter[0] == self.escape {
            return Err(ConfigError::EscapeIsDelimiter);
        }
        Ok(())
    }
}

/// Context handed to the bad-data callback when the tokenizer detects
/// malformed quoting, or (when configured) a line terminator inside a
/// quoted field.
///
/// Borrowing the raw record bytes rather than copying them keeps the
/// common "no callback installed" and "callback only logs" paths
/// allocation-free.
pub struct BadDataContext<'a> {
    raw_record: &'a [u8],
    row: u64,
    raw_row: u64,
}

impl<'a> fmt::Debug for BadDataContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BadDataContext")
            .field("raw_record", &self.raw_record.as_bstr())
            .field("row", &self.row)
            .field("raw_row", &self.raw_row)
            .finish()
    }
}

impl<'a> BadDataContext<'a> {
    pub(crate) fn new(
        raw_record: &'a [u8],
        row: u64,
        raw_row: u64,
    ) -> BadDataContext<'a> {
        BadDataContext { raw_record, row, raw_row }
    }

    /// The raw, untransformed bytes of the record currently being
    /// processed, including its trailing line terminator if one was read.
    pub fn raw_record(&self) -> &[u8] {
        self.raw_record
    }

    /// The logical row (count of records emitted so far, including this
    /// one).
    pub fn row(&self) -> u64 {
        self.row
    }

    /// The raw row (count of source line terminators seen so far).
    pub fn raw_row(&self) -> u64 {
        self.raw_row
    }
}

/// What a bad-data callback wants the parser to do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BadDataAction {
    /// Continue parsing; the offending field keeps its best-effort value.
    Continue,
    /// Abort the [`field`](crate::Parser::field) or
    /// [`record`](crate::Parser::record) call that triggered the callback,
    /// with [`ErrorKind::Aborted`](crate::ErrorKind::Aborted). `next_record`
    /// itself never aborts, since bad data is only detected when a field is
    /// later processed.
    Abort,
}

impl Default for BadDataAction {
    fn default() -> BadDataAction {
        BadDataAction::Continue
    }
}

/// Builds a [`Parser`](crate::Parser) with various configuration knobs.
///
/// Mirrors the shape of this lineage's existing `ReaderBuilder` types:
/// chained `&mut self -> &mut Self` setters and a terminal, fallible
/// `build`.
#[derive(Clone, Debug, Default)]
pub struct ReaderBuilder {
    config: Config,
}

impl ReaderBuilder {
    /// Create a new builder for configuring a tokenizer.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// The field delimiter. May be more than one byte. Defaults to `","`.
    pub fn delimiter<D: Into<Vec<u8>>>(&mut self, delimiter: D) -> &mut Self {
        self.config.delimiter = delimiter.into();
        self
    }

    /// The quote character. Defaults to `"`.
    pub fn quote(&mut self, quote: u8) -> &mut Self {
        self.config.quote = quote;
        self
    }

    /// The escape character used inside quoted fields. Defaults to the
    /// quote character itself (doubled-quote escaping).
    pub fn escape(&mut self, escape: u8) -> &mut Self {
        self.config.escape = escape;
        self
    }

    /// The marker byte that begins a comment line. Defaults to `#`.
    pub fn comment(&mut self, comment: u8) -> &mut Self {
        self.config.comment = comment;
        self
    }

    /// Whether a record whose first byte is the comment marker is
    /// discarded instead of parsed. Defaults to `false`.
    pub fn allow_comments(&mut self, yes: bool) -> &mut Self {
        self.config.allow_comments = yes;
        self
    }

    /// Whether a record consisting only of a line terminator is skipped
    /// instead of yielding a single-empty-field record. Defaults to
    /// `false`.
    pub fn ignore_blank_lines(&mut self, yes: bool) -> &mut Self {
        self.config.ignore_blank_lines = yes;
        self
    }

    /// Whether quote characters are treated as ordinary content. Defaults
    /// to `false`.
    pub fn ignore_quotes(&mut self, yes: bool) -> &mut Self {
        self.config.ignore_quotes = yes;
        self
    }

    /// Whether a CR or LF observed inside a quoted field is reported to
    /// the bad-data callback. Defaults to `false`.
    pub fn line_break_in_quoted_field_is_bad_data(
        &mut self,
        yes: bool,
    ) -> &mut Self {
        self.config.line_break_in_quoted_field_is_bad_data = yes;
        self
    }

    /// Whether `byte_count` tracks the encoded byte length of the input
    /// (using the [`ByteEncoding`] supplied at `build` time, or
    /// [`Utf8Encoding`] by default). Defaults to `false`.
    pub fn count_bytes(&mut self, yes: bool) -> &mut Self {
        self.config.count_bytes = yes;
        self
    }

    /// The initial capacity, in bytes, of the internal character buffer.
    /// Defaults to 8 KiB; it grows on demand regardless.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    /// The set of bytes considered whitespace by the `Trim` options.
    /// Defaults to space and tab.
    pub fn whitespace<W: Into<Vec<u8>>>(&mut self, whitespace: W) -> &mut Self {
        self.config.whitespace = whitespace.into();
        self
    }

    /// The trim policy applied during field processing. Defaults to
    /// `Trim::None`.
    pub fn trim(&mut self, trim: Trim) -> &mut Self {
        self.config.trim = trim;
        self
    }

    pub(crate) fn build_config(&self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}
