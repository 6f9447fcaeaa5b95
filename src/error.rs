use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;

/// A crate-private constructor for `Error`.
fn new_error(kind: ErrorKind) -> Error {
    Error(Box::new(kind))
}

/// A type alias for `Result<T, dsv_core::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur while tokenizing delimited text.
///
/// There are some important scenarios where an error is impossible to
/// occur. For example, if a parser is used on an in-memory buffer and no
/// bad-data callback is installed, then no error can ever be produced by
/// `next_record`; malformed quoting is reported through the bad-data sink
/// instead (see [`BadDataContext`]).
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub(crate) fn io(err: io::Error) -> Error {
        new_error(ErrorKind::Io(err))
    }

    pub(crate) fn buffer_overflow(requested: usize) -> Error {
        new_error(ErrorKind::BufferOverflow { requested })
    }

    pub(crate) fn config(err: ConfigError) -> Error {
        new_error(ErrorKind::Config(err))
    }

    pub(crate) fn aborted() -> Error {
        new_error(ErrorKind::Aborted)
    }

    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns true if this is an I/O error.
    ///
    /// If this is true, the underlying `ErrorKind` is guaranteed to be
    /// `ErrorKind::Io`.
    pub fn is_io_error(&self) -> bool {
        matches!(*self.0, ErrorKind::Io(_))
    }
}

/// The specific type of an error.
#[derive(Debug)]
pub enum ErrorKind {
    /// An I/O error that occurred while pulling bytes from the character
    /// source.
    Io(io::Error),
    /// The character buffer or field-processing scratch buffer could not be
    /// grown to satisfy a request.
    BufferOverflow {
        /// The capacity, in bytes, that was requested and could not be
        /// allocated.
        requested: usize,
    },
    /// A configuration value was rejected at construction time.
    Config(ConfigError),
    /// The bad-data callback chose to abort parsing.
    Aborted,
    /// Hints that destructuring should not be exhaustive.
    ///
    /// This enum may grow additional variants, so this makes sure clients
    /// don't count on exhaustive matching.
    #[doc(hidden)]
    __Nonexhaustive,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::io(err)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self.0 {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::Config(ref err) => Some(err),
            ErrorKind::BufferOverflow { .. } => None,
            ErrorKind::Aborted => None,
            ErrorKind::__Nonexhaustive => unreachable!(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::BufferOverflow { requested } => write!(
                f,
                "failed to grow internal buffer to {} bytes",
                requested
            ),
            ErrorKind::Config(ref err) => err.fmt(f),
            ErrorKind::Aborted => {
                write!(f, "parsing aborted by the bad-data callback")
            }
            ErrorKind::__Nonexhaustive => unreachable!(),
        }
    }
}

/// An error returned when a `ReaderBuilder` is given an invalid combination
/// of delimiter, quote and escape configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The delimiter was empty.
    EmptyDelimiter,
    /// The delimiter equals `"\r"` or `"\n"`.
    DelimiterIsTerminator,
    /// The delimiter, as a one-character string, equals the quote.
    DelimiterIsQuote,
    /// The quote character is CR, LF or NUL.
    QuoteIsControl,
    /// The quote character equals the first byte of a multi-byte
    /// delimiter.
    QuoteIsDelimiter,
    /// The escape character is CR or LF.
    EscapeIsControl,
    /// The escape character, as a one-byte delimiter, equals the delimiter.
    EscapeIsDelimiter,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            ConfigError::EmptyDelimiter => "delimiter must not be empty",
            ConfigError::DelimiterIsTerminator => {
                "delimiter must not be \"\\r\" or \"\\n\""
            }
            ConfigError::DelimiterIsQuote => {
                "delimiter must not equal the quote character"
            }
            ConfigError::QuoteIsControl => {
                "quote character must not be CR, LF or NUL"
            }
            ConfigError::QuoteIsDelimiter => {
                "quote character must not equal the first byte of a multi-byte delimiter"
            }
            ConfigError::EscapeIsControl => {
                "escape character must not be CR or LF"
            }
            ConfigError::EscapeIsDelimiter => {
                "escape character must not equal a single-byte delimiter"
            }
        };
        write!(f, "invalid dsv-core configuration: {}", msg)
    }
}

impl StdError for ConfigError {}
