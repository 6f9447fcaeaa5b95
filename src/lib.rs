/*!
A streaming, single-pass tokenizer for delimited text ("CSV").

This crate covers only the low-level record tokenizer and field-processing
pipeline: a state machine that turns a streaming byte source into a
sequence of records, each a sequence of raw or processed fields, plus the
post-processing pipeline (quote stripping, escape unfolding, trimming).
Header-to-struct mapping, serialization, and file/encoding/transport
concerns are all left to callers built on top of this crate.

```
use dsv_core::{Parser, SliceSource};

let mut parser = Parser::new(SliceSource::new(b"a,b,c\n1,2,3\n")).unwrap();
while parser.next_record().unwrap() {
    let record = parser.record().unwrap();
    assert_eq!(record.len(), 3);
}
```
*/

pub use config::{
    BadDataAction, BadDataContext, ByteEncoding, ReaderBuilder, Trim, Utf8Encoding,
};
pub use error::{ConfigError, Error, ErrorKind, Result};
pub use parser::Parser;
pub use source::{ChunkedSource, CharSource, IoCharSource, SliceSource};

mod buffer;
mod config;
mod counters;
mod error;
mod field_index;
mod parser;
mod processor;
mod source;
