use quickcheck::{quickcheck, TestResult};

use dsv_core::{ChunkedSource, Parser, ReaderBuilder, SliceSource};

/// Drains every record of `input` into a flat `Vec<(field strings)>`, using
/// the given buffer capacity and source chunk size.
fn drain(input: &[u8], buffer_capacity: usize, chunk: usize) -> Vec<Vec<Vec<u8>>> {
    let mut p = ReaderBuilder::new()
        .buffer_capacity(buffer_capacity)
        .build(ChunkedSource::new(input, chunk))
        .unwrap();
    let mut records = Vec::new();
    while p.next_record().unwrap() {
        let fields: Vec<Vec<u8>> =
            p.record().unwrap().into_iter().map(|f| f.into_owned()).collect();
        records.push(fields);
    }
    records
}

quickcheck! {
    /// Field count determinism: the sequence of (record, field) values does
    /// not depend on how the input is chunked or how big the internal
    /// buffer is, only on the bytes themselves.
    fn field_sequence_independent_of_chunking(data: Vec<u8>) -> TestResult {
        // Keep inputs commas, newlines, quotes and letters so we exercise
        // real field boundaries and quoted-field escaping, not just plain
        // content, instead of mostly-empty or mostly-control-byte noise.
        let input: Vec<u8> = data
            .into_iter()
            .map(|b| match b % 5 {
                0 => b',',
                1 => b'\n',
                2 => b'"',
                _ => b'a' + (b % 26),
            })
            .collect();
        if input.is_empty() {
            return TestResult::discard();
        }

        let baseline = drain(&input, 8192, input.len().max(1));
        for &(cap, chunk) in &[(1usize, 1usize), (4, 3), (16, 7), (64, 1)] {
            if drain(&input, cap, chunk) != baseline {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }
}

quickcheck! {
    /// Raw-record reassembly: concatenating every `raw_record()` view
    /// reproduces the entire input up to and including the last
    /// terminator, regardless of buffer size.
    fn raw_record_reassembly(data: Vec<u8>) -> TestResult {
        let input: Vec<u8> = data
            .into_iter()
            .map(|b| match b % 5 {
                0 => b',',
                1 => b'\r',
                2 => b'\n',
                _ => b'a' + (b % 26),
            })
            .collect();
        if input.is_empty() {
            return TestResult::discard();
        }

        let mut p = ReaderBuilder::new()
            .buffer_capacity(4)
            .build(SliceSource::new(&input))
            .unwrap();
        let mut reassembled = Vec::new();
        while p.next_record().unwrap() {
            reassembled.extend_from_slice(p.raw_record());
        }
        // Whatever trailing bytes never formed a complete record (e.g. a
        // final partial line with no terminator) are still captured,
        // since `next_record` emits a final record at EOF whenever any
        // content was accumulated for it.
        TestResult::from_bool(reassembled == input)
    }
}

quickcheck! {
    /// Counter monotonicity: none of the four counters ever decreases
    /// across successive `next_record` calls.
    fn counters_are_monotonic(data: Vec<u8>) -> TestResult {
        let input: Vec<u8> = data
            .into_iter()
            .map(|b| match b % 4 {
                0 => b',',
                1 => b'\n',
                _ => b'a' + (b % 26),
            })
            .collect();
        if input.is_empty() {
            return TestResult::discard();
        }

        let mut p = ReaderBuilder::new()
            .count_bytes(true)
            .build(SliceSource::new(&input))
            .unwrap();
        let (mut cc, mut br, mut row, mut rr) = (0u64, 0u64, 0u64, 0u64);
        while p.next_record().unwrap() {
            if p.char_count() < cc
                || p.byte_count() < br
                || p.row() < row
                || p.raw_row() < rr
            {
                return TestResult::failed();
            }
            cc = p.char_count();
            br = p.byte_count();
            row = p.row();
            rr = p.raw_row();
        }
        TestResult::passed()
    }
}

fn drain_with_delimiter(
    input: &[u8],
    delimiter: &str,
    buffer_capacity: usize,
    chunk: usize,
) -> Vec<Vec<Vec<u8>>> {
    let mut p = ReaderBuilder::new()
        .delimiter(delimiter)
        .buffer_capacity(buffer_capacity)
        .build(ChunkedSource::new(input, chunk))
        .unwrap();
    let mut records = Vec::new();
    while p.next_record().unwrap() {
        let fields: Vec<Vec<u8>> =
            p.record().unwrap().into_iter().map(|f| f.into_owned()).collect();
        records.push(fields);
    }
    records
}

quickcheck! {
    /// Field count determinism holds just as well for a multi-byte
    /// delimiter as for the single-byte default, including when a chunk
    /// boundary lands in the middle of a partially matched delimiter.
    fn field_sequence_independent_of_chunking_multi_byte_delimiter(
        data: Vec<u8>
    ) -> TestResult {
        let input: Vec<u8> = data
            .into_iter()
            .map(|b| match b % 6 {
                0 => b':',
                1 => b'#',
                2 => b'\n',
                3 => b'"',
                _ => b'a' + (b % 26),
            })
            .collect();
        if input.is_empty() {
            return TestResult::discard();
        }

        let baseline = drain_with_delimiter(&input, "::#", 8192, input.len().max(1));
        for &(cap, chunk) in &[(1usize, 1usize), (4, 3), (16, 7)] {
            if drain_with_delimiter(&input, "::#", cap, chunk) != baseline {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }
}

#[test]
fn byte_count_matches_char_count_under_utf8_encoding() {
    let input = b"one,two,three\r\nfour,five,six\r\n";
    let mut p = ReaderBuilder::new()
        .count_bytes(true)
        .build(SliceSource::new(input))
        .unwrap();
    while p.next_record().unwrap() {}
    assert_eq!(p.byte_count(), input.len() as u64);
    assert_eq!(p.char_count(), input.len() as u64);
}

#[test]
fn dispose_is_idempotent() {
    let mut p = Parser::new(SliceSource::new(b"a,b\r\n")).unwrap();
    assert!(p.next_record().unwrap());
    p.dispose();
    p.dispose();
    p.dispose();
}

quickcheck! {
    fn buffer_size_one_never_panics(data: Vec<u8>) -> TestResult {
        let input: Vec<u8> = data
            .into_iter()
            .map(|b| match b % 4 {
                0 => b',',
                1 => b'\n',
                _ => b'a' + (b % 26),
            })
            .collect();
        if input.is_empty() {
            return TestResult::discard();
        }
        let mut p = ReaderBuilder::new()
            .buffer_capacity(1)
            .build(ChunkedSource::new(&input, 1))
            .unwrap();
        while p.next_record().unwrap() {
            let _ = p.record().unwrap();
        }
        TestResult::passed()
    }
}
