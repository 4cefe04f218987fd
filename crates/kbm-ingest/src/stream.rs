//! Lazy reader over the top-level array of a CMS export
//!
//! Exports run to hundreds of megabytes, so the array is never materialized:
//! the reader walks the array punctuation itself and hands each element to
//! `serde_json` one at a time. Every pass over a file opens a new stream.
//!
//! Broken JSON ends the stream with [`KbmError::Parse`]. An element that is
//! well-formed but doesn't fit [`RawRecord`] yields [`KbmError::Malformed`]
//! and the stream moves on to the next element.

use kbm_common::{KbmError, MalformedRecord, RawRecord, RecordRef, Result};
use serde::de::Error as _;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read buffer size for export files
const READ_BUFFER_BYTES: usize = 1024 * 1024;

/// One element of an export as the drivers see it
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Record(RawRecord),
    /// Valid JSON that didn't fit the record shape
    Malformed(MalformedRecord),
}

impl Entry {
    /// Sort a stream item; anything but a malformed record stays an error
    pub fn from_item(item: Result<RawRecord>) -> Result<Self> {
        match item {
            Ok(raw) => Ok(Entry::Record(raw)),
            Err(KbmError::Malformed(bad)) => Ok(Entry::Malformed(bad)),
            Err(e) => Err(e),
        }
    }

    pub fn is_trailer(&self) -> bool {
        matches!(self, Entry::Record(raw) if raw.is_trailer())
    }

    pub fn is_published(&self) -> bool {
        match self {
            Entry::Record(raw) => raw.is_published(),
            Entry::Malformed(bad) => bad.published,
        }
    }

    pub fn record_ref(&self) -> RecordRef {
        match self {
            Entry::Record(raw) => raw.record_ref(),
            Entry::Malformed(bad) => bad.record.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the opening bracket
    Start,
    /// Inside the array, no element read yet
    First,
    /// Inside the array, at least one element read
    Rest,
    Done,
}

/// Forward-only iterator of records parsed out of a JSON array
pub struct RecordStream<R> {
    reader: R,
    index: usize,
    state: State,
}

impl RecordStream<BufReader<File>> {
    /// Open an export file for a single pass
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::with_capacity(READ_BUFFER_BYTES, file)))
    }
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            index: 0,
            state: State::Start,
        }
    }

    /// Number of records yielded so far
    pub fn position(&self) -> usize {
        self.index
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_token(&mut self) -> Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(pos) => {
                    let byte = buf[pos];
                    self.reader.consume(pos);
                    return Ok(Some(byte));
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    fn syntax_error(&self, msg: String) -> KbmError {
        KbmError::Parse {
            index: self.index,
            source: serde_json::Error::custom(msg),
        }
    }

    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        if self.state == State::Done {
            return Ok(None);
        }

        if self.state == State::Start {
            match self.peek_token()? {
                Some(b'[') => {
                    self.reader.consume(1);
                    self.state = State::First;
                }
                Some(other) => {
                    return Err(self.syntax_error(format!(
                        "expected '[' at start of export, found '{}'",
                        other as char
                    )));
                }
                None => return Err(self.syntax_error("export file is empty".to_string())),
            }
        }

        match (self.peek_token()?, self.state) {
            (Some(b']'), _) => {
                self.reader.consume(1);
                self.state = State::Done;
                return Ok(None);
            }
            (Some(b','), State::Rest) => {
                self.reader.consume(1);
                self.expect_object()?;
            }
            (Some(_), State::First) => self.expect_object()?,
            (Some(other), _) => {
                return Err(self.syntax_error(format!(
                    "expected ',' or ']' after record, found '{}'",
                    other as char
                )));
            }
            (None, _) => {
                return Err(self.syntax_error("unexpected end of file inside array".to_string()));
            }
        }

        // Elements are objects, which end on '}', so the deserializer never
        // reads past the element it was handed.
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let value = serde_json::Value::deserialize(&mut de).map_err(|source| KbmError::Parse {
            index: self.index,
            source,
        })?;

        let index = self.index;
        self.state = State::Rest;
        self.index += 1;

        RawRecord::deserialize(&value)
            .map(Some)
            .map_err(|e| KbmError::Malformed(MalformedRecord::from_value(index, &value, &e)))
    }

    fn expect_object(&mut self) -> Result<()> {
        match self.peek_token()? {
            Some(b'{') => Ok(()),
            Some(other) => Err(self.syntax_error(format!(
                "expected a record object, found '{}'",
                other as char
            ))),
            None => Err(self.syntax_error("unexpected end of file inside array".to_string())),
        }
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) if e.is_record_scoped() => Some(Err(e)),
            Err(e) => {
                // The record boundary can't be trusted after a parse error
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}
