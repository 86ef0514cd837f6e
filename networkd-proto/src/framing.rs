// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A minimal single-purpose JSON subset used for the client command
//! protocol. This is deliberately not a general JSON parser: the wire
//! contract tolerates leading whitespace and arbitrary content outside
//! strings, and arrays are implicit (no bracket matching is performed on
//! read — only on write).

use std::fmt;

/// One parsed string element, or the terminal sentinel signalling that no
/// further elements remain in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextItem {
    Value(String),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("string element exceeded buffer capacity")]
    Overflow,
    #[error("invalid backslash escape: \\{0}")]
    InvalidEscape(char),
}

impl fmt::Display for NextItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextItem::Value(v) => write!(f, "{v}"),
            NextItem::End => write!(f, "<end>"),
        }
    }
}

/// Reads one string element out of `text`, handling backslash escapes for
/// `n`, `"`, `\`, `/`, `b`, `r`. Any other escape is a protocol error.
/// `max_len` bounds the accumulated value; hitting it is a protocol error
/// too (one byte of the bound is reserved the way a C string reserves a
/// trailing NUL, so a `max_len`-byte buffer holds at most `max_len - 1`
/// characters).
///
/// Returns the parsed item together with the remainder of `text` starting
/// just after the element (or at the unresolved tail, on error).
pub fn next(text: &str, max_len: usize) -> Result<(NextItem, &str), FramingError> {
    let cap = max_len.saturating_sub(1);
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i] != b'"' {
        i += 1;
    }
    if i >= bytes.len() {
        return Ok((NextItem::End, &text[i..]));
    }
    i += 1; // skip opening quote
    let mut buf = String::with_capacity(cap);
    loop {
        if i >= bytes.len() {
            // Unterminated string: treat like end of input, nothing more
            // to offer the caller.
            return Ok((NextItem::End, &text[text.len()..]));
        }
        let c = bytes[i];
        if c == b'"' {
            i += 1;
            return Ok((NextItem::Value(buf), &text[i..]));
        }
        if c == b'\\' {
            i += 1;
            if i >= bytes.len() {
                return Ok((NextItem::End, &text[text.len()..]));
            }
            let unescaped = match bytes[i] {
                b'n' => '\n',
                b'"' => '"',
                b'\\' => '\\',
                b'/' => '/',
                b'b' => '\u{8}',
                b'r' => '\r',
                other => return Err(FramingError::InvalidEscape(other as char)),
            };
            if buf.len() >= cap {
                return Err(FramingError::Overflow);
            }
            buf.push(unescaped);
            i += 1;
        } else {
            if buf.len() >= cap {
                return Err(FramingError::Overflow);
            }
            // The wire format is ASCII-oriented; treat each input byte as
            // one character rather than re-decoding UTF-8 boundaries.
            buf.push(c as char);
            i += 1;
        }
    }
}

/// Produces a fragment safe to embed between quotes: `"` becomes `\"`, LF
/// becomes `\n`, every other byte passes through unchanged.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Incrementally builds a `["a", "b", …]` array into a `String`.
pub struct ArrayWriter {
    out: String,
    first: bool,
}

impl ArrayWriter {
    pub fn start() -> Self {
        let mut out = String::new();
        out.push('[');
        ArrayWriter { out, first: true }
    }

    pub fn send(&mut self, s: &str) {
        if !self.first {
            self.out.push(',');
        }
        self.first = false;
        self.out.push('"');
        self.out.push_str(&escape(s));
        self.out.push('"');
    }

    pub fn finish(mut self) -> String {
        self.out.push(']');
        self.out
    }
}

/// Shortcut for the common one-element array reply.
pub fn singleton(s: &str) -> String {
    let mut w = ArrayWriter::start();
    w.send(s);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_through_escape_and_next() {
        for text in ["f\no\\o bar", "plain", "a\nb", "\"quoted\""] {
            let escaped = escape(text);
            let wire = format!("\"{escaped}\"");
            let (item, _rest) = next(&wire, 4096).unwrap();
            assert_eq!(item, NextItem::Value(text.to_string()));
        }
    }

    #[test]
    fn escape_examples_from_spec() {
        assert_eq!(escape("a\nb"), "a\\nb");
        let (item, _) = next("\"a\\nb\"", 4096).unwrap();
        assert_eq!(item, NextItem::Value("a\nb".to_string()));
    }

    #[test]
    fn overflow_writes_partial_and_signals() {
        let err = next("\"kitty\"", 5).unwrap_err();
        assert_eq!(err, FramingError::Overflow);
    }

    #[test]
    fn invalid_escape_is_protocol_error() {
        let err = next(r#""bad\qescape""#, 64).unwrap_err();
        assert_eq!(err, FramingError::InvalidEscape('q'));
    }

    #[test]
    fn end_of_input_yields_terminal_sentinel() {
        let (item, rest) = next("no quotes here", 64).unwrap();
        assert_eq!(item, NextItem::End);
        assert!(rest.is_empty());
    }

    #[test]
    fn tolerates_leading_whitespace_before_array() {
        let (item, rest) = next("   [\"list\"]", 64).unwrap();
        assert_eq!(item, NextItem::Value("list".to_string()));
        let (item2, _) = next(rest, 64).unwrap();
        assert_eq!(item2, NextItem::End);
    }

    #[test]
    fn singleton_writes_bracketed_string() {
        assert_eq!(singleton("ok"), "[\"ok\"]");
    }

    #[test]
    fn array_writer_joins_with_commas() {
        let mut w = ArrayWriter::start();
        w.send("ok");
        w.send("em0.flags");
        w.send("UP,RUNNING");
        assert_eq!(w.finish(), "[\"ok\",\"em0.flags\",\"UP,RUNNING\"]");
    }
}
