// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Wire record decoding
//!
//! Trace producers deliver block lists and configuration records as small
//! XML-shaped documents. This module decodes exactly those two record
//! shapes with a minimal pull reader; it is not a general XML parser.
//!
//! A `btrace` document carries a version-gated root with zero or more
//! `block` children, newest block first. A `btrace-conf` document carries
//! an optional `bts` child with an optional `size` attribute.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::config::{Config, Format};
use crate::data::{Block, Data};


/// Decoding errors
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The document ended in the middle of a construct
    Truncated,
    /// Basic syntax was violated at the given byte offset
    Malformed(usize),
    /// Text content, which these records never carry
    UnexpectedText,
    /// An element this record shape does not know
    UnexpectedElement(String),
    /// A closing tag that does not match the open element
    MismatchedClose(String),
    /// A required attribute is missing
    MissingAttribute(&'static str),
    /// An attribute value is not a valid number
    InvalidNumber(String),
    /// The document version is not supported
    UnsupportedVersion(String),
}

impl core::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "document ended unexpectedly"),
            Self::Malformed(offset) => write!(f, "malformed document at offset {offset}"),
            Self::UnexpectedText => write!(f, "unexpected text content"),
            Self::UnexpectedElement(name) => write!(f, "unexpected element \"{name}\""),
            Self::MismatchedClose(name) => write!(f, "mismatched closing tag \"{name}\""),
            Self::MissingAttribute(name) => write!(f, "missing attribute \"{name}\""),
            Self::InvalidNumber(value) => write!(f, "invalid number \"{value}\""),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported btrace version \"{version}\"")
            }
        }
    }
}

/// Decode a branch trace document
///
/// The version must be `"1.0"`. A document without blocks decodes to
/// [`Data::None`]; the block order of the document is preserved.
pub fn parse_btrace(xml: &str) -> Result<Data, ParseError> {
    let mut reader = Reader::new(xml);

    let (attrs, empty) = open_root(&mut reader, "btrace")?;
    let version = attr(&attrs, "version").ok_or(ParseError::MissingAttribute("version"))?;
    if version != "1.0" {
        return Err(ParseError::UnsupportedVersion(version.into()));
    }

    // the format only becomes BTS once the first block shows up
    let mut blocks = None;
    if !empty {
        loop {
            match reader.next()?.ok_or(ParseError::Truncated)? {
                Event::Open { name, attrs, empty } if name == "block" => {
                    let begin = required_u64(&attrs, "begin")?;
                    let end = required_u64(&attrs, "end")?;
                    blocks
                        .get_or_insert_with(Vec::new)
                        .push(Block { begin, end });

                    if !empty {
                        expect_close(&mut reader, "block")?;
                    }
                }
                Event::Open { name, .. } => {
                    return Err(ParseError::UnexpectedElement(name.into()));
                }
                Event::Close(name) if name == "btrace" => break,
                Event::Close(name) => return Err(ParseError::MismatchedClose(name.into())),
            }
        }
    }

    expect_end(&mut reader)?;

    Ok(match blocks {
        Some(blocks) => Data::Bts(blocks),
        None => Data::None,
    })
}

/// Decode a trace configuration document
///
/// The root's `version` attribute is required but its value is not
/// interpreted. Without a `bts` child the configuration requests no
/// tracing format.
pub fn parse_btrace_conf(xml: &str) -> Result<Config, ParseError> {
    let mut reader = Reader::new(xml);

    let (attrs, empty) = open_root(&mut reader, "btrace-conf")?;
    attr(&attrs, "version").ok_or(ParseError::MissingAttribute("version"))?;

    let mut conf = Config::default();
    if !empty {
        loop {
            match reader.next()?.ok_or(ParseError::Truncated)? {
                Event::Open { name, attrs, empty } if name == "bts" => {
                    conf.format = Format::Bts;
                    conf.bts.size = match attr(&attrs, "size") {
                        Some(value) => parse_u64(value)
                            .and_then(|size| u32::try_from(size).ok())
                            .ok_or_else(|| ParseError::InvalidNumber(value.into()))?,
                        None => 0,
                    };

                    if !empty {
                        expect_close(&mut reader, "bts")?;
                    }
                }
                Event::Open { name, .. } => {
                    return Err(ParseError::UnexpectedElement(name.into()));
                }
                Event::Close(name) if name == "btrace-conf" => break,
                Event::Close(name) => return Err(ParseError::MismatchedClose(name.into())),
            }
        }
    }

    expect_end(&mut reader)?;

    Ok(conf)
}

/// Read the root element, which must have the given name
fn open_root<'a>(
    reader: &mut Reader<'a>,
    root: &str,
) -> Result<(Vec<(&'a str, &'a str)>, bool), ParseError> {
    match reader.next()?.ok_or(ParseError::Truncated)? {
        Event::Open { name, attrs, empty } if name == root => Ok((attrs, empty)),
        Event::Open { name, .. } => Err(ParseError::UnexpectedElement(name.into())),
        Event::Close(name) => Err(ParseError::MismatchedClose(name.into())),
    }
}

/// Consume the closing tag of the given element
fn expect_close(reader: &mut Reader<'_>, name: &str) -> Result<(), ParseError> {
    match reader.next()?.ok_or(ParseError::Truncated)? {
        Event::Close(n) if n == name => Ok(()),
        Event::Close(n) => Err(ParseError::MismatchedClose(n.into())),
        Event::Open { name, .. } => Err(ParseError::UnexpectedElement(name.into())),
    }
}

/// Assert that the document is exhausted
fn expect_end(reader: &mut Reader<'_>) -> Result<(), ParseError> {
    match reader.next()? {
        None => Ok(()),
        Some(_) => Err(ParseError::Malformed(reader.pos)),
    }
}

/// Look up an attribute by name
fn attr<'a>(attrs: &[(&'a str, &'a str)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(attr, _)| *attr == name)
        .map(|(_, value)| *value)
}

/// Look up a required integer attribute
fn required_u64(attrs: &[(&str, &str)], name: &'static str) -> Result<u64, ParseError> {
    let value = attr(attrs, name).ok_or(ParseError::MissingAttribute(name))?;
    parse_u64(value).ok_or_else(|| ParseError::InvalidNumber(value.into()))
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
fn parse_u64(value: &str) -> Option<u64> {
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

/// A single markup event
enum Event<'a> {
    Open {
        name: &'a str,
        attrs: Vec<(&'a str, &'a str)>,
        empty: bool,
    },
    Close(&'a str),
}

/// Minimal pull reader over the document
///
/// Yields open and close events, skipping the prolog, comments and
/// doctype declarations. Attribute values are taken verbatim; the records
/// decoded here never require entity expansion.
struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn bump(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_ws(&mut self) {
        let skip = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.bump(skip);
    }

    fn skip_past(&mut self, pat: &str) -> Result<(), ParseError> {
        match self.rest().find(pat) {
            Some(at) => {
                self.bump(at + pat.len());
                Ok(())
            }
            None => Err(ParseError::Truncated),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), ParseError> {
        if self.rest().as_bytes().first() == Some(&byte) {
            self.bump(1);
            Ok(())
        } else {
            Err(ParseError::Malformed(self.pos))
        }
    }

    fn read_name(&mut self) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
            .count();
        if len == 0 {
            return Err(ParseError::Malformed(self.pos));
        }

        self.bump(len);
        Ok(&rest[..len])
    }

    /// Read the attribute list and closing bracket of an open tag
    ///
    /// Returns the attributes and whether the element is self-closing.
    fn read_attrs(&mut self) -> Result<(Vec<(&'a str, &'a str)>, bool), ParseError> {
        let mut attrs = Vec::new();

        loop {
            self.skip_ws();

            if self.rest().starts_with("/>") {
                self.bump(2);
                return Ok((attrs, true));
            }
            if self.rest().starts_with('>') {
                self.bump(1);
                return Ok((attrs, false));
            }

            let name = self.read_name()?;
            self.skip_ws();
            self.expect(b'=')?;
            self.skip_ws();

            let quote = *self
                .rest()
                .as_bytes()
                .first()
                .ok_or(ParseError::Truncated)?;
            if quote != b'"' && quote != b'\'' {
                return Err(ParseError::Malformed(self.pos));
            }
            self.bump(1);

            let rest = self.rest();
            let end = rest.find(quote as char).ok_or(ParseError::Truncated)?;
            attrs.push((name, &rest[..end]));
            self.bump(end + 1);
        }
    }

    fn next(&mut self) -> Result<Option<Event<'a>>, ParseError> {
        loop {
            self.skip_ws();

            let rest = self.rest();
            if rest.is_empty() {
                return Ok(None);
            }
            if !rest.starts_with('<') {
                return Err(ParseError::UnexpectedText);
            }

            if rest.starts_with("<?") {
                self.skip_past("?>")?;
                continue;
            }
            if rest.starts_with("<!--") {
                self.skip_past("-->")?;
                continue;
            }
            if rest.starts_with("<!") {
                self.skip_past(">")?;
                continue;
            }

            if rest.starts_with("</") {
                self.bump(2);
                let name = self.read_name()?;
                self.skip_ws();
                self.expect(b'>')?;
                return Ok(Some(Event::Close(name)));
            }

            self.bump(1);
            let name = self.read_name()?;
            let (attrs, empty) = self.read_attrs()?;
            return Ok(Some(Event::Open { name, attrs, empty }));
        }
    }
}
