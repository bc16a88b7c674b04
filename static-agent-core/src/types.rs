//! Message type and protocol identifier parsing.
//!
//! A message type URI has the shape
//! `<doc_uri><protocol>/<major>.<minor>/<name>`, where the doc-uri is a
//! greedy prefix that may itself contain `/` (e.g.
//! `https://didcomm.org/routing/1.0/forward` has doc-uri
//! `https://didcomm.org/`). Protocol and name are restricted to
//! `[a-z0-9._-]`.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// An abbreviated semantic version as used in message types (`1.0`, not
/// `1.0.0`). Ordering is major-then-minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MsgVersion {
    /// Major version; changes are breaking.
    pub major: u32,
    /// Minor version; higher minors are backward compatible.
    pub minor: u32,
}

impl MsgVersion {
    /// Create a version from its parts.
    #[must_use]
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for MsgVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| Error::MalformedType(format!("invalid version: {s}")))?;
        let major = major
            .parse()
            .map_err(|_| Error::MalformedType(format!("invalid version: {s}")))?;
        let minor = minor
            .parse()
            .map_err(|_| Error::MalformedType(format!("invalid version: {s}")))?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for MsgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn is_ident_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '.' | '_' | '-')
}

/// Split `rest` into (doc_uri, trailing identifier), where the identifier is
/// the longest suffix of `[a-z0-9._-]` characters.
fn split_ident_suffix(rest: &str) -> Option<(&str, &str)> {
    let start = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map(|(i, _)| i)?;
    Some(rest.split_at(start))
}

/// A parsed message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MsgType {
    /// Document URI prefix, including any trailing separator. May be empty.
    pub doc_uri: String,
    /// Protocol name.
    pub protocol: String,
    /// Protocol version.
    pub version: MsgVersion,
    /// Message name within the protocol.
    pub name: String,
}

impl MsgType {
    /// Assemble a type from its parts.
    pub fn from_parts(
        doc_uri: impl Into<String>,
        protocol: impl Into<String>,
        version: MsgVersion,
        name: impl Into<String>,
    ) -> Self {
        Self {
            doc_uri: doc_uri.into(),
            protocol: protocol.into(),
            version,
            name: name.into(),
        }
    }

    /// Whether a concrete inbound type is served by a registered pattern.
    ///
    /// Doc-uri, protocol and name must be equal; the major versions must be
    /// equal; and the concrete minor version must be at least the pattern's
    /// (backward-compatible minor revisions are accepted).
    #[must_use]
    pub fn matches_pattern(&self, pattern: &MsgType) -> bool {
        self.doc_uri == pattern.doc_uri
            && self.protocol == pattern.protocol
            && self.name == pattern.name
            && self.version.major == pattern.version.major
            && self.version.minor >= pattern.version.minor
    }
}

impl FromStr for MsgType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedType(s.to_string());
        let (rest, name) = s.rsplit_once('/').ok_or_else(malformed)?;
        let (rest, version) = rest.rsplit_once('/').ok_or_else(malformed)?;
        let (doc_uri, protocol) = split_ident_suffix(rest).ok_or_else(malformed)?;

        if name.is_empty() || !name.chars().all(is_ident_char) {
            return Err(malformed());
        }
        let version = version
            .parse()
            .map_err(|_| Error::MalformedType(format!("{s}: invalid version {version}")))?;

        Ok(Self {
            doc_uri: doc_uri.to_string(),
            protocol: protocol.to_string(),
            version,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            self.doc_uri, self.protocol, self.version, self.name
        )
    }
}

impl Serialize for MsgType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MsgType {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A protocol identifier: a message type without the message name
/// (`<doc_uri><protocol>/<major>.<minor>`). Used by module routers to supply
/// defaults for their handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolIdentifier {
    /// Document URI prefix, including any trailing separator.
    pub doc_uri: String,
    /// Protocol name.
    pub protocol: String,
    /// Protocol version.
    pub version: MsgVersion,
}

impl ProtocolIdentifier {
    /// Build the full message type for a name within this protocol.
    #[must_use]
    pub fn msg_type(&self, name: impl Into<String>) -> MsgType {
        MsgType::from_parts(self.doc_uri.clone(), self.protocol.clone(), self.version, name)
    }
}

impl FromStr for ProtocolIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedType(s.to_string());
        let trimmed = s.strip_suffix('/').unwrap_or(s);
        let (rest, version) = trimmed.rsplit_once('/').ok_or_else(malformed)?;
        let (doc_uri, protocol) = split_ident_suffix(rest).ok_or_else(malformed)?;
        let version = version
            .parse()
            .map_err(|_| Error::MalformedType(format!("{s}: invalid version {version}")))?;

        Ok(Self {
            doc_uri: doc_uri.to_string(),
            protocol: protocol.to_string(),
            version,
        })
    }
}

impl fmt::Display for ProtocolIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", self.doc_uri, self.protocol, self.version)
    }
}
