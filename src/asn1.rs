//! DER node model used by the attestation parsers.
//!
//! Raw bytes are tokenized with `asn1-rs` and decoded exactly once into the
//! closed [`DerNode`] type, so everything above this module matches on
//! variants instead of probing object types.

use std::collections::BTreeSet;

use asn1_rs::{Any, Class, FromDer, Tag};

use crate::error::{AttestationError, Result};

/// A decoded DER value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerNode {
    Boolean(bool),
    /// Big-endian two's-complement content, converted by [`read_integer`].
    Integer(Vec<u8>),
    Enumerated(Vec<u8>),
    OctetString(Vec<u8>),
    Sequence(Vec<DerNode>),
    Set(Vec<DerNode>),
    /// Explicitly tagged context-specific object, e.g. `[704] EXPLICIT RootOfTrust`.
    Tagged { tag: u32, inner: Box<DerNode> },
    /// Any other type. Kept so a stray element only fails when it is read.
    Other { tag: u32 },
}

impl DerNode {
    /// Decode the first DER object in `bytes`. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8], max_depth: u32) -> Result<DerNode> {
        let (_, any) = Any::from_der(bytes).map_err(malformed)?;
        Self::from_any(any, 0, max_depth)
    }

    fn from_any(any: Any<'_>, depth: u32, max_depth: u32) -> Result<DerNode> {
        if depth > max_depth {
            return Err(AttestationError::MalformedEncoding(format!(
                "nesting deeper than {max_depth} levels"
            )));
        }

        let tag = any.header.tag();
        match any.header.class() {
            Class::Universal => {}
            Class::ContextSpecific => {
                if !any.header.is_constructed() {
                    return Err(AttestationError::MalformedEncoding(format!(
                        "implicitly tagged [{}] object",
                        tag.0
                    )));
                }
                let (rest, inner) = Any::from_der(any.data).map_err(malformed)?;
                if !rest.is_empty() {
                    return Err(AttestationError::MalformedEncoding(format!(
                        "trailing data inside tagged [{}] object",
                        tag.0
                    )));
                }
                let inner = Self::from_any(inner, depth + 1, max_depth)?;
                return Ok(DerNode::Tagged {
                    tag: tag.0,
                    inner: Box::new(inner),
                });
            }
            _ => return Ok(DerNode::Other { tag: tag.0 }),
        }

        let node = match tag {
            Tag::Boolean => DerNode::Boolean(bool::try_from(any).map_err(malformed)?),
            // Kept raw: fields that are never read may hold values wider than i64
            Tag::Integer => DerNode::Integer(any.data.to_vec()),
            Tag::Enumerated => DerNode::Enumerated(any.data.to_vec()),
            Tag::OctetString => DerNode::OctetString(any.data.to_vec()),
            Tag::Sequence => DerNode::Sequence(Self::children(any.data, depth, max_depth)?),
            Tag::Set => DerNode::Set(Self::children(any.data, depth, max_depth)?),
            other => DerNode::Other { tag: other.0 },
        };
        Ok(node)
    }

    fn children(mut data: &[u8], depth: u32, max_depth: u32) -> Result<Vec<DerNode>> {
        let mut nodes = Vec::new();
        while !data.is_empty() {
            let (rest, any) = Any::from_der(data).map_err(malformed)?;
            nodes.push(Self::from_any(any, depth + 1, max_depth)?);
            data = rest;
        }
        Ok(nodes)
    }

    /// Human readable ASN.1 type name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DerNode::Boolean(_) => "BOOLEAN",
            DerNode::Integer(_) => "INTEGER",
            DerNode::Enumerated(_) => "ENUMERATED",
            DerNode::OctetString(_) => "OCTET STRING",
            DerNode::Sequence(_) => "SEQUENCE",
            DerNode::Set(_) => "SET",
            DerNode::Tagged { .. } => "tagged object",
            DerNode::Other { .. } => "unsupported type",
        }
    }

    /// Element `index` of a SEQUENCE.
    pub fn object_at(&self, index: usize) -> Result<&DerNode> {
        match self {
            DerNode::Sequence(elements) => elements.get(index).ok_or_else(|| {
                AttestationError::MalformedEncoding(format!(
                    "sequence has {} elements, no index {index}",
                    elements.len()
                ))
            }),
            other => Err(AttestationError::MalformedEncoding(format!(
                "expected SEQUENCE, found {}",
                other.kind()
            ))),
        }
    }
}

fn malformed<E: std::fmt::Display>(err: E) -> AttestationError {
    AttestationError::MalformedEncoding(err.to_string())
}

fn mismatch(expected: &'static str, node: &DerNode) -> AttestationError {
    AttestationError::TypeMismatch {
        expected,
        found: node.kind(),
    }
}

pub fn read_octets(node: &DerNode) -> Result<&[u8]> {
    match node {
        DerNode::OctetString(bytes) => Ok(bytes.as_slice()),
        other => Err(mismatch("OCTET STRING", other)),
    }
}

pub fn read_boolean(node: &DerNode) -> Result<bool> {
    match node {
        DerNode::Boolean(value) => Ok(*value),
        other => Err(mismatch("BOOLEAN", other)),
    }
}

/// Reads an INTEGER or an ENUMERATED value as a signed integer.
pub fn read_integer(node: &DerNode) -> Result<i64> {
    match node {
        DerNode::Integer(content) | DerNode::Enumerated(content) => signed_from_be(content),
        other => Err(mismatch("INTEGER", other)),
    }
}

/// Two's-complement big-endian content to `i64`. Redundant sign bytes are
/// accepted; values that do not fit are an error.
fn signed_from_be(content: &[u8]) -> Result<i64> {
    let Some(&first) = content.first() else {
        return Err(AttestationError::MalformedEncoding(
            "empty integer content".to_string(),
        ));
    };
    let sign_byte = if first & 0x80 != 0 { 0xff } else { 0x00 };

    let split = content.len().saturating_sub(8);
    let (extension, value) = content.split_at(split);
    let sign_mismatch = value.first().map_or(false, |b| (b & 0x80 != 0) != (sign_byte == 0xff));
    if extension.iter().any(|&b| b != sign_byte) || (!extension.is_empty() && sign_mismatch) {
        return Err(AttestationError::MalformedEncoding(format!(
            "integer of {} bytes does not fit in 64 bits",
            content.len()
        )));
    }

    let init: i64 = if sign_byte == 0xff { -1 } else { 0 };
    Ok(value.iter().fold(init, |acc, &b| (acc << 8) | i64::from(b)))
}

/// Reads a `SET OF INTEGER`.
///
/// An element that is not an integer ends the read; the values collected
/// up to that point are returned.
pub fn read_integer_set(node: &DerNode) -> Result<BTreeSet<i64>> {
    let DerNode::Set(elements) = node else {
        return Err(mismatch("SET", node));
    };

    let mut values = BTreeSet::new();
    for element in elements {
        match read_integer(element) {
            Ok(value) => {
                values.insert(value);
            }
            Err(err) => {
                tracing::debug!(error = %err, collected = values.len(), "Stopped reading integer set");
                break;
            }
        }
    }
    Ok(values)
}

/// Decodes extension bytes into the SEQUENCE they carry.
///
/// Accepts both the bare SEQUENCE and the SEQUENCE wrapped in an OCTET
/// STRING (the form returned by `X509Certificate.getExtensionValue`).
pub fn parse_sequence_from_bytes(bytes: &[u8], max_depth: u32) -> Result<DerNode> {
    let node = match DerNode::decode(bytes, max_depth)? {
        DerNode::OctetString(inner) => DerNode::decode(&inner, max_depth)?,
        node => node,
    };
    match node {
        DerNode::Sequence(_) => Ok(node),
        other => Err(AttestationError::MalformedEncoding(format!(
            "expected SEQUENCE, found {}",
            other.kind()
        ))),
    }
}

/// Streaming view over the elements of a SEQUENCE.
pub struct SequenceCursor<'a> {
    elements: std::slice::Iter<'a, DerNode>,
}

impl<'a> SequenceCursor<'a> {
    pub fn new(node: &'a DerNode) -> Result<Self> {
        match node {
            DerNode::Sequence(elements) => Ok(Self {
                elements: elements.iter(),
            }),
            other => Err(AttestationError::MalformedEncoding(format!(
                "expected SEQUENCE, found {}",
                other.kind()
            ))),
        }
    }

    /// Next element, or `None` at the end of the sequence.
    pub fn read_next(&mut self) -> Option<&'a DerNode> {
        self.elements.next()
    }

    /// Next element as `(tag number, base value)`.
    ///
    /// Running out of elements is `Ok(None)`; an element that is not a
    /// tagged object is an error.
    pub fn read_tagged(&mut self) -> Result<Option<(u32, &'a DerNode)>> {
        match self.read_next() {
            None => Ok(None),
            Some(DerNode::Tagged { tag, inner }) => Ok(Some((*tag, inner.as_ref()))),
            Some(other) => Err(AttestationError::MalformedEncoding(format!(
                "expected tagged object, found {}",
                other.kind()
            ))),
        }
    }
}
