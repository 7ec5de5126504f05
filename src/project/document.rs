//! Envelope and XML helpers shared by the parser and the rewriter.
//!
//! A project file is a gzip stream wrapping one XML document. Objects are
//! elements carrying `ObjectID` (numeric) or `ObjectUID` (GUID); references
//! are elements carrying `ObjectRef` / `ObjectURef`.

use crate::error::{ConsolidateError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Read, Write};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub const ID_ATTRS: [&str; 2] = ["ObjectID", "ObjectUID"];
pub const REF_ATTRS: [&str; 2] = ["ObjectRef", "ObjectURef"];

/// Unwrap the gzip envelope and return the XML text.
pub fn decompress(bytes: &[u8]) -> Result<String> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Err(ConsolidateError::CorruptArchive(
            "missing gzip header".to_string(),
        ));
    }

    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| ConsolidateError::CorruptArchive(e.to_string()))?;

    String::from_utf8(raw).map_err(|e| {
        ConsolidateError::MalformedDocument(format!(
            "document is not valid UTF-8 at byte {}",
            e.utf8_error().valid_up_to()
        ))
    })
}

/// Wrap XML text in the gzip envelope.
pub fn compress(xml: &str) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes())?;
    encoder.finish()
}

pub fn parse_xml(xml: &str) -> Result<roxmltree::Document<'_>> {
    roxmltree::Document::parse(xml)
        .map_err(|e| ConsolidateError::MalformedDocument(format!("XML parse error: {}", e)))
}

/// Identifier defined by an element, if it is an object.
pub fn object_id<'a>(node: &roxmltree::Node<'a, '_>) -> Option<&'a str> {
    ID_ATTRS.iter().find_map(|attr| node.attribute(*attr))
}

/// Identifier referenced by an element, if it is a reference.
pub fn reference<'a>(node: &roxmltree::Node<'a, '_>) -> Option<&'a str> {
    REF_ATTRS.iter().find_map(|attr| node.attribute(*attr))
}

/// Elements below `object` that belong to it, skipping nested object definitions.
pub fn own_elements<'a, 'input>(
    object: roxmltree::Node<'a, 'input>,
) -> Vec<roxmltree::Node<'a, 'input>> {
    let mut out = Vec::new();
    let mut stack: Vec<_> = object.children().filter(|n| n.is_element()).collect();
    stack.reverse();

    while let Some(node) = stack.pop() {
        if object_id(&node).is_some() {
            continue;
        }
        out.push(node);
        let mut children: Vec<_> = node.children().filter(|n| n.is_element()).collect();
        children.reverse();
        stack.extend(children);
    }

    out
}

/// Nearest enclosing object of `node`, excluding `node` itself.
pub fn owning_object<'a>(node: &roxmltree::Node<'a, '_>) -> Option<&'a str> {
    node.ancestors().skip(1).find_map(|n| object_id(&n))
}

/// Every object element in document order, with an id lookup.
pub struct ObjectIndex<'a, 'input> {
    pub objects: Vec<(&'a str, roxmltree::Node<'a, 'input>)>,
    pub by_id: HashMap<&'a str, usize>,
}

impl<'a, 'input> ObjectIndex<'a, 'input> {
    /// First pass over the tree. Duplicate identifiers are a malformed document.
    pub fn build(doc: &'a roxmltree::Document<'input>) -> Result<Self> {
        let mut objects = Vec::new();
        let mut by_id = HashMap::new();

        for node in doc.descendants().filter(|n| n.is_element()) {
            if let Some(id) = object_id(&node) {
                if by_id.insert(id, objects.len()).is_some() {
                    return Err(ConsolidateError::MalformedDocument(format!(
                        "duplicate object identifier '{}'",
                        id
                    )));
                }
                objects.push((id, node));
            }
        }

        Ok(Self { objects, by_id })
    }

    pub fn get(&self, id: &str) -> Option<roxmltree::Node<'a, 'input>> {
        self.by_id.get(id).map(|&i| self.objects[i].1)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }
}
