//! Fixed RDF vocabulary and entity IRI minting.
//!
//! Entity IRIs are `<entity_ns><kind>/<id>`; classes and hierarchy/relationship
//! predicates live under `<vocab_ns>`, with user predicates that collide with a
//! fixed property moved to `<vocab_ns>rel/`. Ids and predicate labels are
//! percent-encoded so that any string yields a valid IRI.

use oxigraph::model::NamedNode;

use crate::config::GraphConfig;
use crate::entity::{EntityKind, NodeKey};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
pub const FOAF_NS: &str = "http://xmlns.com/foaf/0.1/";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

pub const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";
pub const SKOS_NARROWER: &str = "http://www.w3.org/2004/02/skos/core#narrower";
pub const DCTERMS_CREATED: &str = "http://purl.org/dc/terms/created";
pub const DCTERMS_MODIFIED: &str = "http://purl.org/dc/terms/modified";

/// Local names of the fixed `cs:` properties.
pub const PRIMARY_PREDICATE: &str = "primaryPredicate";
pub const VERSION: &str = "version";
pub const BELONGS_TO_LAYER: &str = "belongsToLayer";

/// Local names the builder itself mints under `cs:`.
const RESERVED_LOCAL_NAMES: [&str; 6] = [
    "Layer",
    "Domain",
    "Term",
    PRIMARY_PREDICATE,
    VERSION,
    BELONGS_TO_LAYER,
];

/// Path under `cs:` for user predicates that would shadow a reserved name.
pub const RELATION_PATH: &str = "rel/";

/// Namespace bindings shared by the builder, the query prelude and serializers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    vocab_ns: String,
    entity_ns: String,
}

impl Vocabulary {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            vocab_ns: config.vocab_namespace.clone(),
            entity_ns: config.entity_namespace.clone(),
        }
    }

    pub fn vocab_ns(&self) -> &str {
        &self.vocab_ns
    }

    pub fn entity_ns(&self) -> &str {
        &self.entity_ns
    }

    /// `(prefix, namespace)` pairs predeclared for queries and Turtle output.
    pub fn prefixes(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("cs", self.vocab_ns.as_str()),
            ("entity", self.entity_ns.as_str()),
            ("rdf", RDF_NS),
            ("rdfs", RDFS_NS),
            ("skos", SKOS_NS),
            ("dcterms", DCTERMS_NS),
            ("foaf", FOAF_NS),
            ("xsd", XSD_NS),
        ]
    }

    /// SPARQL `PREFIX` declarations for every bound namespace.
    pub fn sparql_prelude(&self) -> String {
        self.prefixes()
            .into_iter()
            .map(|(prefix, ns)| format!("PREFIX {prefix}: <{ns}>\n"))
            .collect()
    }

    /// IRI of an entity node.
    pub fn entity_iri(&self, key: &NodeKey) -> String {
        format!("{}{}/{}", self.entity_ns, key.kind, encode_local_name(&key.id))
    }

    pub fn entity_node(&self, key: &NodeKey) -> NamedNode {
        NamedNode::new_unchecked(self.entity_iri(key))
    }

    /// Recover a node key from an entity IRI minted by [`Vocabulary::entity_iri`].
    pub fn key_from_iri(&self, iri: &str) -> Option<NodeKey> {
        let rest = iri.strip_prefix(&self.entity_ns)?;
        let (kind, id) = rest.split_once('/')?;
        let kind = kind.parse::<EntityKind>().ok()?;
        let id = decode_local_name(id)?;
        if id.is_empty() {
            return None;
        }
        Some(NodeKey::new(kind, id))
    }

    /// `cs:<local>` for classes and fixed properties.
    pub fn vocab_iri(&self, local: &str) -> String {
        format!("{}{}", self.vocab_ns, encode_local_name(local))
    }

    pub fn vocab_node(&self, local: &str) -> NamedNode {
        NamedNode::new_unchecked(self.vocab_iri(local))
    }

    /// IRI of a hierarchy or relationship predicate label.
    ///
    /// Labels go under `cs:` like the fixed vocabulary, except those equal to a
    /// reserved local name, which move to `cs:rel/` so user data never reads as
    /// layer membership, versions or classes.
    pub fn predicate_iri(&self, label: &str) -> String {
        let local = encode_local_name(label);
        if RESERVED_LOCAL_NAMES.contains(&local.as_str()) {
            format!("{}{RELATION_PATH}{local}", self.vocab_ns)
        } else {
            format!("{}{local}", self.vocab_ns)
        }
    }

    pub fn predicate_node(&self, label: &str) -> NamedNode {
        NamedNode::new_unchecked(self.predicate_iri(label))
    }

    pub fn class_node(&self, kind: EntityKind) -> NamedNode {
        self.vocab_node(kind.class_name())
    }

    /// Shorten an IRI to `prefix:local` when it falls under a bound namespace.
    pub fn compact(&self, iri: &str) -> String {
        for (prefix, ns) in self.prefixes() {
            if let Some(local) = iri.strip_prefix(ns) {
                if !local.is_empty() && !local.contains('/') {
                    return format!("{prefix}:{local}");
                }
            }
        }
        iri.to_string()
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode every byte outside the RFC 3986 unreserved set.
pub fn encode_local_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for &b in raw.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_local_name`]; `None` on malformed escapes or invalid UTF-8.
pub fn decode_local_name(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn is_xml_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_xml_name_char(c: char) -> bool {
    is_xml_name_start(c) || c.is_ascii_digit() || matches!(c, '-' | '.' | '\u{B7}')
}

/// Whether an RDF/XML writer can split `iri` into a namespace and a non-empty
/// XML local name, which predicates need to become element names.
pub fn has_xml_local_name(iri: &str) -> bool {
    let tail = match iri.rfind(|c: char| !is_xml_name_char(c)) {
        Some(pos) => &iri[pos..],
        None => iri,
    };
    tail.chars().any(is_xml_name_start)
}

/// Escape text for use inside a double-quoted SPARQL string literal.
pub fn sparql_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
