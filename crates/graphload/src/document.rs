//! Parsing of uploaded RDF documents into statements.
//!
//! Parsing itself is delegated to `oxttl`; this module only picks the parser
//! from the file extension, collects the statements and renders batches back
//! to N-Triples for the store.

use std::collections::HashSet;
use std::fmt::{self, Write};
use std::path::Path;

use oxrdf::{Subject, Term, Triple};
use oxttl::{NTriplesParser, TurtleParser};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";

/// A parsed subject/predicate/object statement.
pub type Statement = Triple;

/// Serialization formats accepted for uploads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Turtle,
    NTriples,
}

impl DocumentFormat {
    /// Detects the format from the file extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match extension.as_str() {
            "ttl" => Some(Self::Turtle),
            "nt" => Some(Self::NTriples),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Turtle => "Turtle",
            Self::NTriples => "N-Triples",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Turtle => "text/turtle",
            Self::NTriples => "application/n-triples",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a whole document.
///
/// Duplicate statements are dropped (a graph is a set), keeping the order of
/// first appearance. The first syntax error aborts the parse.
pub fn parse_document(
    bytes: &[u8],
    format: DocumentFormat,
    base_iri: Option<&str>,
) -> Result<Vec<Statement>, ParseError> {
    match format {
        DocumentFormat::Turtle => {
            let mut parser = TurtleParser::new();
            if let Some(base) = base_iri {
                parser = parser
                    .with_base_iri(base)
                    .map_err(|e| ParseError::InvalidBaseIri {
                        iri: base.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            collect_statements(parser.for_reader(bytes), format)
        }
        DocumentFormat::NTriples => {
            collect_statements(NTriplesParser::new().for_reader(bytes), format)
        }
    }
}

fn collect_statements<E: fmt::Display>(
    results: impl Iterator<Item = Result<Triple, E>>,
    format: DocumentFormat,
) -> Result<Vec<Statement>, ParseError> {
    let mut seen = HashSet::new();
    let mut statements = Vec::new();
    for result in results {
        let triple = result.map_err(|e| ParseError::Syntax {
            format: format.name(),
            message: e.to_string(),
        })?;
        if seen.insert(triple.clone()) {
            statements.push(triple);
        }
    }
    Ok(statements)
}

/// Renders statements as an N-Triples document.
///
/// N-Triples is a subset of Turtle, so the output can be posted as
/// `text/turtle`.
pub fn to_ntriples(statements: &[Statement]) -> String {
    let mut out = String::with_capacity(statements.len() * 96);
    for triple in statements {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{} .", triple);
    }
    out
}

/// Identifier of a subject as used in result payloads: the bare IRI, or `_:id`.
#[allow(unreachable_patterns)]
pub fn subject_key(subject: &Subject) -> String {
    match subject {
        Subject::NamedNode(node) => node.as_str().to_string(),
        Subject::BlankNode(node) => format!("_:{}", node.as_str()),
        other => other.to_string(),
    }
}

/// The IRI of a term, if it is a named node.
pub fn term_iri(term: &Term) -> Option<&str> {
    match term {
        Term::NamedNode(node) => Some(node.as_str()),
        _ => None,
    }
}

/// The lexical value of a term, if it is a literal.
pub fn literal_value(term: &Term) -> Option<&str> {
    match term {
        Term::Literal(literal) => Some(literal.value()),
        _ => None,
    }
}

/// Last path or fragment segment of an identifier, used as a display fallback.
///
/// `http://example.org/school/Subject#Math` gives `Math`; an identifier
/// without separators, or ending in one, is returned unchanged.
pub fn local_name(identifier: &str) -> &str {
    match identifier.rfind(['/', '#']) {
        Some(pos) if pos + 1 < identifier.len() => &identifier[pos + 1..],
        _ => identifier,
    }
}
