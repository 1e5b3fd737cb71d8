//! Builds a class catalog from an ontology document.

use std::collections::BTreeMap;

use oxrdf::Term;

use super::{ClassCatalog, ClassDefinition};
use crate::document::{
    parse_document, subject_key, term_iri, DocumentFormat, OWL_CLASS, RDFS_CLASS, RDFS_COMMENT,
    RDFS_LABEL, RDFS_SUBCLASS_OF, RDF_TYPE,
};
use crate::error::CatalogError;

/// Extracts every class declared in an ontology.
///
/// A class is a subject typed `owl:Class` or `rdfs:Class`, or any subject of
/// `rdfs:subClassOf`. Labels tagged `@de` and `@en` fill the German and
/// English label; an untagged label fills whichever of the two is still
/// empty. Entries are keyed by class URI.
pub fn extract_from_ontology(
    bytes: &[u8],
    format: DocumentFormat,
) -> Result<ClassCatalog, CatalogError> {
    let statements = parse_document(bytes, format, None)?;

    let mut definitions: BTreeMap<String, ClassDefinition> = BTreeMap::new();
    for triple in &statements {
        let predicate = triple.predicate.as_str();
        let declares_class = (predicate == RDF_TYPE
            && matches!(term_iri(&triple.object), Some(OWL_CLASS | RDFS_CLASS)))
            || predicate == RDFS_SUBCLASS_OF;
        if declares_class {
            let uri = subject_key(&triple.subject);
            definitions.entry(uri.clone()).or_insert_with(|| ClassDefinition {
                uri: Some(uri),
                ..Default::default()
            });
        }
    }

    let mut untagged: BTreeMap<String, String> = BTreeMap::new();
    for triple in &statements {
        let uri = subject_key(&triple.subject);
        let Some(def) = definitions.get_mut(&uri) else {
            continue;
        };
        let Term::Literal(literal) = &triple.object else {
            continue;
        };

        match triple.predicate.as_str() {
            RDFS_LABEL => match literal.language() {
                Some("de") => def.german_label = Some(literal.value().to_string()),
                Some("en") => def.english_label = Some(literal.value().to_string()),
                Some(_) => {}
                None => {
                    untagged
                        .entry(uri)
                        .or_insert_with(|| literal.value().to_string());
                }
            },
            RDFS_COMMENT => def.comment = Some(literal.value().to_string()),
            _ => {}
        }
    }

    for (uri, label) in untagged {
        if let Some(def) = definitions.get_mut(&uri) {
            def.german_label.get_or_insert_with(|| label.clone());
            def.english_label.get_or_insert(label);
        }
    }

    Ok(ClassCatalog::from_definitions(definitions))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONTOLOGY: &str = r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix lp: <http://example.org/lehrplan#> .

lp:Fach a owl:Class ;
    rdfs:label "Fach"@de , "Subject"@en ;
    rdfs:comment "A school subject" .

lp:Kompetenz a rdfs:Class ;
    rdfs:label "Kompetenz" .

lp:Teilkompetenz rdfs:subClassOf lp:Kompetenz .

lp:hasFach a owl:ObjectProperty ;
    rdfs:label "hat Fach"@de .
"#;

    #[test]
    fn test_extracts_declared_classes() {
        let catalog = extract_from_ontology(ONTOLOGY.as_bytes(), DocumentFormat::Turtle).unwrap();
        let uris: Vec<_> = catalog.classes().iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(
            uris,
            vec![
                "http://example.org/lehrplan#Fach",
                "http://example.org/lehrplan#Kompetenz",
                "http://example.org/lehrplan#Teilkompetenz",
            ]
        );
    }

    #[test]
    fn test_language_tagged_and_untagged_labels() {
        let catalog = extract_from_ontology(ONTOLOGY.as_bytes(), DocumentFormat::Turtle).unwrap();
        let defs = catalog.definitions();

        let fach = &defs["http://example.org/lehrplan#Fach"];
        assert_eq!(fach.german_label.as_deref(), Some("Fach"));
        assert_eq!(fach.english_label.as_deref(), Some("Subject"));
        assert_eq!(fach.comment.as_deref(), Some("A school subject"));

        let kompetenz = &defs["http://example.org/lehrplan#Kompetenz"];
        assert_eq!(kompetenz.german_label.as_deref(), Some("Kompetenz"));
        assert_eq!(kompetenz.english_label.as_deref(), Some("Kompetenz"));

        let teil = catalog
            .class_by_uri("http://example.org/lehrplan#Teilkompetenz")
            .unwrap();
        assert_eq!(teil.label, "Teilkompetenz");
    }

    #[test]
    fn test_invalid_ontology() {
        let result = extract_from_ontology(b"lp:Fach a", DocumentFormat::Turtle);
        assert!(matches!(result, Err(CatalogError::Ontology(_))));
    }
}
