//! Extraction behavior on complete TEI documents.
//!
//! Covers the document record, abstract selection, bibliography enumeration
//! through both the union query and its fallback, and the output invariants
//! (sparse records, numeric years, determinism).

mod common;

use common::{has_empty_member, tei, GROBID_TEI, MIXED_BIBLIOGRAPHY_TEI};
use tei_csl::{
    extract, Capabilities, ExtractError, Extractor, PersonName, TeiParseResponse,
};

fn name(given: &str, family: &str) -> PersonName {
    PersonName {
        family: family.to_string(),
        given: given.to_string(),
    }
}

fn titles(citations: &[tei_csl::CslRecord]) -> Vec<&str> {
    citations
        .iter()
        .filter_map(|c| c.title.as_deref())
        .collect()
}

// =============================================================================
// Document record
// =============================================================================

#[test]
fn test_grobid_document_record() {
    // Given: a GROBID full-text document
    // When: we extract it
    let result = extract(GROBID_TEI).unwrap();

    // Then: the header fields populate the document record
    let record = &result.record;
    assert_eq!(record.item_type, "article-journal");
    assert_eq!(record.title.as_deref(), Some("Attention Is All You Need"));
    assert_eq!(
        record.author.as_deref(),
        Some(&[name("Ashish", "Vaswani"), name("Noam", "Shazeer")][..])
    );
    assert_eq!(record.issued.as_ref().and_then(|i| i.year()), Some(2017));
    assert_eq!(
        record.container_title.as_deref(),
        Some("Advances in Neural Information Processing Systems")
    );
    assert_eq!(record.doi.as_deref(), Some("10.5555/3295222.3295349"));
    assert_eq!(record.url, None);
}

#[test]
fn test_grobid_abstract_from_header() {
    let result = extract(GROBID_TEI).unwrap();
    assert_eq!(
        result.abstract_text.as_deref(),
        Some("The dominant sequence transduction models are based on complex recurrent networks.")
    );
}

#[test]
fn test_grobid_citations() {
    let result = extract(GROBID_TEI).unwrap();
    let citations = &result.citations;

    assert_eq!(
        titles(citations),
        vec!["Layer normalization", "Long short-term memory", "Deep Learning"]
    );

    // Structured names, with first and middle forenames joined
    assert_eq!(
        citations[0].author.as_deref(),
        Some(&[name("Jimmy Lei", "Ba"), name("Jamie", "Kiros")][..])
    );
    assert_eq!(citations[0].issued.as_ref().and_then(|i| i.year()), Some(2016));
    assert_eq!(citations[0].container_title.as_deref(), Some("arXiv preprint"));
    assert_eq!(
        citations[0].url.as_deref(),
        Some("https://arxiv.org/abs/1607.06450")
    );
    assert_eq!(citations[0].doi, None);

    // Bare persName split into given/family, year from text, untyped DOI
    assert_eq!(
        citations[1].author.as_deref(),
        Some(&[name("Sepp", "Hochreiter")][..])
    );
    assert_eq!(citations[1].issued.as_ref().and_then(|i| i.year()), Some(1997));
    assert_eq!(citations[1].doi.as_deref(), Some("10.1162/neco.1997.9.8.1735"));

    // Monograph-only entry: monograph author and title, undated
    assert_eq!(
        citations[2].author.as_deref(),
        Some(&[name("Ian", "Goodfellow")][..])
    );
    assert_eq!(citations[2].container_title.as_deref(), Some("Deep Learning"));
    assert_eq!(citations[2].issued, None);
}

#[test]
fn test_missing_fields_are_omitted_not_errors() {
    // Given: a TEI root with nothing in it
    let result = extract(r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"/>"#).unwrap();

    // Then: the record only carries its type
    assert_eq!(result.record, tei_csl::CslRecord::default());
    assert_eq!(result.abstract_text, None);
    assert!(result.citations.is_empty());
}

#[test]
fn test_elements_outside_tei_namespace_are_ignored() {
    // Given: the right element names without the TEI namespace
    let xml = "<TEI><teiHeader><fileDesc><titleStmt><title>No namespace</title></titleStmt></fileDesc></teiHeader></TEI>";

    // When: we extract
    let result = extract(xml).unwrap();

    // Then: nothing matches
    assert_eq!(result.record.title, None);
}

// =============================================================================
// Testable properties
// =============================================================================

#[test]
fn test_extraction_is_idempotent() {
    for doc in [GROBID_TEI, MIXED_BIBLIOGRAPHY_TEI] {
        assert_eq!(extract(doc).unwrap(), extract(doc).unwrap());
    }
}

#[test]
fn test_records_are_sparse() {
    // Given: documents with many missing and empty fields
    let sparse = tei(
        r#"<fileDesc><titleStmt><title> </title></titleStmt><sourceDesc><biblStruct>
            <analytic><author><persName/></author></analytic>
            <monogr><title/><imprint><date>unknown</date></imprint></monogr>
            <idno type="DOI"/>
        </biblStruct></sourceDesc></fileDesc>"#,
        r#"<back><listBibl><biblStruct><analytic><title/></analytic><ref type="url"/></biblStruct></listBibl></back>"#,
    );

    for doc in [GROBID_TEI, MIXED_BIBLIOGRAPHY_TEI, sparse.as_str()] {
        // When: we serialize the records
        let response: TeiParseResponse = extract(doc).unwrap().into();
        let records = serde_json::to_value((&response.csl_json, &response.citations)).unwrap();

        // Then: no record has a null, empty string or empty list member
        assert!(!has_empty_member(&records), "non-sparse output: {}", records);
    }
}

#[test]
fn test_issued_only_from_numeric_years() {
    let header = |date: &str| {
        tei(
            &format!(
                "<fileDesc><sourceDesc><biblStruct><monogr><imprint>{}</imprint></monogr></biblStruct></sourceDesc></fileDesc>",
                date
            ),
            "",
        )
    };

    let issued = |date: &str| {
        extract(&header(date))
            .unwrap()
            .record
            .issued
            .and_then(|i| i.year())
    };

    assert_eq!(issued(r#"<date when="2020-03"/>"#), Some(2020));
    assert_eq!(issued(r#"<date when="c.2020"/>"#), None);
    assert_eq!(issued("<date>Spring 2021</date>"), Some(2021));
    assert_eq!(issued("<date>'21</date>"), None);
}

#[test]
fn test_doi_heuristic_fallback() {
    // Given: identifiers with no DOI type, one of which is shaped like a DOI
    let text = r#"<back><listBibl><biblStruct>
        <monogr><title>J</title></monogr>
        <idno type="ISBN">978-0262035613</idno>
        <idno>10.1000/xyz123</idno>
        <idno>10.2000/later</idno>
    </biblStruct></listBibl></back>"#;

    // When: we extract
    let result = extract(&tei("", text)).unwrap();

    // Then: the first DOI-shaped identifier is taken
    assert_eq!(result.citations[0].doi.as_deref(), Some("10.1000/xyz123"));
}

#[test]
fn test_document_doi_falls_back_to_any_identifier() {
    // Given: a header without identifiers and a reference with an untyped DOI
    let text = r#"<back><div type="references"><biblStruct>
        <idno type="PMID">123</idno>
        <idno>10.5555/ref</idno>
    </biblStruct></div></back>"#;

    // When: we extract
    let result = extract(&tei("<fileDesc/>", text)).unwrap();

    // Then: the document record takes the first DOI-shaped identifier in the document
    assert_eq!(result.record.doi.as_deref(), Some("10.5555/ref"));
}

#[test]
fn test_inline_markup_keeps_source_spacing() {
    // Given: a wrapped title with inline highlighting
    let header = r#"<fileDesc><titleStmt><title>Deep<hi>Mind</hi>: BERT<hi>:</hi>
        pre-training   of
        transformers</title></titleStmt></fileDesc>"#;

    // When: we extract
    let result = extract(&tei(header, "")).unwrap();

    // Then: no spaces are invented and line wrapping is collapsed
    assert_eq!(
        result.record.title.as_deref(),
        Some("DeepMind: BERT: pre-training of transformers")
    );
}

#[test]
fn test_bare_person_name_is_split() {
    let text = r#"<back><listBibl><biblStruct><analytic>
        <author><persName>Jane Q. Public</persName></author>
        <author><persName>Aristotle</persName></author>
        <author><persName>  </persName></author>
    </analytic></biblStruct></listBibl></back>"#;

    let result = extract(&tei("", text)).unwrap();

    assert_eq!(
        result.citations[0].author.as_deref(),
        Some(&[name("Jane Q.", "Public"), name("", "Aristotle")][..])
    );
}

#[test]
fn test_abstract_falls_back_to_first_three_paragraphs() {
    // Given: no header abstract and four body paragraphs
    let body = r#"<body>
        <div><p> One. </p><p>Two <ref type="bibr">[1]</ref>.</p></div>
        <div><p>Three.</p><p>Four.</p></div>
    </body>"#;

    // When: we extract
    let result = extract(&tei("<fileDesc/>", body)).unwrap();

    // Then: the first three paragraphs are concatenated
    assert_eq!(result.abstract_text.as_deref(), Some("One. Two [1]. Three."));
}

#[test]
fn test_abstract_fallback_is_truncated() {
    let paragraph = "x".repeat(2000);
    let body = format!("<body><p>{0}</p><p>{0}</p></body>", paragraph);

    let result = extract(&tei("", &body)).unwrap();
    let abstract_text = result.abstract_text.unwrap();

    assert_eq!(abstract_text.chars().count(), 3000);
    assert!(abstract_text.starts_with(&paragraph));
}

#[test]
fn test_back_matter_paragraphs_are_not_an_abstract() {
    let text = "<back><div><p>Acknowledgements.</p></div></back>";
    let result = extract(&tei("", text)).unwrap();
    assert_eq!(result.abstract_text, None);
}

// =============================================================================
// Bibliography enumeration
// =============================================================================

#[test]
fn test_mixed_wrappers_in_document_order() {
    // Given: one entry under listBibl and one under div[@type='references']
    // When: we extract with the combined query
    let result = extract(MIXED_BIBLIOGRAPHY_TEI).unwrap();

    // Then: both appear, in document order, and nothing else
    assert_eq!(titles(&result.citations), vec!["First entry", "Second entry"]);
}

#[test]
fn test_fallback_path_matches_union_path() {
    // Given: an engine that cannot evaluate unions
    let fallback = Extractor::with_capabilities(Capabilities::without_unions());

    for doc in [GROBID_TEI, MIXED_BIBLIOGRAPHY_TEI] {
        // When: we extract through both paths
        let union_result = Extractor::new().extract(doc).unwrap();
        let fallback_result = fallback.extract(doc).unwrap();

        // Then: the results are identical
        assert_eq!(union_result, fallback_result);
    }
}

#[test]
fn test_nested_wrappers_do_not_duplicate_entries() {
    // GROBID nests listBibl in div[@type='references']; each entry matches
    // both branches but is listed once.
    let union_count = extract(GROBID_TEI).unwrap().citations.len();
    let fallback_count = Extractor::with_capabilities(Capabilities::without_unions())
        .extract(GROBID_TEI)
        .unwrap()
        .citations
        .len();

    assert_eq!(union_count, 3);
    assert_eq!(fallback_count, 3);
}

#[test]
fn test_bibliography_outside_back_matter_is_ignored() {
    let text = r#"<body><listBibl><biblStruct><analytic><title>Inline</title></analytic></biblStruct></listBibl></body>"#;
    let result = extract(&tei("", text)).unwrap();
    assert!(result.citations.is_empty());
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unclosed_tag_is_a_parse_error() {
    let result = extract(r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader>"#);
    assert!(matches!(result, Err(ExtractError::InvalidXml(_))));
}

#[test]
fn test_garbage_is_a_parse_error() {
    for input in ["", "not xml", "<TEI><a></b></TEI>", "<a/><b/>"] {
        let result = extract(input);
        assert!(
            matches!(result, Err(ExtractError::InvalidXml(_))),
            "expected a parse error for {:?}, got {:?}",
            input,
            result
        );
    }
}

#[test]
fn test_parse_error_message_is_readable() {
    let err = extract("<TEI><teiHeader>").unwrap_err();
    assert!(err.to_string().starts_with("Invalid TEI XML: "), "{}", err);
}
