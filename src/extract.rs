//! TEI to CSL-JSON extraction.
//!
//! Recovers a record for the document itself, its abstract, and one record
//! per bibliography entry from GROBID-style TEI. Every field is best effort:
//! a missing or empty element leaves the field out of the record, it never
//! fails the extraction.

use thiserror::Error;
use tracing::debug;

use crate::csl::{split_full_name, CslRecord, ExtractionResult, Issued, PersonName};
use crate::query::{document_order, Capabilities, Namespaces, QueryError, Selector};
use crate::xml::{Document, Element, XmlError};

/// Errors that can occur during extraction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Invalid TEI XML: {0}")]
    InvalidXml(#[from] XmlError),

    #[error("TEI query error: {0}")]
    Query(#[from] QueryError),
}

/// Number of body paragraphs used when the header has no abstract.
const FALLBACK_PARAGRAPHS: usize = 3;

/// Hard cap, in characters, on the body-excerpt abstract.
pub const FALLBACK_ABSTRACT_MAX_CHARS: usize = 3000;

// Header (the document's own record).
const HEADER_TITLE: &str = ".//tei:teiHeader//tei:titleStmt/tei:title";
const HEADER_AUTHORS: &str = ".//tei:teiHeader//tei:sourceDesc//tei:analytic/tei:author";
const HEADER_DATE: &str = ".//tei:teiHeader//tei:sourceDesc//tei:monogr/tei:imprint/tei:date";
const HEADER_CONTAINER: &str = ".//tei:teiHeader//tei:sourceDesc//tei:monogr/tei:title";
const HEADER_TYPED_DOI: &str = ".//tei:teiHeader//tei:sourceDesc//tei:idno[@type='DOI']";
const DOCUMENT_IDNO: &str = ".//tei:idno";
const HEADER_ABSTRACT: &str = ".//tei:teiHeader//tei:profileDesc//tei:abstract";
const ABSTRACT_PARAGRAPHS: &str = ".//tei:p";
const BODY_PARAGRAPHS: &str = ".//tei:text/tei:body//tei:p";

// Bibliography entries.
const BIBL_IN_LIST: &str = ".//tei:back//tei:listBibl//tei:biblStruct";
const BIBL_IN_REFERENCES_DIV: &str = ".//tei:back//tei:div[@type='references']//tei:biblStruct";

// Relative to one bibliography entry.
const ENTRY_ANALYTIC_AUTHORS: &str = ".//tei:analytic/tei:author";
const ENTRY_MONOGR_AUTHORS: &str = ".//tei:monogr/tei:author";
const ENTRY_ANALYTIC_TITLE: &str = ".//tei:analytic/tei:title";
const ENTRY_MONOGR_TITLE: &str = ".//tei:monogr/tei:title";
const ENTRY_DATE: &str = ".//tei:imprint/tei:date";
const ENTRY_TYPED_DOI: &str = ".//tei:idno[@type='DOI']";
const ENTRY_IDNO: &str = ".//tei:idno";
const ENTRY_URL_LINKS: [&str; 2] = [".//tei:ref[@type='url']", ".//tei:ptr[@type='url']"];

// Relative to one author.
const AUTHOR_SURNAME: &str = ".//tei:surname";
const AUTHOR_FORENAMES: &str = ".//tei:forename";
const AUTHOR_PERS_NAME: &str = ".//tei:persName";

/// Extracts CSL records from TEI documents.
///
/// An extractor holds no per-document state and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Extractor {
    selector: Selector,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::default())
    }

    /// An extractor whose query engine only evaluates `capabilities`.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            selector: Selector::new(Namespaces::tei(), capabilities),
        }
    }

    /// Parses `tei_xml` and extracts the document record, abstract and
    /// bibliography.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidXml`] if the input is not well-formed,
    /// or [`ExtractError::Query`] if a query construct the engine cannot
    /// evaluate survives the fallback strategy.
    pub fn extract(&self, tei_xml: &str) -> Result<ExtractionResult, ExtractError> {
        let doc = Document::parse(tei_xml)?;
        let root = doc.root();

        let record = self.document_record(root)?;
        let abstract_text = self.abstract_text(root)?;
        let citations = self
            .bibliography(root)?
            .into_iter()
            .map(|entry| self.citation_record(entry))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            citations = citations.len(),
            has_abstract = abstract_text.is_some(),
            has_title = record.title.is_some(),
            "extracted TEI document"
        );

        Ok(ExtractionResult {
            record,
            abstract_text,
            citations,
        })
    }

    fn document_record(&self, root: Element<'_>) -> Result<CslRecord, QueryError> {
        let authors = self.selector.select(root, HEADER_AUTHORS)?;
        let year = self
            .selector
            .select_first(root, HEADER_DATE)?
            .and_then(|date| year_of(&date));

        Ok(CslRecord {
            title: self.first_text(root, HEADER_TITLE)?,
            author: Some(self.person_names(&authors)?),
            issued: year.as_deref().and_then(Issued::from_year),
            container_title: self.first_text(root, HEADER_CONTAINER)?,
            doi: self.doi(root, HEADER_TYPED_DOI, DOCUMENT_IDNO)?,
            ..CslRecord::default()
        }
        .sparsify())
    }

    fn citation_record(&self, entry: Element<'_>) -> Result<CslRecord, QueryError> {
        let authors =
            self.select_union(entry, &[ENTRY_ANALYTIC_AUTHORS, ENTRY_MONOGR_AUTHORS])?;
        let title = match self.first_text(entry, ENTRY_ANALYTIC_TITLE)? {
            Some(title) => Some(title),
            None => self.first_text(entry, ENTRY_MONOGR_TITLE)?,
        };
        let year = self
            .selector
            .select_first(entry, ENTRY_DATE)?
            .and_then(|date| year_of(&date));

        Ok(CslRecord {
            title,
            author: Some(self.person_names(&authors)?),
            issued: year.as_deref().and_then(Issued::from_year),
            container_title: self.first_text(entry, ENTRY_MONOGR_TITLE)?,
            doi: self.doi(entry, ENTRY_TYPED_DOI, ENTRY_IDNO)?,
            url: self.url(entry)?,
            ..CslRecord::default()
        }
        .sparsify())
    }

    /// Bibliography entries under the back matter, in document order.
    ///
    /// GROBID wraps entries in `listBibl`, other producers in
    /// `div[@type='references']`, and many in both.
    fn bibliography<'a>(&self, root: Element<'a>) -> Result<Vec<Element<'a>>, QueryError> {
        self.select_union(root, &[BIBL_IN_LIST, BIBL_IN_REFERENCES_DIV])
    }

    /// Evaluates the union of `branches`.
    ///
    /// When the engine rejects the combined query as unsupported, each branch
    /// is evaluated on its own, in order, and the results are merged back into
    /// document order without duplicates. Errors from the branches themselves
    /// are returned as is.
    fn select_union<'a>(
        &self,
        context: Element<'a>,
        branches: &[&str],
    ) -> Result<Vec<Element<'a>>, QueryError> {
        let combined = branches.join(" | ");
        match self.selector.select(context, &combined) {
            Err(QueryError::Unsupported { construct, .. }) => {
                debug!(query = %combined, %construct, "combined query unsupported, evaluating branches separately");
                let mut merged = Vec::new();
                for branch in branches {
                    merged.extend(self.selector.select(context, branch)?);
                }
                Ok(document_order(merged))
            }
            other => other,
        }
    }

    /// Text of each `p` under `element`, space-separated. Falls back to the
    /// element's own text when it has no paragraphs.
    fn paragraph_text(&self, element: Element<'_>) -> Result<String, QueryError> {
        let paragraphs = self.selector.select(element, ABSTRACT_PARAGRAPHS)?;
        if paragraphs.is_empty() {
            return Ok(element.text());
        }
        Ok(paragraphs
            .iter()
            .map(|p| p.text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn first_text(&self, context: Element<'_>, expr: &str) -> Result<Option<String>, QueryError> {
        Ok(self
            .selector
            .select_first(context, expr)?
            .map(|e| e.text())
            .filter(|t| !t.is_empty()))
    }

    fn person_names(&self, authors: &[Element<'_>]) -> Result<Vec<PersonName>, QueryError> {
        let mut names = Vec::with_capacity(authors.len());
        for author in authors {
            if let Some(name) = self.person_name(*author)? {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Surname and forenames when present, otherwise the split `persName`
    /// text. `None` when the author carries no name at all.
    fn person_name(&self, author: Element<'_>) -> Result<Option<PersonName>, QueryError> {
        let family = self.first_text(author, AUTHOR_SURNAME)?.unwrap_or_default();
        let given = self
            .selector
            .select(author, AUTHOR_FORENAMES)?
            .iter()
            .map(|f| f.text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !family.is_empty() || !given.is_empty() {
            return Ok(Some(PersonName { family, given }));
        }

        Ok(self
            .first_text(author, AUTHOR_PERS_NAME)?
            .map(|full| split_full_name(&full)))
    }

    /// The DOI-typed identifier, or else the first identifier shaped like a DOI.
    ///
    /// A typed identifier settles the question even when it is empty.
    fn doi(
        &self,
        context: Element<'_>,
        typed: &str,
        any: &str,
    ) -> Result<Option<String>, QueryError> {
        if let Some(idno) = self.selector.select_first(context, typed)? {
            return Ok(Some(idno.text()).filter(|t| !t.is_empty()));
        }
        Ok(self
            .selector
            .select(context, any)?
            .iter()
            .map(|idno| idno.text())
            .find(|text| looks_like_doi(text)))
    }

    fn url(&self, entry: Element<'_>) -> Result<Option<String>, QueryError> {
        for expr in ENTRY_URL_LINKS {
            if let Some(link) = self.selector.select_first(entry, expr)? {
                let target = link
                    .attribute("target")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                return Ok(target.or_else(|| Some(link.text()).filter(|t| !t.is_empty())));
            }
        }
        Ok(None)
    }

    /// The header abstract, or an excerpt of the first body paragraphs.
    fn abstract_text(&self, root: Element<'_>) -> Result<Option<String>, QueryError> {
        if let Some(header) = self.selector.select_first(root, HEADER_ABSTRACT)? {
            let abstract_text = self.paragraph_text(header)?;
            if !abstract_text.is_empty() {
                return Ok(Some(abstract_text));
            }
        }

        let excerpt = self
            .selector
            .select(root, BODY_PARAGRAPHS)?
            .iter()
            .take(FALLBACK_PARAGRAPHS)
            .map(|p| p.text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let excerpt = truncate_chars(excerpt.trim(), FALLBACK_ABSTRACT_MAX_CHARS).trim_end();

        if excerpt.is_empty() {
            debug!("no abstract and no body paragraphs");
            return Ok(None);
        }
        debug!("abstract taken from body paragraphs");
        Ok(Some(excerpt.to_string()))
    }
}

/// Extracts with a default [`Extractor`].
pub fn extract(tei_xml: &str) -> Result<ExtractionResult, ExtractError> {
    Extractor::new().extract(tei_xml)
}

/// Four-character year from a `date` element.
///
/// The normalized `when` attribute wins when it has at least four characters;
/// otherwise the first four digits of the element text are used.
fn year_of(date: &Element<'_>) -> Option<String> {
    if let Some(when) = date.attribute("when") {
        if when.chars().count() >= 4 {
            return Some(when.chars().take(4).collect());
        }
    }

    let digits: String = date
        .text()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(4)
        .collect();
    (digits.len() == 4).then_some(digits)
}

/// Loose DOI shape check: a `10.` registrant prefix and a suffix separator.
fn looks_like_doi(text: &str) -> bool {
    text.contains("10.") && text.contains('/')
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
