//! CSL-JSON records produced from TEI documents.
//!
//! Records are sparse: a field that could not be recovered is left out of the
//! serialized JSON entirely rather than written as `null` or `""`.

use serde::{Deserialize, Serialize};

/// The only CSL item type emitted.
pub const ARTICLE_JOURNAL: &str = "article-journal";

/// A CSL name variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub family: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub given: String,
}

impl PersonName {
    pub fn is_empty(&self) -> bool {
        self.family.is_empty() && self.given.is_empty()
    }
}

/// Splits a free-text personal name on whitespace.
///
/// The last token becomes the family name and the preceding tokens, joined by
/// a single space, the given name. A single token is taken as a family name.
///
/// # Examples
///
/// ```
/// use tei_csl::split_full_name;
///
/// let name = split_full_name("Jane Q. Public");
/// assert_eq!(name.family, "Public");
/// assert_eq!(name.given, "Jane Q.");
/// ```
pub fn split_full_name(text: &str) -> PersonName {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    let family = tokens.pop().unwrap_or_default().to_string();
    PersonName {
        family,
        given: tokens.join(" "),
    }
}

/// A CSL date variable carrying only a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issued {
    #[serde(rename = "date-parts")]
    pub date_parts: Vec<Vec<i32>>,
}

impl Issued {
    /// Builds `{"date-parts": [[year]]}` when `year` is made only of ASCII digits.
    pub fn from_year(year: &str) -> Option<Issued> {
        if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year = year.parse().ok()?;
        Some(Issued {
            date_parts: vec![vec![year]],
        })
    }

    pub fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied()
    }
}

/// A CSL-JSON item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CslRecord {
    #[serde(rename = "type")]
    pub item_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Vec<PersonName>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<Issued>,

    #[serde(
        rename = "container-title",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container_title: Option<String>,

    #[serde(rename = "DOI", default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Default for CslRecord {
    fn default() -> Self {
        Self {
            item_type: ARTICLE_JOURNAL.to_string(),
            title: None,
            author: None,
            issued: None,
            container_title: None,
            doi: None,
            url: None,
        }
    }
}

impl CslRecord {
    /// Drops empty strings, nameless authors and empty author lists.
    pub fn sparsify(mut self) -> Self {
        fn text(value: Option<String>) -> Option<String> {
            value.filter(|s| !s.trim().is_empty())
        }

        self.title = text(self.title);
        self.container_title = text(self.container_title);
        self.doi = text(self.doi);
        self.url = text(self.url);
        self.author = self
            .author
            .map(|names| {
                names
                    .into_iter()
                    .filter(|n| !n.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|names| !names.is_empty());
        self.issued = self.issued.filter(|i| i.year().is_some());
        self
    }
}

/// Everything recovered from one TEI document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// The document's own record.
    pub record: CslRecord,
    pub abstract_text: Option<String>,
    /// Bibliography entries in document order.
    pub citations: Vec<CslRecord>,
}
