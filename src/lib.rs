//! tei-csl: extract CSL-JSON citation records from TEI-XML documents.
//!
//! This library provides functionality to:
//! - Parse TEI-XML (as produced by GROBID) into a namespace-aware tree
//! - Query that tree with a small XPath subset
//! - Recover the document's own CSL record, its abstract and its bibliography
//! - Serve the extraction over HTTP

pub mod config;
pub mod csl;
pub mod extract;
pub mod query;
pub mod server;
pub mod service;
pub mod xml;

pub use config::Settings;
pub use csl::{split_full_name, CslRecord, ExtractionResult, Issued, PersonName};
pub use extract::{extract, ExtractError, Extractor};
pub use query::{Capabilities, QueryError};
pub use service::{parse_tei, ServiceError, TeiParseRequest, TeiParseResponse};
pub use xml::XmlError;
