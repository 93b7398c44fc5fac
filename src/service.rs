//! Request/response boundary around the extractor.
//!
//! Transport-agnostic: the HTTP server and the CLI both go through
//! [`parse_tei`] and serialize [`TeiParseResponse`] as-is.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::csl::{CslRecord, ExtractionResult};
use crate::extract::{ExtractError, Extractor};
use crate::query::QueryError;
use crate::xml::XmlError;

/// A TEI document submitted for parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeiParseRequest {
    pub tei_xml: String,
}

/// The extraction result as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeiParseResponse {
    pub csl_json: CslRecord,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub citations: Vec<CslRecord>,
}

impl From<ExtractionResult> for TeiParseResponse {
    fn from(result: ExtractionResult) -> Self {
        Self {
            csl_json: result.record,
            abstract_text: result.abstract_text,
            citations: result.citations,
        }
    }
}

/// Errors reported to callers of the boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// The submitted document is not well-formed XML.
    #[error("Invalid TEI XML: {0}")]
    InvalidXml(XmlError),

    /// The query engine could not evaluate a construct, even after falling back.
    #[error("TEI query not supported: {0}")]
    UnsupportedQuery(QueryError),

    /// A built-in query failed to compile.
    #[error("TEI query error: {0}")]
    Query(QueryError),

    /// The extraction task did not run to completion.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidXml(_) => "invalid_xml",
            ServiceError::UnsupportedQuery(_) => "unsupported_query",
            ServiceError::Query(_) => "query_error",
            ServiceError::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller's input is at fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ServiceError::Query(_) | ServiceError::Internal(_))
    }
}

impl From<ExtractError> for ServiceError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::InvalidXml(e) => ServiceError::InvalidXml(e),
            ExtractError::Query(e @ QueryError::Unsupported { .. }) => {
                ServiceError::UnsupportedQuery(e)
            }
            ExtractError::Query(e) => ServiceError::Query(e),
        }
    }
}

/// Runs `extractor` over the request's TEI document.
pub fn parse_tei(
    extractor: &Extractor,
    request: &TeiParseRequest,
) -> Result<TeiParseResponse, ServiceError> {
    Ok(extractor.extract(&request.tei_xml)?.into())
}
