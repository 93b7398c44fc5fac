//! Path queries over the XML tree.
//!
//! Supports the subset of XPath the TEI extractor needs:
//!
//! - relative location paths made of `/` (child) and `//` (descendant) steps,
//!   with an optional leading `.`
//! - name tests `prefix:local`, `local` (no namespace) and `*`
//! - one attribute-equality predicate per step: `[@type='DOI']`
//! - unions of paths: `.//a | .//b`
//!
//! A [`Selector`] declares which of these constructs it is willing to
//! evaluate through [`Capabilities`]. Asking it to evaluate anything else
//! yields [`QueryError::Unsupported`], distinct from a syntax error, so callers
//! can recover by rewriting the query.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::xml::Element;

/// The TEI namespace URI.
pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";

/// A query construct that an engine may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    Union,
    Predicate,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Construct::Union => write!(f, "union"),
            Construct::Predicate => write!(f, "predicate"),
        }
    }
}

/// Errors that can occur when compiling or evaluating a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("invalid query '{expr}': {message}")]
    Syntax { expr: String, message: String },

    #[error("query '{expr}' uses an unsupported {construct}")]
    Unsupported { expr: String, construct: Construct },
}

/// Prefix to namespace URI bindings used to resolve name tests.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    prefixes: HashMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `prefix` to `uri`.
    pub fn with(mut self, prefix: &str, uri: &str) -> Self {
        self.prefixes.insert(prefix.to_string(), uri.to_string());
        self
    }

    /// Bindings with `tei` mapped to the TEI namespace.
    pub fn tei() -> Self {
        Self::new().with("tei", TEI_NS)
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }
}

/// Query constructs an engine is able to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub unions: bool,
    pub predicates: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            unions: true,
            predicates: true,
        }
    }
}

impl Capabilities {
    /// Everything except `|` unions.
    pub fn without_unions() -> Self {
        Self {
            unions: false,
            ..Self::default()
        }
    }

    fn check(&self, query: &Query) -> Result<(), QueryError> {
        if !self.unions && query.paths.len() > 1 {
            return Err(QueryError::Unsupported {
                expr: query.expr.clone(),
                construct: Construct::Union,
            });
        }
        let has_predicate = query
            .paths
            .iter()
            .flat_map(|p| &p.steps)
            .any(|s| s.predicate.is_some());
        if !self.predicates && has_predicate {
            return Err(QueryError::Unsupported {
                expr: query.expr.clone(),
                construct: Construct::Predicate,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq)]
enum NameTest {
    Any,
    Named {
        namespace: Option<String>,
        local: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct AttrPredicate {
    name: String,
    value: String,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicate: Option<AttrPredicate>,
}

impl Step {
    fn matches(&self, element: &Element<'_>) -> bool {
        let name_ok = match &self.test {
            NameTest::Any => true,
            NameTest::Named { namespace, local } => {
                element.local_name() == local && element.namespace() == namespace.as_deref()
            }
        };
        name_ok
            && self
                .predicate
                .as_ref()
                .map_or(true, |p| element.attribute(&p.name) == Some(p.value.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Path {
    steps: Vec<Step>,
}

/// A compiled query.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    expr: String,
    paths: Vec<Path>,
}

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:([A-Za-z_][\w.-]*):)?([A-Za-z_][\w.-]*)|\*)$").unwrap()
});

static PREDICATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*@([A-Za-z_][\w.:-]*)\s*=\s*(?:'([^']*)'|"([^"]*)")\s*$"#).unwrap()
});

impl Query {
    /// Compiles `expr`, resolving prefixes through `namespaces`.
    pub fn compile(expr: &str, namespaces: &Namespaces) -> Result<Query, QueryError> {
        let syntax = |message: String| QueryError::Syntax {
            expr: expr.to_string(),
            message,
        };

        let mut paths = Vec::new();
        for branch in split_outside_brackets(expr, '|').map_err(syntax)? {
            paths.push(compile_path(branch, namespaces).map_err(syntax)?);
        }

        Ok(Query {
            expr: expr.to_string(),
            paths,
        })
    }

    /// Number of union branches.
    pub fn branch_count(&self) -> usize {
        self.paths.len()
    }

    /// Evaluates the query relative to `context`.
    ///
    /// Results are in document order, without duplicates.
    pub fn evaluate<'a>(&self, context: Element<'a>) -> Vec<Element<'a>> {
        let mut found = Vec::new();
        for path in &self.paths {
            let mut current = vec![context];
            for step in &path.steps {
                let mut next = Vec::new();
                for node in &current {
                    match step.axis {
                        Axis::Child => next.extend(node.children().filter(|e| step.matches(e))),
                        Axis::Descendant => next.extend(
                            node.descendants().into_iter().filter(|e| step.matches(e)),
                        ),
                    }
                }
                current = document_order(next);
            }
            found.extend(current);
        }
        document_order(found)
    }
}

/// Sorts elements into document order and drops duplicates.
pub fn document_order(mut elements: Vec<Element<'_>>) -> Vec<Element<'_>> {
    elements.sort_by_key(|e| e.id());
    elements.dedup_by_key(|e| e.id());
    elements
}

/// Splits on `sep` where it appears outside `[...]` and quoted strings.
fn split_outside_brackets(expr: &str, sep: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced ']' at offset {}", i))?;
            }
            (None, c) if c == sep && depth == 0 => {
                parts.push(&expr[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    if depth != 0 {
        return Err("unbalanced '['".to_string());
    }
    parts.push(&expr[start..]);
    Ok(parts)
}

fn compile_path(branch: &str, namespaces: &Namespaces) -> Result<Path, String> {
    let branch = branch.trim();
    let mut rest = branch.strip_prefix('.').unwrap_or(branch);
    if rest.is_empty() {
        return Err("empty location path".to_string());
    }

    let mut steps = Vec::new();
    while !rest.is_empty() {
        let (axis, after_axis) = if let Some(r) = rest.strip_prefix("//") {
            (Axis::Descendant, r)
        } else if let Some(r) = rest.strip_prefix('/') {
            (Axis::Child, r)
        } else {
            return Err(format!("expected '/' or '//' before '{}'", rest));
        };

        let name_end = after_axis.find(['/', '[']).unwrap_or(after_axis.len());
        let test = compile_name(after_axis[..name_end].trim(), namespaces)?;
        rest = &after_axis[name_end..];

        let mut predicate = None;
        if let Some(after_open) = rest.strip_prefix('[') {
            let close = closing_bracket(after_open)
                .ok_or_else(|| "unbalanced '['".to_string())?;
            predicate = Some(compile_predicate(&after_open[..close])?);
            rest = &after_open[close + 1..];
            if rest.starts_with('[') {
                return Err("only one predicate per step is supported".to_string());
            }
        }

        steps.push(Step {
            axis,
            test,
            predicate,
        });
    }

    Ok(Path { steps })
}

fn compile_name(name: &str, namespaces: &Namespaces) -> Result<NameTest, String> {
    let caps = NAME_RE
        .captures(name)
        .ok_or_else(|| format!("invalid name test '{}'", name))?;

    let Some(local) = caps.get(2) else {
        return Ok(NameTest::Any);
    };
    let namespace = match caps.get(1) {
        Some(prefix) => Some(
            namespaces
                .resolve(prefix.as_str())
                .ok_or_else(|| format!("unbound namespace prefix '{}'", prefix.as_str()))?
                .to_string(),
        ),
        None => None,
    };

    Ok(NameTest::Named {
        namespace,
        local: local.as_str().to_string(),
    })
}

fn compile_predicate(body: &str) -> Result<AttrPredicate, String> {
    let caps = PREDICATE_RE
        .captures(body)
        .ok_or_else(|| format!("unsupported predicate syntax '[{}]'", body))?;
    let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());

    Ok(AttrPredicate {
        name: caps[1].to_string(),
        value: value.to_string(),
    })
}

/// Offset of the `]` closing a predicate body, skipping quoted strings.
fn closing_bracket(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ']') => return Some(i),
            _ => {}
        }
    }
    None
}

/// Compiles and evaluates queries within a fixed set of capabilities.
#[derive(Debug, Clone)]
pub struct Selector {
    namespaces: Namespaces,
    capabilities: Capabilities,
}

impl Selector {
    pub fn new(namespaces: Namespaces, capabilities: Capabilities) -> Self {
        Self {
            namespaces,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// All elements matching `expr` relative to `context`, in document order.
    pub fn select<'a>(
        &self,
        context: Element<'a>,
        expr: &str,
    ) -> Result<Vec<Element<'a>>, QueryError> {
        let query = Query::compile(expr, &self.namespaces)?;
        self.capabilities.check(&query)?;
        Ok(query.evaluate(context))
    }

    /// The first element matching `expr`, if any.
    pub fn select_first<'a>(
        &self,
        context: Element<'a>,
        expr: &str,
    ) -> Result<Option<Element<'a>>, QueryError> {
        Ok(self.select(context, expr)?.into_iter().next())
    }
}
