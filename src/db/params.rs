//! Parameter style conversion.
//!
//! Some client libraries only understand positional `%s` placeholders. These
//! helpers rewrite `%(name)s` queries into positional form and remember the
//! rewrite per query text, since callers reuse a small set of fixed statements.

use crate::models::{ErrorClass, LibraryError, Params, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

fn named_placeholder() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%\(.*?\)s").expect("valid placeholder pattern"))
}

/// A query rewritten from named to positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalQuery {
    sql: String,
    /// Parameter names in placeholder order; repeats allowed.
    names: Vec<String>,
}

impl PositionalQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Pick the named values in placeholder order.
    pub fn bind(&self, values: &HashMap<String, Value>) -> Result<Vec<Value>, LibraryError> {
        self.names
            .iter()
            .map(|name| {
                values.get(name).cloned().ok_or_else(|| {
                    LibraryError::new(ErrorClass::Other, format!("missing parameter '{name}'"))
                })
            })
            .collect()
    }
}

/// Rewrite `%(name)s` placeholders to `%s`.
pub fn rewrite_named(sql: &str) -> PositionalQuery {
    let names: Vec<String> = named_placeholder()
        .find_iter(sql)
        .map(|m| {
            let text = m.as_str();
            text[2..text.len() - 2].to_string()
        })
        .collect();

    if names.is_empty() {
        return PositionalQuery {
            sql: sql.to_string(),
            names,
        };
    }

    PositionalQuery {
        sql: named_placeholder().replace_all(sql, "%s").into_owned(),
        names,
    }
}

/// Memoized [`rewrite_named`], keyed by the original query text.
///
/// Concurrent misses on the same key may both compute the rewrite; the result
/// is identical, so whichever insert lands last is as good as the first.
#[derive(Debug, Default)]
pub struct RewriteCache {
    entries: RwLock<HashMap<String, Arc<PositionalQuery>>>,
}

impl RewriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_rewrite(&self, sql: &str) -> Arc<PositionalQuery> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(query) = entries.get(sql) {
                return Arc::clone(query);
            }
        }

        let query = Arc::new(rewrite_named(sql));
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(sql.to_string(), Arc::clone(&query));
        query
    }

    /// Convert `params` to positional form for `sql`.
    ///
    /// Named parameters go through the cache; other shapes pass through.
    pub fn to_positional(
        &self,
        sql: &str,
        params: &Params,
    ) -> Result<(String, Params), LibraryError> {
        match params {
            Params::Named(values) => {
                let query = self.get_or_rewrite(sql);
                let values = query.bind(values)?;
                Ok((query.sql().to_string(), Params::Positional(values)))
            }
            other => Ok((sql.to_string(), other.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Translate `%s` placeholders to `?` and unescape `%%`.
pub fn format_to_qmark(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                out.push('?');
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    out
}
