//! Lightweight `{dotted.field}` templates.
//!
//! A template is raw text with placeholders like `{user.name}` or
//! `{packs.evidence}` that are resolved against a JSON variable map at
//! assembly time. Rendering is deterministic and allocation-light: a
//! single left-to-right scan, no regex.
//!
//! `{{` and `}}` escape literal braces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Assembly-time variables: a JSON object whose fields are addressed by
/// dotted paths from template placeholders.
pub type Vars = serde_json::Map<String, Value>;

/// Raw template text with `{dotted.field}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(pub String);

impl Template {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw, unrendered text.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Whether the template references the given dotted path.
    pub fn references(&self, path: &str) -> bool {
        self.placeholders().any(|p| p == path)
    }

    /// Iterate over the dotted paths of every placeholder, in order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        let mut rest = self.0.as_str();
        std::iter::from_fn(move || {
            loop {
                let open = rest.find('{')?;
                // `{{` is an escaped literal brace
                if rest[open + 1..].starts_with('{') {
                    rest = &rest[open + 2..];
                    continue;
                }
                let close = match rest[open..].find('}') {
                    Some(i) => open + i,
                    None => return None,
                };
                let path = &rest[open + 1..close];
                rest = &rest[close + 1..];
                return Some(path);
            }
        })
    }

    /// Render the template against `vars`.
    ///
    /// Every placeholder must resolve to a scalar (string, number or
    /// bool); a missing path or a non-scalar value is an
    /// [`Error::Template`] naming the placeholder.
    pub fn render(&self, vars: &Vars) -> Result<String> {
        let raw = self.0.as_str();
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open].replace("}}", "}"));
            if rest[open + 1..].starts_with('{') {
                out.push('{');
                rest = &rest[open + 2..];
                continue;
            }
            let close = rest[open..]
                .find('}')
                .ok_or_else(|| Error::Template(rest[open..].to_string()))?
                + open;
            let path = &rest[open + 1..close];
            out.push_str(&resolve_path(vars, path)?);
            rest = &rest[close + 1..];
        }
        out.push_str(&rest.replace("}}", "}"));
        Ok(out)
    }
}

impl From<&str> for Template {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Walk a dotted path through a JSON object and stringify the leaf.
fn resolve_path(vars: &Vars, path: &str) -> Result<String> {
    let mut current: Option<&Value> = None;
    for segment in path.split('.') {
        current = match current {
            None => vars.get(segment),
            Some(Value::Object(map)) => map.get(segment),
            Some(_) => None,
        };
        if current.is_none() {
            return Err(Error::Template(path.to_string()));
        }
    }
    match current {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(Error::Template(path.to_string())),
    }
}
