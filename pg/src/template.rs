//! Vertex id templates
//!
//! Id templates are Handlebars templates restricted to plain `{{field}}`
//! substitution. The built-in helpers are removed, so a field named `len` or
//! `if` is looked up like any other, and block, partial and helper-call
//! expressions are rejected when the template is registered. Rendering is best
//! effort: a missing field renders as an empty string and a render failure
//! yields an empty id.

use handlebars::Handlebars;
use tracing::{debug, warn};

use crate::Record;
use crate::error::SchemaError;

/// Helpers a stock `Handlebars` registry ships with
const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "raw", "log", "eq", "ne", "gt", "gte", "lt", "lte", "and", "or", "not",
    "len",
];

/// Compiled id templates, one per rule label
#[derive(Debug)]
pub struct IdTemplates {
    hbs: Handlebars<'static>,
}

impl IdTemplates {
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(false);
        hbs.register_escape_fn(handlebars::no_escape);
        for name in BUILTIN_HELPERS {
            hbs.unregister_helper(name);
        }
        Self { hbs }
    }

    /// Compile and register the template for `label`, replacing any previous one
    pub fn register(&mut self, label: &str, template: &str) -> Result<(), SchemaError> {
        debug!(%label, %template, "IdTemplates::register: called");
        check_substitution(template).map_err(|message| SchemaError::InvalidTemplate {
            label: label.to_string(),
            message,
        })?;
        self.hbs
            .register_template_string(label, template)
            .map_err(|e| SchemaError::InvalidTemplate {
                label: label.to_string(),
                message: e.to_string(),
            })
    }

    /// Render the id for a record of the given label
    pub fn render(&self, label: &str, record: &Record) -> String {
        match self.hbs.render(label, record) {
            Ok(id) => id,
            Err(e) => {
                warn!(%label, error = %e, "Failed to render id template, using empty id");
                String::new()
            }
        }
    }

    pub fn has_template(&self, label: &str) -> bool {
        self.hbs.has_template(label)
    }
}

/// Accept only `{{path}}` expressions
fn check_substitution(template: &str) -> Result<(), String> {
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        // Unterminated expressions are left to the parser
        let Some(end) = after.find("}}") else {
            return Ok(());
        };
        let expr = after[..end]
            .trim_start_matches(['{', '&', '~'])
            .trim_end_matches(['}', '~'])
            .trim();
        if expr.is_empty()
            || expr.starts_with(['#', '/', '^', '>', '!', '*'])
            || expr == "else"
            || expr.contains(['(', '='])
            || has_bare_whitespace(expr)
        {
            return Err(format!("'{}' is not a plain field substitution", expr));
        }
        rest = &after[end + 2..];
    }
    Ok(())
}

/// Whitespace outside `[...]` path segments separates helper arguments
fn has_bare_whitespace(expr: &str) -> bool {
    let mut in_segment = false;
    for c in expr.chars() {
        match c {
            '[' => in_segment = true,
            ']' => in_segment = false,
            c if c.is_whitespace() && !in_segment => return true,
            _ => {}
        }
    }
    false
}

impl Default for IdTemplates {
    fn default() -> Self {
        Self::new()
    }
}
