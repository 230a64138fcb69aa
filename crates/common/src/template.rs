//! Command templating
//!
//! `$name` tokens are replaced with the value of `name` from the test's
//! namespace. Values are inserted verbatim and never re-scanned. A `$` that
//! is not followed by an identifier is kept as is.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{Error, Result};
use crate::vars::{VariableNamespace, MASK};

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid token pattern"));

/// Renders command templates against a variable namespace
pub struct CommandTemplater;

impl CommandTemplater {
    /// Substitute every `$name` token of `template`.
    ///
    /// Fails on the first token whose name is not in `namespace`.
    pub fn render(template: &str, namespace: &VariableNamespace) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in TOKEN.captures_iter(template) {
            let (whole, name) = split(&caps);
            let value = namespace.get(name).ok_or_else(|| Error::Template {
                name: name.to_string(),
                template: template.to_string(),
            })?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }

        out.push_str(&template[last..]);
        Ok(out)
    }

    /// Render for display: sensitive values are masked and unknown tokens are
    /// left in place instead of failing.
    pub fn render_masked(template: &str, namespace: &VariableNamespace) -> String {
        TOKEN
            .replace_all(template, |caps: &Captures<'_>| {
                let (whole, name) = split(caps);
                match namespace.get(name) {
                    Some(_) if VariableNamespace::is_sensitive(name) => MASK.to_string(),
                    Some(value) => value.to_string(),
                    None => whole.as_str().to_string(),
                }
            })
            .into_owned()
    }
}

fn split<'t>(caps: &Captures<'t>) -> (regex::Match<'t>, &'t str) {
    // group 0 and group 1 always participate in a match of TOKEN
    let whole = caps.get(0).expect("group 0");
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    (whole, name)
}
