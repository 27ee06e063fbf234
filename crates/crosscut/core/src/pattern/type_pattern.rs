// Crosscut
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Type name patterns over fully-qualified dotted names.
//!
//! Wildcard semantics: `*` matches word characters within a single dotted
//! segment, `..` matches package segments (zero or more between segments,
//! at least one further segment when trailing), and a trailing `+` widens
//! the match to subtypes. Abbreviated unqualified common types expand
//! through a fixed lookup table before compilation.

use std::fmt;

use regex::Regex;

use crate::model::{ClassInfo, ClassModel};
use crate::pattern::PatternError;

/// Abbreviations for common types usable without qualification.
const TYPE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Object", "lang.Object"),
    ("String", "lang.String"),
    ("StringBuffer", "lang.StringBuffer"),
    ("Integer", "lang.Integer"),
    ("Long", "lang.Long"),
    ("Boolean", "lang.Boolean"),
    ("Throwable", "lang.Throwable"),
    ("Exception", "lang.Exception"),
    ("RuntimeException", "lang.RuntimeException"),
    ("List", "util.List"),
    ("Map", "util.Map"),
    ("Set", "util.Set"),
];

/// Expand an unqualified abbreviated type name, leaving primitives and
/// already-qualified names untouched.
pub fn expand_abbreviation(name: &str) -> &str {
    if name.contains('.') || name.contains('*') {
        return name;
    }
    TYPE_ABBREVIATIONS
        .iter()
        .find(|(abbrev, _)| *abbrev == name)
        .map(|(_, full)| *full)
        .unwrap_or(name)
}

/// A compiled type name pattern.
#[derive(Debug, Clone)]
pub struct TypePattern {
    source: String,
    regex: Regex,
    hierarchy: bool,
}

impl TypePattern {
    /// Compile a pattern from its source string.
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(PatternError::malformed(source, "empty type pattern"));
        }

        let (body, hierarchy) = match trimmed.strip_suffix('+') {
            Some(stripped) if !stripped.is_empty() => (stripped, true),
            Some(_) => return Err(PatternError::malformed(source, "'+' requires a preceding pattern")),
            None => (trimmed, false),
        };

        let body = expand_abbreviation(body);
        let regex = Regex::new(&format!("^{}$", translate(body, source)?))?;

        Ok(Self {
            source: trimmed.to_string(),
            regex,
            hierarchy,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether this pattern also matches subtypes (`+` suffix).
    pub fn matches_hierarchy(&self) -> bool {
        self.hierarchy
    }

    /// Match a fully-qualified type name. Pure string matching; subtype
    /// traversal is [`TypePattern::matches_class`].
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// Match a class, walking its hierarchy when the pattern carries `+`.
    pub fn matches_class(&self, class: &ClassInfo, model: &ClassModel) -> bool {
        if self.hierarchy {
            model.hierarchy_matches(class, &|c| self.matches(&c.name))
        } else {
            self.matches(&class.name)
        }
    }
}

impl PartialEq for TypePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for TypePattern {}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Translate a wildcard pattern body into a regex fragment.
fn translate(body: &str, original: &str) -> Result<String, PatternError> {
    // A lone '*' matches any type, qualified or not.
    if body == "*" {
        return Ok(".*".to_string());
    }

    let chars: Vec<char> = body.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' if chars.get(i + 1) == Some(&'.') => {
                if i == 0 {
                    out.push_str(r"(?:[\w$]+\.)*");
                } else if i + 2 == chars.len() {
                    out.push_str(r"\.(?:[\w$]+\.)*[\w$]+");
                } else {
                    out.push_str(r"\.(?:[\w$]+\.)*");
                }
                i += 2;
            }
            '.' => {
                out.push_str(r"\.");
                i += 1;
            }
            '*' => {
                out.push_str(r"[\w$]*");
                i += 1;
            }
            '$' => {
                out.push_str(r"\$");
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                out.push(c);
                i += 1;
            }
            c => {
                return Err(PatternError::malformed(original, format!("unexpected character '{c}'")));
            }
        }
    }
    Ok(out)
}
