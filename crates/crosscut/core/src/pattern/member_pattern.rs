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

//! Member signature patterns: methods, fields, constructors.
//!
//! Grammar, in the order the parser consumes it:
//!
//! ```text
//! method pattern       [@Anno]* [modifier]* return-type declaring.name(params) [throws type]
//! constructor pattern  [modifier]* declaring.new(params)
//! field pattern        [@Anno]* [modifier]* field-type declaring.name
//! ```
//!
//! Parameter lists match exactly; `(..)` matches any list, and a single
//! `..` slot inside a list absorbs zero or more types at that position.

use std::fmt;

use regex::Regex;

use crate::model::{modifiers, ClassInfo, ClassModel, ConstructorInfo, FieldInfo, MethodInfo};
use crate::pattern::type_pattern::{expand_abbreviation, TypePattern};
use crate::pattern::PatternError;

/// A member name pattern: word characters and `*` wildcards, no dots.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        if source.is_empty() {
            return Err(PatternError::malformed(source, "empty name pattern"));
        }
        let mut out = String::from("^");
        for c in source.chars() {
            match c {
                '*' => out.push_str(r"[\w$]*"),
                '$' => out.push_str(r"\$"),
                c if c.is_alphanumeric() || c == '_' => out.push(c),
                c => return Err(PatternError::malformed(source, format!("unexpected character '{c}' in name"))),
            }
        }
        out.push('$');
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(&out)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// One slot of a declared parameter list pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamToken {
    Type(TypePattern),
    /// `..`: zero or more parameters at this position.
    Ellipsis,
}

/// A parameter list pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamsPattern {
    /// `(..)`: any parameter list.
    Any,
    /// An explicit list, possibly containing one `..` slot.
    List(Vec<ParamToken>),
}

impl ParamsPattern {
    fn parse(inner: &str, original: &str) -> Result<Self, PatternError> {
        let inner = inner.trim();
        if inner.is_empty() {
            return Ok(Self::List(Vec::new()));
        }
        if inner == ".." {
            return Ok(Self::Any);
        }
        let mut tokens = Vec::new();
        let mut ellipsis_seen = false;
        for part in inner.split(',') {
            let part = part.trim();
            if part == ".." {
                if ellipsis_seen {
                    return Err(PatternError::malformed(original, "at most one '..' per parameter list"));
                }
                ellipsis_seen = true;
                tokens.push(ParamToken::Ellipsis);
            } else if part.is_empty() {
                return Err(PatternError::malformed(original, "empty parameter slot"));
            } else {
                tokens.push(ParamToken::Type(TypePattern::compile(part)?));
            }
        }
        Ok(Self::List(tokens))
    }

    /// Match a concrete parameter type list.
    pub fn matches(&self, parameter_types: &[String]) -> bool {
        match self {
            Self::Any => true,
            Self::List(tokens) => match tokens.iter().position(|t| *t == ParamToken::Ellipsis) {
                None => {
                    tokens.len() == parameter_types.len()
                        && tokens.iter().zip(parameter_types).all(|(t, p)| token_matches(t, p))
                }
                Some(split) => {
                    let prefix = &tokens[..split];
                    let suffix = &tokens[split + 1..];
                    if parameter_types.len() < prefix.len() + suffix.len() {
                        return false;
                    }
                    let tail_start = parameter_types.len() - suffix.len();
                    prefix.iter().zip(&parameter_types[..prefix.len()]).all(|(t, p)| token_matches(t, p))
                        && suffix.iter().zip(&parameter_types[tail_start..]).all(|(t, p)| token_matches(t, p))
                }
            },
        }
    }
}

fn token_matches(token: &ParamToken, parameter_type: &str) -> bool {
    match token {
        ParamToken::Type(tp) => tp.matches(parameter_type),
        ParamToken::Ellipsis => true,
    }
}

/// A compiled method signature pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodPattern {
    source: String,
    pub annotations: Vec<String>,
    pub required_modifiers: u32,
    pub return_type: TypePattern,
    pub declaring_type: TypePattern,
    pub name: NamePattern,
    pub params: ParamsPattern,
    pub throws: Option<TypePattern>,
}

impl MethodPattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        let (head, params_inner, tail) = split_parens(trimmed, source)?;

        let throws = match tail.trim() {
            "" => None,
            rest => match rest.strip_prefix("throws ") {
                Some(tp) => Some(TypePattern::compile(tp.trim())?),
                None => return Err(PatternError::malformed(source, format!("unexpected trailing '{rest}'"))),
            },
        };

        let (annotations, head) = strip_annotations(head);
        let mut tokens: Vec<&str> = head.split_whitespace().collect();
        let target = tokens
            .pop()
            .ok_or_else(|| PatternError::malformed(source, "missing declaring type and method name"))?;

        let mut required_modifiers = 0u32;
        let mut return_token = None;
        for token in tokens {
            match modifiers::from_keyword(token) {
                Some(bit) if return_token.is_none() => required_modifiers |= bit,
                _ if return_token.is_none() => return_token = Some(token),
                _ => return Err(PatternError::malformed(source, format!("unexpected token '{token}'"))),
            }
        }
        let return_token = return_token.ok_or_else(|| PatternError::malformed(source, "missing return type"))?;

        let (declaring, name) = target
            .rsplit_once('.')
            .ok_or_else(|| PatternError::malformed(source, "method pattern requires 'declaring.name'"))?;

        Ok(Self {
            source: trimmed.to_string(),
            annotations,
            required_modifiers,
            return_type: TypePattern::compile(return_token)?,
            declaring_type: TypePattern::compile(declaring)?,
            name: NamePattern::compile(name)?,
            params: ParamsPattern::parse(params_inner, source)?,
            throws,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a method executing on (or called through) `class`.
    pub fn matches_method(&self, method: &MethodInfo, class: &ClassInfo, model: &ClassModel) -> bool {
        self.annotations.iter().all(|a| method.has_annotation(a))
            && (method.modifiers & self.required_modifiers) == self.required_modifiers
            && self.return_type.matches(expand_abbreviation(&method.return_type))
            && self.name.matches(&method.name)
            && self.declaring_type.matches_class(class, model)
            && self.params.matches(&method.parameter_types)
            && self.throws.as_ref().is_none_or(|tp| method.exception_types.iter().any(|e| tp.matches(e)))
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A compiled constructor signature pattern (`declaring.new(params)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorPattern {
    source: String,
    pub required_modifiers: u32,
    pub declaring_type: TypePattern,
    pub params: ParamsPattern,
}

impl ConstructorPattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        let (head, params_inner, tail) = split_parens(trimmed, source)?;
        if !tail.trim().is_empty() {
            return Err(PatternError::malformed(source, format!("unexpected trailing '{}'", tail.trim())));
        }

        let mut tokens: Vec<&str> = head.split_whitespace().collect();
        let target = tokens
            .pop()
            .ok_or_else(|| PatternError::malformed(source, "missing declaring type"))?;

        let mut required_modifiers = 0u32;
        for token in tokens {
            match modifiers::from_keyword(token) {
                Some(bit) => required_modifiers |= bit,
                None => return Err(PatternError::malformed(source, format!("unexpected token '{token}'"))),
            }
        }

        let declaring = target
            .strip_suffix(".new")
            .ok_or_else(|| PatternError::malformed(source, "constructor pattern requires 'declaring.new(..)'"))?;

        Ok(Self {
            source: trimmed.to_string(),
            required_modifiers,
            declaring_type: TypePattern::compile(declaring)?,
            params: ParamsPattern::parse(params_inner, source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches_constructor(&self, constructor: &ConstructorInfo, class: &ClassInfo, model: &ClassModel) -> bool {
        (constructor.modifiers & self.required_modifiers) == self.required_modifiers
            && self.declaring_type.matches_class(class, model)
            && self.params.matches(&constructor.parameter_types)
    }
}

/// A compiled field signature pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPattern {
    source: String,
    pub annotations: Vec<String>,
    pub required_modifiers: u32,
    pub field_type: TypePattern,
    pub declaring_type: TypePattern,
    pub name: NamePattern,
}

impl FieldPattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        let (annotations, head) = strip_annotations(trimmed);
        let mut tokens: Vec<&str> = head.split_whitespace().collect();
        let target = tokens
            .pop()
            .ok_or_else(|| PatternError::malformed(source, "missing declaring type and field name"))?;

        let mut required_modifiers = 0u32;
        let mut type_token = None;
        for token in tokens {
            match modifiers::from_keyword(token) {
                Some(bit) if type_token.is_none() => required_modifiers |= bit,
                _ if type_token.is_none() => type_token = Some(token),
                _ => return Err(PatternError::malformed(source, format!("unexpected token '{token}'"))),
            }
        }
        let type_token = type_token.ok_or_else(|| PatternError::malformed(source, "missing field type"))?;

        let (declaring, name) = target
            .rsplit_once('.')
            .ok_or_else(|| PatternError::malformed(source, "field pattern requires 'declaring.name'"))?;

        Ok(Self {
            source: trimmed.to_string(),
            annotations,
            required_modifiers,
            field_type: TypePattern::compile(type_token)?,
            declaring_type: TypePattern::compile(declaring)?,
            name: NamePattern::compile(name)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches_field(&self, field: &FieldInfo, class: &ClassInfo, model: &ClassModel) -> bool {
        self.annotations.iter().all(|a| field.has_annotation(a))
            && (field.modifiers & self.required_modifiers) == self.required_modifiers
            && self.field_type.matches(expand_abbreviation(&field.field_type))
            && self.name.matches(&field.name)
            && self.declaring_type.matches_class(class, model)
    }
}

/// Split `head(params)tail`, validating the parens are present and balanced.
fn split_parens<'a>(source: &'a str, original: &str) -> Result<(&'a str, &'a str, &'a str), PatternError> {
    let open = source
        .find('(')
        .ok_or_else(|| PatternError::malformed(original, "missing parameter list"))?;
    let close = source
        .rfind(')')
        .filter(|close| *close > open)
        .ok_or_else(|| PatternError::malformed(original, "unbalanced parameter list"))?;
    Ok((&source[..open], &source[open + 1..close], &source[close + 1..]))
}

/// Strip leading `@Anno` markers, returning them plus the remaining head.
fn strip_annotations(head: &str) -> (Vec<String>, &str) {
    let mut annotations = Vec::new();
    let mut rest = head.trim_start();
    while let Some(stripped) = rest.strip_prefix('@') {
        let end = stripped.find(char::is_whitespace).unwrap_or(stripped.len());
        annotations.push(stripped[..end].to_string());
        rest = stripped[end..].trim_start();
    }
    (annotations, rest)
}
