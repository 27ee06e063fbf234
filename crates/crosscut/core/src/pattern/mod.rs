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

//! The signature pattern language.
//!
//! Patterns are compiled once from their source strings into anchored
//! regexes. Compilation is idempotent: equal sources produce
//! interchangeable matchers, so patterns compare by source. Malformed
//! pattern syntax is a compile-time [`PatternError`], never a runtime
//! failure mode.

pub mod member_pattern;
pub mod type_pattern;

use thiserror::Error;

pub use member_pattern::{ConstructorPattern, FieldPattern, MethodPattern, NamePattern, ParamToken, ParamsPattern};
pub use type_pattern::TypePattern;

/// Errors raised while compiling a signature pattern.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("malformed pattern '{pattern}': {reason}")]
    Malformed { pattern: String, reason: String },
    #[error("pattern regex compilation failed: {0}")]
    Regex(#[from] regex::Error),
}

impl PatternError {
    pub(crate) fn malformed(pattern: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
