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

//! Dispatch-time error taxonomy.
//!
//! Business exceptions raised by advice or the original operation travel
//! as [`DispatchFault::Thrown`] and are never wrapped or swallowed.
//! Framework-internal invariant violations are [`DispatchFault::Internal`]
//! and stay invisible to afterThrowing filters.

use std::fmt;

use thiserror::Error;

/// Framework-internal dispatch errors: invalid dispatch state, not
/// business failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("join point '{0}' is not installed")]
    UnknownJoinPoint(String),
    #[error("proceed() called outside the dynamic extent of a join-point activation")]
    IllegalState,
    #[error("aspect '{aspect}' has no registered container")]
    UnknownAspect { aspect: String },
    #[error("advice method '{method}' of aspect '{aspect}' is not registered")]
    UnresolvedAdvice { aspect: String, method: String },
    #[error("join point '{join_point}' needs a target instance for {deployment} deployment")]
    MissingTarget { join_point: String, deployment: String },
    #[error("woven unit for '{class}' is stale (woven at generation {woven}, definitions at {current})")]
    StaleUnit { class: String, woven: u64, current: u64 },
    #[error("re-weaving '{class}' failed: {reason}")]
    ReweaveFailed { class: String, reason: String },
}

/// A business exception crossing the dispatch boundary: the advised
/// program's exception type plus its message.
#[derive(Debug, Clone, PartialEq)]
pub struct Thrown {
    pub exception_type: String,
    pub message: String,
}

impl Thrown {
    pub fn new(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exception_type, self.message)
    }
}

/// Everything that can travel outward through `proceed()` frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchFault {
    /// A business exception; propagates unchanged to the join point's
    /// caller, visible to matching afterThrowing advice.
    #[error("{0}")]
    Thrown(Thrown),
    /// A framework invariant violation; never visible to afterThrowing.
    #[error("dispatch error: {0}")]
    Internal(#[from] DispatchError),
}

impl DispatchFault {
    pub fn thrown(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Thrown(Thrown::new(exception_type, message))
    }

    pub fn as_thrown(&self) -> Option<&Thrown> {
        match self {
            Self::Thrown(thrown) => Some(thrown),
            Self::Internal(_) => None,
        }
    }
}
