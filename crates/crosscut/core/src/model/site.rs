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

//! Call-side code sites inside method bodies.
//!
//! Execution-side join points come straight from a class's declared
//! members; call-side join points (method call, field get/set, constructor
//! call, exception handler) need the class-loading hook to report where
//! inside a body they occur. A [`CodeSite`] is that report.

/// The shape of a call-side code location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    /// Invocation of `callee_class.method_name(..)`.
    MethodCall {
        callee_class: String,
        method_name: String,
    },
    /// Read of `declaring_class.field_name`.
    FieldGet {
        declaring_class: String,
        field_name: String,
    },
    /// Write of `declaring_class.field_name`.
    FieldSet {
        declaring_class: String,
        field_name: String,
    },
    /// `new callee_class(..)`.
    ConstructorCall { callee_class: String },
    /// A catch block for `exception_class`.
    Handler { exception_class: String },
}

/// One call-side location: what happens, and inside which method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSite {
    /// Name of the enclosing method within the reporting class.
    pub within_method: String,
    pub kind: SiteKind,
}

impl CodeSite {
    pub fn call(within_method: impl Into<String>, callee_class: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            within_method: within_method.into(),
            kind: SiteKind::MethodCall {
                callee_class: callee_class.into(),
                method_name: method_name.into(),
            },
        }
    }

    pub fn field_get(within_method: impl Into<String>, declaring_class: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            within_method: within_method.into(),
            kind: SiteKind::FieldGet {
                declaring_class: declaring_class.into(),
                field_name: field_name.into(),
            },
        }
    }

    pub fn field_set(within_method: impl Into<String>, declaring_class: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            within_method: within_method.into(),
            kind: SiteKind::FieldSet {
                declaring_class: declaring_class.into(),
                field_name: field_name.into(),
            },
        }
    }

    pub fn constructor_call(within_method: impl Into<String>, callee_class: impl Into<String>) -> Self {
        Self {
            within_method: within_method.into(),
            kind: SiteKind::ConstructorCall {
                callee_class: callee_class.into(),
            },
        }
    }

    pub fn handler(within_method: impl Into<String>, exception_class: impl Into<String>) -> Self {
        Self {
            within_method: within_method.into(),
            kind: SiteKind::Handler {
                exception_class: exception_class.into(),
            },
        }
    }
}
