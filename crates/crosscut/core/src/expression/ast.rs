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

//! The pointcut expression tree: a small boolean algebra over leaf
//! pointcut primitives. Immutable once parsed.

use std::fmt;
use std::sync::Arc;

use crate::pattern::{ConstructorPattern, FieldPattern, MethodPattern, TypePattern};

/// Identity of a `cflow` sub-expression, derived from its normalized
/// source text. Join points that match the inner expression push this id
/// onto the thread's marker stack; `cflow` leaves test for its presence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CflowId(Arc<str>);

impl CflowId {
    pub fn new(source: &str) -> Self {
        Self(Arc::from(source.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A member pattern usable where executions and calls accept both method
/// and constructor signatures (`a.B.m(..)` vs `a.B.new(..)`).
#[derive(Debug, Clone, PartialEq)]
pub enum MemberPattern {
    Method(MethodPattern),
    Constructor(ConstructorPattern),
}

/// One slot of an `args(..)` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgEntry {
    /// `..`: zero or more arguments at this position.
    Ellipsis,
    /// A type pattern the argument's declared type must match.
    Type(TypePattern),
    /// A name bound to the advice method's parameter of the same name.
    Binding(String),
}

/// The argument of a `target(..)` or `this(..)` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSpec {
    Type(TypePattern),
    Binding(String),
}

/// Leaf predicates of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum PointcutPrimitive {
    Execution(MemberPattern),
    Call(MemberPattern),
    Get(FieldPattern),
    Set(FieldPattern),
    Handler(TypePattern),
    StaticInitialization(TypePattern),
    Within(TypePattern),
    WithinCode(MethodPattern),
    Cflow { id: CflowId, inner: Box<ExpressionAst> },
    Args(Vec<ArgEntry>),
    Target(TargetSpec),
    This(TargetSpec),
}

/// The expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionAst {
    And(Box<ExpressionAst>, Box<ExpressionAst>),
    Or(Box<ExpressionAst>, Box<ExpressionAst>),
    Not(Box<ExpressionAst>),
    Pointcut(PointcutPrimitive),
    /// A named pointcut reference, resolved against the owning aspect at
    /// definition-build time.
    Reference(String),
}

impl ExpressionAst {
    /// Walk the tree, visiting every node.
    pub fn visit(&self, visitor: &mut dyn FnMut(&ExpressionAst)) {
        visitor(self);
        match self {
            Self::And(left, right) | Self::Or(left, right) => {
                left.visit(visitor);
                right.visit(visitor);
            }
            Self::Not(inner) => inner.visit(visitor),
            Self::Pointcut(PointcutPrimitive::Cflow { inner, .. }) => inner.visit(visitor),
            Self::Pointcut(_) | Self::Reference(_) => {}
        }
    }

    pub fn contains_cflow(&self) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            if matches!(node, Self::Pointcut(PointcutPrimitive::Cflow { .. })) {
                found = true;
            }
        });
        found
    }

    /// All `cflow` sub-expressions, outermost first.
    pub fn cflow_nodes(&self) -> Vec<(CflowId, ExpressionAst)> {
        let mut nodes = Vec::new();
        self.visit(&mut |node| {
            if let Self::Pointcut(PointcutPrimitive::Cflow { id, inner }) = node {
                nodes.push((id.clone(), (**inner).clone()));
            }
        });
        nodes
    }

    /// Names of unresolved pointcut references.
    pub fn reference_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit(&mut |node| {
            if let Self::Reference(name) = node {
                names.push(name.clone());
            }
        });
        names
    }

    /// Names bound through `args()/target()/this()` clauses.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit(&mut |node| match node {
            Self::Pointcut(PointcutPrimitive::Args(entries)) => {
                for entry in entries {
                    if let ArgEntry::Binding(name) = entry {
                        names.push(name.clone());
                    }
                }
            }
            Self::Pointcut(PointcutPrimitive::Target(TargetSpec::Binding(name)))
            | Self::Pointcut(PointcutPrimitive::This(TargetSpec::Binding(name))) => {
                names.push(name.clone());
            }
            _ => {}
        });
        names
    }

    /// Replace every [`ExpressionAst::Reference`] using `substitute`.
    pub fn resolve(&self, substitute: &dyn Fn(&str) -> Option<ExpressionAst>) -> Result<ExpressionAst, String> {
        match self {
            Self::And(left, right) => Ok(Self::And(
                Box::new(left.resolve(substitute)?),
                Box::new(right.resolve(substitute)?),
            )),
            Self::Or(left, right) => Ok(Self::Or(
                Box::new(left.resolve(substitute)?),
                Box::new(right.resolve(substitute)?),
            )),
            Self::Not(inner) => Ok(Self::Not(Box::new(inner.resolve(substitute)?))),
            Self::Pointcut(PointcutPrimitive::Cflow { id, inner }) => Ok(Self::Pointcut(PointcutPrimitive::Cflow {
                id: id.clone(),
                inner: Box::new(inner.resolve(substitute)?),
            })),
            Self::Pointcut(primitive) => Ok(Self::Pointcut(primitive.clone())),
            Self::Reference(name) => substitute(name).ok_or_else(|| name.clone()),
        }
    }
}
