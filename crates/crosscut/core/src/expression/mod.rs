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

//! The pointcut expression language: tokenizer, parser, AST, and the
//! two-phase evaluator.
//!
//! [`ExpressionInfo`] is the compiled form handed around the system: the
//! source string plus its immutable AST plus the argument names bound
//! through `args()/target()/this()`. Same (expression, context) always
//! yields the same result.

pub mod ast;
pub mod context;
pub mod eval;
pub mod parser;
pub mod token;

use thiserror::Error;

pub use ast::{ArgEntry, CflowId, ExpressionAst, MemberPattern, PointcutPrimitive, TargetSpec};
pub use context::{ExpressionContext, PointcutKind, Subject, WithinContext};
pub use eval::{evaluate, filter, residualize, AssumeInCflow, CflowResidual, CflowResolver, Ternary};

use crate::pattern::PatternError;

/// Errors raised while compiling a pointcut expression.
#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown pointcut primitive '{0}'")]
    UnknownPrimitive(String),
    #[error("malformed args/target clause: {0}")]
    MalformedArgs(String),
    #[error("unresolved pointcut reference '{0}'")]
    UnknownReference(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// A compiled pointcut expression: source text, immutable AST, and the
/// names its binding clauses introduce.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionInfo {
    source: String,
    ast: ExpressionAst,
}

impl ExpressionInfo {
    /// Compile an expression from source. Malformed syntax fails here,
    /// never at match time.
    pub fn compile(source: &str) -> Result<Self, ExpressionError> {
        let tokens = token::tokenize(source)?;
        let ast = parser::parse(&tokens)?;
        Ok(Self {
            source: source.trim().to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &ExpressionAst {
        &self.ast
    }

    /// Names bound through `args()/target()/this()` clauses, to be checked
    /// against the advice method's declared parameters.
    pub fn bound_names(&self) -> Vec<String> {
        self.ast.bound_names()
    }

    /// Whether any `cflow` leaf occurs in the tree.
    pub fn has_cflow(&self) -> bool {
        self.ast.contains_cflow()
    }

    /// All `cflow` sub-expressions, outermost first.
    pub fn cflow_nodes(&self) -> Vec<(CflowId, ExpressionAst)> {
        self.ast.cflow_nodes()
    }

    /// Inline every named pointcut reference using `lookup`. Fails on the
    /// first name `lookup` cannot supply.
    pub fn resolve_references(&self, lookup: &dyn Fn(&str) -> Option<ExpressionAst>) -> Result<Self, ExpressionError> {
        let ast = self.ast.resolve(lookup).map_err(ExpressionError::UnknownReference)?;
        Ok(Self {
            source: self.source.clone(),
            ast,
        })
    }

    /// Precise-phase match. `cflow` leaves are assumed active; the
    /// dispatch engine re-checks them against the live marker stack.
    pub fn matches(&self, ctx: &ExpressionContext<'_>) -> bool {
        eval::evaluate(&self.ast, ctx, &AssumeInCflow)
    }

    /// Coarse filter-phase match: permissive when the context lacks the
    /// detail to decide.
    pub fn matches_filter(&self, ctx: &ExpressionContext<'_>) -> bool {
        eval::filter(&self.ast, ctx) != Ternary::False
    }
}

impl std::fmt::Display for ExpressionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassInfo, ClassModel, MethodInfo};

    #[test]
    fn test_compile_and_match() {
        let mut model = ClassModel::new();
        let class = model.register(ClassInfo::new("demo.Target").with_method(MethodInfo::new("demo.Target", "toLog1", "void")));
        let method = class.method("toLog1").unwrap();
        let ctx = ExpressionContext::execution(class, method, &model);

        let info = ExpressionInfo::compile("execution(* demo.Target.toLog1(..))").unwrap();
        assert!(info.matches(&ctx));
        assert!(info.matches_filter(&ctx));
    }

    #[test]
    fn test_bound_names_collected() {
        let info = ExpressionInfo::compile("execution(* a.B.m(..)) && args(position) && target(acct)").unwrap();
        let mut names = info.bound_names();
        names.sort();
        assert_eq!(names, vec!["acct".to_string(), "position".to_string()]);
    }

    #[test]
    fn test_reference_resolution() {
        let named = ExpressionInfo::compile("execution(* a.B.m(..))").unwrap();
        let referring = ExpressionInfo::compile("myPointcut && !within(a.Excluded)").unwrap();
        let resolved = referring
            .resolve_references(&|name| (name == "myPointcut").then(|| named.ast().clone()))
            .unwrap();
        assert!(resolved.ast().reference_names().is_empty());

        let err = referring.resolve_references(&|_| None);
        assert!(matches!(err, Err(ExpressionError::UnknownReference(_))));
    }

    #[test]
    fn test_malformed_expression_fails_at_compile_time() {
        assert!(ExpressionInfo::compile("execution(").is_err());
        assert!(ExpressionInfo::compile("execution(* a.B.m(..)) &&").is_err());
    }
}
