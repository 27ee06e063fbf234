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

//! Recursive-descent parser for pointcut expressions.
//!
//! Precedence, loosest first: `||`, `&&`, unary `!`. A bare identifier is
//! a named pointcut reference; an identifier followed by a parenthesized
//! body is a pointcut primitive whose body is compiled by the pattern
//! layer (or, for `cflow`, parsed recursively as an expression).

use crate::expression::ast::{ArgEntry, CflowId, ExpressionAst, MemberPattern, PointcutPrimitive, TargetSpec};
use crate::expression::token::{tokenize, Token};
use crate::expression::ExpressionError;
use crate::pattern::{ConstructorPattern, FieldPattern, MethodPattern, TypePattern};

pub fn parse(tokens: &[Token]) -> Result<ExpressionAst, ExpressionError> {
    let mut current = 0;
    if tokens.first() == Some(&Token::Eof) {
        return Err(ExpressionError::Empty);
    }
    let ast = parse_or(tokens, &mut current)?;
    match tokens.get(current) {
        Some(Token::Eof) => Ok(ast),
        _ => Err(ExpressionError::UnexpectedToken(current)),
    }
}

fn parse_or(tokens: &[Token], current: &mut usize) -> Result<ExpressionAst, ExpressionError> {
    let mut left = parse_and(tokens, current)?;
    while tokens.get(*current) == Some(&Token::OrOr) {
        *current += 1;
        let right = parse_and(tokens, current)?;
        left = ExpressionAst::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(tokens: &[Token], current: &mut usize) -> Result<ExpressionAst, ExpressionError> {
    let mut left = parse_unary(tokens, current)?;
    while tokens.get(*current) == Some(&Token::AndAnd) {
        *current += 1;
        let right = parse_unary(tokens, current)?;
        left = ExpressionAst::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_unary(tokens: &[Token], current: &mut usize) -> Result<ExpressionAst, ExpressionError> {
    if tokens.get(*current) == Some(&Token::Not) {
        *current += 1;
        let inner = parse_unary(tokens, current)?;
        return Ok(ExpressionAst::Not(Box::new(inner)));
    }
    parse_primary(tokens, current)
}

fn parse_primary(tokens: &[Token], current: &mut usize) -> Result<ExpressionAst, ExpressionError> {
    match tokens.get(*current) {
        Some(Token::LeftParen) => {
            *current += 1;
            let inner = parse_or(tokens, current)?;
            match tokens.get(*current) {
                Some(Token::RightParen) => {
                    *current += 1;
                    Ok(inner)
                }
                _ => Err(ExpressionError::UnexpectedToken(*current)),
            }
        }
        Some(Token::Identifier(name)) => {
            *current += 1;
            if let Some(Token::Group(body)) = tokens.get(*current) {
                *current += 1;
                Ok(ExpressionAst::Pointcut(parse_primitive(name, body)?))
            } else {
                Ok(ExpressionAst::Reference(name.clone()))
            }
        }
        Some(Token::Eof) | None => Err(ExpressionError::UnexpectedEnd),
        Some(_) => Err(ExpressionError::UnexpectedToken(*current)),
    }
}

fn parse_primitive(name: &str, body: &str) -> Result<PointcutPrimitive, ExpressionError> {
    match name {
        "execution" => Ok(PointcutPrimitive::Execution(parse_member_pattern(body)?)),
        "call" => Ok(PointcutPrimitive::Call(parse_member_pattern(body)?)),
        "get" => Ok(PointcutPrimitive::Get(FieldPattern::compile(body)?)),
        "set" => Ok(PointcutPrimitive::Set(FieldPattern::compile(body)?)),
        "handler" => Ok(PointcutPrimitive::Handler(TypePattern::compile(body)?)),
        "staticinitialization" => Ok(PointcutPrimitive::StaticInitialization(TypePattern::compile(body)?)),
        "within" => Ok(PointcutPrimitive::Within(TypePattern::compile(body)?)),
        "withincode" => Ok(PointcutPrimitive::WithinCode(MethodPattern::compile(body)?)),
        "cflow" => {
            let inner_tokens = tokenize(body)?;
            let inner = parse(&inner_tokens)?;
            Ok(PointcutPrimitive::Cflow {
                id: CflowId::new(body),
                inner: Box::new(inner),
            })
        }
        "args" => Ok(PointcutPrimitive::Args(parse_args(body)?)),
        "target" => Ok(PointcutPrimitive::Target(parse_target_spec(body)?)),
        "this" => Ok(PointcutPrimitive::This(parse_target_spec(body)?)),
        other => Err(ExpressionError::UnknownPrimitive(other.to_string())),
    }
}

/// Executions and calls accept constructor patterns through the `.new(`
/// marker; everything else is a method pattern.
fn parse_member_pattern(body: &str) -> Result<MemberPattern, ExpressionError> {
    if body.contains(".new(") {
        Ok(MemberPattern::Constructor(ConstructorPattern::compile(body)?))
    } else {
        Ok(MemberPattern::Method(MethodPattern::compile(body)?))
    }
}

fn parse_args(body: &str) -> Result<Vec<ArgEntry>, ExpressionError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    let mut ellipsis_seen = false;
    for part in body.split(',') {
        let part = part.trim();
        if part == ".." {
            if ellipsis_seen {
                return Err(ExpressionError::MalformedArgs("at most one '..' per args list".to_string()));
            }
            ellipsis_seen = true;
            entries.push(ArgEntry::Ellipsis);
        } else if part.is_empty() {
            return Err(ExpressionError::MalformedArgs("empty args slot".to_string()));
        } else if is_binding_name(part) {
            entries.push(ArgEntry::Binding(part.to_string()));
        } else {
            entries.push(ArgEntry::Type(TypePattern::compile(part)?));
        }
    }
    Ok(entries)
}

fn parse_target_spec(body: &str) -> Result<TargetSpec, ExpressionError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ExpressionError::MalformedArgs("empty target/this clause".to_string()));
    }
    if is_binding_name(body) {
        Ok(TargetSpec::Binding(body.to_string()))
    } else {
        Ok(TargetSpec::Type(TypePattern::compile(body)?))
    }
}

/// A binding name is a plain lowercase identifier that is not a primitive
/// type keyword; anything qualified, wildcarded, or capitalized reads as a
/// type pattern.
fn is_binding_name(text: &str) -> bool {
    const PRIMITIVES: &[&str] = &["void", "boolean", "byte", "char", "short", "int", "long", "float", "double"];
    !PRIMITIVES.contains(&text)
        && text.chars().next().is_some_and(|c| c.is_lowercase())
        && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_source(source: &str) -> Result<ExpressionAst, ExpressionError> {
        parse(&tokenize(source)?)
    }

    #[test]
    fn test_single_execution_primitive() {
        let ast = parse_source("execution(* foo.Bar.toLog1(..))").unwrap();
        assert!(matches!(
            ast,
            ExpressionAst::Pointcut(PointcutPrimitive::Execution(MemberPattern::Method(_)))
        ));
    }

    #[test]
    fn test_constructor_execution() {
        let ast = parse_source("execution(foo.Bar.new(int))").unwrap();
        assert!(matches!(
            ast,
            ExpressionAst::Pointcut(PointcutPrimitive::Execution(MemberPattern::Constructor(_)))
        ));
    }

    #[test]
    fn test_precedence_or_binds_loosest() {
        let ast = parse_source("a || b && c").unwrap();
        match ast {
            ExpressionAst::Or(left, right) => {
                assert!(matches!(*left, ExpressionAst::Reference(_)));
                assert!(matches!(*right, ExpressionAst::And(_, _)));
            }
            other => panic!("expected Or at root, got {other:?}"),
        }
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        let ast = parse_source("(a || b) && c").unwrap();
        assert!(matches!(ast, ExpressionAst::And(_, _)));
    }

    #[test]
    fn test_not_binds_tightest() {
        let ast = parse_source("!a && b").unwrap();
        match ast {
            ExpressionAst::And(left, _) => assert!(matches!(*left, ExpressionAst::Not(_))),
            other => panic!("expected And at root, got {other:?}"),
        }
    }

    #[test]
    fn test_cflow_parses_inner_expression() {
        let ast = parse_source("execution(* a.B.m(..)) && cflow(execution(* a.B.outer(..)))").unwrap();
        let mut cflow_count = 0;
        ast.visit(&mut |node| {
            if matches!(node, ExpressionAst::Pointcut(PointcutPrimitive::Cflow { .. })) {
                cflow_count += 1;
            }
        });
        assert_eq!(cflow_count, 1);
        assert!(ast.contains_cflow());
    }

    #[test]
    fn test_args_binding_vs_type() {
        let entries = parse_args("int, position, .., lang.String").unwrap();
        assert!(matches!(entries[0], ArgEntry::Type(_)));
        assert!(matches!(entries[1], ArgEntry::Binding(_)));
        assert!(matches!(entries[2], ArgEntry::Ellipsis));
        assert!(matches!(entries[3], ArgEntry::Type(_)));
    }

    #[test]
    fn test_bare_identifier_is_reference() {
        let ast = parse_source("myPointcut").unwrap();
        assert_eq!(ast.reference_names(), vec!["myPointcut".to_string()]);
    }

    #[test]
    fn test_unknown_primitive_fails() {
        assert!(matches!(
            parse_source("withinside(foo.Bar)"),
            Err(ExpressionError::UnknownPrimitive(_))
        ));
    }

    #[test]
    fn test_empty_expression_fails() {
        assert!(matches!(parse_source(""), Err(ExpressionError::Empty)));
    }

    #[test]
    fn test_trailing_garbage_fails() {
        assert!(parse_source("a b").is_err());
    }
}
