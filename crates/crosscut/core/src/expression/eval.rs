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

//! Expression evaluation.
//!
//! Two phases share one tree. The precise phase (`evaluate`) has full
//! member context and yields a definite boolean. The filter phase
//! (`filter`) runs at class scope where member detail is unknown and
//! evaluates in three-valued logic: `Unknown` propagates through
//! And/Or/Not (Kleene), and an `Unknown` root is treated as a match so
//! class-level filtering stays permissive. `cflow` leaves are resolved
//! through a [`CflowResolver`]; the static phases pass a resolver that
//! answers true, deferring the real check to dispatch time.

use crate::expression::ast::{ArgEntry, CflowId, ExpressionAst, MemberPattern, PointcutPrimitive, TargetSpec};
use crate::expression::context::{ExpressionContext, PointcutKind, Subject};
use crate::model::modifiers;
use crate::pattern::TypePattern;

/// Three-valued logic for the filter phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    Unknown,
}

impl Ternary {
    pub fn and(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::False, _) | (_, Ternary::False) => Ternary::False,
            (Ternary::Unknown, _) | (_, Ternary::Unknown) => Ternary::Unknown,
            _ => Ternary::True,
        }
    }

    pub fn or(self, other: Ternary) -> Ternary {
        match (self, other) {
            (Ternary::True, _) | (_, Ternary::True) => Ternary::True,
            (Ternary::Unknown, _) | (_, Ternary::Unknown) => Ternary::Unknown,
            _ => Ternary::False,
        }
    }

    pub fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Unknown => Ternary::Unknown,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value { Ternary::True } else { Ternary::False }
    }
}

/// Resolves `cflow` leaves at evaluation time.
pub trait CflowResolver {
    fn in_cflow(&self, id: &CflowId) -> bool;
}

/// Static-phase resolver: every cflow is assumed active; the dispatch
/// engine re-evaluates gated bindings with the real marker stack.
pub struct AssumeInCflow;

impl CflowResolver for AssumeInCflow {
    fn in_cflow(&self, _id: &CflowId) -> bool {
        true
    }
}

/// Precise evaluation: full member context, definite result. Pure: no
/// state is touched besides the resolver's read of the marker stack.
pub fn evaluate(ast: &ExpressionAst, ctx: &ExpressionContext<'_>, resolver: &dyn CflowResolver) -> bool {
    match ast {
        ExpressionAst::And(left, right) => evaluate(left, ctx, resolver) && evaluate(right, ctx, resolver),
        ExpressionAst::Or(left, right) => evaluate(left, ctx, resolver) || evaluate(right, ctx, resolver),
        ExpressionAst::Not(inner) => !evaluate(inner, ctx, resolver),
        ExpressionAst::Pointcut(primitive) => evaluate_primitive(primitive, ctx, resolver),
        // References are inlined at definition build; an unresolved one
        // cannot match anything.
        ExpressionAst::Reference(_) => false,
    }
}

/// Filter evaluation: class-level three-valued result.
pub fn filter(ast: &ExpressionAst, ctx: &ExpressionContext<'_>) -> Ternary {
    match ast {
        ExpressionAst::And(left, right) => filter(left, ctx).and(filter(right, ctx)),
        ExpressionAst::Or(left, right) => filter(left, ctx).or(filter(right, ctx)),
        ExpressionAst::Not(inner) => filter(inner, ctx).not(),
        ExpressionAst::Pointcut(primitive) => filter_primitive(primitive, ctx),
        ExpressionAst::Reference(_) => Ternary::False,
    }
}

fn evaluate_primitive(primitive: &PointcutPrimitive, ctx: &ExpressionContext<'_>, resolver: &dyn CflowResolver) -> bool {
    match primitive {
        PointcutPrimitive::Execution(member) => member_matches(member, ctx, PointcutKind::Execution),
        PointcutPrimitive::Call(member) => member_matches(member, ctx, PointcutKind::Call),
        PointcutPrimitive::Get(fp) => field_matches(fp, ctx, PointcutKind::Get),
        PointcutPrimitive::Set(fp) => field_matches(fp, ctx, PointcutKind::Set),
        PointcutPrimitive::Handler(tp) => {
            ctx.kind == Some(PointcutKind::Handler)
                && ctx.class.as_ref().is_some_and(|c| tp.matches_class(c, ctx.model))
        }
        PointcutPrimitive::StaticInitialization(tp) => {
            ctx.kind == Some(PointcutKind::StaticInitialization)
                && ctx.class.as_ref().is_some_and(|c| tp.matches_class(c, ctx.model))
        }
        PointcutPrimitive::Within(tp) => ctx
            .within
            .as_ref()
            .is_some_and(|w| tp.matches_class(&w.class, ctx.model)),
        PointcutPrimitive::WithinCode(mp) => ctx.within.as_ref().is_some_and(|w| {
            w.method
                .as_ref()
                .is_some_and(|m| mp.matches_method(m, &w.class, ctx.model))
        }),
        PointcutPrimitive::Cflow { id, .. } => resolver.in_cflow(id),
        PointcutPrimitive::Args(entries) => subject_parameter_types(ctx).is_some_and(|params| args_match(entries, &params)),
        PointcutPrimitive::Target(spec) => target_matches(spec, ctx),
        PointcutPrimitive::This(spec) => this_matches(spec, ctx),
    }
}

fn member_matches(member: &MemberPattern, ctx: &ExpressionContext<'_>, expected: PointcutKind) -> bool {
    if ctx.kind != Some(expected) {
        return false;
    }
    let Some(class) = ctx.class.as_ref() else {
        return false;
    };
    match (member, ctx.subject.as_ref()) {
        (MemberPattern::Method(mp), Some(Subject::Method(method))) => mp.matches_method(method, class, ctx.model),
        (MemberPattern::Constructor(cp), Some(Subject::Constructor(ctor))) => cp.matches_constructor(ctor, class, ctx.model),
        _ => false,
    }
}

fn field_matches(fp: &crate::pattern::FieldPattern, ctx: &ExpressionContext<'_>, expected: PointcutKind) -> bool {
    ctx.kind == Some(expected)
        && match (ctx.subject.as_ref(), ctx.class.as_ref()) {
            (Some(Subject::Field(field)), Some(class)) => fp.matches_field(field, class, ctx.model),
            _ => false,
        }
}

/// Declared argument types of the subject, if it has an argument list.
/// Field sets expose the incoming value as a single argument; field gets
/// expose none.
fn subject_parameter_types(ctx: &ExpressionContext<'_>) -> Option<Vec<String>> {
    match (ctx.subject.as_ref()?, ctx.kind?) {
        (Subject::Method(m), _) => Some(m.parameter_types.clone()),
        (Subject::Constructor(c), _) => Some(c.parameter_types.clone()),
        (Subject::Field(f), PointcutKind::Set) => Some(vec![f.field_type.clone()]),
        (Subject::Field(_), PointcutKind::Get) => Some(Vec::new()),
        _ => None,
    }
}

fn args_match(entries: &[ArgEntry], params: &[String]) -> bool {
    match entries.iter().position(|e| *e == ArgEntry::Ellipsis) {
        None => entries.len() == params.len() && entries.iter().zip(params).all(|(e, p)| arg_entry_matches(e, p)),
        Some(split) => {
            let prefix = &entries[..split];
            let suffix = &entries[split + 1..];
            if params.len() < prefix.len() + suffix.len() {
                return false;
            }
            let tail_start = params.len() - suffix.len();
            prefix.iter().zip(&params[..prefix.len()]).all(|(e, p)| arg_entry_matches(e, p))
                && suffix.iter().zip(&params[tail_start..]).all(|(e, p)| arg_entry_matches(e, p))
        }
    }
}

fn arg_entry_matches(entry: &ArgEntry, param: &str) -> bool {
    match entry {
        ArgEntry::Type(tp) => tp.matches(param),
        // A bound name accepts any single argument; the definition layer
        // has already checked the name against the advice parameters.
        ArgEntry::Binding(_) => true,
        ArgEntry::Ellipsis => true,
    }
}

fn subject_is_static(ctx: &ExpressionContext<'_>) -> bool {
    match ctx.subject.as_ref() {
        Some(Subject::Method(m)) => m.modifiers & modifiers::STATIC != 0,
        Some(Subject::Field(f)) => f.modifiers & modifiers::STATIC != 0,
        Some(Subject::Constructor(_)) => false,
        Some(Subject::Class(_)) | None => true,
    }
}

fn instance_of(tp: &TypePattern, class: &crate::model::ClassInfo, model: &crate::model::ClassModel) -> bool {
    model.hierarchy_matches(class, &|c| tp.matches(&c.name))
}

fn target_matches(spec: &TargetSpec, ctx: &ExpressionContext<'_>) -> bool {
    if subject_is_static(ctx) {
        return false;
    }
    match spec {
        TargetSpec::Binding(_) => true,
        TargetSpec::Type(tp) => ctx.class.as_ref().is_some_and(|c| instance_of(tp, c, ctx.model)),
    }
}

fn this_matches(spec: &TargetSpec, ctx: &ExpressionContext<'_>) -> bool {
    let Some(within) = ctx.within.as_ref() else {
        return false;
    };
    let Some(method) = within.method.as_ref() else {
        return false;
    };
    if method.modifiers & modifiers::STATIC != 0 {
        return false;
    }
    match spec {
        TargetSpec::Binding(_) => true,
        TargetSpec::Type(tp) => instance_of(tp, &within.class, ctx.model),
    }
}

fn filter_primitive(primitive: &PointcutPrimitive, ctx: &ExpressionContext<'_>) -> Ternary {
    // With full kind information the precise rules apply; the class-level
    // context is the one that has to stay permissive.
    if ctx.kind.is_some() && ctx.subject.is_some() {
        return Ternary::from(evaluate_primitive(primitive, ctx, &AssumeInCflow));
    }
    match primitive {
        PointcutPrimitive::Execution(member) => {
            if ctx.kind.is_some() && ctx.kind != Some(PointcutKind::Execution) {
                return Ternary::False;
            }
            declaring_type_filter(member_declaring_type(member), ctx)
        }
        // Call-side shapes cannot be rejected at class scope: the callee
        // is another class.
        PointcutPrimitive::Call(_) | PointcutPrimitive::Get(_) | PointcutPrimitive::Set(_) | PointcutPrimitive::Handler(_) => {
            Ternary::Unknown
        }
        PointcutPrimitive::StaticInitialization(tp) => match ctx.class.as_ref() {
            Some(class) if !tp.matches_class(class, ctx.model) => Ternary::False,
            _ => Ternary::Unknown,
        },
        PointcutPrimitive::Within(tp) => match ctx.within.as_ref() {
            Some(within) => Ternary::from(tp.matches_class(&within.class, ctx.model)),
            None => Ternary::Unknown,
        },
        PointcutPrimitive::WithinCode(mp) => declaring_type_filter(Some(&mp.declaring_type), ctx),
        PointcutPrimitive::Cflow { .. } => Ternary::Unknown,
        PointcutPrimitive::Args(_) | PointcutPrimitive::Target(_) | PointcutPrimitive::This(_) => Ternary::Unknown,
    }
}

fn member_declaring_type(member: &MemberPattern) -> Option<&TypePattern> {
    match member {
        MemberPattern::Method(mp) => Some(&mp.declaring_type),
        MemberPattern::Constructor(cp) => Some(&cp.declaring_type),
    }
}

/// Reject definitively when the declaring-type part of a member pattern
/// cannot match the filtered class; otherwise the member detail is still
/// unknown.
fn declaring_type_filter(declaring: Option<&TypePattern>, ctx: &ExpressionContext<'_>) -> Ternary {
    match (declaring, ctx.class.as_ref()) {
        (Some(tp), Some(class)) => {
            if tp.matches_class(class, ctx.model) {
                Ternary::Unknown
            } else {
                Ternary::False
            }
        }
        _ => Ternary::Unknown,
    }
}

/// What remains of an expression after every non-`cflow` leaf has been
/// decided against a precise context: a small boolean tree over `cflow`
/// ids, evaluated by the dispatch engine against the live marker stack.
#[derive(Debug, Clone, PartialEq)]
pub enum CflowResidual {
    Const(bool),
    Cflow(CflowId),
    And(Box<CflowResidual>, Box<CflowResidual>),
    Or(Box<CflowResidual>, Box<CflowResidual>),
    Not(Box<CflowResidual>),
}

impl CflowResidual {
    fn and(left: CflowResidual, right: CflowResidual) -> CflowResidual {
        match (left, right) {
            (Self::Const(false), _) | (_, Self::Const(false)) => Self::Const(false),
            (Self::Const(true), other) | (other, Self::Const(true)) => other,
            (left, right) => Self::And(Box::new(left), Box::new(right)),
        }
    }

    fn or(left: CflowResidual, right: CflowResidual) -> CflowResidual {
        match (left, right) {
            (Self::Const(true), _) | (_, Self::Const(true)) => Self::Const(true),
            (Self::Const(false), other) | (other, Self::Const(false)) => other,
            (left, right) => Self::Or(Box::new(left), Box::new(right)),
        }
    }

    fn negate(inner: CflowResidual) -> CflowResidual {
        match inner {
            Self::Const(value) => Self::Const(!value),
            Self::Not(inner) => *inner,
            inner => Self::Not(Box::new(inner)),
        }
    }

    /// Whether the static part already rules the binding out.
    pub fn is_never(&self) -> bool {
        *self == Self::Const(false)
    }

    /// Whether no runtime cflow check remains.
    pub fn is_always(&self) -> bool {
        *self == Self::Const(true)
    }

    /// Evaluate against the live marker stack.
    pub fn decide(&self, resolver: &dyn CflowResolver) -> bool {
        match self {
            Self::Const(value) => *value,
            Self::Cflow(id) => resolver.in_cflow(id),
            Self::And(left, right) => left.decide(resolver) && right.decide(resolver),
            Self::Or(left, right) => left.decide(resolver) || right.decide(resolver),
            Self::Not(inner) => !inner.decide(resolver),
        }
    }
}

/// Fold a precisely-matched context into an expression, leaving only its
/// `cflow` structure. `Const(false)` means the binding can never apply at
/// this join point; anything else is the guard the dispatch engine checks
/// on each activation.
pub fn residualize(ast: &ExpressionAst, ctx: &ExpressionContext<'_>) -> CflowResidual {
    match ast {
        ExpressionAst::And(left, right) => CflowResidual::and(residualize(left, ctx), residualize(right, ctx)),
        ExpressionAst::Or(left, right) => CflowResidual::or(residualize(left, ctx), residualize(right, ctx)),
        ExpressionAst::Not(inner) => CflowResidual::negate(residualize(inner, ctx)),
        ExpressionAst::Pointcut(PointcutPrimitive::Cflow { id, .. }) => CflowResidual::Cflow(id.clone()),
        other => CflowResidual::Const(evaluate(other, ctx, &AssumeInCflow)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse;
    use crate::expression::token::tokenize;
    use crate::model::{ClassInfo, ClassModel, MethodInfo};
    use std::sync::Arc;

    fn ast(source: &str) -> ExpressionAst {
        parse(&tokenize(source).unwrap()).unwrap()
    }

    fn demo_model() -> ClassModel {
        let mut model = ClassModel::new();
        model.register(
            ClassInfo::new("demo.Target")
                .with_method(MethodInfo::new("demo.Target", "toLog1", "void"))
                .with_method(MethodInfo::new("demo.Target", "other", "void")),
        );
        model.register(ClassInfo::new("unrelated.Thing"));
        model
    }

    #[test]
    fn test_precise_execution_match() {
        let model = demo_model();
        let class = model.get("demo.Target").unwrap();
        let method = class.method("toLog1").unwrap();
        let ctx = ExpressionContext::execution(class, method, &model);
        assert!(evaluate(&ast("execution(* demo.Target.toLog1(..))"), &ctx, &AssumeInCflow));
        assert!(!evaluate(&ast("execution(* demo.Target.missing(..))"), &ctx, &AssumeInCflow));
    }

    #[test]
    fn test_boolean_composition() {
        let model = demo_model();
        let class = model.get("demo.Target").unwrap();
        let method = class.method("toLog1").unwrap();
        let ctx = ExpressionContext::execution(class, method, &model);
        assert!(evaluate(
            &ast("execution(* demo.Target.toLog1(..)) || execution(* demo.Target.other(..))"),
            &ctx,
            &AssumeInCflow
        ));
        assert!(!evaluate(
            &ast("execution(* demo.Target.toLog1(..)) && !within(demo.Target)"),
            &ctx,
            &AssumeInCflow
        ));
    }

    #[test]
    fn test_class_filter_is_permissive_on_unknown() {
        let model = demo_model();
        let class = model.get("demo.Target").unwrap();
        let ctx = ExpressionContext::class_filter(class, &model);
        // Member detail unknown at class scope, so the filter keeps it.
        assert_eq!(filter(&ast("execution(* demo.Target.toLog1(..))"), &ctx), Ternary::Unknown);
        // Negation of unknown stays unknown (permissive), per the
        // documented filter asymmetry.
        assert_eq!(filter(&ast("!execution(* demo.Target.toLog1(..))"), &ctx), Ternary::Unknown);
    }

    #[test]
    fn test_class_filter_rejects_foreign_declaring_type() {
        let model = demo_model();
        let class = model.get("unrelated.Thing").unwrap();
        let ctx = ExpressionContext::class_filter(class, &model);
        assert_eq!(filter(&ast("execution(* demo.Target.toLog1(..))"), &ctx), Ternary::False);
        assert_eq!(filter(&ast("within(demo.Target)"), &ctx), Ternary::False);
    }

    #[test]
    fn test_ternary_kleene_tables() {
        use Ternary::*;
        assert_eq!(True.and(Unknown), Unknown);
        assert_eq!(False.and(Unknown), False);
        assert_eq!(True.or(Unknown), True);
        assert_eq!(False.or(Unknown), Unknown);
        assert_eq!(Unknown.not(), Unknown);
    }

    #[test]
    fn test_residualize_keeps_only_cflow_structure() {
        let model = demo_model();
        let class = model.get("demo.Target").unwrap();
        let method = class.method("toLog1").unwrap();
        let ctx = ExpressionContext::execution(class, method, &model);

        let plain = residualize(&ast("execution(* demo.Target.toLog1(..))"), &ctx);
        assert!(plain.is_always());

        let miss = residualize(&ast("execution(* demo.Target.missing(..))"), &ctx);
        assert!(miss.is_never());

        let gated = residualize(
            &ast("execution(* demo.Target.toLog1(..)) && cflow(execution(* demo.Target.other(..)))"),
            &ctx,
        );
        assert!(matches!(gated, CflowResidual::Cflow(_)));

        let negated = residualize(
            &ast("execution(* demo.Target.toLog1(..)) && !cflow(execution(* demo.Target.other(..)))"),
            &ctx,
        );
        assert!(matches!(negated, CflowResidual::Not(_)));
        assert!(!negated.decide(&AssumeInCflow));
    }

    #[test]
    fn test_cflow_leaf_uses_resolver() {
        struct Never;
        impl CflowResolver for Never {
            fn in_cflow(&self, _id: &CflowId) -> bool {
                false
            }
        }
        let model = demo_model();
        let class = model.get("demo.Target").unwrap();
        let method = class.method("toLog1").unwrap();
        let ctx = ExpressionContext::execution(class, method, &model);
        let expr = ast("execution(* demo.Target.toLog1(..)) && cflow(execution(* demo.Target.other(..)))");
        assert!(evaluate(&expr, &ctx, &AssumeInCflow));
        assert!(!evaluate(&expr, &ctx, &Never));
    }
}
