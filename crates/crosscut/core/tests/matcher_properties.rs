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

//! Property tests for the matcher: evaluation is pure, and pattern
//! compilation is idempotent across recompiles of the same source.

use proptest::prelude::*;

use crosscut_core::expression::{ExpressionContext, ExpressionInfo};
use crosscut_core::model::{ClassInfo, ClassModel, MethodInfo};
use crosscut_core::pattern::TypePattern;

/// A dotted type name: one to four word segments.
fn type_name() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9]{0,5}", 1..4).prop_flat_map(|packages| {
        "[A-Z][a-zA-Z0-9]{0,6}".prop_map(move |class| {
            let mut name = packages.join(".");
            if !name.is_empty() {
                name.push('.');
            }
            name.push_str(&class);
            name
        })
    })
}

/// A well-formed type pattern: segments where some are wildcards or
/// partial-wildcard words, optionally joined by `..`.
fn type_pattern_source() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        Just("*".to_string()),
        "[a-z][a-z0-9]{0,4}".prop_map(|s| s),
        "[a-z][a-z0-9]{0,3}".prop_map(|s| format!("{s}*")),
        "[A-Z][a-zA-Z0-9]{0,5}".prop_map(|s| s),
    ];
    prop::collection::vec((segment, prop::bool::ANY), 1..4).prop_map(|parts| {
        let mut source = String::new();
        for (index, (segment, double_dot)) in parts.iter().enumerate() {
            if index > 0 {
                source.push_str(if *double_dot { ".." } else { "." });
            }
            source.push_str(segment);
        }
        source
    })
}

fn expression_source() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        type_pattern_source().prop_map(|tp| format!("execution(* {tp}.*(..))")),
        type_pattern_source().prop_map(|tp| format!("within({tp})")),
        type_pattern_source().prop_map(|tp| format!("call(* {tp}.do*(..))")),
    ];
    (leaf.clone(), leaf, prop::bool::ANY, prop::bool::ANY).prop_map(|(left, right, or, negate)| {
        let op = if or { "||" } else { "&&" };
        let not = if negate { "!" } else { "" };
        format!("{left} {op} {not}{right}")
    })
}

fn single_class_model(class_name: &str, method_name: &str) -> ClassModel {
    let mut model = ClassModel::new();
    model.register(ClassInfo::new(class_name).with_method(MethodInfo::new(class_name, method_name, "void")));
    model
}

proptest! {
    /// Repeated evaluation of the same (expression, context) pair yields
    /// the same result, in both the precise and the filter phase.
    #[test]
    fn evaluation_is_pure(source in expression_source(), class_name in type_name()) {
        let expression = ExpressionInfo::compile(&source).unwrap();
        let model = single_class_model(&class_name, "probe");
        let class = model.get(&class_name).unwrap();
        let method = class.method("probe").unwrap();

        let precise = ExpressionContext::execution(class.clone(), method, &model);
        let first = expression.matches(&precise);
        for _ in 0..4 {
            prop_assert_eq!(expression.matches(&precise), first);
        }

        let coarse = ExpressionContext::class_filter(class, &model);
        let filtered = expression.matches_filter(&coarse);
        for _ in 0..4 {
            prop_assert_eq!(expression.matches_filter(&coarse), filtered);
        }
    }

    /// Compiling the same pattern source twice yields interchangeable
    /// matchers: equal by source, identical decisions on any name.
    #[test]
    fn pattern_compilation_is_idempotent(source in type_pattern_source(), name in type_name()) {
        let first = TypePattern::compile(&source).unwrap();
        let second = TypePattern::compile(&source).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.matches(&name), second.matches(&name));
    }

    /// The coarse filter never rejects something the precise phase would
    /// accept: filter(false) implies no precise match for any member.
    #[test]
    fn filter_is_conservative(source in expression_source(), class_name in type_name()) {
        let expression = ExpressionInfo::compile(&source).unwrap();
        let model = single_class_model(&class_name, "probe");
        let class = model.get(&class_name).unwrap();

        let coarse = ExpressionContext::class_filter(class.clone(), &model);
        if !expression.matches_filter(&coarse) {
            let method = class.method("probe").unwrap();
            let precise = ExpressionContext::execution(class, method, &model);
            prop_assert!(!expression.matches(&precise));
        }
    }
}
