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

//! End-to-end dispatch protocol tests: advice ordering, proceed
//! semantics, deployment-model instance cardinality, cflow gating, and
//! hot redefinition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use crosscut_core::definition::{DefinitionDocument, SystemRegistry};
use crosscut_core::model::{ClassInfo, ClassModel, MethodInfo};
use crosscut_core::signature::{InstanceRef, Value};
use crosscut_runtime::{DispatchConfig, DispatchEngine, DispatchError, DispatchFault, Invocation, OriginalFn};
use crosscut_weaver::{Weaver, WeaverConfig};

type Log = Arc<Mutex<Vec<String>>>;

fn demo_model() -> Arc<ClassModel> {
    let mut model = ClassModel::new();
    model.register(
        ClassInfo::new("demo.Target")
            .with_method(MethodInfo::new("demo.Target", "toLog1", "void"))
            .with_method(MethodInfo::new("demo.Target", "other", "void")),
    );
    model.register(
        ClassInfo::new("math.Pi")
            .with_method(MethodInfo::new("math.Pi", "getPiDecimal", "int").with_parameter("int", "position")),
    );
    model.register(
        ClassInfo::new("flow.Service")
            .with_method(MethodInfo::new("flow.Service", "outer", "void"))
            .with_method(MethodInfo::new("flow.Service", "inner", "void")),
    );
    Arc::new(model)
}

/// Registry + engine + a weaver handle for explicit weaving in tests.
fn build_stack(definition_json: &str) -> (Arc<SystemRegistry>, Arc<DispatchEngine>, Arc<Weaver>) {
    let document: DefinitionDocument = serde_json::from_str(definition_json).unwrap();
    let registry = Arc::new(SystemRegistry::new());
    registry.register(document.build().unwrap());
    let weaver = Arc::new(Weaver::new(registry.clone(), demo_model(), WeaverConfig::default()));
    let engine = Arc::new(DispatchEngine::new(weaver.clone(), DispatchConfig::default()));
    (registry, engine, weaver)
}

fn noop_original() -> OriginalFn {
    Arc::new(|_rtti| Ok(Value::Unit))
}

#[test]
fn logging_scenario_before_body_after_in_order() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Logging",
                "qualified_name": "sys/Logging",
                "class_name": "demo.LoggingAspect",
                "deployment_model": "perJVM",
                "pointcuts": [{"name": "logged", "expression": "execution(* demo.Target.toLog1())"}],
                "advices": [
                    {"name": "logEntry", "kind": "before", "expression": "logged"},
                    {"name": "logExit", "kind": "after", "expression": "logged"}
                ]
            }]
        }"#,
    );
    let log: Log = Arc::new(Mutex::new(Vec::new()));

    engine.register_aspect("sys/Logging", || Box::new(()));
    engine.register_advice("sys/Logging", "logEntry", {
        let log = log.clone();
        move |_aspect, jp| {
            log.lock().unwrap().push(format!("before-{}", jp.signature().name()));
            Ok(Value::Unit)
        }
    });
    engine.register_advice("sys/Logging", "logExit", {
        let log = log.clone();
        move |_aspect, jp| {
            log.lock().unwrap().push(format!("after-{}", jp.signature().name()));
            Ok(Value::Unit)
        }
    });
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let original: OriginalFn = {
        let log = log.clone();
        Arc::new(move |_rtti| {
            log.lock().unwrap().push("body".to_string());
            Ok(Value::Unit)
        })
    };
    engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), original)
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["before-toLog1".to_string(), "body".to_string(), "after-toLog1".to_string()]
    );
}

#[test]
fn advice_order_is_registration_then_declaration() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [
                {
                    "name": "A",
                    "qualified_name": "sys/A",
                    "class_name": "demo.AAspect",
                    "deployment_model": "perJVM",
                    "advices": [
                        {"name": "beforeA", "kind": "before", "expression": "execution(* demo.Target.toLog1())"},
                        {"name": "afterA", "kind": "after", "expression": "execution(* demo.Target.toLog1())"}
                    ]
                },
                {
                    "name": "B",
                    "qualified_name": "sys/B",
                    "class_name": "demo.BAspect",
                    "deployment_model": "perJVM",
                    "advices": [
                        {"name": "beforeB", "kind": "before", "expression": "execution(* demo.Target.toLog1())"},
                        {"name": "afterB", "kind": "after", "expression": "execution(* demo.Target.toLog1())"}
                    ]
                }
            ]
        }"#,
    );
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    for (aspect, advices) in [("sys/A", ["beforeA", "afterA"]), ("sys/B", ["beforeB", "afterB"])] {
        engine.register_aspect(aspect, || Box::new(()));
        for advice in advices {
            let log = log.clone();
            engine.register_advice(aspect, advice, move |_aspect, _jp| {
                log.lock().unwrap().push(advice.to_string());
                Ok(Value::Unit)
            });
        }
    }
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let original: OriginalFn = {
        let log = log.clone();
        Arc::new(move |_rtti| {
            log.lock().unwrap().push("body".to_string());
            Ok(Value::Unit)
        })
    };
    engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), original)
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["beforeA", "beforeB", "body", "afterA", "afterB"]
    );
}

#[test]
fn around_without_proceed_short_circuits() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Guard",
                "qualified_name": "sys/Guard",
                "class_name": "demo.GuardAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "deny", "kind": "around", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    engine.register_aspect("sys/Guard", || Box::new(()));
    engine.register_advice("sys/Guard", "deny", |_aspect, _jp| Ok(Value::Int(7)));
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let body_runs = Arc::new(AtomicUsize::new(0));
    let original: OriginalFn = {
        let body_runs = body_runs.clone();
        Arc::new(move |_rtti| {
            body_runs.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Unit)
        })
    };
    let result = engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), original)
        .unwrap();

    // The around advice's return value becomes the join point's result.
    assert_eq!(result, Value::Int(7));
    assert_eq!(body_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn around_may_proceed_more_than_once() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Retry",
                "qualified_name": "sys/Retry",
                "class_name": "demo.RetryAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "retryOnce", "kind": "around", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    engine.register_aspect("sys/Retry", || Box::new(()));
    engine.register_advice("sys/Retry", "retryOnce", |_aspect, jp| {
        let first = jp.proceed();
        if first.is_err() { jp.proceed() } else { first }
    });
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let attempts = Arc::new(AtomicUsize::new(0));
    let original: OriginalFn = {
        let attempts = attempts.clone();
        Arc::new(move |_rtti| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DispatchFault::thrown("lang.RuntimeException", "transient"))
            } else {
                Ok(Value::Int(1))
            }
        })
    };
    let result = engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), original)
        .unwrap();
    assert_eq!(result, Value::Int(1));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn caching_scenario_keyed_by_argument_values() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Caching",
                "qualified_name": "sys/Caching",
                "class_name": "math.CachingAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "cached", "kind": "around", "expression": "execution(int math.Pi.getPiDecimal(int))"}
                ]
            }]
        }"#,
    );
    let around_calls = Arc::new(AtomicUsize::new(0));
    engine.register_aspect("sys/Caching", || Box::new(HashMap::<String, Value>::new()));
    engine.register_advice("sys/Caching", "cached", {
        let around_calls = around_calls.clone();
        move |aspect, jp| {
            around_calls.fetch_add(1, Ordering::SeqCst);
            let key = jp
                .rtti
                .args
                .iter()
                .map(Value::key_text)
                .collect::<Vec<_>>()
                .join(",");
            let hit = aspect
                .with_state::<HashMap<String, Value>, _>(|cache| cache.get(&key).cloned())
                .flatten();
            if let Some(value) = hit {
                return Ok(value);
            }
            let value = jp.proceed()?;
            aspect.with_state::<HashMap<String, Value>, _>(|cache| {
                cache.insert(key, value.clone());
            });
            Ok(value)
        }
    });
    engine.install(&weaver.weave("math.Pi").unwrap()).unwrap();

    let body_runs = Arc::new(AtomicUsize::new(0));
    let original: OriginalFn = {
        let body_runs = body_runs.clone();
        Arc::new(move |rtti| {
            body_runs.fetch_add(1, Ordering::SeqCst);
            let digits = [1i64, 4, 1, 5, 9, 2, 6, 5];
            let position = rtti.arg(0).and_then(Value::as_int).unwrap_or(0) as usize;
            Ok(Value::Int(digits[position % digits.len()]))
        })
    };

    let id = "math.Pi::execution::getPiDecimal(int)";
    let first = engine.dispatch(id, Invocation::new(vec![Value::Int(3)]), original.clone()).unwrap();
    let second = engine.dispatch(id, Invocation::new(vec![Value::Int(3)]), original.clone()).unwrap();
    assert_eq!(first, second);
    // Cache hit on the second call: the underlying method ran once.
    assert_eq!(body_runs.load(Ordering::SeqCst), 1);
    assert_eq!(around_calls.load(Ordering::SeqCst), 2);

    // A different argument is a different cache key.
    engine.dispatch(id, Invocation::new(vec![Value::Int(4)]), original.clone()).unwrap();
    assert_eq!(body_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn per_instance_concurrent_first_activation_creates_one_instance() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Audit",
                "qualified_name": "sys/Audit",
                "class_name": "demo.AuditAspect",
                "deployment_model": "perInstance",
                "advices": [
                    {"name": "audit", "kind": "before", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    let creations = Arc::new(AtomicUsize::new(0));
    engine.register_aspect("sys/Audit", {
        let creations = creations.clone();
        move || {
            creations.fetch_add(1, Ordering::SeqCst);
            Box::new(())
        }
    });
    engine.register_advice("sys/Audit", "audit", |_aspect, _jp| Ok(Value::Unit));
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    std::thread::scope(|scope| {
        for _ in 0..threads {
            let engine = engine.clone();
            let barrier = barrier.clone();
            scope.spawn(move || {
                barrier.wait();
                let invocation = Invocation::default().with_target(InstanceRef::new("demo.Target", 42));
                engine
                    .dispatch("demo.Target::execution::toLog1()", invocation, noop_original())
                    .unwrap();
            });
        }
    });
    assert_eq!(creations.load(Ordering::SeqCst), 1);

    // A different target object gets its own instance.
    let invocation = Invocation::default().with_target(InstanceRef::new("demo.Target", 43));
    engine
        .dispatch("demo.Target::execution::toLog1()", invocation, noop_original())
        .unwrap();
    assert_eq!(creations.load(Ordering::SeqCst), 2);
}

#[test]
fn per_thread_aspects_are_one_instance_per_calling_thread() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Local",
                "qualified_name": "sys/Local",
                "class_name": "demo.LocalAspect",
                "deployment_model": "perThread",
                "advices": [
                    {"name": "touch", "kind": "before", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    let creations = Arc::new(AtomicUsize::new(0));
    engine.register_aspect("sys/Local", {
        let creations = creations.clone();
        move || {
            creations.fetch_add(1, Ordering::SeqCst);
            Box::new(())
        }
    });
    engine.register_advice("sys/Local", "touch", |_aspect, _jp| Ok(Value::Unit));
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    // Two activations on the same thread share one instance.
    engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), noop_original())
        .unwrap();
    engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), noop_original())
        .unwrap();
    assert_eq!(creations.load(Ordering::SeqCst), 1);

    // A different thread gets its own.
    std::thread::scope(|scope| {
        scope.spawn(|| {
            engine
                .dispatch("demo.Target::execution::toLog1()", Invocation::default(), noop_original())
                .unwrap();
        });
    });
    assert_eq!(creations.load(Ordering::SeqCst), 2);
}

#[test]
fn per_instance_without_target_is_a_dispatch_error() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Audit",
                "qualified_name": "sys/Audit",
                "class_name": "demo.AuditAspect",
                "deployment_model": "perInstance",
                "advices": [
                    {"name": "audit", "kind": "before", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    engine.register_aspect("sys/Audit", || Box::new(()));
    engine.register_advice("sys/Audit", "audit", |_aspect, _jp| Ok(Value::Unit));
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let fault = engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), noop_original())
        .unwrap_err();
    assert!(matches!(fault, DispatchFault::Internal(DispatchError::MissingTarget { .. })));
}

#[test]
fn cflow_gates_binding_and_pops_on_throw() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Flow",
                "qualified_name": "sys/Flow",
                "class_name": "flow.FlowAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "gated", "kind": "before",
                     "expression": "execution(* flow.Service.inner()) && cflow(execution(* flow.Service.outer()))"}
                ]
            }]
        }"#,
    );
    let gated_runs = Arc::new(AtomicUsize::new(0));
    engine.register_aspect("sys/Flow", || Box::new(()));
    engine.register_advice("sys/Flow", "gated", {
        let gated_runs = gated_runs.clone();
        move |_aspect, _jp| {
            gated_runs.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Unit)
        }
    });
    engine.install(&weaver.weave("flow.Service").unwrap()).unwrap();

    let inner_id = "flow.Service::execution::inner()";
    let outer_id = "flow.Service::execution::outer()";

    // Outside the outer flow the binding does not apply.
    engine.dispatch(inner_id, Invocation::default(), noop_original()).unwrap();
    assert_eq!(gated_runs.load(Ordering::SeqCst), 0);

    // Inside it, it does.
    let nested: OriginalFn = {
        let engine = engine.clone();
        Arc::new(move |_rtti| engine.dispatch(inner_id, Invocation::default(), noop_original()))
    };
    engine.dispatch(outer_id, Invocation::default(), nested).unwrap();
    assert_eq!(gated_runs.load(Ordering::SeqCst), 1);

    // The marker pops even when the outer body throws after the nested
    // call.
    let nested_then_throw: OriginalFn = {
        let engine = engine.clone();
        Arc::new(move |_rtti| {
            engine.dispatch(inner_id, Invocation::default(), noop_original())?;
            Err(DispatchFault::thrown("lang.RuntimeException", "outer failed"))
        })
    };
    let fault = engine.dispatch(outer_id, Invocation::default(), nested_then_throw).unwrap_err();
    assert!(fault.as_thrown().is_some());
    assert_eq!(gated_runs.load(Ordering::SeqCst), 2);

    engine.dispatch(inner_id, Invocation::default(), noop_original()).unwrap();
    assert_eq!(gated_runs.load(Ordering::SeqCst), 2);
}

#[test]
fn after_throwing_filters_by_exception_type_and_after_always_runs() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Errors",
                "qualified_name": "sys/Errors",
                "class_name": "demo.ErrorsAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "onAppError", "kind": "afterThrowing", "exception_filter": "app..",
                     "expression": "execution(* demo.Target.toLog1())"},
                    {"name": "onLangError", "kind": "afterThrowing", "exception_filter": "lang..",
                     "expression": "execution(* demo.Target.toLog1())"},
                    {"name": "always", "kind": "after", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    engine.register_aspect("sys/Errors", || Box::new(()));
    for advice in ["onAppError", "onLangError", "always"] {
        let log = log.clone();
        engine.register_advice("sys/Errors", advice, move |_aspect, _jp| {
            log.lock().unwrap().push(advice.to_string());
            Ok(Value::Unit)
        });
    }
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let original: OriginalFn = Arc::new(|_rtti| Err(DispatchFault::thrown("app.db.DbException", "down")));
    let fault = engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), original)
        .unwrap_err();

    // The business exception propagates unchanged.
    assert_eq!(fault.as_thrown().unwrap().exception_type, "app.db.DbException");
    assert_eq!(*log.lock().unwrap(), vec!["onAppError", "always"]);
}

#[test]
fn framework_errors_are_invisible_to_after_throwing() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Misuse",
                "qualified_name": "sys/Misuse",
                "class_name": "demo.MisuseAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "eager", "kind": "before", "expression": "execution(* demo.Target.toLog1())"},
                    {"name": "onAnyError", "kind": "afterThrowing", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    let catcher_ran = Arc::new(AtomicUsize::new(0));
    engine.register_aspect("sys/Misuse", || Box::new(()));
    // proceed() from a before advice is outside the around chain's
    // dynamic extent.
    engine.register_advice("sys/Misuse", "eager", |_aspect, jp| jp.proceed());
    engine.register_advice("sys/Misuse", "onAnyError", {
        let catcher_ran = catcher_ran.clone();
        move |_aspect, _jp| {
            catcher_ran.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Unit)
        }
    });
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let fault = engine
        .dispatch("demo.Target::execution::toLog1()", Invocation::default(), noop_original())
        .unwrap_err();
    assert!(matches!(fault, DispatchFault::Internal(DispatchError::IllegalState)));
    assert_eq!(catcher_ran.load(Ordering::SeqCst), 0);
}

#[test]
fn hot_redefinition_applies_to_subsequent_activations() {
    let (registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Logging",
                "qualified_name": "sys/Logging",
                "class_name": "demo.LoggingAspect",
                "deployment_model": "perJVM",
                "pointcuts": [{"name": "logged", "expression": "execution(* demo.Target.toLog1())"}],
                "advices": [
                    {"name": "logEntry", "kind": "before", "expression": "logged"}
                ]
            }]
        }"#,
    );
    let uuid = registry.systems()[0].uuid;
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    engine.register_aspect("sys/Logging", || Box::new(()));
    engine.register_advice("sys/Logging", "logEntry", {
        let log = log.clone();
        move |_aspect, jp| {
            log.lock().unwrap().push(format!("before-{}", jp.signature().name()));
            Ok(Value::Unit)
        }
    });
    engine.install(&weaver.weave("demo.Target").unwrap()).unwrap();

    let to_log1 = "demo.Target::execution::toLog1()";
    let other = "demo.Target::execution::other()";

    engine.dispatch(to_log1, Invocation::default(), noop_original()).unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);

    // other() is unadvised: the stub falls through to the original.
    engine.dispatch(other, Invocation::default(), noop_original()).unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);

    // Bind the advice to other() at runtime; the engine rebuilds the
    // stale unit on the next activation.
    assert!(registry.activate(uuid, "Logging", "logEntry", "execution(* demo.Target.other())", "others").is_applied());
    engine.dispatch(other, Invocation::default(), noop_original()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["before-toLog1", "before-other"]);

    // Unbind everything; subsequent activations run the bare operation.
    assert!(registry.deactivate(uuid, "Logging", "logEntry").is_applied());
    engine.dispatch(to_log1, Invocation::default(), noop_original()).unwrap();
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[test]
fn unregistered_advice_fails_install_loudly() {
    let (_registry, engine, weaver) = build_stack(
        r#"{
            "aspects": [{
                "name": "Logging",
                "qualified_name": "sys/Logging",
                "class_name": "demo.LoggingAspect",
                "deployment_model": "perJVM",
                "advices": [
                    {"name": "logEntry", "kind": "before", "expression": "execution(* demo.Target.toLog1())"}
                ]
            }]
        }"#,
    );
    // No aspect or advice registration at all.
    let errors = engine.install(&weaver.weave("demo.Target").unwrap()).unwrap_err();
    assert!(matches!(errors[0], DispatchError::UnknownAspect { .. }));
}

#[test]
fn unknown_join_point_is_a_structured_error() {
    let (_registry, engine, _weaver) = build_stack(r#"{"aspects": []}"#);
    let fault = engine
        .dispatch("no.Such::execution::thing()", Invocation::default(), noop_original())
        .unwrap_err();
    assert!(matches!(fault, DispatchFault::Internal(DispatchError::UnknownJoinPoint(_))));
}
