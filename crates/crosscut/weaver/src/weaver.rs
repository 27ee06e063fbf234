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

//! The join-point compiler.
//!
//! `weave` is a pure function of (class, definition snapshot): it
//! enumerates candidate join-point shapes, runs the coarse filter and the
//! precise match, and assembles ordered advice chains. Chain order is
//! deterministic: aspects in registration order, advices in declaration
//! order, never a hash-map traversal. Weaving the same class twice at the
//! same generation yields an equivalent unit.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crosscut_core::definition::{AdviceDefinition, AdviceKind, DeploymentModel, SystemRegistry};
use crosscut_core::expression::{residualize, CflowId, ExpressionAst, ExpressionContext, PointcutKind, WithinContext};
use crosscut_core::model::{modifiers, ClassInfo, ClassModel, SiteKind};
use crosscut_core::signature::Signature;

use crate::config::WeaverConfig;
use crate::plan::{BoundAdvice, DispatchStub, JoinPointPlan, WovenClassUnit};

/// Errors raised while weaving. Binding-level errors are recorded on the
/// woven unit (partial success per class) unless the weaver is strict.
#[derive(Error, Debug, Clone)]
pub enum WeaveError {
    #[error("class '{class}' is not present in the class model")]
    UnknownClass { class: String },
    #[error("join point '{join_point}': advice '{advice}' of aspect '{aspect}' is bound more than once")]
    DuplicateBinding {
        join_point: String,
        aspect: String,
        advice: String,
    },
}

/// The weaver: owns the matcher inputs and the already-woven ledger.
pub struct Weaver {
    registry: Arc<SystemRegistry>,
    model: Arc<ClassModel>,
    config: WeaverConfig,
    /// Class name to the generation it was last woven at.
    woven: Mutex<HashMap<String, u64>>,
}

impl Weaver {
    pub fn new(registry: Arc<SystemRegistry>, model: Arc<ClassModel>, config: WeaverConfig) -> Self {
        Self {
            registry,
            model,
            config,
            woven: Mutex::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &Arc<ClassModel> {
        &self.model
    }

    pub fn registry(&self) -> &Arc<SystemRegistry> {
        &self.registry
    }

    /// Compile the dispatch plans for one class against the current
    /// definition snapshot.
    pub fn weave(&self, class_name: &str) -> Result<WovenClassUnit, WeaveError> {
        let generation = self.registry.generation();
        let Some(class) = self.model.get(class_name) else {
            return Err(WeaveError::UnknownClass {
                class: class_name.to_string(),
            });
        };

        {
            let mut woven = self.woven.lock();
            if woven.insert(class_name.to_string(), generation) == Some(generation) {
                debug!(class = class_name, generation, "re-weaving at unchanged generation");
            }
        }

        let systems = self.registry.systems();
        let mut candidates: Vec<(&AdviceDefinition, DeploymentModel)> = Vec::new();
        let mut cflow_nodes: Vec<(CflowId, ExpressionAst)> = Vec::new();
        for system in &systems {
            if !system.should_prepare(class_name) {
                continue;
            }
            for aspect in &system.aspects {
                for advice in &aspect.advices {
                    candidates.push((advice, aspect.deployment_model));
                    for (id, inner) in advice.expression.cflow_nodes() {
                        if !cflow_nodes.iter().any(|(existing, _)| *existing == id) {
                            cflow_nodes.push((id, inner));
                        }
                    }
                }
            }
        }

        // Coarse phase: drop advices whose expression definitively cannot
        // apply anywhere in this class. Member detail stays unknown here,
        // so the filter errs on the side of keeping.
        if self.config.class_filter {
            let filter_ctx = ExpressionContext::class_filter(class.clone(), &self.model);
            candidates.retain(|(advice, _)| advice.expression.matches_filter(&filter_ctx));
        }

        let mut unit = WovenClassUnit::unwoven(class_name, generation);
        if candidates.is_empty() && cflow_nodes.is_empty() {
            return Ok(unit);
        }

        for site in self.enumerate_sites(&class) {
            let mut plan = JoinPointPlan {
                id: site.id.clone(),
                kind: site.kind,
                signature: site.signature.clone(),
                before: Vec::new(),
                around: Vec::new(),
                after_returning: Vec::new(),
                after_throwing: Vec::new(),
                after: Vec::new(),
                cflow_marks: Vec::new(),
                stub: DispatchStub {
                    join_point_id: site.id.clone(),
                    class_name: class_name.to_string(),
                    within_method: site.within_method.clone(),
                },
            };

            // Precise phase, in registration then declaration order.
            for (advice, deployment_model) in &candidates {
                let residual = residualize(advice.expression.ast(), &site.context);
                if residual.is_never() {
                    continue;
                }
                let chain = match advice.kind {
                    AdviceKind::Before => &mut plan.before,
                    AdviceKind::Around => &mut plan.around,
                    AdviceKind::AfterReturning => &mut plan.after_returning,
                    AdviceKind::AfterThrowing => &mut plan.after_throwing,
                    AdviceKind::After => &mut plan.after,
                };
                if chain
                    .iter()
                    .any(|bound| bound.aspect_qualified_name == advice.aspect_qualified_name && bound.advice_name == advice.name)
                {
                    let failure = WeaveError::DuplicateBinding {
                        join_point: site.id.clone(),
                        aspect: advice.aspect_qualified_name.clone(),
                        advice: advice.name.clone(),
                    };
                    if self.config.strict {
                        return Err(failure);
                    }
                    unit.failures.push(failure);
                    continue;
                }
                chain.push(BoundAdvice {
                    aspect_qualified_name: advice.aspect_qualified_name.clone(),
                    advice_name: advice.name.clone(),
                    method_name: advice.method_name.clone(),
                    kind: advice.kind,
                    deployment_model: *deployment_model,
                    residual,
                    exception_filter: advice.exception_filter.clone(),
                    parameter_names: advice.parameter_names.clone(),
                });
            }

            // Any join point matching a cflow's inner expression marks the
            // flow for its dynamic extent.
            for (id, inner) in &cflow_nodes {
                if !residualize(inner, &site.context).is_never() {
                    plan.cflow_marks.push(id.clone());
                }
            }

            if !plan.is_empty() {
                unit.join_points.push(plan);
            }
        }

        debug!(
            class = class_name,
            join_points = unit.join_points.len(),
            failures = unit.failures.len(),
            "woven class unit"
        );
        Ok(unit)
    }

    /// Weave many classes, in parallel when configured. Output order
    /// matches input order regardless of scheduling.
    pub fn weave_all(&self, class_names: &[String]) -> Vec<Result<WovenClassUnit, WeaveError>> {
        let results = if self.config.parallel {
            class_names.par_iter().map(|name| self.weave(name)).collect()
        } else {
            class_names.iter().map(|name| self.weave(name)).collect()
        };
        info!(classes = class_names.len(), "weave pass complete");
        results
    }

    /// Enumerate every candidate join-point shape in the class:
    /// execution-side shapes from declared members, call-side shapes from
    /// reported code sites.
    fn enumerate_sites<'m>(&'m self, class: &Arc<ClassInfo>) -> Vec<CandidateSite<'m>> {
        let model: &ClassModel = &self.model;
        let mut sites = Vec::new();

        for method in &class.methods {
            // Abstract methods have no body to rewrite.
            if method.modifiers & modifiers::ABSTRACT != 0 {
                continue;
            }
            sites.push(CandidateSite {
                id: format!("{}::execution::{}", class.name, method.signature_key()),
                kind: PointcutKind::Execution,
                signature: Arc::new(Signature::method(method.clone())),
                within_method: None,
                context: ExpressionContext::execution(class.clone(), method.clone(), model),
            });
        }

        for constructor in &class.constructors {
            sites.push(CandidateSite {
                id: format!("{}::execution::{}", class.name, constructor.signature_key()),
                kind: PointcutKind::Execution,
                signature: Arc::new(Signature::constructor(constructor.clone())),
                within_method: None,
                context: ExpressionContext::constructor_execution(class.clone(), constructor.clone(), model),
            });
        }

        if class.has_static_initializer {
            sites.push(CandidateSite {
                id: format!("{}::staticinitialization::clinit", class.name),
                kind: PointcutKind::StaticInitialization,
                signature: Arc::new(Signature::static_initializer(&class.name)),
                within_method: None,
                context: ExpressionContext::static_initialization(class.clone(), model),
            });
        }

        for (index, site) in class.sites.iter().enumerate() {
            let within = WithinContext {
                class: class.clone(),
                method: class.method(&site.within_method),
            };
            match &site.kind {
                SiteKind::MethodCall { callee_class, method_name } => {
                    let callee = model.get(callee_class);
                    let method = callee.as_ref().and_then(|c| c.method(method_name));
                    // An unresolvable callee cannot match in the precise
                    // phase; the permissiveness lives in the filter stage.
                    let Some(method) = method else { continue };
                    sites.push(CandidateSite {
                        id: format!("{}::call::{}.{}#{}", class.name, callee_class, method.signature_key(), index),
                        kind: PointcutKind::Call,
                        signature: Arc::new(Signature::method(method.clone())),
                        within_method: Some(site.within_method.clone()),
                        context: ExpressionContext::call(callee, Some(method), within, model),
                    });
                }
                SiteKind::FieldGet { declaring_class, field_name } => {
                    let Some(declaring) = model.get(declaring_class) else { continue };
                    let Some(field) = declaring.field(field_name) else { continue };
                    sites.push(CandidateSite {
                        id: format!("{}::get::{}.{}#{}", class.name, declaring_class, field_name, index),
                        kind: PointcutKind::Get,
                        signature: Arc::new(Signature::field(field.clone())),
                        within_method: Some(site.within_method.clone()),
                        context: ExpressionContext::field_get(declaring, field, within, model),
                    });
                }
                SiteKind::FieldSet { declaring_class, field_name } => {
                    let Some(declaring) = model.get(declaring_class) else { continue };
                    let Some(field) = declaring.field(field_name) else { continue };
                    sites.push(CandidateSite {
                        id: format!("{}::set::{}.{}#{}", class.name, declaring_class, field_name, index),
                        kind: PointcutKind::Set,
                        signature: Arc::new(Signature::field(field.clone())),
                        within_method: Some(site.within_method.clone()),
                        context: ExpressionContext::field_set(declaring, field, within, model),
                    });
                }
                SiteKind::ConstructorCall { callee_class } => {
                    let Some(callee) = model.get(callee_class) else { continue };
                    for constructor in &callee.constructors {
                        sites.push(CandidateSite {
                            id: format!("{}::call::{}.{}#{}", class.name, callee_class, constructor.signature_key(), index),
                            kind: PointcutKind::Call,
                            signature: Arc::new(Signature::constructor(constructor.clone())),
                            within_method: Some(site.within_method.clone()),
                            context: ExpressionContext::constructor_call(callee.clone(), constructor.clone(), within.clone(), model),
                        });
                    }
                }
                SiteKind::Handler { exception_class } => {
                    let Some(exception) = model.get(exception_class) else { continue };
                    sites.push(CandidateSite {
                        id: format!("{}::handler::{}#{}", class.name, exception_class, index),
                        kind: PointcutKind::Handler,
                        signature: Arc::new(Signature::handler(exception_class, &class.name)),
                        within_method: Some(site.within_method.clone()),
                        context: ExpressionContext::handler(exception, within, model),
                    });
                }
            }
        }

        sites
    }
}

/// One enumerated join-point candidate, before matching.
struct CandidateSite<'m> {
    id: String,
    kind: PointcutKind,
    signature: Arc<Signature>,
    within_method: Option<String>,
    context: ExpressionContext<'m>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscut_core::definition::DefinitionDocument;
    use crosscut_core::model::{ClassInfo, CodeSite, MethodInfo};

    fn target_model() -> Arc<ClassModel> {
        let mut model = ClassModel::new();
        model.register(
            ClassInfo::new("demo.Target")
                .with_method(MethodInfo::new("demo.Target", "toLog1", "void"))
                .with_method(MethodInfo::new("demo.Target", "other", "void")),
        );
        model.register(
            ClassInfo::new("demo.Caller")
                .with_method(MethodInfo::new("demo.Caller", "run", "void"))
                .with_site(CodeSite::call("run", "demo.Target", "toLog1")),
        );
        Arc::new(model)
    }

    fn registry_from_json(json: &str) -> Arc<SystemRegistry> {
        let document: DefinitionDocument = serde_json::from_str(json).unwrap();
        let registry = SystemRegistry::new();
        registry.register(document.build().unwrap());
        Arc::new(registry)
    }

    fn logging_registry() -> Arc<SystemRegistry> {
        registry_from_json(
            r#"{
                "aspects": [{
                    "name": "Logging",
                    "class_name": "demo.LoggingAspect",
                    "deployment_model": "perJVM",
                    "advices": [
                        {"name": "logEntry", "kind": "before", "expression": "execution(* demo.Target.toLog1(..))"},
                        {"name": "logExit", "kind": "after", "expression": "execution(* demo.Target.toLog1(..))"}
                    ]
                }]
            }"#,
        )
    }

    #[test]
    fn test_weave_emits_plan_for_matched_execution() {
        let weaver = Weaver::new(logging_registry(), target_model(), WeaverConfig::default());
        let unit = weaver.weave("demo.Target").unwrap();
        assert_eq!(unit.join_points.len(), 1);
        let plan = &unit.join_points[0];
        assert_eq!(plan.id, "demo.Target::execution::toLog1()");
        assert_eq!(plan.before.len(), 1);
        assert_eq!(plan.after.len(), 1);
        assert_eq!(plan.signature.name(), "toLog1");
    }

    #[test]
    fn test_weave_is_idempotent() {
        let weaver = Weaver::new(logging_registry(), target_model(), WeaverConfig::default());
        let first = weaver.weave("demo.Target").unwrap();
        let second = weaver.weave("demo.Target").unwrap();
        assert_eq!(first.join_points.len(), second.join_points.len());
        for (a, b) in first.join_points.iter().zip(&second.join_points) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.advice_count(), b.advice_count());
        }
    }

    #[test]
    fn test_call_side_join_point_from_site() {
        let registry = registry_from_json(
            r#"{
                "aspects": [{
                    "name": "CallWatch",
                    "class_name": "demo.CallWatchAspect",
                    "deployment_model": "perJVM",
                    "advices": [
                        {"name": "watch", "kind": "before", "expression": "call(* demo.Target.toLog1(..)) && within(demo.Caller)"}
                    ]
                }]
            }"#,
        );
        let weaver = Weaver::new(registry, target_model(), WeaverConfig::default());
        let unit = weaver.weave("demo.Caller").unwrap();
        assert_eq!(unit.join_points.len(), 1);
        assert_eq!(unit.join_points[0].kind, PointcutKind::Call);
        // The execution side of the callee is untouched by a call pointcut.
        let callee_unit = weaver.weave("demo.Target").unwrap();
        assert!(callee_unit.join_points.is_empty());
    }

    #[test]
    fn test_chain_order_across_aspects_is_registration_then_declaration() {
        let registry = registry_from_json(
            r#"{
                "aspects": [
                    {
                        "name": "First",
                        "class_name": "demo.FirstAspect",
                        "deployment_model": "perJVM",
                        "advices": [
                            {"name": "firstA", "kind": "before", "expression": "execution(* demo.Target.toLog1(..))"},
                            {"name": "firstB", "kind": "before", "expression": "execution(* demo.Target.toLog1(..))"}
                        ]
                    },
                    {
                        "name": "Second",
                        "class_name": "demo.SecondAspect",
                        "deployment_model": "perJVM",
                        "advices": [
                            {"name": "second", "kind": "before", "expression": "execution(* demo.Target.toLog1(..))"}
                        ]
                    }
                ]
            }"#,
        );
        let weaver = Weaver::new(registry, target_model(), WeaverConfig::default());
        let unit = weaver.weave("demo.Target").unwrap();
        let names: Vec<&str> = unit.join_points[0].before.iter().map(|b| b.advice_name.as_str()).collect();
        assert_eq!(names, vec!["firstA", "firstB", "second"]);
    }

    #[test]
    fn test_cflow_residual_and_marks() {
        let registry = registry_from_json(
            r#"{
                "aspects": [{
                    "name": "Flow",
                    "class_name": "demo.FlowAspect",
                    "deployment_model": "perJVM",
                    "advices": [
                        {"name": "gated", "kind": "before",
                         "expression": "execution(* demo.Target.toLog1(..)) && cflow(execution(* demo.Target.other(..)))"}
                    ]
                }]
            }"#,
        );
        let weaver = Weaver::new(registry, target_model(), WeaverConfig::default());
        let unit = weaver.weave("demo.Target").unwrap();

        let gated = unit.join_point("demo.Target::execution::toLog1()").unwrap();
        assert!(!gated.before[0].residual.is_always());

        // The join point matching the cflow's inner expression carries the
        // marker for its dynamic extent.
        let marker = unit.join_point("demo.Target::execution::other()").unwrap();
        assert_eq!(marker.cflow_marks.len(), 1);
        assert!(marker.advice_count() == 0);
    }

    #[test]
    fn test_unknown_class_fails() {
        let weaver = Weaver::new(logging_registry(), target_model(), WeaverConfig::default());
        assert!(matches!(
            weaver.weave("demo.Missing"),
            Err(WeaveError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_weave_all_preserves_input_order() {
        let weaver = Weaver::new(logging_registry(), target_model(), WeaverConfig::default());
        let names = vec!["demo.Caller".to_string(), "demo.Target".to_string()];
        let results = weaver.weave_all(&names);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().class_name, "demo.Caller");
        assert_eq!(results[1].as_ref().unwrap().class_name, "demo.Target");
    }
}
