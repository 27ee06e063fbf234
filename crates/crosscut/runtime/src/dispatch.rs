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

//! The dispatch engine.
//!
//! Woven stubs route every activation through [`DispatchEngine::dispatch`],
//! which walks the compiled chain inline on the calling thread:
//! before advices, the around chain into the original operation, then
//! afterReturning or afterThrowing by outcome, then after advices with
//! finally semantics. Aspect instances resolve per deployment model on
//! entry; cflow markers scope the activation's dynamic extent.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crosscut_core::definition::SystemRegistry;
use crosscut_core::signature::{InstanceRef, Rtti, Value};
use crosscut_weaver::{BoundAdvice, JoinPointPlan, Weaver, WovenClassUnit};

use crate::aspect::{AspectRegistry, AspectState, DeploymentKey};
use crate::cflow::{CflowScope, ThreadCflow};
use crate::errors::{DispatchError, DispatchFault};
use crate::join_point::{JoinPoint, OriginalFn, ResolvedAdvice};

/// Engine configuration, overridable from the environment.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Rebuild join points woven against an older definition generation
    /// before dispatching through them.
    pub rebuild_on_stale: bool,
    /// Fail installation when a bound advice has no registered
    /// implementation instead of skipping the affected join point.
    pub strict_install: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rebuild_on_stale: true,
            strict_install: true,
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var("CROSSCUT_REBUILD_ON_STALE") {
            if let Some(flag) = parse_bool(&value) {
                config.rebuild_on_stale = flag;
            }
        }
        if let Ok(value) = std::env::var("CROSSCUT_STRICT_INSTALL") {
            if let Some(flag) = parse_bool(&value) {
                config.strict_install = flag;
            }
        }
        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// One invocation's inputs, handed over by the woven stub.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub args: Vec<Value>,
    pub target: Option<InstanceRef>,
    pub caller: Option<InstanceRef>,
}

impl Invocation {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            target: None,
            caller: None,
        }
    }

    pub fn with_target(mut self, target: InstanceRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_caller(mut self, caller: InstanceRef) -> Self {
        self.caller = Some(caller);
        self
    }

    fn into_rtti(self) -> Rtti {
        Rtti {
            args: self.args,
            return_value: None,
            target: self.target,
            caller: self.caller,
        }
    }
}

struct InstalledJoinPoint {
    plan: JoinPointPlan,
    generation: u64,
}

/// The runtime dispatch engine.
pub struct DispatchEngine {
    weaver: Arc<Weaver>,
    registry: Arc<SystemRegistry>,
    aspects: AspectRegistry,
    installed: DashMap<String, Arc<InstalledJoinPoint>>,
    /// Class name to the generation its units were installed at; lets a
    /// stub whose join point became unadvised fall through to the
    /// original operation instead of failing.
    classes: DashMap<String, u64>,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(weaver: Arc<Weaver>, config: DispatchConfig) -> Self {
        let registry = weaver.registry().clone();
        Self {
            weaver,
            registry,
            aspects: AspectRegistry::new(),
            installed: DashMap::new(),
            classes: DashMap::new(),
            config,
        }
    }

    pub fn aspects(&self) -> &AspectRegistry {
        &self.aspects
    }

    pub fn register_aspect(&self, qualified_name: &str, factory: impl Fn() -> AspectState + Send + Sync + 'static) {
        self.aspects.register_aspect(qualified_name, factory);
    }

    pub fn register_advice(
        &self,
        qualified_name: &str,
        method_name: &str,
        advice: impl Fn(&crate::aspect::AspectInstance, &mut JoinPoint) -> Result<Value, DispatchFault> + Send + Sync + 'static,
    ) {
        self.aspects.register_advice(qualified_name, method_name, advice);
    }

    /// Install (or replace) a woven unit's join points. Every bound
    /// advice must have a registered implementation; a binding that does
    /// not resolve fails the install when strict, otherwise its join
    /// point is skipped and reported.
    pub fn install(&self, unit: &WovenClassUnit) -> Result<usize, Vec<DispatchError>> {
        let mut errors = Vec::new();
        let mut valid = Vec::new();
        for plan in &unit.join_points {
            let mut plan_errors = Vec::new();
            for bound in plan.all_advices() {
                if self.aspects.container(&bound.aspect_qualified_name).is_none() {
                    plan_errors.push(DispatchError::UnknownAspect {
                        aspect: bound.aspect_qualified_name.clone(),
                    });
                } else if self.aspects.advice(&bound.aspect_qualified_name, &bound.method_name).is_none() {
                    plan_errors.push(DispatchError::UnresolvedAdvice {
                        aspect: bound.aspect_qualified_name.clone(),
                        method: bound.method_name.clone(),
                    });
                }
            }
            if plan_errors.is_empty() {
                valid.push(plan);
            } else {
                warn!(join_point = %plan.id, errors = plan_errors.len(), "join point has unresolvable bindings");
                errors.extend(plan_errors);
            }
        }

        if self.config.strict_install && !errors.is_empty() {
            return Err(errors);
        }

        // Replace everything previously installed for this class, so
        // re-installation after a re-weave never doubles advice.
        self.installed.retain(|_, entry| entry.plan.stub.class_name != unit.class_name);
        let count = valid.len();
        for plan in valid {
            self.installed.insert(
                plan.id.clone(),
                Arc::new(InstalledJoinPoint {
                    plan: plan.clone(),
                    generation: unit.generation,
                }),
            );
        }
        self.classes.insert(unit.class_name.clone(), unit.generation);
        info!(class = %unit.class_name, join_points = count, generation = unit.generation, "installed woven unit");
        Ok(count)
    }

    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }

    /// Dispatch one activation. `original` is the wrapped operation; it
    /// runs when the around chain proceeds through, zero or more times.
    pub fn dispatch(&self, join_point_id: &str, invocation: Invocation, original: OriginalFn) -> Result<Value, DispatchFault> {
        let Some(installed) = self.lookup_current(join_point_id)? else {
            // The join point became unadvised after a redefinition; the
            // stub still routes here, so run the operation untouched.
            let mut rtti = invocation.into_rtti();
            return original(&mut rtti);
        };
        let plan = &installed.plan;
        debug!(join_point = %plan.id, "dispatching activation");

        // Markers cover the whole dynamic extent and pop on every exit
        // path, unwinding included.
        let _scope = CflowScope::enter(&plan.cflow_marks);
        let resolver = ThreadCflow;

        let target = invocation.target.clone();
        let before = self.resolve_chain(&plan.before, plan, target.as_ref(), &resolver)?;
        let arounds = self.resolve_chain(&plan.around, plan, target.as_ref(), &resolver)?;
        let after_returning = self.resolve_chain(&plan.after_returning, plan, target.as_ref(), &resolver)?;
        let after_throwing = self.resolve_chain(&plan.after_throwing, plan, target.as_ref(), &resolver)?;
        let after = self.resolve_chain(&plan.after, plan, target.as_ref(), &resolver)?;

        let mut join_point = JoinPoint::new(plan.signature.clone(), invocation.into_rtti(), arounds, original);

        let mut outcome = Ok(Value::Unit);
        for advice in &before {
            if let Err(fault) = advice.invoke(&mut join_point) {
                outcome = Err(fault);
                break;
            }
        }

        if outcome.is_ok() {
            join_point.begin();
            outcome = join_point.proceed();
            join_point.finish();
        }

        outcome = match outcome {
            Ok(value) => {
                join_point.rtti.return_value = Some(value.clone());
                let mut result = Ok(value);
                for advice in &after_returning {
                    if let Err(fault) = advice.invoke(&mut join_point) {
                        result = Err(fault);
                        break;
                    }
                }
                result
            }
            Err(DispatchFault::Thrown(thrown)) => {
                let mut result = Err(DispatchFault::Thrown(thrown.clone()));
                for advice in &after_throwing {
                    let applies = advice
                        .exception_filter
                        .as_ref()
                        .is_none_or(|filter| filter.matches(&thrown.exception_type));
                    if applies {
                        if let Err(fault) = advice.invoke(&mut join_point) {
                            result = Err(fault);
                            break;
                        }
                    }
                }
                result
            }
            // A framework invariant violation aborts the activation; the
            // after phases only see business outcomes.
            Err(internal) => return Err(internal),
        };

        for advice in &after {
            if let Err(fault) = advice.invoke(&mut join_point) {
                outcome = Err(fault);
                break;
            }
        }
        outcome
    }

    /// Resolve the chain for this activation: apply residual cflow
    /// guards, look up advice implementations, and fetch or create the
    /// aspect instance for the deployment key.
    fn resolve_chain(
        &self,
        bound: &[BoundAdvice],
        plan: &JoinPointPlan,
        target: Option<&InstanceRef>,
        resolver: &ThreadCflow,
    ) -> Result<Vec<ResolvedAdvice>, DispatchFault> {
        let mut resolved = Vec::with_capacity(bound.len());
        for advice in bound {
            if !advice.residual.decide(resolver) {
                continue;
            }
            let container = self
                .aspects
                .container(&advice.aspect_qualified_name)
                .ok_or_else(|| DispatchError::UnknownAspect {
                    aspect: advice.aspect_qualified_name.clone(),
                })?;
            let func = self
                .aspects
                .advice(&advice.aspect_qualified_name, &advice.method_name)
                .ok_or_else(|| DispatchError::UnresolvedAdvice {
                    aspect: advice.aspect_qualified_name.clone(),
                    method: advice.method_name.clone(),
                })?;
            let key = DeploymentKey::for_activation(advice.deployment_model, plan.signature.declaring_type(), target).ok_or_else(|| {
                DispatchError::MissingTarget {
                    join_point: plan.id.clone(),
                    deployment: advice.deployment_model.as_str().to_string(),
                }
            })?;
            resolved.push(ResolvedAdvice {
                aspect_qualified_name: advice.aspect_qualified_name.clone(),
                advice_name: advice.advice_name.clone(),
                func,
                instance: container.instance(key),
                exception_filter: advice.exception_filter.clone(),
            });
        }
        Ok(resolved)
    }

    /// Current installed entry for a join point, rebuilding the class's
    /// units first when the definitions moved on. `None` means the stub
    /// exists but nothing is bound there anymore.
    fn lookup_current(&self, join_point_id: &str) -> Result<Option<Arc<InstalledJoinPoint>>, DispatchFault> {
        let current = self.registry.generation();
        if let Some(entry) = self.installed.get(join_point_id) {
            if entry.generation == current {
                return Ok(Some(entry.clone()));
            }
            let class = entry.plan.stub.class_name.clone();
            let woven = entry.generation;
            drop(entry);
            if !self.config.rebuild_on_stale {
                return Err(DispatchError::StaleUnit { class, woven, current }.into());
            }
            self.refresh_class(&class)?;
            return Ok(self.installed.get(join_point_id).map(|entry| entry.clone()));
        }

        // Unseen id: either its class was installed and the join point is
        // simply unadvised now, or the id is wrong.
        let class = join_point_id.split("::").next().unwrap_or(join_point_id).to_string();
        let Some(installed_generation) = self.classes.get(&class).map(|entry| *entry) else {
            return Err(DispatchError::UnknownJoinPoint(join_point_id.to_string()).into());
        };
        if installed_generation != current && self.config.rebuild_on_stale {
            self.refresh_class(&class)?;
        }
        Ok(self.installed.get(join_point_id).map(|entry| entry.clone()))
    }

    fn refresh_class(&self, class: &str) -> Result<(), DispatchFault> {
        debug!(class, "rebuilding stale woven unit");
        let unit = self.weaver.weave(class).map_err(|err| DispatchError::ReweaveFailed {
            class: class.to_string(),
            reason: err.to_string(),
        })?;
        self.install(&unit).map_err(|errors| {
            let reason = errors
                .iter()
                .map(|err| err.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            DispatchError::ReweaveFailed {
                class: class.to_string(),
                reason,
            }
        })?;
        Ok(())
    }
}
