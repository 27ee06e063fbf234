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

//! The system registry: the explicit context object holding every loaded
//! [`SystemDefinition`], threaded through the weaver and the dispatch
//! engine instead of a process-wide singleton.
//!
//! Hot redefinition (`activate`/`deactivate`) swaps a whole definition
//! snapshot under one coarse lock and bumps the generation counter that
//! downstream caches check. A failed redefinition leaves the model
//! unchanged and reports a structured [`RedefinitionOutcome`] instead of
//! throwing past the boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::definition::{AdviceDefinition, PointcutDefinition, SystemDefinition};
use crate::expression::ExpressionInfo;

/// Structured result of a hot-redefinition request.
#[derive(Debug, Clone, PartialEq)]
pub enum RedefinitionOutcome {
    /// The binding change is live; join points entered after caches see
    /// this generation pick it up.
    Applied { generation: u64 },
    SystemNotFound { uuid: Uuid },
    AspectNotFound { aspect: String },
    AdviceNotFound { aspect: String, advice: String },
    PointcutNotFound { aspect: String, pointcut: String },
    InvalidExpression { reason: String },
}

impl RedefinitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Registry of loaded system definitions, in registration order.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: RwLock<Vec<Arc<SystemDefinition>>>,
    redefinition: Mutex<()>,
    generation: AtomicU64,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, system: SystemDefinition) -> Uuid {
        let uuid = system.uuid;
        info!(system = %uuid, aspects = system.aspects.len(), "registering system definition");
        self.systems.write().push(Arc::new(system));
        self.generation.fetch_add(1, Ordering::SeqCst);
        uuid
    }

    /// Snapshot of all systems, in registration order.
    pub fn systems(&self) -> Vec<Arc<SystemDefinition>> {
        self.systems.read().clone()
    }

    pub fn system(&self, uuid: Uuid) -> Option<Arc<SystemDefinition>> {
        self.systems.read().iter().find(|s| s.uuid == uuid).cloned()
    }

    /// Monotonic counter bumped on every definition change. Weaver and
    /// dispatch caches compare against it to detect staleness.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Add an advice-at-pointcut binding to a live aspect. The named
    /// advice must already exist; its method reference and kind carry
    /// over to the new binding. A non-empty `expression` is compiled and
    /// also registered under `pointcut_name`; an empty one binds to the
    /// existing named pointcut instead.
    pub fn activate(&self, uuid: Uuid, aspect_name: &str, advice_name: &str, expression: &str, pointcut_name: &str) -> RedefinitionOutcome {
        let _guard = self.redefinition.lock();
        let mut systems = self.systems.write();

        let Some(slot) = systems.iter_mut().find(|s| s.uuid == uuid) else {
            warn!(system = %uuid, "activate: system not found");
            return RedefinitionOutcome::SystemNotFound { uuid };
        };

        let mut modified = (**slot).clone();
        let Some(aspect) = modified.aspects.iter_mut().find(|a| a.name == aspect_name) else {
            warn!(aspect = aspect_name, "activate: aspect not found");
            return RedefinitionOutcome::AspectNotFound {
                aspect: aspect_name.to_string(),
            };
        };

        let Some(template) = aspect.advice(advice_name).cloned() else {
            warn!(aspect = aspect_name, advice = advice_name, "activate: advice not found");
            return RedefinitionOutcome::AdviceNotFound {
                aspect: aspect_name.to_string(),
                advice: advice_name.to_string(),
            };
        };

        let expression = if expression.trim().is_empty() {
            match aspect.pointcut(pointcut_name) {
                Some(pointcut) => pointcut.expression.clone(),
                None => {
                    warn!(aspect = aspect_name, pointcut = pointcut_name, "activate: pointcut not found");
                    return RedefinitionOutcome::PointcutNotFound {
                        aspect: aspect_name.to_string(),
                        pointcut: pointcut_name.to_string(),
                    };
                }
            }
        } else {
            match ExpressionInfo::compile(expression) {
                Ok(compiled) => compiled,
                Err(err) => {
                    return RedefinitionOutcome::InvalidExpression { reason: err.to_string() };
                }
            }
        };

        let resolved = match aspect.resolve_and_validate(advice_name, &template.parameter_names, &expression) {
            Ok(resolved) => resolved,
            Err(err) => {
                return RedefinitionOutcome::InvalidExpression { reason: err.to_string() };
            }
        };

        match aspect.pointcuts.iter_mut().find(|p| p.name == pointcut_name) {
            Some(existing) => existing.expression = expression.clone(),
            None => aspect.pointcuts.push(PointcutDefinition {
                name: pointcut_name.to_string(),
                expression: expression.clone(),
            }),
        }
        aspect.advices.push(AdviceDefinition {
            expression: resolved,
            ..template
        });

        *slot = Arc::new(modified);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(aspect = aspect_name, advice = advice_name, pointcut = pointcut_name, generation, "activated advice binding");
        RedefinitionOutcome::Applied { generation }
    }

    /// Remove every binding of the named advice from a live aspect.
    /// Already-in-flight activations are unaffected.
    pub fn deactivate(&self, uuid: Uuid, aspect_name: &str, advice_name: &str) -> RedefinitionOutcome {
        let _guard = self.redefinition.lock();
        let mut systems = self.systems.write();

        let Some(slot) = systems.iter_mut().find(|s| s.uuid == uuid) else {
            warn!(system = %uuid, "deactivate: system not found");
            return RedefinitionOutcome::SystemNotFound { uuid };
        };

        let mut modified = (**slot).clone();
        let Some(aspect) = modified.aspects.iter_mut().find(|a| a.name == aspect_name) else {
            warn!(aspect = aspect_name, "deactivate: aspect not found");
            return RedefinitionOutcome::AspectNotFound {
                aspect: aspect_name.to_string(),
            };
        };

        let before = aspect.advices.len();
        aspect.advices.retain(|a| a.name != advice_name);
        if aspect.advices.len() == before {
            warn!(aspect = aspect_name, advice = advice_name, "deactivate: advice not found");
            return RedefinitionOutcome::AdviceNotFound {
                aspect: aspect_name.to_string(),
                advice: advice_name.to_string(),
            };
        }

        *slot = Arc::new(modified);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(aspect = aspect_name, advice = advice_name, generation, "deactivated advice binding");
        RedefinitionOutcome::Applied { generation }
    }
}
