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

//! Aspect instances and their containers.
//!
//! Aspect implementations are registered as closures keyed by (aspect
//! qualified name, advice method name), and aspect state comes from a
//! factory closure per aspect; no reflective instantiation. Containers
//! own one state instance per deployment key and guarantee at-most-one
//! creation per key under concurrent first activation.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crosscut_core::definition::DeploymentModel;
use crosscut_core::signature::{InstanceRef, Value};

use crate::errors::DispatchFault;
use crate::join_point::JoinPoint;

/// User-defined per-aspect state, downcast by the aspect's own advice.
pub type AspectState = Box<dyn Any + Send>;

/// Creates a fresh aspect state for one deployment key.
pub type StateFactory = Arc<dyn Fn() -> AspectState + Send + Sync>;

/// One advice implementation. Around advice drives the chain through
/// [`JoinPoint::proceed`]; before/after advice returns `Value::Unit`.
pub type AdviceFn = Arc<dyn Fn(&AspectInstance, &mut JoinPoint) -> Result<Value, DispatchFault> + Send + Sync>;

/// Instance cardinality key, derived from the deployment model at each
/// activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeploymentKey {
    Runtime,
    Class(String),
    Instance(InstanceRef),
    Thread(String),
}

impl DeploymentKey {
    /// The key for one activation: the advised class for perClass, the
    /// target object for perInstance, the calling thread for perThread.
    pub fn for_activation(model: DeploymentModel, declaring_class: &str, target: Option<&InstanceRef>) -> Option<Self> {
        match model {
            DeploymentModel::PerRuntime => Some(Self::Runtime),
            DeploymentModel::PerClass => Some(Self::Class(declaring_class.to_string())),
            DeploymentModel::PerInstance => target.cloned().map(Self::Instance),
            DeploymentModel::PerThread => Some(Self::Thread(format!("{:?}", std::thread::current().id()))),
        }
    }
}

/// One live aspect instance: the user state behind a lock. Advice locks
/// the state only while it reads or writes it, not across `proceed()`.
pub struct AspectInstance {
    aspect_qualified_name: String,
    key: DeploymentKey,
    state: Mutex<AspectState>,
}

impl AspectInstance {
    fn new(aspect_qualified_name: String, key: DeploymentKey, state: AspectState) -> Self {
        Self {
            aspect_qualified_name,
            key,
            state: Mutex::new(state),
        }
    }

    pub fn aspect_qualified_name(&self) -> &str {
        &self.aspect_qualified_name
    }

    pub fn key(&self) -> &DeploymentKey {
        &self.key
    }

    /// Run `f` against the typed state. `None` when the state is of a
    /// different type than the advice expects.
    pub fn with_state<T: Any + Send, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.state.lock();
        guard.downcast_mut::<T>().map(f)
    }
}

/// Owns the instances of one aspect, keyed by deployment key.
pub struct AspectContainer {
    aspect_qualified_name: String,
    factory: StateFactory,
    instances: DashMap<DeploymentKey, Arc<AspectInstance>>,
}

impl AspectContainer {
    pub fn new(aspect_qualified_name: impl Into<String>, factory: StateFactory) -> Self {
        Self {
            aspect_qualified_name: aspect_qualified_name.into(),
            factory,
            instances: DashMap::new(),
        }
    }

    /// The instance for `key`, created on first use. The map's entry
    /// guard makes concurrent first activations agree on one instance.
    pub fn instance(&self, key: DeploymentKey) -> Arc<AspectInstance> {
        self.instances
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(aspect = %self.aspect_qualified_name, ?key, "creating aspect instance");
                Arc::new(AspectInstance::new(self.aspect_qualified_name.clone(), key.clone(), (self.factory)()))
            })
            .clone()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

/// The runtime registry of aspect containers and advice implementations:
/// string keys to closures, populated at startup from the definition
/// model.
#[derive(Default)]
pub struct AspectRegistry {
    containers: DashMap<String, Arc<AspectContainer>>,
    advices: DashMap<(String, String), AdviceFn>,
}

impl AspectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_aspect(&self, qualified_name: &str, factory: impl Fn() -> AspectState + Send + Sync + 'static) {
        self.containers.insert(
            qualified_name.to_string(),
            Arc::new(AspectContainer::new(qualified_name, Arc::new(factory))),
        );
    }

    pub fn register_advice(
        &self,
        qualified_name: &str,
        method_name: &str,
        advice: impl Fn(&AspectInstance, &mut JoinPoint) -> Result<Value, DispatchFault> + Send + Sync + 'static,
    ) {
        self.advices
            .insert((qualified_name.to_string(), method_name.to_string()), Arc::new(advice));
    }

    pub fn container(&self, qualified_name: &str) -> Option<Arc<AspectContainer>> {
        self.containers.get(qualified_name).map(|entry| entry.clone())
    }

    pub fn advice(&self, qualified_name: &str, method_name: &str) -> Option<AdviceFn> {
        self.advices
            .get(&(qualified_name.to_string(), method_name.to_string()))
            .map(|entry| entry.clone())
    }
}
