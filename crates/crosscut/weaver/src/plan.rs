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

//! The weaver's output contract: per-join-point dispatch plans and the
//! woven unit that groups them per class.

use std::fmt;
use std::sync::Arc;

use crosscut_core::definition::{AdviceKind, DeploymentModel};
use crosscut_core::expression::{CflowId, CflowResidual, PointcutKind};
use crosscut_core::pattern::TypePattern;
use crosscut_core::signature::Signature;

use crate::weaver::WeaveError;

/// One advice bound into a join point's chain, with everything the
/// dispatch engine needs to resolve and gate it at activation time.
#[derive(Debug, Clone)]
pub struct BoundAdvice {
    pub aspect_qualified_name: String,
    pub advice_name: String,
    pub method_name: String,
    pub kind: AdviceKind,
    pub deployment_model: DeploymentModel,
    /// Runtime cflow guard left over after static matching. `Const(true)`
    /// means unconditional.
    pub residual: CflowResidual,
    /// afterThrowing only: the raised exception must match.
    pub exception_filter: Option<TypePattern>,
    pub parameter_names: Vec<String>,
}

/// Descriptor of the call-site rewrite: where the stub sits and which
/// compiled join point it routes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStub {
    pub join_point_id: String,
    pub class_name: String,
    /// Enclosing method for call-side stubs; absent for execution-side
    /// rewrites.
    pub within_method: Option<String>,
}

/// The compiled dispatch plan for one join point: the ordered advice
/// chains, the cflow markers to scope around the activation, and the
/// stub descriptor.
#[derive(Debug, Clone)]
pub struct JoinPointPlan {
    pub id: String,
    pub kind: PointcutKind,
    pub signature: Arc<Signature>,
    pub before: Vec<BoundAdvice>,
    pub around: Vec<BoundAdvice>,
    pub after_returning: Vec<BoundAdvice>,
    pub after_throwing: Vec<BoundAdvice>,
    pub after: Vec<BoundAdvice>,
    /// Marker ids pushed for the dynamic extent of each activation,
    /// popped on every exit path.
    pub cflow_marks: Vec<CflowId>,
    pub stub: DispatchStub,
}

impl JoinPointPlan {
    pub fn advice_count(&self) -> usize {
        self.before.len() + self.around.len() + self.after_returning.len() + self.after_throwing.len() + self.after.len()
    }

    /// Whether anything is bound here at all; empty plans are dropped
    /// rather than emitted.
    pub fn is_empty(&self) -> bool {
        self.advice_count() == 0 && self.cflow_marks.is_empty()
    }

    /// All bound advices in chain order, for reporting.
    pub fn all_advices(&self) -> impl Iterator<Item = &BoundAdvice> {
        self.before
            .iter()
            .chain(&self.around)
            .chain(&self.after_returning)
            .chain(&self.after_throwing)
            .chain(&self.after)
    }
}

impl fmt::Display for JoinPointPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] advices={}", self.id, self.kind, self.advice_count())
    }
}

/// Everything the weaver produced for one class: the dispatch plans plus
/// any per-binding failures (partial success per class).
#[derive(Debug, Clone)]
pub struct WovenClassUnit {
    pub class_name: String,
    /// Definition generation this unit was woven against.
    pub generation: u64,
    pub join_points: Vec<JoinPointPlan>,
    pub failures: Vec<WeaveError>,
}

impl WovenClassUnit {
    pub fn unwoven(class_name: impl Into<String>, generation: u64) -> Self {
        Self {
            class_name: class_name.into(),
            generation,
            join_points: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_woven(&self) -> bool {
        !self.join_points.is_empty()
    }

    pub fn join_point(&self, id: &str) -> Option<&JoinPointPlan> {
        self.join_points.iter().find(|jp| jp.id == id)
    }
}
