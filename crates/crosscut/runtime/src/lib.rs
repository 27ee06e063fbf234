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

//! Crosscut runtime: the dispatch engine that woven stubs call into.
//!
//! Advice runs inline on the thread executing the advised code; the
//! engine introduces no concurrency of its own. The shared mutable state
//! is the aspect instance maps (guarded per key) and the thread-local
//! cflow marker stacks.

pub mod aspect;
pub mod cflow;
pub mod dispatch;
pub mod errors;
pub mod join_point;

pub use aspect::{AdviceFn, AspectContainer, AspectInstance, AspectRegistry, AspectState, DeploymentKey, StateFactory};
pub use cflow::{CflowScope, ThreadCflow};
pub use dispatch::{DispatchConfig, DispatchEngine, Invocation};
pub use errors::{DispatchError, DispatchFault, Thrown};
pub use join_point::{JoinPoint, OriginalFn, ResolvedAdvice};
