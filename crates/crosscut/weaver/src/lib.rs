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

//! Crosscut weaver: the join-point compiler.
//!
//! Given the class model and the registered system definitions, the
//! weaver enumerates every candidate join-point shape in a class, runs
//! the matcher's coarse filter and precise phases, and assembles ordered
//! advice chains into a [`plan::WovenClassUnit`] the dispatch engine
//! installs.

pub mod config;
pub mod plan;
pub mod weaver;

pub use config::WeaverConfig;
pub use plan::{BoundAdvice, DispatchStub, JoinPointPlan, WovenClassUnit};
pub use weaver::{WeaveError, Weaver};
