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

//! CLI command implementations.

pub mod check;
pub mod weave;

use thiserror::Error;

use crosscut_core::definition::DefinitionError;
use crosscut_core::model::ModelDocumentError;
use crosscut_weaver::WeaveError;

/// Errors surfaced by the CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),
    #[error("class model error: {0}")]
    Model(#[from] ModelDocumentError),
    #[error("weave error: {0}")]
    Weave(#[from] WeaveError),
}
