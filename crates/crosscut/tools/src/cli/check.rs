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

//! Definition checking: build and validate a definition document without
//! weaving anything.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crosscut_core::definition::{AdviceKind, DefinitionDocument};

use crate::cli::CliError;

/// CLI arguments for the definition checker.
#[derive(Parser, Debug)]
#[command(name = "crosscut-check")]
#[command(about = "Validate an aspect definition document")]
pub struct CheckArgs {
    /// Aspect definition document (JSON)
    #[arg(short, long)]
    pub definition: PathBuf,
}

/// Validate the document and summarize what it declares.
pub fn check_definition(args: &CheckArgs) -> Result<String, CliError> {
    let document: DefinitionDocument = serde_json::from_str(&fs::read_to_string(&args.definition)?)?;
    let system = document.build()?;

    let mut out = format!("system {} is valid\n", system.uuid);
    for aspect in &system.aspects {
        out.push_str(&format!(
            "aspect {} ({}, {}): {} pointcuts, {} advices\n",
            aspect.name,
            aspect.class_name,
            aspect.deployment_model.as_str(),
            aspect.pointcuts.len(),
            aspect.advices.len()
        ));
    }
    for kind in [
        AdviceKind::Before,
        AdviceKind::Around,
        AdviceKind::AfterReturning,
        AdviceKind::AfterThrowing,
        AdviceKind::After,
    ] {
        let count = system.advice_definitions(kind).len();
        if count > 0 {
            out.push_str(&format!("  {}: {}\n", kind.as_str(), count));
        }
    }
    Ok(out)
}
