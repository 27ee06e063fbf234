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

//! Offline weaving: load a definition document and a class-model
//! document, run the weaver over every modeled class, and report the
//! resulting dispatch plans.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crosscut_core::definition::{DefinitionDocument, SystemRegistry};
use crosscut_core::model::ClassModelDocument;
use crosscut_weaver::{Weaver, WeaverConfig, WovenClassUnit};

use crate::cli::CliError;

/// CLI arguments for the offline weaver.
#[derive(Parser, Debug)]
#[command(name = "crosscut-weave")]
#[command(about = "Weave a class model against an aspect definition document")]
pub struct WeaveArgs {
    /// Aspect definition document (JSON)
    #[arg(short, long)]
    pub definition: PathBuf,

    /// Class model document (JSON)
    #[arg(short, long)]
    pub model: PathBuf,

    /// Write the woven report as JSON instead of text
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Fail on per-binding weave errors instead of reporting them
    #[arg(long)]
    pub strict: bool,

    /// Weave classes one at a time
    #[arg(long)]
    pub serial: bool,
}

/// The offline weaving pipeline: parse, build, weave, report.
pub struct WeavePipeline {
    args: WeaveArgs,
}

impl WeavePipeline {
    pub fn new(args: WeaveArgs) -> Self {
        Self { args }
    }

    pub fn execute(&self) -> Result<WeaveReport, CliError> {
        let definition: DefinitionDocument = serde_json::from_str(&fs::read_to_string(&self.args.definition)?)?;
        let model_document: ClassModelDocument = serde_json::from_str(&fs::read_to_string(&self.args.model)?)?;

        let registry = Arc::new(SystemRegistry::new());
        registry.register(definition.build()?);
        let model = Arc::new(model_document.build()?);
        let class_names = model.class_names();
        info!(classes = class_names.len(), "weaving class model");

        let config = WeaverConfig {
            parallel: !self.args.serial,
            strict: self.args.strict,
            ..WeaverConfig::default()
        };
        let weaver = Weaver::new(registry, model, config);

        let mut units = Vec::new();
        for result in weaver.weave_all(&class_names) {
            units.push(result?);
        }
        let report = WeaveReport::from_units(units);

        if let Some(output) = &self.args.output {
            fs::write(output, report.to_json()?)?;
        }
        Ok(report)
    }
}

/// Summary of one weave run.
#[derive(Debug)]
pub struct WeaveReport {
    pub units: Vec<WovenClassUnit>,
}

impl WeaveReport {
    fn from_units(units: Vec<WovenClassUnit>) -> Self {
        Self { units }
    }

    pub fn woven_class_count(&self) -> usize {
        self.units.iter().filter(|unit| unit.is_woven()).count()
    }

    pub fn join_point_count(&self) -> usize {
        self.units.iter().map(|unit| unit.join_points.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.units.iter().map(|unit| unit.failures.len()).sum()
    }

    /// Human-readable report, one line per join point.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for unit in &self.units {
            if !unit.is_woven() && unit.failures.is_empty() {
                continue;
            }
            out.push_str(&format!("{} ({} join points)\n", unit.class_name, unit.join_points.len()));
            for plan in &unit.join_points {
                out.push_str(&format!("  {plan}\n"));
                for advice in plan.all_advices() {
                    out.push_str(&format!(
                        "    {} {}::{}\n",
                        advice.kind.as_str(),
                        advice.aspect_qualified_name,
                        advice.advice_name
                    ));
                }
            }
            for failure in &unit.failures {
                out.push_str(&format!("  error: {failure}\n"));
            }
        }
        if out.is_empty() {
            out.push_str("nothing to weave\n");
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let units: Vec<serde_json::Value> = self
            .units
            .iter()
            .map(|unit| {
                serde_json::json!({
                    "class": unit.class_name,
                    "generation": unit.generation,
                    "join_points": unit
                        .join_points
                        .iter()
                        .map(|plan| {
                            serde_json::json!({
                                "id": plan.id,
                                "kind": plan.kind.as_str(),
                                "signature": plan.signature.to_string(),
                                "cflow_marks": plan.cflow_marks.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                                "advices": plan
                                    .all_advices()
                                    .map(|advice| {
                                        serde_json::json!({
                                            "aspect": advice.aspect_qualified_name,
                                            "advice": advice.advice_name,
                                            "kind": advice.kind.as_str(),
                                            "deployment": advice.deployment_model.as_str(),
                                        })
                                    })
                                    .collect::<Vec<_>>(),
                            })
                        })
                        .collect::<Vec<_>>(),
                    "failures": unit.failures.iter().map(|failure| failure.to_string()).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&serde_json::json!({ "units": units }))
    }
}
