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

//! The declarative definition document.
//!
//! This is the boundary contract with the definition source loader:
//! whatever parses XML or annotations upstream hands the core this serde
//! shape. [`DefinitionDocument::build`] compiles it into a validated
//! [`SystemDefinition`], failing fast with the aspect/pointcut/advice
//! names of the offending declaration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::{AdviceDefinition, AdviceKind, AspectDefinition, DefinitionError, DeploymentModel, PointcutDefinition, SystemDefinition};
use crate::expression::ExpressionInfo;
use crate::pattern::TypePattern;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointcutDocument {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceDocument {
    pub name: String,
    /// One of `before|around|after|afterReturning|afterThrowing`.
    pub kind: String,
    pub expression: String,
    /// Advice method on the aspect class; defaults to the advice name.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    /// afterThrowing only: type pattern the raised exception must match.
    #[serde(default)]
    pub exception_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AspectDocument {
    pub name: String,
    #[serde(default)]
    pub qualified_name: Option<String>,
    pub class_name: String,
    /// One of `perJVM|perClass|perInstance|perThread`.
    pub deployment_model: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub pointcuts: Vec<PointcutDocument>,
    #[serde(default)]
    pub advices: Vec<AdviceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionDocument {
    /// System identity; a fresh uuid is assigned when absent.
    #[serde(default)]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub aspects: Vec<AspectDocument>,
    /// Class-name patterns eligible for weaving.
    #[serde(default)]
    pub prepare: Vec<String>,
}

impl DefinitionDocument {
    /// Compile and validate into an immutable [`SystemDefinition`].
    pub fn build(&self) -> Result<SystemDefinition, DefinitionError> {
        let uuid = self.uuid.unwrap_or_else(Uuid::new_v4);
        let mut system = SystemDefinition::new(uuid);

        for pattern in &self.prepare {
            system.prepare_patterns.push(TypePattern::compile(pattern)?);
        }

        for aspect_doc in &self.aspects {
            if system.aspects.iter().any(|a| a.name == aspect_doc.name) {
                return Err(DefinitionError::DuplicateAspect {
                    name: aspect_doc.name.clone(),
                });
            }
            system.aspects.push(build_aspect(uuid, aspect_doc)?);
        }
        Ok(system)
    }
}

fn build_aspect(system_uuid: Uuid, doc: &AspectDocument) -> Result<AspectDefinition, DefinitionError> {
    let deployment_model = DeploymentModel::parse(&doc.deployment_model).ok_or_else(|| DefinitionError::InvalidDeploymentModel {
        aspect: doc.name.clone(),
        value: doc.deployment_model.clone(),
    })?;
    let qualified_name = doc
        .qualified_name
        .clone()
        .unwrap_or_else(|| format!("{system_uuid}/{}", doc.name));

    let mut aspect = AspectDefinition {
        name: doc.name.clone(),
        qualified_name: qualified_name.clone(),
        class_name: doc.class_name.clone(),
        deployment_model,
        container_class: doc.container.clone(),
        parameters: doc.parameters.clone(),
        pointcuts: Vec::new(),
        advices: Vec::new(),
    };

    for pointcut_doc in &doc.pointcuts {
        let expression = ExpressionInfo::compile(&pointcut_doc.expression).map_err(|source| DefinitionError::Pointcut {
            aspect: doc.name.clone(),
            pointcut: pointcut_doc.name.clone(),
            expression: pointcut_doc.expression.clone(),
            source,
        })?;
        aspect.pointcuts.push(PointcutDefinition {
            name: pointcut_doc.name.clone(),
            expression,
        });
    }

    for advice_doc in &doc.advices {
        let kind = AdviceKind::parse(&advice_doc.kind).ok_or_else(|| DefinitionError::InvalidAdviceKind {
            aspect: doc.name.clone(),
            advice: advice_doc.name.clone(),
            value: advice_doc.kind.clone(),
        })?;
        let expression = ExpressionInfo::compile(&advice_doc.expression).map_err(|source| DefinitionError::Expression {
            aspect: doc.name.clone(),
            advice: advice_doc.name.clone(),
            expression: advice_doc.expression.clone(),
            source,
        })?;
        let resolved = aspect.resolve_and_validate(&advice_doc.name, &advice_doc.parameters, &expression)?;
        let exception_filter = match &advice_doc.exception_filter {
            Some(pattern) => Some(TypePattern::compile(pattern)?),
            None => None,
        };
        aspect.advices.push(AdviceDefinition {
            name: advice_doc.name.clone(),
            kind,
            expression: resolved,
            method_name: advice_doc.method.clone().unwrap_or_else(|| advice_doc.name.clone()),
            parameter_names: advice_doc.parameters.clone(),
            exception_filter,
            aspect_qualified_name: qualified_name.clone(),
        });
    }

    Ok(aspect)
}
