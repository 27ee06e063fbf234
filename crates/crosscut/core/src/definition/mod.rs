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

//! The aspect definition model.
//!
//! A [`SystemDefinition`] is built once from a declarative source,
//! validated, and immutable from then on; hot redefinition goes through
//! the [`registry::SystemRegistry`], which swaps whole definition
//! snapshots under a single process-wide lock. Validation failures carry
//! the aspect/pointcut/advice names needed to locate the offending
//! declaration.

pub mod document;
pub mod registry;

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::expression::{ExpressionAst, ExpressionError, ExpressionInfo};
use crate::pattern::{PatternError, TypePattern};

pub use document::{AdviceDocument, AspectDocument, DefinitionDocument, PointcutDocument};
pub use registry::{RedefinitionOutcome, SystemRegistry};

/// Cardinality policy for aspect instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeploymentModel {
    /// One instance for the process lifetime.
    PerRuntime,
    /// One instance per advised target class.
    PerClass,
    /// One instance per advised target object.
    PerInstance,
    /// One instance per calling thread.
    PerThread,
}

impl DeploymentModel {
    /// Parse the declarative form. Unknown values fail the build.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "perJVM" => Some(Self::PerRuntime),
            "perClass" => Some(Self::PerClass),
            "perInstance" => Some(Self::PerInstance),
            "perThread" => Some(Self::PerThread),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerRuntime => "perJVM",
            Self::PerClass => "perClass",
            Self::PerInstance => "perInstance",
            Self::PerThread => "perThread",
        }
    }
}

/// The five advice kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceKind {
    Before,
    Around,
    After,
    AfterReturning,
    AfterThrowing,
}

impl AdviceKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "before" => Some(Self::Before),
            "around" => Some(Self::Around),
            "after" => Some(Self::After),
            "afterReturning" => Some(Self::AfterReturning),
            "afterThrowing" => Some(Self::AfterThrowing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Around => "around",
            Self::After => "after",
            Self::AfterReturning => "afterReturning",
            Self::AfterThrowing => "afterThrowing",
        }
    }
}

/// Errors raised while building or validating a definition model.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("aspect '{aspect}': invalid deployment model '{value}'")]
    InvalidDeploymentModel { aspect: String, value: String },
    #[error("aspect '{aspect}', advice '{advice}': invalid advice kind '{value}'")]
    InvalidAdviceKind { aspect: String, advice: String, value: String },
    #[error("aspect '{aspect}', advice '{advice}': cannot compile expression '{expression}': {source}")]
    Expression {
        aspect: String,
        advice: String,
        expression: String,
        source: ExpressionError,
    },
    #[error("aspect '{aspect}', pointcut '{pointcut}': cannot compile expression '{expression}': {source}")]
    Pointcut {
        aspect: String,
        pointcut: String,
        expression: String,
        source: ExpressionError,
    },
    #[error("aspect '{aspect}', advice '{advice}': unknown pointcut reference '{reference}'")]
    UnknownPointcut {
        aspect: String,
        advice: String,
        reference: String,
    },
    #[error("aspect '{aspect}', advice '{advice}': bound name '{name}' has no matching advice parameter")]
    UnresolvedBinding { aspect: String, advice: String, name: String },
    #[error("duplicate aspect '{name}'")]
    DuplicateAspect { name: String },
    #[error("invalid type pattern: {0}")]
    Pattern(#[from] PatternError),
}

/// A named pointcut declared by an aspect.
#[derive(Debug, Clone)]
pub struct PointcutDefinition {
    pub name: String,
    pub expression: ExpressionInfo,
}

/// One advice binding: an advice method of the aspect class bound to a
/// compiled expression.
#[derive(Debug, Clone)]
pub struct AdviceDefinition {
    pub name: String,
    pub kind: AdviceKind,
    /// Fully resolved: named pointcut references are already inlined.
    pub expression: ExpressionInfo,
    pub method_name: String,
    pub parameter_names: Vec<String>,
    /// For afterThrowing: only exceptions matching this type pattern
    /// trigger the advice. Absent means any exception.
    pub exception_filter: Option<TypePattern>,
    pub aspect_qualified_name: String,
}

/// A named bundle of pointcuts and advice with a deployment model.
#[derive(Debug, Clone)]
pub struct AspectDefinition {
    pub name: String,
    pub qualified_name: String,
    pub class_name: String,
    pub deployment_model: DeploymentModel,
    pub container_class: Option<String>,
    pub parameters: HashMap<String, String>,
    pub pointcuts: Vec<PointcutDefinition>,
    /// Declaration order across all kinds; chain assembly depends on it.
    pub advices: Vec<AdviceDefinition>,
}

impl AspectDefinition {
    pub fn pointcut(&self, name: &str) -> Option<&PointcutDefinition> {
        self.pointcuts.iter().find(|p| p.name == name)
    }

    pub fn advice(&self, name: &str) -> Option<&AdviceDefinition> {
        self.advices.iter().find(|a| a.name == name)
    }

    pub fn advices_of_kind(&self, kind: AdviceKind) -> impl Iterator<Item = &AdviceDefinition> {
        self.advices.iter().filter(move |a| a.kind == kind)
    }

    /// Resolve an expression's named pointcut references against this
    /// aspect and check its bindings against the advice parameters. The
    /// two definition-time invariants every binding must satisfy.
    pub fn resolve_and_validate(
        &self,
        advice_name: &str,
        parameter_names: &[String],
        expression: &ExpressionInfo,
    ) -> Result<ExpressionInfo, DefinitionError> {
        let lookup = |name: &str| -> Option<ExpressionAst> { self.pointcut(name).map(|p| p.expression.ast().clone()) };
        let resolved = expression.resolve_references(&lookup).map_err(|err| match err {
            ExpressionError::UnknownReference(reference) => DefinitionError::UnknownPointcut {
                aspect: self.name.clone(),
                advice: advice_name.to_string(),
                reference,
            },
            source => DefinitionError::Expression {
                aspect: self.name.clone(),
                advice: advice_name.to_string(),
                expression: expression.source().to_string(),
                source,
            },
        })?;

        for bound in resolved.bound_names() {
            if !parameter_names.contains(&bound) {
                return Err(DefinitionError::UnresolvedBinding {
                    aspect: self.name.clone(),
                    advice: advice_name.to_string(),
                    name: bound,
                });
            }
        }
        Ok(resolved)
    }
}

/// Top-level container for one woven system: its aspects in registration
/// order plus the class-preparation rules.
#[derive(Debug, Clone)]
pub struct SystemDefinition {
    pub uuid: Uuid,
    pub aspects: Vec<AspectDefinition>,
    /// Class-name patterns eligible for weaving. Empty means every class.
    pub prepare_patterns: Vec<TypePattern>,
}

impl SystemDefinition {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            aspects: Vec::new(),
            prepare_patterns: Vec::new(),
        }
    }

    pub fn aspect(&self, qualified_name: &str) -> Option<&AspectDefinition> {
        self.aspects.iter().find(|a| a.qualified_name == qualified_name)
    }

    pub fn aspect_named(&self, name: &str) -> Option<&AspectDefinition> {
        self.aspects.iter().find(|a| a.name == name)
    }

    /// All advice definitions of one kind, in aspect registration order
    /// then declaration order.
    pub fn advice_definitions(&self, kind: AdviceKind) -> Vec<&AdviceDefinition> {
        self.aspects.iter().flat_map(|a| a.advices_of_kind(kind)).collect()
    }

    /// Whether a class is eligible for weaving at all.
    pub fn should_prepare(&self, class_name: &str) -> bool {
        self.prepare_patterns.is_empty() || self.prepare_patterns.iter().any(|p| p.matches(class_name))
    }
}
