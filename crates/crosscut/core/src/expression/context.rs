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

//! Evaluation contexts: the call-site-like tuple an expression is matched
//! against, consisting of the pointcut kind, the subject code element,
//! and the enclosing ("within") code element.

use std::sync::Arc;

use crate::model::{ClassInfo, ClassModel, ConstructorInfo, FieldInfo, MethodInfo};

/// The shape of join point a context describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointcutKind {
    Execution,
    Call,
    Get,
    Set,
    Handler,
    StaticInitialization,
}

impl PointcutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Call => "call",
            Self::Get => "get",
            Self::Set => "set",
            Self::Handler => "handler",
            Self::StaticInitialization => "staticinitialization",
        }
    }
}

impl std::fmt::Display for PointcutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The code element a join point activates on.
#[derive(Debug, Clone)]
pub enum Subject {
    Method(Arc<MethodInfo>),
    Field(Arc<FieldInfo>),
    Constructor(Arc<ConstructorInfo>),
    Class(Arc<ClassInfo>),
}

/// The enclosing code element of a call-side join point.
#[derive(Debug, Clone)]
pub struct WithinContext {
    pub class: Arc<ClassInfo>,
    pub method: Option<Arc<MethodInfo>>,
}

/// Everything the matcher may consult for one decision. `kind` and
/// `subject` are absent in the coarse class-level filter context; the
/// precise phase always carries both.
#[derive(Clone)]
pub struct ExpressionContext<'m> {
    pub kind: Option<PointcutKind>,
    /// The subject's class (callee side). Absent when a call site's callee
    /// class is not present in the model.
    pub class: Option<Arc<ClassInfo>>,
    pub subject: Option<Subject>,
    pub within: Option<WithinContext>,
    pub model: &'m ClassModel,
}

impl<'m> ExpressionContext<'m> {
    /// Class-level filter context: no subject member, no kind. Member
    /// detail is unknown here; the evaluator answers `Unknown` for
    /// member-level tests and the filter stays permissive.
    pub fn class_filter(class: Arc<ClassInfo>, model: &'m ClassModel) -> Self {
        Self {
            kind: None,
            class: Some(class.clone()),
            subject: None,
            within: Some(WithinContext { class, method: None }),
            model,
        }
    }

    pub fn execution(class: Arc<ClassInfo>, method: Arc<MethodInfo>, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::Execution),
            class: Some(class.clone()),
            subject: Some(Subject::Method(method.clone())),
            within: Some(WithinContext {
                class,
                method: Some(method),
            }),
            model,
        }
    }

    pub fn constructor_execution(class: Arc<ClassInfo>, constructor: Arc<ConstructorInfo>, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::Execution),
            class: Some(class.clone()),
            subject: Some(Subject::Constructor(constructor)),
            within: Some(WithinContext { class, method: None }),
            model,
        }
    }

    pub fn call(
        callee_class: Option<Arc<ClassInfo>>,
        method: Option<Arc<MethodInfo>>,
        within: WithinContext,
        model: &'m ClassModel,
    ) -> Self {
        Self {
            kind: Some(PointcutKind::Call),
            class: callee_class,
            subject: method.map(Subject::Method),
            within: Some(within),
            model,
        }
    }

    pub fn constructor_call(callee_class: Arc<ClassInfo>, constructor: Arc<ConstructorInfo>, within: WithinContext, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::Call),
            class: Some(callee_class),
            subject: Some(Subject::Constructor(constructor)),
            within: Some(within),
            model,
        }
    }

    pub fn field_get(class: Arc<ClassInfo>, field: Arc<FieldInfo>, within: WithinContext, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::Get),
            class: Some(class),
            subject: Some(Subject::Field(field)),
            within: Some(within),
            model,
        }
    }

    pub fn field_set(class: Arc<ClassInfo>, field: Arc<FieldInfo>, within: WithinContext, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::Set),
            class: Some(class),
            subject: Some(Subject::Field(field)),
            within: Some(within),
            model,
        }
    }

    pub fn handler(exception_class: Arc<ClassInfo>, within: WithinContext, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::Handler),
            class: Some(exception_class.clone()),
            subject: Some(Subject::Class(exception_class)),
            within: Some(within),
            model,
        }
    }

    pub fn static_initialization(class: Arc<ClassInfo>, model: &'m ClassModel) -> Self {
        Self {
            kind: Some(PointcutKind::StaticInitialization),
            class: Some(class.clone()),
            subject: Some(Subject::Class(class.clone())),
            within: Some(WithinContext { class, method: None }),
            model,
        }
    }

    /// Whether this is the coarse class-level filter context.
    pub fn is_class_filter(&self) -> bool {
        self.kind.is_none()
    }
}
