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

//! Read-only join-point descriptors and the per-activation RTTI holder.
//!
//! A [`Signature`] is constructed once per distinct code element and
//! shared freely across concurrent activations; it is immutable after
//! construction. Parameter and return *values* live on [`Rtti`], which is
//! allocated fresh per activation and never shared.

use std::fmt;
use std::sync::Arc;

use crate::model::{ConstructorInfo, FieldInfo, MethodInfo};

/// A reference to one live object of the advised program, identified by
/// its class and an instance id assigned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    pub class_name: String,
    pub instance_id: u64,
}

impl InstanceRef {
    pub fn new(class_name: impl Into<String>, instance_id: u64) -> Self {
        Self {
            class_name: class_name.into(),
            instance_id,
        }
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.instance_id)
    }
}

/// A runtime value crossing the advice boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(InstanceRef),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Stable key text, used by advice that caches by argument values.
    pub fn key_text(&self) -> String {
        match self {
            Self::Unit => "()".to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Str(value) => value.clone(),
            Self::Object(instance) => instance.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_text())
    }
}

/// Static descriptor of a method join point.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub method: Arc<MethodInfo>,
}

/// Static descriptor of a field get/set join point.
#[derive(Debug, Clone)]
pub struct FieldSignature {
    pub field: Arc<FieldInfo>,
}

/// Static descriptor of a constructor join point.
#[derive(Debug, Clone)]
pub struct ConstructorSignature {
    pub constructor: Arc<ConstructorInfo>,
}

/// Static descriptor of a static-initializer join point.
#[derive(Debug, Clone)]
pub struct StaticInitializerSignature {
    pub class_name: String,
}

/// Static descriptor of an exception-handler join point.
#[derive(Debug, Clone)]
pub struct HandlerSignature {
    pub exception_type: String,
    pub within_class: String,
}

/// The closed set of join-point shapes, with shared accessors hoisted
/// here and shape-specific detail in the variant payloads.
#[derive(Debug, Clone)]
pub enum Signature {
    Method(MethodSignature),
    Field(FieldSignature),
    Constructor(ConstructorSignature),
    StaticInitializer(StaticInitializerSignature),
    Handler(HandlerSignature),
}

impl Signature {
    pub fn method(method: Arc<MethodInfo>) -> Self {
        Self::Method(MethodSignature { method })
    }

    pub fn field(field: Arc<FieldInfo>) -> Self {
        Self::Field(FieldSignature { field })
    }

    pub fn constructor(constructor: Arc<ConstructorInfo>) -> Self {
        Self::Constructor(ConstructorSignature { constructor })
    }

    pub fn static_initializer(class_name: impl Into<String>) -> Self {
        Self::StaticInitializer(StaticInitializerSignature {
            class_name: class_name.into(),
        })
    }

    pub fn handler(exception_type: impl Into<String>, within_class: impl Into<String>) -> Self {
        Self::Handler(HandlerSignature {
            exception_type: exception_type.into(),
            within_class: within_class.into(),
        })
    }

    /// The member name: method or field name, `new` for constructors,
    /// `clinit` for static initializers, the exception type for handlers.
    pub fn name(&self) -> &str {
        match self {
            Self::Method(sig) => &sig.method.name,
            Self::Field(sig) => &sig.field.name,
            Self::Constructor(_) => "new",
            Self::StaticInitializer(_) => "clinit",
            Self::Handler(sig) => &sig.exception_type,
        }
    }

    pub fn declaring_type(&self) -> &str {
        match self {
            Self::Method(sig) => &sig.method.declaring_class,
            Self::Field(sig) => &sig.field.declaring_class,
            Self::Constructor(sig) => &sig.constructor.declaring_class,
            Self::StaticInitializer(sig) => &sig.class_name,
            Self::Handler(sig) => &sig.within_class,
        }
    }

    pub fn modifiers(&self) -> u32 {
        match self {
            Self::Method(sig) => sig.method.modifiers,
            Self::Field(sig) => sig.field.modifiers,
            Self::Constructor(sig) => sig.constructor.modifiers,
            Self::StaticInitializer(_) | Self::Handler(_) => 0,
        }
    }

    /// Declared parameter types, where the shape has them. Field sets
    /// carry the incoming value as one parameter.
    pub fn parameter_types(&self) -> Vec<String> {
        match self {
            Self::Method(sig) => sig.method.parameter_types.clone(),
            Self::Constructor(sig) => sig.constructor.parameter_types.clone(),
            Self::Field(sig) => vec![sig.field.field_type.clone()],
            Self::StaticInitializer(_) | Self::Handler(_) => Vec::new(),
        }
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        match self {
            Self::Method(sig) => sig.method.has_annotation(name),
            Self::Field(sig) => sig.field.has_annotation(name),
            Self::Constructor(sig) => sig.constructor.has_annotation(name),
            Self::StaticInitializer(_) | Self::Handler(_) => false,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type(), self.name())
    }
}

/// Per-activation runtime values: argument values in declaration order,
/// the return value once produced, and the instances involved. Never
/// shared across concurrent activations of the same join point.
#[derive(Debug, Clone, Default)]
pub struct Rtti {
    pub args: Vec<Value>,
    pub return_value: Option<Value>,
    /// The instance the join point executes on; absent in static contexts.
    pub target: Option<InstanceRef>,
    /// The enclosing instance on the calling side; absent in static
    /// contexts and execution-side join points.
    pub caller: Option<InstanceRef>,
}

impl Rtti {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            return_value: None,
            target: None,
            caller: None,
        }
    }

    pub fn with_target(mut self, target: InstanceRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_caller(mut self, caller: InstanceRef) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_shared_accessors() {
        let method = Arc::new(MethodInfo::new("demo.Target", "toLog1", "void"));
        let sig = Signature::method(method);
        assert_eq!(sig.name(), "toLog1");
        assert_eq!(sig.declaring_type(), "demo.Target");
        assert_eq!(sig.to_string(), "demo.Target.toLog1");
    }

    #[test]
    fn test_constructor_and_static_initializer_names() {
        let ctor = Signature::constructor(Arc::new(ConstructorInfo::new("demo.Target")));
        assert_eq!(ctor.name(), "new");
        let clinit = Signature::static_initializer("demo.Target");
        assert_eq!(clinit.name(), "clinit");
        assert_eq!(clinit.declaring_type(), "demo.Target");
    }

    #[test]
    fn test_field_set_exposes_value_parameter() {
        let field = Arc::new(FieldInfo::new("demo.Target", "count", "int"));
        let sig = Signature::field(field);
        assert_eq!(sig.parameter_types(), vec!["int".to_string()]);
    }

    #[test]
    fn test_value_key_text_distinguishes_arguments() {
        assert_ne!(Value::Int(3).key_text(), Value::Int(4).key_text());
        assert_eq!(Value::Str("x".into()).key_text(), "x");
    }
}
