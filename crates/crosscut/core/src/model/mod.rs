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

//! In-memory model of the advised program's classes.
//!
//! The weaver and the expression matcher never see real bytecode; they see
//! this model, fed by the host's class-loading hook. Hierarchy traversal
//! resolves superclass and interface names through the owning [`ClassModel`]
//! and terminates at names the model does not know.

pub mod document;
pub mod site;

use std::collections::HashMap;
use std::sync::Arc;

pub use document::{ClassModelDocument, ModelDocumentError};
pub use site::{CodeSite, SiteKind};

/// Modifier bit masks for classes and members.
pub mod modifiers {
    pub const PUBLIC: u32 = 0x0001;
    pub const PRIVATE: u32 = 0x0002;
    pub const PROTECTED: u32 = 0x0004;
    pub const STATIC: u32 = 0x0008;
    pub const FINAL: u32 = 0x0010;
    pub const SYNCHRONIZED: u32 = 0x0020;
    pub const ABSTRACT: u32 = 0x0400;

    /// Parse a textual modifier keyword into its bit mask.
    pub fn from_keyword(keyword: &str) -> Option<u32> {
        match keyword {
            "public" => Some(PUBLIC),
            "private" => Some(PRIVATE),
            "protected" => Some(PROTECTED),
            "static" => Some(STATIC),
            "final" => Some(FINAL),
            "synchronized" => Some(SYNCHRONIZED),
            "abstract" => Some(ABSTRACT),
            _ => None,
        }
    }
}

/// An annotation attached to a class or member, with its string-valued
/// elements. Presence and value lookup is all the matcher needs; how the
/// annotations were extracted is the host's concern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnnotationInfo {
    pub name: String,
    pub values: HashMap<String, String>,
}

impl AnnotationInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// Metadata for one declared method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    pub declaring_class: String,
    pub modifiers: u32,
    pub return_type: String,
    pub parameter_types: Vec<String>,
    pub parameter_names: Vec<String>,
    pub exception_types: Vec<String>,
    pub annotations: Vec<AnnotationInfo>,
}

impl MethodInfo {
    pub fn new(declaring_class: impl Into<String>, name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_class: declaring_class.into(),
            modifiers: modifiers::PUBLIC,
            return_type: return_type.into(),
            parameter_types: Vec::new(),
            parameter_names: Vec::new(),
            exception_types: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_parameter(mut self, param_type: impl Into<String>, param_name: impl Into<String>) -> Self {
        self.parameter_types.push(param_type.into());
        self.parameter_names.push(param_name.into());
        self
    }

    pub fn with_exception(mut self, exception_type: impl Into<String>) -> Self {
        self.exception_types.push(exception_type.into());
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationInfo) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a.name == name)
    }

    /// Signature key in the form `name(type,type)`, unique within a class.
    pub fn signature_key(&self) -> String {
        format!("{}({})", self.name, self.parameter_types.join(","))
    }
}

/// Metadata for one declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub declaring_class: String,
    pub modifiers: u32,
    pub field_type: String,
    pub annotations: Vec<AnnotationInfo>,
}

impl FieldInfo {
    pub fn new(declaring_class: impl Into<String>, name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_class: declaring_class.into(),
            modifiers: modifiers::PRIVATE,
            field_type: field_type.into(),
            annotations: Vec::new(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationInfo) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a.name == name)
    }
}

/// Metadata for one declared constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorInfo {
    pub declaring_class: String,
    pub modifiers: u32,
    pub parameter_types: Vec<String>,
    pub exception_types: Vec<String>,
    pub annotations: Vec<AnnotationInfo>,
}

impl ConstructorInfo {
    pub fn new(declaring_class: impl Into<String>) -> Self {
        Self {
            declaring_class: declaring_class.into(),
            modifiers: modifiers::PUBLIC,
            parameter_types: Vec::new(),
            exception_types: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, param_type: impl Into<String>) -> Self {
        self.parameter_types.push(param_type.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: u32) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a.name == name)
    }

    pub fn signature_key(&self) -> String {
        format!("new({})", self.parameter_types.join(","))
    }
}

/// One class as the weaver sees it: declared members plus the code sites
/// inside its method bodies that are eligible call-side join points.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub modifiers: u32,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<AnnotationInfo>,
    pub methods: Vec<Arc<MethodInfo>>,
    pub fields: Vec<Arc<FieldInfo>>,
    pub constructors: Vec<Arc<ConstructorInfo>>,
    pub sites: Vec<CodeSite>,
    pub has_static_initializer: bool,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: modifiers::PUBLIC,
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            sites: Vec::new(),
            has_static_initializer: false,
        }
    }

    pub fn with_superclass(mut self, name: impl Into<String>) -> Self {
        self.superclass = Some(name.into());
        self
    }

    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(Arc::new(field));
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(Arc::new(constructor));
        self
    }

    pub fn with_site(mut self, site: CodeSite) -> Self {
        self.sites.push(site);
        self
    }

    pub fn with_static_initializer(mut self) -> Self {
        self.has_static_initializer = true;
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationInfo) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotations.iter().any(|a| a.name == name)
    }

    pub fn method(&self, name: &str) -> Option<Arc<MethodInfo>> {
        self.methods.iter().find(|m| m.name == name).cloned()
    }

    pub fn field(&self, name: &str) -> Option<Arc<FieldInfo>> {
        self.fields.iter().find(|f| f.name == name).cloned()
    }
}

/// Registry of all classes known to the system, keyed by fully-qualified
/// dotted name.
#[derive(Debug, Default)]
pub struct ClassModel {
    classes: HashMap<String, Arc<ClassInfo>>,
}

impl ClassModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: ClassInfo) -> Arc<ClassInfo> {
        let class = Arc::new(class);
        self.classes.insert(class.name.clone(), class.clone());
        class
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.classes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Depth-first hierarchy walk: the class itself, then the superclass
    /// chain, then the interface closure. Returns true on the first class
    /// for which the predicate holds. Hierarchies are acyclic in the host
    /// type system; the walk terminates at names the model does not know.
    pub fn hierarchy_matches(&self, class: &ClassInfo, predicate: &dyn Fn(&ClassInfo) -> bool) -> bool {
        if predicate(class) {
            return true;
        }
        if let Some(super_name) = &class.superclass {
            if let Some(super_class) = self.get(super_name) {
                if self.hierarchy_matches(&super_class, predicate) {
                    return true;
                }
            }
        }
        for interface_name in &class.interfaces {
            if let Some(interface) = self.get(interface_name) {
                if self.hierarchy_matches(&interface, predicate) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether `class` is `candidate` or transitively extends/implements it.
    pub fn is_subtype_of(&self, class: &ClassInfo, candidate: &str) -> bool {
        self.hierarchy_matches(class, &|c| c.name == candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> ClassModel {
        let mut model = ClassModel::new();
        model.register(ClassInfo::new("lang.Object"));
        model.register(ClassInfo::new("service.Base").with_superclass("lang.Object"));
        model.register(ClassInfo::new("service.Auditable"));
        model.register(
            ClassInfo::new("service.Account")
                .with_superclass("service.Base")
                .with_interface("service.Auditable")
                .with_method(MethodInfo::new("service.Account", "credit", "void").with_parameter("int", "amount")),
        );
        model
    }

    #[test]
    fn test_hierarchy_walk_hits_superclass_chain() {
        let model = sample_model();
        let account = model.get("service.Account").unwrap();
        assert!(model.is_subtype_of(&account, "service.Base"));
        assert!(model.is_subtype_of(&account, "lang.Object"));
    }

    #[test]
    fn test_hierarchy_walk_hits_interfaces() {
        let model = sample_model();
        let account = model.get("service.Account").unwrap();
        assert!(model.is_subtype_of(&account, "service.Auditable"));
    }

    #[test]
    fn test_hierarchy_walk_terminates_at_unknown_superclass() {
        let mut model = ClassModel::new();
        let orphan = model.register(ClassInfo::new("x.Orphan").with_superclass("x.Missing"));
        assert!(!model.is_subtype_of(&orphan, "x.Missing.Parent"));
        assert!(model.is_subtype_of(&orphan, "x.Orphan"));
    }

    #[test]
    fn test_method_signature_key() {
        let method = MethodInfo::new("service.Account", "credit", "void")
            .with_parameter("int", "amount")
            .with_parameter("lang.String", "memo");
        assert_eq!(method.signature_key(), "credit(int,lang.String)");
    }

    #[test]
    fn test_annotation_lookup() {
        let method = MethodInfo::new("a.B", "m", "void")
            .with_annotation(AnnotationInfo::new("Traced").with_value("level", "debug"));
        assert!(method.has_annotation("Traced"));
        assert!(!method.has_annotation("Cached"));
    }
}
