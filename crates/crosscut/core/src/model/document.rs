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

//! The declarative class-model document.
//!
//! Boundary contract with the class-loading hook: the host reports class
//! metadata in this serde shape and [`ClassModelDocument::build`] turns
//! it into the [`ClassModel`] the matcher and weaver consume.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{modifiers, AnnotationInfo, ClassInfo, ClassModel, CodeSite, ConstructorInfo, FieldInfo, MethodInfo};

/// Errors raised while building a class model from its document form.
#[derive(Error, Debug)]
pub enum ModelDocumentError {
    #[error("class '{class}': unknown modifier keyword '{keyword}'")]
    UnknownModifier { class: String, keyword: String },
    #[error("class '{class}': unknown site kind '{kind}'")]
    UnknownSiteKind { class: String, kind: String },
    #[error("class '{class}': site kind '{kind}' requires a member name")]
    MissingSiteMember { class: String, kind: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnnotationDocument {
    pub name: String,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDocument {
    pub name: String,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterDocument>,
    #[serde(default)]
    pub exceptions: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDocument>,
}

fn default_return_type() -> String {
    "void".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorDocument {
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub parameter_types: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

/// One call-side location inside a method body. `class` names the callee
/// or declaring class of the accessed element; `member` the method or
/// field where the kind has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDocument {
    pub within: String,
    /// One of `call|get|set|constructor-call|handler`.
    pub kind: String,
    pub class: String,
    #[serde(default)]
    pub member: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDocument {
    pub name: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDocument>,
    #[serde(default)]
    pub methods: Vec<MethodDocument>,
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDocument>,
    #[serde(default)]
    pub sites: Vec<SiteDocument>,
    #[serde(default)]
    pub static_initializer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClassModelDocument {
    pub classes: Vec<ClassDocument>,
}

impl ClassModelDocument {
    pub fn build(&self) -> Result<ClassModel, ModelDocumentError> {
        let mut model = ClassModel::new();
        for class_doc in &self.classes {
            model.register(build_class(class_doc)?);
        }
        Ok(model)
    }
}

fn parse_modifiers(class: &str, keywords: &[String], default: u32) -> Result<u32, ModelDocumentError> {
    if keywords.is_empty() {
        return Ok(default);
    }
    let mut mask = 0u32;
    for keyword in keywords {
        mask |= modifiers::from_keyword(keyword).ok_or_else(|| ModelDocumentError::UnknownModifier {
            class: class.to_string(),
            keyword: keyword.clone(),
        })?;
    }
    Ok(mask)
}

fn build_annotations(docs: &[AnnotationDocument]) -> Vec<AnnotationInfo> {
    docs.iter()
        .map(|doc| AnnotationInfo {
            name: doc.name.clone(),
            values: doc.values.clone(),
        })
        .collect()
}

fn build_class(doc: &ClassDocument) -> Result<ClassInfo, ModelDocumentError> {
    let mut class = ClassInfo::new(doc.name.clone());
    class.modifiers = parse_modifiers(&doc.name, &doc.modifiers, modifiers::PUBLIC)?;
    class.superclass = doc.superclass.clone();
    class.interfaces = doc.interfaces.clone();
    class.annotations = build_annotations(&doc.annotations);
    class.has_static_initializer = doc.static_initializer;

    for method_doc in &doc.methods {
        let mut method = MethodInfo::new(&doc.name, &method_doc.name, &method_doc.return_type);
        method.modifiers = parse_modifiers(&doc.name, &method_doc.modifiers, modifiers::PUBLIC)?;
        for parameter in &method_doc.parameters {
            method.parameter_types.push(parameter.param_type.clone());
            method.parameter_names.push(parameter.name.clone());
        }
        method.exception_types = method_doc.exceptions.clone();
        method.annotations = build_annotations(&method_doc.annotations);
        class = class.with_method(method);
    }

    for field_doc in &doc.fields {
        let mut field = FieldInfo::new(&doc.name, &field_doc.name, &field_doc.field_type);
        field.modifiers = parse_modifiers(&doc.name, &field_doc.modifiers, modifiers::PRIVATE)?;
        field.annotations = build_annotations(&field_doc.annotations);
        class = class.with_field(field);
    }

    for constructor_doc in &doc.constructors {
        let mut constructor = ConstructorInfo::new(&doc.name);
        constructor.modifiers = parse_modifiers(&doc.name, &constructor_doc.modifiers, modifiers::PUBLIC)?;
        constructor.parameter_types = constructor_doc.parameter_types.clone();
        constructor.exception_types = constructor_doc.exceptions.clone();
        class = class.with_constructor(constructor);
    }

    for site_doc in &doc.sites {
        class = class.with_site(build_site(&doc.name, site_doc)?);
    }

    Ok(class)
}

fn build_site(class: &str, doc: &SiteDocument) -> Result<CodeSite, ModelDocumentError> {
    let member = || {
        doc.member.clone().ok_or_else(|| ModelDocumentError::MissingSiteMember {
            class: class.to_string(),
            kind: doc.kind.clone(),
        })
    };
    match doc.kind.as_str() {
        "call" => Ok(CodeSite::call(&doc.within, &doc.class, member()?)),
        "get" => Ok(CodeSite::field_get(&doc.within, &doc.class, member()?)),
        "set" => Ok(CodeSite::field_set(&doc.within, &doc.class, member()?)),
        "constructor-call" => Ok(CodeSite::constructor_call(&doc.within, &doc.class)),
        "handler" => Ok(CodeSite::handler(&doc.within, &doc.class)),
        other => Err(ModelDocumentError::UnknownSiteKind {
            class: class.to_string(),
            kind: other.to_string(),
        }),
    }
}
