//! Material data and typed shader properties

use serde::{Deserialize, Serialize};

use crate::id::INVALID_ID;

/// Value of a shader property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    Vector([f32; 4]),
    Matrix([f32; 16]),
    FloatArray(Vec<f32>),
    VectorArray(Vec<[f32; 4]>),
    MatrixArray(Vec<[f32; 16]>),
    /// Id of a texture sent in the same scene
    Texture(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperty {
    pub name: String,
    pub value: PropertyValue,
}

impl MaterialProperty {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self { name: name.into(), value }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            PropertyValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<[f32; 4]> {
        match self.value {
            PropertyValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<i32> {
        match self.value {
            PropertyValue::Texture(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialKeyword {
    pub name: String,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub id: i32,
    pub name: String,
    pub index: i32,
    pub shader: String,
    pub properties: Vec<MaterialProperty>,
    pub keywords: Vec<MaterialKeyword>,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            name: String::new(),
            index: 0,
            shader: String::new(),
            properties: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

impl MaterialData {
    pub const COLOR_PROPERTY: &'static str = "_Color";

    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Case-sensitive property lookup
    pub fn find_property(&self, name: &str) -> Option<&MaterialProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Insert or replace a property
    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.properties.push(MaterialProperty::new(name, value)),
        }
    }

    /// Main color, black when unset
    pub fn color(&self) -> [f32; 4] {
        self.find_property(Self::COLOR_PROPERTY)
            .and_then(MaterialProperty::as_vector)
            .unwrap_or([0.0, 0.0, 0.0, 1.0])
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.set_property(Self::COLOR_PROPERTY, PropertyValue::Vector(color));
    }

    pub fn has_keyword(&self, name: &str) -> bool {
        self.keywords.iter().any(|k| k.name == name && k.value)
    }

    pub fn set_keyword(&mut self, name: impl Into<String>, value: bool) {
        let name = name.into();
        match self.keywords.iter_mut().find(|k| k.name == name) {
            Some(existing) => existing.value = value,
            None => self.keywords.push(MaterialKeyword { name, value }),
        }
    }

    /// Ids of all textures referenced by properties
    pub fn texture_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.properties.iter().filter_map(MaterialProperty::as_texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut mat = MaterialData::new(0, "Steel");
        mat.set_property("_Glossiness", PropertyValue::Float(0.8));
        assert_eq!(mat.find_property("_Glossiness").and_then(|p| p.as_float()), Some(0.8));
        assert!(mat.find_property("_glossiness").is_none());
    }

    #[test]
    fn test_color_default_and_set() {
        let mut mat = MaterialData::new(1, "Paint");
        assert_eq!(mat.color(), [0.0, 0.0, 0.0, 1.0]);
        mat.set_color([1.0, 0.5, 0.25, 1.0]);
        mat.set_color([1.0, 0.0, 0.0, 1.0]);
        assert_eq!(mat.color(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(mat.properties.len(), 1);
    }

    #[test]
    fn test_keywords_and_textures() {
        let mut mat = MaterialData::new(2, "Skin");
        mat.set_keyword("_NORMALMAP", true);
        mat.set_property("_MainTex", PropertyValue::Texture(4));
        mat.set_property("_BumpMap", PropertyValue::Texture(5));
        assert!(mat.has_keyword("_NORMALMAP"));
        assert!(!mat.has_keyword("_EMISSION"));
        assert_eq!(mat.texture_ids().collect::<Vec<_>>(), vec![4, 5]);
    }
}
