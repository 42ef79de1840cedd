//! 元数据定义
//!
//! 提供与类型加载方式无关的统一元数据视图：类型上的声明式标记、父类型、
//! 接口、嵌套类型以及方法。

use crate::errors::{MetadataError, ResolutionError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// 标记属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl AttributeValue {
    /// 以字符串列表形式读取，单个字符串视为单元素列表
    pub fn as_list(&self) -> Vec<String> {
        match self {
            AttributeValue::Str(s) => vec![s.clone()],
            AttributeValue::List(items) => items.clone(),
            AttributeValue::Bool(b) => vec![b.to_string()],
            AttributeValue::Int(i) => vec![i.to_string()],
        }
    }

    /// 空字符串与空列表视为未声明
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Str(s) => s.is_empty(),
            AttributeValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            AttributeValue::List(items) => format!("[{}]", items.join(", ")),
            other => other.as_list().join(""),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(value: Vec<&str>) -> Self {
        AttributeValue::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::List(value)
    }
}

/// 标记属性集合，保持声明顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerAttributes(IndexMap<String, AttributeValue>);

impl MarkerAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(AttributeValue::Str(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(AttributeValue::Bool(b)) => *b,
            Some(AttributeValue::Str(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(AttributeValue::Int(i)) => Some(*i),
            Some(AttributeValue::Str(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .map(AttributeValue::as_list)
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// 读取一对互为别名的属性
    ///
    /// 两者都声明且值不同时返回 [`ResolutionError::AmbiguousDeclaration`]。
    pub fn aliased_list(
        &self,
        primary: &str,
        alias: &str,
        marker: &str,
        source_type: &str,
    ) -> Result<Vec<String>, ResolutionError> {
        let first = self.0.get(primary).filter(|v| !v.is_empty());
        let second = self.0.get(alias).filter(|v| !v.is_empty());
        match (first, second) {
            (Some(a), Some(b)) if a.as_list() != b.as_list() => {
                Err(ResolutionError::AmbiguousDeclaration {
                    source_type: source_type.to_string(),
                    marker: marker.to_string(),
                    attribute: format!("{}/{}", primary, alias),
                    first: a.describe(),
                    second: b.describe(),
                })
            }
            (Some(value), _) | (None, Some(value)) => Ok(value
                .as_list()
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect()),
            (None, None) => Ok(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }
}

/// 声明式标记实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// 标记类型的全限定名
    pub name: String,
    /// 标记属性
    #[serde(default)]
    pub attributes: MarkerAttributes,
}

impl Marker {
    /// 创建无属性的标记
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: MarkerAttributes::new(),
        }
    }

    /// 添加属性
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    /// 标记类型本身
    Marker,
}

/// 方法元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodMetadata {
    /// 方法名
    pub name: String,
    /// 声明该方法的类型
    #[serde(default)]
    pub declaring_type: String,
    /// 返回类型
    #[serde(default)]
    pub return_type: String,
    /// 方法上的标记
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_private: bool,
}

impl MethodMetadata {
    /// 创建新的方法元数据
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            return_type: return_type.into(),
            markers: Vec::new(),
            is_static: false,
            is_abstract: false,
            is_final: false,
            is_private: false,
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn as_private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.iter().any(|m| m.name == name)
    }

    pub fn marker_attributes(&self, name: &str) -> Option<&MarkerAttributes> {
        self.markers
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.attributes)
    }

    /// 方法的可读标识，形如 `app.Config::dataSource`
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }
}

/// 元数据视图
///
/// 对类型声明式信息的只读统一访问接口，与类型是通过何种方式加载的无关。
/// 标记只包含直接声明在类型上的实例，元标记的展开由 [`crate::MarkerIndex`] 负责。
pub trait MetadataView: Debug + Send + Sync {
    /// 全限定类型名
    fn type_name(&self) -> &str;

    /// 类型种类
    fn kind(&self) -> TypeKind {
        TypeKind::Class
    }

    fn is_abstract(&self) -> bool {
        false
    }

    fn is_final(&self) -> bool {
        false
    }

    /// 直接声明的标记，按声明顺序
    fn markers(&self) -> &[Marker];

    /// 父类型名
    fn superclass_name(&self) -> Option<&str>;

    /// 直接实现的接口名
    fn interface_names(&self) -> &[String];

    /// 嵌套类型名
    fn nested_type_names(&self) -> &[String];

    /// 全部方法
    fn methods(&self) -> &[MethodMetadata];

    /// `methods()` 是否按源码声明顺序返回
    fn preserves_declaration_order(&self) -> bool {
        true
    }

    fn has_marker(&self, name: &str) -> bool {
        self.markers().iter().any(|m| m.name == name)
    }

    fn marker_attributes(&self, name: &str) -> Option<&MarkerAttributes> {
        self.markers()
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.attributes)
    }

    /// 带有指定标记的方法
    fn methods_with_marker(&self, name: &str) -> Vec<&MethodMetadata> {
        self.methods().iter().filter(|m| m.has_marker(name)).collect()
    }

    fn is_interface(&self) -> bool {
        self.kind() == TypeKind::Interface
    }
}

/// 类型加载器
///
/// 按全限定名加载类型的元数据视图。
pub trait TypeLoader: Send + Sync {
    /// 加载类型元数据
    fn load(&self, type_name: &str) -> Result<Arc<dyn MetadataView>, MetadataError>;

    /// 以保证声明顺序的方式再次读取类型元数据
    ///
    /// 主读取方式不保证方法顺序时，用于确定工厂方法的声明顺序。
    fn load_declaration_ordered(&self, _type_name: &str) -> Option<Arc<dyn MetadataView>> {
        None
    }
}

/// 返回类型名所在的包，嵌套类型以 `$` 与外部类型分隔
pub fn package_of(type_name: &str) -> &str {
    let outer = type_name.split('$').next().unwrap_or(type_name);
    match outer.rfind('.') {
        Some(idx) => &outer[..idx],
        None => "",
    }
}

/// 返回不含包名的简短类型名
pub fn short_name_of(type_name: &str) -> String {
    let package = package_of(type_name);
    let short = if package.is_empty() {
        type_name
    } else {
        &type_name[package.len() + 1..]
    };
    short.replace('$', ".")
}
