//! 内存类型目录
//!
//! [`TypeDescriptor`] 以声明式方式描述一个类型的元数据，[`TypeCatalog`] 按全限定名
//! 提供这些描述，实现 [`TypeLoader`]。目录既可以通过构建器 API 组装，也可以从
//! TOML 文本加载。

use indexmap::IndexMap;
use infrastructure_common::markers::{
    COMPONENT, CONDITIONAL, CONDITIONAL_ON_DEFINITION, CONDITIONAL_ON_MISSING_DEFINITION,
    CONDITIONAL_ON_PROPERTY, CONFIGURATION, CONTROLLER, REPOSITORY, SERVICE,
};
use infrastructure_common::{
    Marker, MetadataError, MetadataView, MethodMetadata, TypeKind, TypeLoader,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// 类型描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub nested: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodMetadata>,
    /// 主读取方式不保证方法的声明顺序
    #[serde(default)]
    pub unordered_methods: bool,
}

impl TypeDescriptor {
    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_abstract: false,
            is_final: false,
            markers: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            nested: Vec::new(),
            methods: Vec::new(),
            unordered_methods: false,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// 标记类型
    pub fn marker_type(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Marker)
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn superclass(mut self, name: impl Into<String>) -> Self {
        self.superclass = Some(name.into());
        self
    }

    pub fn implements(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn nested(mut self, name: impl Into<String>) -> Self {
        self.nested.push(name.into());
        self
    }

    /// 添加方法，未指定声明类型时使用本类型
    pub fn method(mut self, mut method: MethodMetadata) -> Self {
        if method.declaring_type.is_empty() {
            method.declaring_type = self.name.clone();
        }
        self.methods.push(method);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn final_type(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn unordered_methods(mut self) -> Self {
        self.unordered_methods = true;
        self
    }

    fn normalize(&mut self) {
        for method in &mut self.methods {
            if method.declaring_type.is_empty() {
                method.declaring_type = self.name.clone();
            }
        }
    }

    /// 方法按名称排序的视图，模拟不保证声明顺序的读取方式
    fn scrambled(&self) -> Self {
        let mut view = self.clone();
        view.methods.sort_by(|a, b| a.name.cmp(&b.name));
        view
    }
}

impl MetadataView for TypeDescriptor {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TypeKind {
        self.kind
    }

    fn is_abstract(&self) -> bool {
        self.is_abstract || self.kind == TypeKind::Interface
    }

    fn is_final(&self) -> bool {
        self.is_final
    }

    fn markers(&self) -> &[Marker] {
        &self.markers
    }

    fn superclass_name(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    fn interface_names(&self) -> &[String] {
        &self.interfaces
    }

    fn nested_type_names(&self) -> &[String] {
        &self.nested
    }

    fn methods(&self) -> &[MethodMetadata] {
        &self.methods
    }

    fn preserves_declaration_order(&self) -> bool {
        !self.unordered_methods
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    types: Vec<TypeDescriptor>,
}

/// 类型目录
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    types: IndexMap<String, Arc<TypeDescriptor>>,
    scrambled: IndexMap<String, Arc<TypeDescriptor>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加类型，同名类型被替换
    pub fn register(&mut self, mut descriptor: TypeDescriptor) {
        descriptor.normalize();
        let name = descriptor.name.clone();
        if descriptor.unordered_methods {
            self.scrambled
                .insert(name.clone(), Arc::new(descriptor.scrambled()));
        } else {
            self.scrambled.shift_remove(&name);
        }
        self.types.insert(name, Arc::new(descriptor));
    }

    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// 登记内置的构造型、上下文与条件标记类型
    pub fn with_standard_markers(mut self) -> Self {
        self.register(TypeDescriptor::marker_type(COMPONENT));
        for stereotype in [CONFIGURATION, SERVICE, REPOSITORY, CONTROLLER] {
            self.register(TypeDescriptor::marker_type(stereotype).marker(Marker::new(COMPONENT)));
        }
        for condition in [
            CONDITIONAL,
            CONDITIONAL_ON_PROPERTY,
            CONDITIONAL_ON_DEFINITION,
            CONDITIONAL_ON_MISSING_DEFINITION,
        ] {
            self.register(TypeDescriptor::marker_type(condition));
        }
        self
    }

    /// 从 TOML 文本加载，`[[types]]` 数组中每项为一个类型描述
    pub fn from_toml_str(text: &str) -> Result<Self, MetadataError> {
        let file: CatalogFile = toml::from_str(text).map_err(|e| MetadataError::InvalidMetadata {
            type_name: "<catalog>".to_string(),
            message: e.to_string(),
        })?;
        let mut catalog = Self::new();
        for descriptor in file.types {
            catalog.register(descriptor);
        }
        debug!("从 TOML 加载类型目录: {} 个类型", catalog.len());
        Ok(catalog)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| MetadataError::InvalidMetadata {
            type_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    /// 按登记顺序返回全部类型名
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// 类型是否可赋值给目标类型：自身、父类型链或（传递的）接口
    pub fn is_assignable(&self, type_name: &str, target: &str) -> bool {
        let mut pending = vec![type_name.to_string()];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = pending.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(descriptor) = self.types.get(&current) {
                pending.extend(descriptor.superclass.iter().cloned());
                pending.extend(descriptor.interfaces.iter().cloned());
            }
        }
        false
    }
}

impl TypeLoader for TypeCatalog {
    fn load(&self, type_name: &str) -> Result<Arc<dyn MetadataView>, MetadataError> {
        if let Some(view) = self.scrambled.get(type_name) {
            return Ok(view.clone());
        }
        self.types
            .get(type_name)
            .map(|d| d.clone() as Arc<dyn MetadataView>)
            .ok_or_else(|| MetadataError::TypeNotFound {
                type_name: type_name.to_string(),
            })
    }

    fn load_declaration_ordered(&self, type_name: &str) -> Option<Arc<dyn MetadataView>> {
        self.types
            .get(type_name)
            .map(|d| d.clone() as Arc<dyn MetadataView>)
    }
}
