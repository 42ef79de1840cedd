//! 配置源模型

use di_abstractions::DefinitionRegistrar;
use indexmap::{IndexMap, IndexSet};
use infrastructure_common::markers::LOWEST_PRECEDENCE;
use infrastructure_common::{MetadataView, MethodMetadata};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 配置源上记录的工厂方法
#[derive(Debug, Clone)]
pub struct FactoryMethod {
    pub metadata: MethodMetadata,
    /// 所属配置源的键
    pub source: String,
}

impl FactoryMethod {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// 导入的注册器及发起导入的类型
#[derive(Clone)]
pub struct RegistrarEntry {
    /// 注册器目标类型名
    pub name: String,
    pub registrar: Arc<dyn DefinitionRegistrar>,
    pub importing: Arc<dyn MetadataView>,
}

impl fmt::Debug for RegistrarEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrarEntry")
            .field("name", &self.name)
            .field("importing", &self.importing.type_name())
            .finish()
    }
}

/// 配置源
///
/// 以全限定类型名为唯一标识，相等性与哈希只依赖该键。
#[derive(Debug, Clone)]
pub struct ConfigurationSource {
    key: String,
    metadata: Arc<dyn MetadataView>,
    /// 注册名，显式注册的配置源在创建时给定，被导入的在产出阶段分配
    registered_name: Option<String>,
    imported_by: IndexSet<String>,
    order: i32,
    pub(crate) factory_methods: Vec<FactoryMethod>,
    /// 资源位置 -> 读取器类型（空字符串表示按扩展名选择）
    pub(crate) imported_resources: IndexMap<String, String>,
    pub(crate) registrars: Vec<RegistrarEntry>,
    pub(crate) skipped_factory_methods: HashSet<String>,
}

impl ConfigurationSource {
    /// 显式注册的配置源
    pub fn registered(metadata: Arc<dyn MetadataView>, name: impl Into<String>) -> Self {
        let mut source = Self::bare(metadata);
        source.registered_name = Some(name.into());
        source
    }

    /// 由 `importer` 导入的配置源
    pub fn imported(metadata: Arc<dyn MetadataView>, importer: &str) -> Self {
        let mut source = Self::bare(metadata);
        source.imported_by.insert(importer.to_string());
        source
    }

    fn bare(metadata: Arc<dyn MetadataView>) -> Self {
        Self {
            key: metadata.type_name().to_string(),
            metadata,
            registered_name: None,
            imported_by: IndexSet::new(),
            order: LOWEST_PRECEDENCE,
            factory_methods: Vec::new(),
            imported_resources: IndexMap::new(),
            registrars: Vec::new(),
            skipped_factory_methods: HashSet::new(),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataView> {
        &self.metadata
    }

    /// 仅通过导入发现
    pub fn is_imported(&self) -> bool {
        !self.imported_by.is_empty()
    }

    pub fn imported_by(&self) -> &IndexSet<String> {
        &self.imported_by
    }

    /// 合并导入方集合
    pub fn merge_imported_by(&mut self, other: &ConfigurationSource) {
        for importer in &other.imported_by {
            self.imported_by.insert(importer.clone());
        }
    }

    pub fn registered_name(&self) -> Option<&str> {
        self.registered_name.as_deref()
    }

    /// 注册名只分配一次
    pub(crate) fn assign_name(&mut self, name: String) {
        if self.registered_name.is_none() {
            self.registered_name = Some(name);
        }
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn factory_methods(&self) -> &[FactoryMethod] {
        &self.factory_methods
    }

    pub fn imported_resources(&self) -> &IndexMap<String, String> {
        &self.imported_resources
    }

    pub fn registrars(&self) -> &[RegistrarEntry] {
        &self.registrars
    }

    pub fn skipped_factory_methods(&self) -> &HashSet<String> {
        &self.skipped_factory_methods
    }

    pub(crate) fn add_factory_method(&mut self, metadata: MethodMetadata) {
        self.factory_methods.push(FactoryMethod {
            metadata,
            source: self.key.clone(),
        });
    }

    pub(crate) fn add_imported_resource(&mut self, location: String, reader: String) {
        self.imported_resources.insert(location, reader);
    }

    pub(crate) fn add_registrar(&mut self, entry: RegistrarEntry) {
        self.registrars.push(entry);
    }
}

impl PartialEq for ConfigurationSource {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ConfigurationSource {}

impl Hash for ConfigurationSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigurationSource[{}]", self.key)
    }
}
