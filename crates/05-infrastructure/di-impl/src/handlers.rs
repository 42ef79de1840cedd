//! 导入处理器目录与内置选择器

use di_abstractions::{
    DeferredImportGroup, DeferredImportSelector, DefinitionRegistrar, ExclusionFilter, GroupEntry,
    ImportContext, ImportHandler, ImportHandlerFactory, ImportSelector,
};
use indexmap::IndexMap;
use infrastructure_common::markers::LOWEST_PRECEDENCE;
use infrastructure_common::MetadataView;
use std::sync::Arc;
use tracing::debug;

type GroupFactory = Arc<dyn Fn() -> Box<dyn DeferredImportGroup> + Send + Sync>;

/// 按类型名登记的导入处理器目录
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: IndexMap<String, ImportHandler>,
    groups: IndexMap<String, GroupFactory>,
}

impl std::fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCatalog")
            .field("handlers", &self.handlers)
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selector(
        mut self,
        type_name: impl Into<String>,
        selector: Arc<dyn ImportSelector>,
    ) -> Self {
        self.handlers
            .insert(type_name.into(), ImportHandler::Selector(selector));
        self
    }

    pub fn deferred(
        mut self,
        type_name: impl Into<String>,
        selector: Arc<dyn DeferredImportSelector>,
    ) -> Self {
        self.handlers
            .insert(type_name.into(), ImportHandler::Deferred(selector));
        self
    }

    pub fn registrar(
        mut self,
        type_name: impl Into<String>,
        registrar: Arc<dyn DefinitionRegistrar>,
    ) -> Self {
        self.handlers
            .insert(type_name.into(), ImportHandler::Registrar(registrar));
        self
    }

    /// 为分组键登记自定义分组
    pub fn group<F>(mut self, group_key: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn DeferredImportGroup> + Send + Sync + 'static,
    {
        self.groups.insert(group_key.into(), Arc::new(factory));
        self
    }
}

impl ImportHandlerFactory for HandlerCatalog {
    fn handler_for(&self, target: &str) -> Option<ImportHandler> {
        self.handlers.get(target).cloned()
    }

    fn group_for(&self, group_key: &str) -> Box<dyn DeferredImportGroup> {
        match self.groups.get(group_key) {
            Some(factory) => factory(),
            None => Box::new(DefaultImportGroup::new()),
        }
    }
}

/// 默认延迟导入分组
///
/// 汇总各选择器的结果，按目标名去重并保持首次出现的顺序。
#[derive(Debug, Default)]
pub struct DefaultImportGroup {
    entries: IndexMap<String, Arc<dyn MetadataView>>,
}

impl DefaultImportGroup {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeferredImportGroup for DefaultImportGroup {
    fn process(
        &mut self,
        importing: &Arc<dyn MetadataView>,
        selector: &dyn DeferredImportSelector,
        ctx: &ImportContext<'_>,
    ) {
        for target in selector.select_imports(importing.as_ref(), ctx) {
            if self.entries.contains_key(&target) {
                debug!("延迟导入目标重复，保留首次声明: {}", target);
                continue;
            }
            self.entries.insert(target, importing.clone());
        }
    }

    fn select_imports(&mut self) -> Vec<GroupEntry> {
        self.entries
            .drain(..)
            .map(|(target, importing)| GroupEntry { importing, target })
            .collect()
    }
}

/// 返回固定目标列表的选择器
#[derive(Debug, Clone, Default)]
pub struct FixedImportSelector {
    targets: Vec<String>,
    exclusion: Option<ExclusionFilter>,
}

impl FixedImportSelector {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            exclusion: None,
        }
    }

    pub fn with_exclusion(mut self, filter: ExclusionFilter) -> Self {
        self.exclusion = Some(filter);
        self
    }
}

impl ImportSelector for FixedImportSelector {
    fn select_imports(
        &self,
        _importing: &dyn MetadataView,
        _ctx: &ImportContext<'_>,
    ) -> Vec<String> {
        self.targets.clone()
    }

    fn exclusion_filter(&self) -> Option<ExclusionFilter> {
        self.exclusion.clone()
    }
}

/// 返回固定目标列表的延迟选择器
#[derive(Debug, Clone)]
pub struct FixedDeferredSelector {
    targets: Vec<String>,
    group_key: Option<String>,
    order: i32,
}

impl FixedDeferredSelector {
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            group_key: None,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn in_group(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl DeferredImportSelector for FixedDeferredSelector {
    fn select_imports(
        &self,
        _importing: &dyn MetadataView,
        _ctx: &ImportContext<'_>,
    ) -> Vec<String> {
        self.targets.clone()
    }

    fn group_key(&self) -> Option<String> {
        self.group_key.clone()
    }

    fn order(&self) -> i32 {
        self.order
    }
}

/// 从属性读取候选列表的延迟选择器
///
/// 属性值为逗号分隔的类型名；导入方标记的 `exclude` 属性中列出的类型被剔除。
#[derive(Debug, Clone)]
pub struct PropertyListSelector {
    property_key: String,
    marker: String,
    group_key: Option<String>,
}

impl PropertyListSelector {
    /// `marker` 为导入方上携带 `exclude` 属性的标记名
    pub fn new(property_key: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            property_key: property_key.into(),
            marker: marker.into(),
            group_key: None,
        }
    }

    pub fn in_group(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }
}

impl DeferredImportSelector for PropertyListSelector {
    fn select_imports(&self, importing: &dyn MetadataView, ctx: &ImportContext<'_>) -> Vec<String> {
        let Some(raw) = ctx.environment.get_property(&self.property_key) else {
            return Vec::new();
        };
        let excluded = importing
            .marker_attributes(&self.marker)
            .map(|attrs| attrs.get_list("exclude"))
            .unwrap_or_default();
        let selected: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty() && !excluded.iter().any(|e| e == name))
            .map(str::to_string)
            .collect();
        debug!(
            "属性 {} 提供 {} 个候选导入 (排除 {} 个)",
            self.property_key,
            selected.len(),
            excluded.len()
        );
        selected
    }

    fn group_key(&self) -> Option<String> {
        self.group_key.clone()
    }
}
