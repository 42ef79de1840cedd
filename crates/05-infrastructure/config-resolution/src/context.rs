//! 解析过程共享的协作者与运行期状态

use crate::deferred::DeferredImport;
use crate::import_stack::ImportStack;
use crate::settings::ResolverSettings;
use crate::source::ConfigurationSource;
use config_impl::PropertySourceLoader;
use di_abstractions::{
    ComponentScanner, ConditionGate, ConfigurationEnhancer, ExclusionFilter, ImportHandlerFactory,
    NameGenerator, ResourceDefinitionReader,
};
use indexmap::{IndexMap, IndexSet};
use infrastructure_common::{MarkerIndex, ProblemReport, TypeLoader};
use std::collections::HashMap;
use std::sync::Arc;

/// 外部协作者，一次解析期间只读
pub(crate) struct Collaborators {
    pub(crate) types: Arc<dyn TypeLoader>,
    pub(crate) markers: MarkerIndex,
    pub(crate) gate: Arc<dyn ConditionGate>,
    pub(crate) handlers: Arc<dyn ImportHandlerFactory>,
    /// 扫描组件的命名策略
    pub(crate) component_names: Arc<dyn NameGenerator>,
    /// 被导入配置源的命名策略
    pub(crate) import_names: Arc<dyn NameGenerator>,
    /// 读取器类型 -> 读取器
    pub(crate) readers: IndexMap<String, Arc<dyn ResourceDefinitionReader>>,
    pub(crate) property_loader: PropertySourceLoader,
    pub(crate) scanner: Option<Arc<dyn ComponentScanner>>,
    pub(crate) enhancer: Option<Arc<dyn ConfigurationEnhancer>>,
    pub(crate) settings: ResolverSettings,
    pub(crate) default_filter: ExclusionFilter,
}

/// 跨轮次保留的解析状态
#[derive(Default)]
pub(crate) struct ResolutionState {
    /// 配置源键 -> 配置源，每个键至多一条记录
    pub(crate) sources: IndexMap<String, ConfigurationSource>,
    /// 首次遇到配置源的顺序，导入方先于被导入方
    pub(crate) discovery: IndexSet<String>,
    /// 已遍历的父类型 -> 引入它的配置源
    pub(crate) known_superclasses: HashMap<String, String>,
    pub(crate) import_stack: ImportStack,
    /// 同步阶段收集的延迟导入；为 `None` 时新发现的延迟导入立即处理
    pub(crate) deferred: Option<Vec<DeferredImport>>,
    pub(crate) problems: ProblemReport,
    /// 已加入环境的属性源名称，按加入顺序
    pub(crate) property_source_names: Vec<String>,
}

impl ResolutionState {
    /// 按发现顺序返回指定配置源键
    pub(crate) fn in_discovery_order(&self, keys: &IndexSet<String>) -> Vec<String> {
        self.discovery
            .iter()
            .filter(|key| keys.contains(*key) && self.sources.contains_key(*key))
            .cloned()
            .collect()
    }
}
