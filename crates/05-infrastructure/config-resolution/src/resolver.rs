//! 配置解析器
//!
//! 对注册表反复执行“收集候选 -> 构建配置图 -> 产出定义”，
//! 直到某一轮不再产生新的配置源候选为止。

use crate::candidate;
use crate::context::{Collaborators, ResolutionState};
use crate::emitter::DefinitionEmitter;
use crate::import_stack::ImportEdge;
use crate::parser::GraphBuilder;
use crate::settings::ResolverSettings;
use crate::source::ConfigurationSource;
use config_impl::{Environment, PropertySourceLoader};
use di_abstractions::{
    ComponentScanner, ConditionGate, ConfigurationEnhancer, ConfigurationMode, DefinitionRegistry,
    ExclusionFilter, ImportHandlerFactory, NameGenerator, ResourceDefinitionReader,
};
use di_impl::{
    CatalogComponentScanner, ConditionEvaluator, FileDefinitionReader, FullyQualifiedNameGenerator,
    HandlerCatalog, MarkerNameGenerator, TypeCatalog,
};
use indexmap::{IndexMap, IndexSet};
use infrastructure_common::markers::LOWEST_PRECEDENCE;
use infrastructure_common::{
    MarkerIndex, Problem, ProblemReport, ResolutionError, ResolutionResult, TypeLoader,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 默认资源读取器的类型名
pub const FILE_READER: &str = "file";

/// 一次解析的结果摘要
#[derive(Debug, Clone, Default)]
pub struct ResolutionSummary {
    /// 实际执行的轮数
    pub rounds: usize,
    /// 本次解析的配置源，按发现顺序
    pub sources: Vec<String>,
    /// 未导致失败的问题
    pub problems: ProblemReport,
}

impl ResolutionSummary {
    pub fn warnings(&self) -> Vec<Problem> {
        self.problems.warnings()
    }
}

/// 配置解析器
pub struct ConfigurationResolver {
    collab: Collaborators,
    environment: Environment,
    state: ResolutionState,
}

impl std::fmt::Debug for ConfigurationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationResolver")
            .field("settings", &self.collab.settings)
            .field("sources", &self.state.sources.len())
            .finish()
    }
}

impl ConfigurationResolver {
    pub fn builder(types: Arc<dyn TypeLoader>) -> ConfigurationResolverBuilder {
        ConfigurationResolverBuilder::new(types)
    }

    /// 基于内存类型目录创建构建器，同时启用目录扫描器
    pub fn for_catalog(catalog: Arc<TypeCatalog>) -> ConfigurationResolverBuilder {
        let scanner = Arc::new(CatalogComponentScanner::new(catalog.clone()));
        ConfigurationResolverBuilder::new(catalog).scanner(scanner)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.collab.settings
    }

    /// 最近一次导入 `type_name` 的配置源类型
    pub fn imported_by(&self, type_name: &str) -> Option<String> {
        self.state
            .import_stack
            .importing_source_for(type_name)
            .map(|view| view.type_name().to_string())
    }

    /// 已记录的导入边
    pub fn import_edges(&self) -> impl Iterator<Item = &ImportEdge> {
        self.state.import_stack.edges()
    }

    /// 已解析的配置源
    pub fn sources(&self) -> impl Iterator<Item = &ConfigurationSource> {
        self.state.sources.values()
    }

    pub fn source(&self, key: &str) -> Option<&ConfigurationSource> {
        self.state.sources.get(key)
    }

    #[cfg(test)]
    pub(crate) fn into_collaborators(self) -> Collaborators {
        self.collab
    }

    /// 解析注册表中的全部配置源候选，产出的定义直接写回注册表
    ///
    /// 已被分类过的定义不会再次作为候选，因此对同一注册表重复调用不会产生新定义。
    pub fn resolve(
        &mut self,
        registry: &mut dyn DefinitionRegistry,
    ) -> ResolutionResult<ResolutionSummary> {
        let names = registry.names();
        let mut candidates = self.collect_candidates(registry, &names);
        let mut parsed: IndexSet<String> = IndexSet::new();
        let mut rounds = 0;

        if candidates.is_empty() {
            info!("注册表中没有配置源候选");
        }

        while !candidates.is_empty() {
            rounds += 1;
            if rounds > self.collab.settings.max_rounds {
                return Err(ResolutionError::FixpointNotReached {
                    rounds: self.collab.settings.max_rounds,
                });
            }
            info!("第 {} 轮解析，{} 个配置源候选", rounds, candidates.len());
            let known: HashSet<String> = registry.names().into_iter().collect();

            let keys = {
                let mut builder = GraphBuilder::new(
                    &self.collab,
                    &mut self.environment,
                    &mut *registry,
                    &mut self.state,
                );
                builder.parse(candidates)?;
                let fresh: IndexSet<String> = builder
                    .state
                    .sources
                    .keys()
                    .filter(|key| !parsed.contains(*key))
                    .cloned()
                    .collect();
                let keys = builder.state.in_discovery_order(&fresh);
                builder.validate(&keys);
                keys
            };

            if self.collab.settings.fail_on_problems && self.state.problems.has_errors() {
                let report = std::mem::take(&mut self.state.problems);
                return Err(ResolutionError::Problems { report });
            }

            DefinitionEmitter::new(&self.collab, &self.environment, &mut *registry, &mut self.state)
                .emit(&keys)?;
            parsed.extend(keys);

            let added: Vec<String> = registry
                .names()
                .into_iter()
                .filter(|name| !known.contains(name))
                .collect();
            debug!("第 {} 轮新增 {} 个定义", rounds, added.len());
            candidates = self.collect_candidates(registry, &added);
        }

        if self.collab.settings.enhance_full_configurations {
            self.enhance(registry, &parsed)?;
        }
        self.collab.markers.clear();

        let problems = std::mem::take(&mut self.state.problems);
        info!(
            "配置解析完成: {} 轮, {} 个配置源, {} 个问题",
            rounds,
            parsed.len(),
            problems.problems().len()
        );
        Ok(ResolutionSummary {
            rounds,
            sources: parsed.into_iter().collect(),
            problems,
        })
    }

    /// 从给定名称中挑出尚未分类且类型尚未解析的配置源候选，按顺序值排序
    fn collect_candidates(
        &self,
        registry: &mut dyn DefinitionRegistry,
        names: &[String],
    ) -> Vec<ConfigurationSource> {
        let mut candidates = Vec::new();
        for name in names {
            let Some(definition) = registry.get_mut(name) else {
                continue;
            };
            if definition.configuration_mode.is_some() {
                debug!("定义 '{}' 已作为配置源处理过", name);
                continue;
            }
            if !candidate::check_definition(
                definition,
                self.collab.types.as_ref(),
                &self.collab.markers,
            ) {
                continue;
            }
            if self.state.sources.contains_key(&definition.type_name) {
                continue;
            }
            let order = definition.order.unwrap_or(LOWEST_PRECEDENCE);
            match self.collab.types.load(&definition.type_name) {
                Ok(view) => candidates
                    .push(ConfigurationSource::registered(view, name.clone()).with_order(order)),
                Err(e) => warn!("无法加载配置源 '{}' 的类型: {}", name, e),
            }
        }
        candidates.sort_by_key(|source| source.order());
        candidates
    }

    fn enhance(
        &self,
        registry: &mut dyn DefinitionRegistry,
        parsed: &IndexSet<String>,
    ) -> ResolutionResult<()> {
        let Some(enhancer) = self.collab.enhancer.as_ref() else {
            return Ok(());
        };
        for name in registry.names() {
            let Some(definition) = registry.get_mut(&name) else {
                continue;
            };
            if definition.configuration_mode != Some(ConfigurationMode::Full)
                || definition.is_factory_method()
                || !parsed.contains(&definition.type_name)
            {
                continue;
            }
            let enhanced = enhancer.enhance(&definition.type_name)?;
            if enhanced != definition.type_name {
                debug!("配置源 '{}' 增强为 {}", name, enhanced);
                definition.type_name = enhanced;
            }
        }
        Ok(())
    }
}

/// 配置解析器构建器
pub struct ConfigurationResolverBuilder {
    types: Arc<dyn TypeLoader>,
    gate: Option<Arc<dyn ConditionGate>>,
    handlers: Option<Arc<dyn ImportHandlerFactory>>,
    component_names: Option<Arc<dyn NameGenerator>>,
    import_names: Option<Arc<dyn NameGenerator>>,
    readers: IndexMap<String, Arc<dyn ResourceDefinitionReader>>,
    property_loader: PropertySourceLoader,
    scanner: Option<Arc<dyn ComponentScanner>>,
    enhancer: Option<Arc<dyn ConfigurationEnhancer>>,
    environment: Option<Environment>,
    settings: ResolverSettings,
}

impl ConfigurationResolverBuilder {
    fn new(types: Arc<dyn TypeLoader>) -> Self {
        let mut readers: IndexMap<String, Arc<dyn ResourceDefinitionReader>> = IndexMap::new();
        readers.insert(FILE_READER.to_string(), Arc::new(FileDefinitionReader::new()));
        Self {
            types,
            gate: None,
            handlers: None,
            component_names: None,
            import_names: None,
            readers,
            property_loader: PropertySourceLoader::new(),
            scanner: None,
            enhancer: None,
            environment: None,
            settings: ResolverSettings::default(),
        }
    }

    pub fn gate(mut self, gate: Arc<dyn ConditionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn handlers(mut self, handlers: Arc<dyn ImportHandlerFactory>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// 扫描组件与注册器使用的命名策略
    pub fn component_names(mut self, generator: Arc<dyn NameGenerator>) -> Self {
        self.component_names = Some(generator);
        self
    }

    /// 被导入配置源使用的命名策略，默认使用全限定类型名
    pub fn import_names(mut self, generator: Arc<dyn NameGenerator>) -> Self {
        self.import_names = Some(generator);
        self
    }

    /// 注册资源读取器，同名读取器被替换
    pub fn reader(
        mut self,
        kind: impl Into<String>,
        reader: Arc<dyn ResourceDefinitionReader>,
    ) -> Self {
        self.readers.insert(kind.into(), reader);
        self
    }

    pub fn scanner(mut self, scanner: Arc<dyn ComponentScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn enhancer(mut self, enhancer: Arc<dyn ConfigurationEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn property_loader(mut self, loader: PropertySourceLoader) -> Self {
        self.property_loader = loader;
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> ConfigurationResolver {
        let types = self.types;
        let default_filter = if self.settings.excluded_import_prefixes.is_empty() {
            ExclusionFilter::none()
        } else {
            ExclusionFilter::prefixes(self.settings.excluded_import_prefixes.clone())
        };
        let collab = Collaborators {
            markers: MarkerIndex::new(types.clone()),
            gate: self.gate.unwrap_or_else(|| Arc::new(ConditionEvaluator::new())),
            handlers: self.handlers.unwrap_or_else(|| Arc::new(HandlerCatalog::new())),
            component_names: self
                .component_names
                .unwrap_or_else(|| Arc::new(MarkerNameGenerator::with_types(types.clone()))),
            import_names: self
                .import_names
                .unwrap_or_else(|| Arc::new(FullyQualifiedNameGenerator)),
            readers: self.readers,
            property_loader: self.property_loader,
            scanner: self.scanner,
            enhancer: self.enhancer,
            settings: self.settings,
            default_filter,
            types,
        };
        debug!("配置解析器构建完成: {:?}", collab.settings);
        ConfigurationResolver {
            collab,
            environment: self.environment.unwrap_or_default(),
            state: ResolutionState::default(),
        }
    }
}
