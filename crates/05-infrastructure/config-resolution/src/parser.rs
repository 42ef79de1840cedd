//! 配置图构建
//!
//! 把一个配置源展开为完整的图节点，按顺序处理：
//!
//! 1. 组件标记类型上的嵌套配置源
//! 2. 附加属性源声明
//! 3. 组件扫描声明
//! 4. 导入声明
//! 5. 导入资源声明（只记录，产出阶段处理）
//! 6. 类型与接口上的工厂方法
//! 7. 父类型，返回给调用方继续循环

use crate::candidate;
use crate::context::{Collaborators, ResolutionState};
use crate::source::ConfigurationSource;
use config_abstractions::PropertyResolver;
use config_impl::Environment;
use di_abstractions::{
    ComponentDefinition, ConditionContext, ConditionTarget, ConfigurationPhase, DefinitionOrigin,
    DefinitionRegistry, ExclusionFilter, ScanDirective, TypeFilter,
};
use indexmap::IndexSet;
use infrastructure_common::markers::{
    BEAN, COMPONENT, COMPONENT_SCAN, IMPORT, IMPORT_RESOURCE, PROPERTY_SOURCE, ROOT_TYPE,
};
use infrastructure_common::{
    package_of, MarkerAttributes, MetadataView, MethodMetadata, Problem, ProblemKind,
    ResolutionError, ResolutionResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 配置图构建器，借用一轮解析所需的全部状态
pub(crate) struct GraphBuilder<'a> {
    pub(crate) collab: &'a Collaborators,
    pub(crate) environment: &'a mut Environment,
    pub(crate) registry: &'a mut dyn DefinitionRegistry,
    pub(crate) state: &'a mut ResolutionState,
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn new(
        collab: &'a Collaborators,
        environment: &'a mut Environment,
        registry: &'a mut dyn DefinitionRegistry,
        state: &'a mut ResolutionState,
    ) -> Self {
        Self {
            collab,
            environment,
            registry,
            state,
        }
    }

    /// 解析一轮候选配置源，同步阶段结束后处理全部延迟导入
    pub(crate) fn parse(&mut self, candidates: Vec<ConfigurationSource>) -> ResolutionResult<()> {
        self.state.deferred = Some(Vec::new());
        let filter = self.collab.default_filter.clone();
        for source in candidates {
            self.process_source(source, &filter)?;
        }
        self.process_deferred()
    }

    pub(crate) fn should_skip(
        &self,
        target: ConditionTarget<'_>,
        phase: ConfigurationPhase,
    ) -> bool {
        let ctx = ConditionContext {
            registry: &*self.registry,
            environment: &*self.environment,
            types: self.collab.types.as_ref(),
            markers: &self.collab.markers,
        };
        self.collab.gate.should_skip(target, phase, &ctx)
    }

    /// 处理单个配置源并把结果放入配置源表
    pub(crate) fn process_source(
        &mut self,
        mut source: ConfigurationSource,
        filter: &ExclusionFilter,
    ) -> ResolutionResult<()> {
        if self.should_skip(
            ConditionTarget::Type(source.metadata().as_ref()),
            ConfigurationPhase::ParseConfiguration,
        ) {
            debug!("配置源 {} 在解析阶段被条件跳过", source.key());
            return Ok(());
        }

        let key = source.key().to_string();
        // 仍在活动导入链上的配置源只登记导入方，不再重复展开
        if source.is_imported() && self.state.import_stack.contains(&key) {
            if self.state.import_stack.is_chained_import_on_stack(&key) {
                let chain = self.state.import_stack.chain_description(&key);
                self.state.problems.report(Problem::error(
                    ProblemKind::CircularImport,
                    Some(&key),
                    format!("检测到循环导入: {}", chain),
                ));
            } else {
                debug!("配置源 {} 仍在处理中，只登记导入方 {:?}", key, source.imported_by());
            }
            match self.state.sources.get_mut(&key) {
                Some(existing) if existing.is_imported() => existing.merge_imported_by(&source),
                Some(_) => {}
                None => {
                    self.state.sources.insert(key, source);
                }
            }
            return Ok(());
        }
        if let Some(existing) = self.state.sources.get_mut(&key) {
            if source.is_imported() {
                if existing.is_imported() {
                    existing.merge_imported_by(&source);
                }
                debug!("配置源 {} 已处理，合并导入方", key);
                return Ok(());
            }
            debug!("配置源 {} 被显式注册，替换之前的导入记录", key);
            self.state.sources.shift_remove(&key);
            self.state.known_superclasses.retain(|_, owner| owner != &key);
        }
        self.state.discovery.insert(key.clone());

        let mut next = Some(source.metadata().clone());
        while let Some(view) = next {
            next = self.expand(&mut source, view, filter)?;
        }

        // 处理期间可能经由循环导入再次登记了同一配置源
        match self.state.sources.get(&key) {
            Some(previous) if !previous.is_imported() && source.is_imported() => {
                debug!("配置源 {} 已被显式注册，忽略导入记录", key);
                return Ok(());
            }
            Some(previous) if previous.is_imported() && source.is_imported() => {
                source.merge_imported_by(previous);
            }
            _ => {}
        }
        info!(
            "配置源解析完成: {} ({} 个工厂方法, 导入方 {:?})",
            key,
            source.factory_methods().len(),
            source.imported_by()
        );
        self.state.sources.insert(key, source);
        Ok(())
    }

    fn expand(
        &mut self,
        source: &mut ConfigurationSource,
        view: Arc<dyn MetadataView>,
        filter: &ExclusionFilter,
    ) -> ResolutionResult<Option<Arc<dyn MetadataView>>> {
        let collab = self.collab;

        if collab.markers.is_present(view.as_ref(), COMPONENT) {
            self.process_member_sources(source, view.as_ref(), filter)?;
        }

        for attributes in collab.markers.find_all(view.as_ref(), PROPERTY_SOURCE) {
            self.process_property_source(&attributes, view.as_ref())?;
        }

        let scans = collab.markers.find_all(view.as_ref(), COMPONENT_SCAN);
        if !scans.is_empty()
            && !self.should_skip(
                ConditionTarget::Type(view.as_ref()),
                ConfigurationPhase::RegisterDefinition,
            )
        {
            for attributes in scans {
                let directive = self.scan_directive(&attributes, view.as_ref())?;
                for (name, scanned) in self.scan(&directive)? {
                    let is_candidate = match self.registry.get_mut(&name) {
                        Some(definition) => candidate::check_definition(
                            definition,
                            collab.types.as_ref(),
                            &collab.markers,
                        ),
                        None => false,
                    };
                    if is_candidate {
                        let order = candidate::order_of(scanned.as_ref(), &collab.markers);
                        self.process_source(
                            ConfigurationSource::registered(scanned, name).with_order(order),
                            &collab.default_filter,
                        )?;
                    }
                }
            }
        }

        let targets = self.import_targets(view.as_ref());
        self.process_imports(source, &view, targets, filter, true)?;

        if let Some(attributes) = collab.markers.find(view.as_ref(), IMPORT_RESOURCE) {
            let locations = attributes.aliased_list(
                "locations",
                "value",
                IMPORT_RESOURCE,
                view.type_name(),
            )?;
            let reader = attributes.get_str("reader").unwrap_or_default().to_string();
            for location in locations {
                let resolved = self.environment.resolve_required_placeholders(&location)?;
                source.add_imported_resource(resolved, reader.clone());
            }
        }

        for method in self.factory_methods_of(view.as_ref()) {
            source.add_factory_method(method);
        }
        self.process_interfaces(source, view.as_ref(), &mut HashSet::new());

        Ok(self.next_superclass(source, view.as_ref(), filter))
    }

    /// 处理嵌套配置源，按顺序提示稳定排序
    fn process_member_sources(
        &mut self,
        source: &ConfigurationSource,
        view: &dyn MetadataView,
        filter: &ExclusionFilter,
    ) -> ResolutionResult<()> {
        let collab = self.collab;
        let mut members: Vec<(i32, Arc<dyn MetadataView>)> = Vec::new();
        for name in view.nested_type_names() {
            match collab.types.load(name) {
                Ok(member) => {
                    if member.type_name() != source.key()
                        && candidate::is_configuration_candidate(member.as_ref(), &collab.markers)
                    {
                        let order = candidate::order_of(member.as_ref(), &collab.markers);
                        members.push((order, member));
                    }
                }
                Err(e) => self.state.problems.report(Problem::warning(
                    ProblemKind::UnresolvableType,
                    Some(source.key()),
                    format!("无法加载嵌套类型 {}: {}", name, e),
                )),
            }
        }
        members.sort_by_key(|(order, _)| *order);

        for (_, member) in members {
            if self.state.import_stack.contains(source.key()) {
                let chain = self.state.import_stack.chain_description(source.key());
                self.state.problems.report(Problem::error(
                    ProblemKind::CircularImport,
                    Some(source.key()),
                    format!("检测到循环导入: {}", chain),
                ));
                continue;
            }
            self.state.import_stack.push(source.key());
            let result =
                self.process_source(ConfigurationSource::imported(member, source.key()), filter);
            self.state.import_stack.pop();
            result?;
        }
        Ok(())
    }

    fn scan_directive(
        &self,
        attributes: &MarkerAttributes,
        view: &dyn MetadataView,
    ) -> ResolutionResult<ScanDirective> {
        let declared = attributes.aliased_list(
            "base_packages",
            "value",
            COMPONENT_SCAN,
            view.type_name(),
        )?;
        let mut packages: Vec<String> = Vec::new();
        for raw in declared {
            let resolved = self.environment.resolve_placeholders(&raw);
            for package in resolved
                .split(|c: char| matches!(c, ',' | ';' | ' ' | '\t' | '\n'))
                .filter(|p| !p.is_empty())
            {
                if !packages.iter().any(|p| p == package) {
                    packages.push(package.to_string());
                }
            }
        }
        for type_name in attributes.get_list("base_package_types") {
            let package = package_of(&type_name).to_string();
            if !packages.contains(&package) {
                packages.push(package);
            }
        }
        if packages.is_empty() {
            packages.push(package_of(view.type_name()).to_string());
        }

        let mut directive = ScanDirective::new(view.type_name(), packages);
        directive.include_filters = parse_filters(attributes, "include_filters", view.type_name())?;
        directive.exclude_filters = parse_filters(attributes, "exclude_filters", view.type_name())?;
        directive.use_default_filters = attributes.get_bool("use_default_filters", true);
        directive.lazy_init = attributes.get_bool("lazy_init", false);
        Ok(directive)
    }

    /// 执行扫描并注册扫描到的组件，返回新注册的 (名称, 元数据)
    fn scan(
        &mut self,
        directive: &ScanDirective,
    ) -> ResolutionResult<Vec<(String, Arc<dyn MetadataView>)>> {
        let collab = self.collab;
        let Some(scanner) = collab.scanner.as_ref() else {
            warn!("{} 声明了组件扫描，但未配置组件扫描器", directive.declaring_type);
            return Ok(Vec::new());
        };

        let mut registered = Vec::new();
        for view in scanner.scan(directive, &collab.markers)? {
            let phase = if candidate::is_configuration_candidate(view.as_ref(), &collab.markers) {
                ConfigurationPhase::ParseConfiguration
            } else {
                ConfigurationPhase::RegisterDefinition
            };
            if self.should_skip(ConditionTarget::Type(view.as_ref()), phase) {
                debug!("扫描到的组件 {} 被条件跳过", view.type_name());
                continue;
            }

            let mut definition = ComponentDefinition::new(view.type_name())
                .with_origin(DefinitionOrigin::Scanned)
                .with_markers(view.markers().to_vec());
            definition.lazy_init = directive.lazy_init;
            definition.apply_markers(&collab.markers.merged_for(view.as_ref()));

            let name = collab.component_names.generate_name(&definition, &*self.registry)?;
            if self.check_scanned_candidate(&name, &definition)? {
                self.registry.register(&name, definition)?;
                registered.push((name, view));
            }
        }
        info!(
            "组件扫描 {:?} (声明于 {}) 注册了 {} 个组件",
            directive.base_packages,
            directive.declaring_type,
            registered.len()
        );
        Ok(registered)
    }

    /// 名称未占用时返回 true；已有兼容定义时返回 false
    fn check_scanned_candidate(
        &self,
        name: &str,
        definition: &ComponentDefinition,
    ) -> ResolutionResult<bool> {
        let Some(existing) = self.registry.get(name) else {
            return Ok(true);
        };
        if existing.origin != DefinitionOrigin::Scanned
            || existing.type_name == definition.type_name
        {
            debug!("跳过扫描组件 '{}'，已存在兼容定义: {}", name, existing);
            return Ok(false);
        }
        Err(ResolutionError::naming_conflict(
            name,
            existing.to_string(),
            definition.to_string(),
            "扫描到的组件与已有同名组件类型不兼容",
        ))
    }

    /// 直接与元标记上的导入目标，按首次出现去重
    fn import_targets(&self, view: &dyn MetadataView) -> Vec<String> {
        let mut targets = IndexSet::new();
        for attributes in self.collab.markers.find_all(view, IMPORT) {
            targets.extend(attributes.get_list("value"));
        }
        targets.into_iter().collect()
    }

    /// 工厂方法，主读取方式不保证顺序时借助第二次读取恢复声明顺序
    fn factory_methods_of(&self, view: &dyn MetadataView) -> Vec<MethodMetadata> {
        let primary: Vec<MethodMetadata> =
            view.methods_with_marker(BEAN).into_iter().cloned().collect();
        if primary.len() < 2 || view.preserves_declaration_order() {
            return primary;
        }
        let Some(ordered_view) = self.collab.types.load_declaration_ordered(view.type_name()) else {
            return primary;
        };

        let mut remaining = primary.clone();
        let mut ordered = Vec::with_capacity(primary.len());
        for method in ordered_view.methods_with_marker(BEAN) {
            if let Some(pos) = remaining.iter().position(|m| m.name == method.name) {
                ordered.push(remaining.remove(pos));
            }
        }
        if remaining.is_empty() {
            debug!("按声明顺序排列 {} 的 {} 个工厂方法", view.type_name(), ordered.len());
            ordered
        } else {
            primary
        }
    }

    /// 接口上的非抽象工厂方法，递归处理父接口
    fn process_interfaces(
        &mut self,
        source: &mut ConfigurationSource,
        view: &dyn MetadataView,
        visited: &mut HashSet<String>,
    ) {
        for name in view.interface_names() {
            if !visited.insert(name.clone()) {
                continue;
            }
            match self.collab.types.load(name) {
                Ok(interface) => {
                    for method in self.factory_methods_of(interface.as_ref()) {
                        if !method.is_abstract {
                            source.add_factory_method(method);
                        }
                    }
                    self.process_interfaces(source, interface.as_ref(), visited);
                }
                Err(e) => self.state.problems.report(Problem::warning(
                    ProblemKind::UnresolvableType,
                    Some(source.key()),
                    format!("无法加载接口 {}: {}", name, e),
                )),
            }
        }
    }

    fn next_superclass(
        &mut self,
        source: &ConfigurationSource,
        view: &dyn MetadataView,
        filter: &ExclusionFilter,
    ) -> Option<Arc<dyn MetadataView>> {
        let superclass = view.superclass_name()?;
        if superclass == ROOT_TYPE
            || self.collab.settings.is_platform_type(superclass)
            || filter.matches(superclass)
            || self.state.known_superclasses.contains_key(superclass)
        {
            return None;
        }
        self.state
            .known_superclasses
            .insert(superclass.to_string(), source.key().to_string());
        match self.collab.types.load(superclass) {
            Ok(parent) => {
                debug!("继续处理 {} 的父类型 {}", source.key(), superclass);
                Some(parent)
            }
            Err(e) => {
                self.state.problems.report(Problem::warning(
                    ProblemKind::UnresolvableType,
                    Some(source.key()),
                    format!("无法加载父类型 {}: {}", superclass, e),
                ));
                None
            }
        }
    }

    /// 校验本轮解析出的完整模式配置源
    pub(crate) fn validate(&mut self, keys: &[String]) {
        let collab = self.collab;
        let state = &mut *self.state;
        for key in keys {
            let Some(source) = state.sources.get(key) else {
                continue;
            };
            let view = source.metadata();
            if !candidate::is_full(view.as_ref(), &collab.markers) {
                continue;
            }
            if view.is_final() {
                state.problems.report(Problem::error(
                    ProblemKind::InvalidConfigurationSource,
                    Some(key),
                    format!("完整模式配置源 {} 不能是 final 类型", key),
                ));
            }
            for method in source.factory_methods() {
                let metadata = &method.metadata;
                if !metadata.is_static && (metadata.is_final || metadata.is_private) {
                    state.problems.report(Problem::error(
                        ProblemKind::InvalidFactoryMethod,
                        Some(key),
                        format!(
                            "工厂方法 {} 必须可被覆盖 (非 final、非 private)",
                            metadata.qualified_name()
                        ),
                    ));
                }
            }
        }
    }
}

fn parse_filters(
    attributes: &MarkerAttributes,
    key: &str,
    source_type: &str,
) -> ResolutionResult<Vec<TypeFilter>> {
    attributes
        .get_list(key)
        .iter()
        .map(|text| {
            TypeFilter::parse(text).ok_or_else(|| ResolutionError::InvalidScanDirective {
                source_type: source_type.to_string(),
                message: format!("无法解析类型过滤器 '{}'", text),
            })
        })
        .collect()
}
