//! 组件定义产出
//!
//! 按发现顺序遍历配置源，每个配置源依次：
//!
//! 1. 注册被导入的配置源自身，或在其被条件跳过时撤销已有定义
//! 2. 注册工厂方法定义，先应用覆盖策略
//! 3. 通过资源读取器加载导入资源
//! 4. 调用注册器

use crate::context::{Collaborators, ResolutionState};
use crate::source::{ConfigurationSource, FactoryMethod};
use config_impl::Environment;
use di_abstractions::{
    ComponentDefinition, ConditionContext, ConditionTarget, ConfigurationPhase, DefinitionOrigin,
    DefinitionRegistry, ResourceDefinitionReader, Role,
};
use infrastructure_common::markers::{BEAN, CONFIGURATION};
use infrastructure_common::{ConfigError, ResolutionError, ResolutionResult};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 定义产出器
pub(crate) struct DefinitionEmitter<'a> {
    collab: &'a Collaborators,
    environment: &'a Environment,
    registry: &'a mut dyn DefinitionRegistry,
    state: &'a mut ResolutionState,
    /// 配置源键 -> 是否跳过，仅在一次 `emit` 内有效
    skipped: HashMap<String, bool>,
    in_progress: HashSet<String>,
}

impl<'a> DefinitionEmitter<'a> {
    pub(crate) fn new(
        collab: &'a Collaborators,
        environment: &'a Environment,
        registry: &'a mut dyn DefinitionRegistry,
        state: &'a mut ResolutionState,
    ) -> Self {
        Self {
            collab,
            environment,
            registry,
            state,
            skipped: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// 依次产出给定配置源的定义
    pub(crate) fn emit(&mut self, keys: &[String]) -> ResolutionResult<()> {
        for key in keys {
            let Some(mut source) = self.state.sources.get(key).cloned() else {
                continue;
            };
            self.emit_source(&mut source)?;
            if let Some(stored) = self.state.sources.get_mut(key) {
                *stored = source;
            }
        }
        self.skipped.clear();
        Ok(())
    }

    fn emit_source(&mut self, source: &mut ConfigurationSource) -> ResolutionResult<()> {
        if self.is_skipped(source.key()) {
            if let Some(name) = source.registered_name() {
                if self.registry.remove(name).is_some() {
                    info!("配置源 {} 被条件跳过，撤销定义 '{}'", source.key(), name);
                }
            }
            self.state.import_stack.remove_importing_source(source.key());
            return Ok(());
        }

        if source.is_imported() {
            self.register_imported_source(source)?;
        }
        for method in source.factory_methods().to_vec() {
            self.emit_factory_method(source, &method)?;
        }
        self.load_imported_resources(source)?;
        self.invoke_registrars(source)
    }

    fn condition_skips(&self, target: ConditionTarget<'_>) -> bool {
        let ctx = ConditionContext {
            registry: &*self.registry,
            environment: self.environment,
            types: self.collab.types.as_ref(),
            markers: &self.collab.markers,
        };
        self.collab
            .gate
            .should_skip(target, ConfigurationPhase::RegisterDefinition, &ctx)
    }

    /// 被导入的配置源在其全部导入方都被跳过时跳过，否则看自身的注册阶段条件
    fn is_skipped(&mut self, key: &str) -> bool {
        if let Some(skip) = self.skipped.get(key) {
            return *skip;
        }
        if !self.in_progress.insert(key.to_string()) {
            return false;
        }

        let (importers, metadata) = match self.state.sources.get(key) {
            Some(source) => (
                source.imported_by().iter().cloned().collect::<Vec<_>>(),
                Some(source.metadata().clone()),
            ),
            None => (Vec::new(), None),
        };
        let skip = match metadata {
            // 未进入配置源表的导入方视为已跳过
            None => true,
            Some(metadata) => {
                let all_importers_skipped = !importers.is_empty()
                    && importers.iter().all(|importer| self.is_skipped(importer));
                all_importers_skipped
                    || self.condition_skips(ConditionTarget::Type(metadata.as_ref()))
            }
        };

        self.in_progress.remove(key);
        self.skipped.insert(key.to_string(), skip);
        skip
    }

    fn register_imported_source(
        &mut self,
        source: &mut ConfigurationSource,
    ) -> ResolutionResult<()> {
        let metadata = source.metadata().clone();
        let mut definition = ComponentDefinition::new(source.key())
            .with_origin(DefinitionOrigin::ConfigurationSource {
                source: source.key().to_string(),
            })
            .with_markers(metadata.markers().to_vec());
        definition.apply_markers(&self.collab.markers.merged_for(metadata.as_ref()));

        let name = match source.registered_name() {
            Some(name) => name.to_string(),
            None => self
                .collab
                .import_names
                .generate_name(&definition, &*self.registry)?,
        };
        self.registry.register(&name, definition)?;
        info!("注册被导入的配置源 '{}' ({})", name, source.key());
        source.assign_name(name);
        Ok(())
    }

    fn emit_factory_method(
        &mut self,
        source: &mut ConfigurationSource,
        method: &FactoryMethod,
    ) -> ResolutionResult<()> {
        let metadata = &method.metadata;
        let method_name = metadata.name.clone();

        if self.condition_skips(ConditionTarget::Method(metadata)) {
            debug!("工厂方法 {} 被条件跳过", metadata.qualified_name());
            source.skipped_factory_methods.insert(method_name);
            return Ok(());
        }
        if source.skipped_factory_methods.contains(&method_name) {
            return Ok(());
        }

        let declared = match metadata.marker_attributes(BEAN) {
            Some(attributes) => {
                attributes.aliased_list("name", "value", BEAN, &metadata.qualified_name())?
            }
            None => Vec::new(),
        };
        let mut names = declared.into_iter();
        let name = names.next().unwrap_or_else(|| method_name.clone());
        let aliases: Vec<String> = names.collect();

        if source.registered_name() == Some(name.as_str()) {
            return Err(ResolutionError::naming_conflict(
                &name,
                source.key(),
                metadata.qualified_name(),
                "工厂方法产生的组件名与所在配置源的组件名相同",
            ));
        }
        if self.is_overridden_by_existing(source, metadata.name.as_str(), &name)? {
            self.register_aliases(&name, &aliases)?;
            return Ok(());
        }

        let mut definition = ComponentDefinition::new(metadata.return_type.clone())
            .with_origin(DefinitionOrigin::FactoryMethod {
                source: source.key().to_string(),
                method: method_name,
                factory_component: if metadata.is_static {
                    None
                } else {
                    source.registered_name().map(str::to_string)
                },
                is_static: metadata.is_static,
                non_unique: false,
            })
            .with_markers(metadata.markers.clone());
        definition.apply_markers(&self.collab.markers.merged_for_method(metadata));

        // 被替换定义上已登记的别名继续指向新定义
        let inherited = self.registry.aliases(&name);
        if self.registry.remove(&name).is_some() {
            debug!("替换已有定义 '{}'，保留别名 {:?}", name, inherited);
        }
        self.registry.register(&name, definition)?;
        self.register_aliases(&name, &inherited)?;
        self.register_aliases(&name, &aliases)?;
        info!("注册工厂方法定义 '{}' <- {}", name, metadata.qualified_name());
        Ok(())
    }

    fn register_aliases(&mut self, name: &str, aliases: &[String]) -> ResolutionResult<()> {
        for alias in aliases {
            self.registry.register_alias(name, alias)?;
        }
        Ok(())
    }

    /// 覆盖策略：返回 true 表示保留已有定义并丢弃新定义
    fn is_overridden_by_existing(
        &mut self,
        source: &ConfigurationSource,
        method_name: &str,
        name: &str,
    ) -> ResolutionResult<bool> {
        let allows_override = self.registry.allows_override();
        let enforce_unique = self.enforces_unique_methods(source);
        let Some(existing) = self.registry.get_mut(name) else {
            return Ok(false);
        };
        let described = existing.to_string();
        let role = existing.role;
        let candidate = format!("{}::{}", source.key(), method_name);

        match &mut existing.origin {
            DefinitionOrigin::FactoryMethod {
                source: existing_source,
                method,
                non_unique,
                ..
            } if existing_source.as_str() == source.key() => {
                if method.as_str() == method_name {
                    debug!("'{}' 为同一配置源上的重载工厂方法，保留首个定义", name);
                    *non_unique = true;
                    return Ok(true);
                }
                if enforce_unique || !allows_override {
                    return Err(ResolutionError::naming_conflict(
                        name,
                        described,
                        candidate,
                        "同一配置源上不同工厂方法使用了相同的组件名",
                    ));
                }
                Ok(false)
            }
            // 不同配置源之间后者覆盖前者
            DefinitionOrigin::FactoryMethod { .. } => Ok(false),
            DefinitionOrigin::ConfigurationSource { source: existing_source }
                if existing_source.as_str() != source.key() =>
            {
                Ok(false)
            }
            DefinitionOrigin::Scanned => Ok(false),
            _ if role > Role::Application => Ok(false),
            _ if allows_override => {
                warn!("工厂方法 {} 覆盖外部定义 '{}'", candidate, name);
                Ok(false)
            }
            _ => Err(ResolutionError::naming_conflict(
                name,
                described,
                candidate,
                "注册表不允许工厂方法覆盖已有定义",
            )),
        }
    }

    /// 配置源标记的 `enforce_unique_methods`，默认为 true；轻量配置源不受约束
    fn enforces_unique_methods(&self, source: &ConfigurationSource) -> bool {
        self.collab
            .markers
            .find(source.metadata().as_ref(), CONFIGURATION)
            .map(|attributes| attributes.get_bool("enforce_unique_methods", true))
            .unwrap_or(false)
    }

    fn load_imported_resources(&mut self, source: &ConfigurationSource) -> ResolutionResult<()> {
        for (location, reader_kind) in source.imported_resources() {
            let reader = self
                .reader_for(location, reader_kind)
                .ok_or_else(|| ResolutionError::ResourceLoad {
                    location: location.clone(),
                    source_type: source.key().to_string(),
                    source: ConfigError::UnsupportedFormat {
                        path: location.clone(),
                    },
                })?;
            let count = reader
                .load_definitions(location, &mut *self.registry)
                .map_err(|e| match e {
                    ResolutionError::Config { source: cause } => ResolutionError::ResourceLoad {
                        location: location.clone(),
                        source_type: source.key().to_string(),
                        source: cause,
                    },
                    other => other,
                })?;
            debug!("资源 {} 提供了 {} 个定义", location, count);
        }
        Ok(())
    }

    /// 按声明的读取器类型选择，未声明时按扩展名选择
    fn reader_for(&self, location: &str, kind: &str) -> Option<Arc<dyn ResourceDefinitionReader>> {
        if !kind.is_empty() {
            return self.collab.readers.get(kind).cloned();
        }
        let extension = Path::new(location)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)?;
        self.collab
            .readers
            .values()
            .find(|reader| reader.extensions().iter().any(|e| *e == extension))
            .cloned()
    }

    fn invoke_registrars(&mut self, source: &ConfigurationSource) -> ResolutionResult<()> {
        for entry in source.registrars() {
            let before = self.registry.len();
            entry
                .registrar
                .register_definitions(
                    entry.importing.as_ref(),
                    &mut *self.registry,
                    self.collab.component_names.as_ref(),
                )
                .map_err(|e| match e {
                    ResolutionError::NamingConflict { .. }
                    | ResolutionError::AmbiguousDeclaration { .. } => e,
                    other => ResolutionError::Registrar {
                        registrar: entry.name.clone(),
                        message: other.to_string(),
                    },
                })?;
            info!(
                "注册器 {} (导入方 {}) 执行完成，注册表定义数 {} -> {}",
                entry.name,
                entry.importing.type_name(),
                before,
                self.registry.len()
            );
        }
        Ok(())
    }
}
