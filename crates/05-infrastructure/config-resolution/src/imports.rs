//! 导入解析
//!
//! 每个导入目标被归入四类之一：选择器、延迟选择器、注册器或普通配置源。

use crate::import_stack::ImportKind;
use crate::parser::GraphBuilder;
use crate::source::{ConfigurationSource, RegistrarEntry};
use di_abstractions::{ExclusionFilter, ImportContext, ImportHandler};
use infrastructure_common::{MetadataView, Problem, ProblemKind, ResolutionResult};
use std::sync::Arc;
use tracing::debug;

impl GraphBuilder<'_> {
    /// 处理配置源 `source` 在类型 `current`（自身或其父类型）上声明的导入目标
    ///
    /// 检测到循环导入时记录问题并放弃本次导入，不中断解析。
    pub(crate) fn process_imports(
        &mut self,
        source: &mut ConfigurationSource,
        current: &Arc<dyn MetadataView>,
        candidates: Vec<String>,
        filter: &ExclusionFilter,
        check_cycles: bool,
    ) -> ResolutionResult<()> {
        if candidates.is_empty() {
            return Ok(());
        }
        if check_cycles && self.state.import_stack.is_chained_import_on_stack(source.key()) {
            let chain = self.state.import_stack.chain_description(source.key());
            self.state.problems.report(Problem::error(
                ProblemKind::CircularImport,
                Some(source.key()),
                format!("检测到循环导入: {}", chain),
            ));
            return Ok(());
        }

        self.state.import_stack.push(source.key());
        let result = self.process_import_candidates(source, current, candidates, filter);
        self.state.import_stack.pop();
        result
    }

    fn process_import_candidates(
        &mut self,
        source: &mut ConfigurationSource,
        current: &Arc<dyn MetadataView>,
        candidates: Vec<String>,
        filter: &ExclusionFilter,
    ) -> ResolutionResult<()> {
        for target in candidates {
            if filter.matches(&target) {
                debug!("导入目标 {} 被排除过滤器忽略 (导入方 {})", target, source.key());
                continue;
            }

            match self.collab.handlers.handler_for(&target) {
                Some(ImportHandler::Selector(selector)) => {
                    self.state
                        .import_stack
                        .record_edge(source.key(), &target, ImportKind::Selector);
                    let filter = match selector.exclusion_filter() {
                        Some(extra) => filter.clone().or(extra),
                        None => filter.clone(),
                    };
                    let selected = {
                        let ctx = ImportContext {
                            environment: &*self.environment,
                            registry: &*self.registry,
                            types: self.collab.types.as_ref(),
                        };
                        selector.select_imports(current.as_ref(), &ctx)
                    };
                    debug!("选择器 {} 为 {} 选出导入: {:?}", target, current.type_name(), selected);
                    self.process_imports(source, current, selected, &filter, false)?;
                }
                Some(ImportHandler::Deferred(selector)) => {
                    self.state
                        .import_stack
                        .record_edge(source.key(), &target, ImportKind::DeferredSelector);
                    self.handle_deferred(source, &target, selector)?;
                }
                Some(ImportHandler::Registrar(registrar)) => {
                    self.state
                        .import_stack
                        .record_edge(source.key(), &target, ImportKind::Registrar);
                    debug!("登记注册器 {} (导入方 {})", target, current.type_name());
                    source.add_registrar(RegistrarEntry {
                        name: target,
                        registrar,
                        importing: current.clone(),
                    });
                }
                None => {
                    self.state
                        .import_stack
                        .record_edge(source.key(), &target, ImportKind::Plain);
                    self.state.import_stack.register_import(current.clone(), &target);
                    let view = self.collab.types.load(&target)?;
                    let imported = ConfigurationSource::imported(view, source.key());
                    self.process_source(imported, filter)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{Collaborators, ResolutionState};
    use crate::parser::GraphBuilder;
    use crate::resolver::ConfigurationResolver;
    use crate::source::ConfigurationSource;
    use config_impl::Environment;
    use di_impl::{
        DefaultDefinitionRegistry, FixedImportSelector, HandlerCatalog, TypeCatalog, TypeDescriptor,
    };
    use di_abstractions::ExclusionFilter;
    use infrastructure_common::markers::{CONFIGURATION, IMPORT};
    use infrastructure_common::{Marker, ProblemKind, TypeLoader};
    use std::sync::Arc;

    fn collaborators(catalog: TypeCatalog, handlers: HandlerCatalog) -> Collaborators {
        ConfigurationResolver::builder(Arc::new(catalog))
            .handlers(Arc::new(handlers))
            .build()
            .into_collaborators()
    }

    fn config(name: &str, imports: &[&str]) -> TypeDescriptor {
        let mut descriptor = TypeDescriptor::class(name).marker(Marker::new(CONFIGURATION));
        if !imports.is_empty() {
            descriptor = descriptor.marker(Marker::new(IMPORT).with("value", imports.to_vec()));
        }
        descriptor
    }

    #[test]
    fn test_selector_targets_are_expanded_with_merged_filter() {
        let catalog = TypeCatalog::new()
            .with_standard_markers()
            .with(config("app.Root", &["app.Selector"]))
            .with(config("app.P", &[]))
            .with(config("app.Internal", &[]));
        let handlers = HandlerCatalog::new().selector(
            "app.Selector",
            Arc::new(
                FixedImportSelector::new(["app.P", "app.Internal"])
                    .with_exclusion(ExclusionFilter::from_fn(|name| name.ends_with("Internal"))),
            ),
        );
        let collab = collaborators(catalog, handlers);
        let mut environment = Environment::new();
        let mut registry = DefaultDefinitionRegistry::new();
        let mut state = ResolutionState::default();

        let root = collab.types.load("app.Root").unwrap();
        GraphBuilder::new(&collab, &mut environment, &mut registry, &mut state)
            .parse(vec![ConfigurationSource::registered(root, "root")])
            .unwrap();

        assert!(state.sources.contains_key("app.P"));
        assert!(!state.sources.contains_key("app.Internal"));
        assert_eq!(state.import_stack.edges_from("app.Root").count(), 2);
    }

    #[test]
    fn test_missing_plain_target_is_fatal() {
        let catalog = TypeCatalog::new()
            .with_standard_markers()
            .with(config("app.Root", &["app.Missing"]));
        let collab = collaborators(catalog, HandlerCatalog::new());
        let mut environment = Environment::new();
        let mut registry = DefaultDefinitionRegistry::new();
        let mut state = ResolutionState::default();

        let root = collab.types.load("app.Root").unwrap();
        let result = GraphBuilder::new(&collab, &mut environment, &mut registry, &mut state)
            .parse(vec![ConfigurationSource::registered(root, "root")]);
        assert!(result.is_err());
        assert_eq!(state.problems.of_kind(ProblemKind::CircularImport).count(), 0);
    }
}
