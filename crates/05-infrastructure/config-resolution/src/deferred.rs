//! 延迟导入分组
//!
//! 同步阶段收集的延迟导入在全部配置源解析完成后按分组统一处理。
//! 分组内各选择器的结果合并为一个有序的 (导入方, 目标) 序列，再交给普通导入流程。

use crate::parser::GraphBuilder;
use crate::source::ConfigurationSource;
use di_abstractions::{DeferredImportGroup, DeferredImportSelector, ExclusionFilter, ImportContext};
use di_impl::DefaultImportGroup;
use indexmap::IndexMap;
use infrastructure_common::{MetadataView, Problem, ProblemKind, ResolutionResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 一条待处理的延迟导入
#[derive(Clone)]
pub(crate) struct DeferredImport {
    /// 发起导入的配置源
    pub(crate) source_key: String,
    pub(crate) importing: Arc<dyn MetadataView>,
    /// 延迟选择器的类型名
    pub(crate) target: String,
    pub(crate) selector: Arc<dyn DeferredImportSelector>,
}

impl fmt::Debug for DeferredImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredImport")
            .field("source_key", &self.source_key)
            .field("target", &self.target)
            .finish()
    }
}

/// 分组键：选择器声明的键，或未声明时每条导入独占一组
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DeferredGroupKey {
    Declared(String),
    Single(usize),
}

impl fmt::Display for DeferredGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredGroupKey::Declared(key) => f.write_str(key),
            DeferredGroupKey::Single(idx) => write!(f, "#{}", idx),
        }
    }
}

struct Grouping {
    group: Box<dyn DeferredImportGroup>,
    imports: Vec<DeferredImport>,
}

impl GraphBuilder<'_> {
    /// 登记或立即处理一条延迟导入
    pub(crate) fn handle_deferred(
        &mut self,
        source: &mut ConfigurationSource,
        target: &str,
        selector: Arc<dyn DeferredImportSelector>,
    ) -> ResolutionResult<()> {
        let deferred = DeferredImport {
            source_key: source.key().to_string(),
            importing: source.metadata().clone(),
            target: target.to_string(),
            selector,
        };
        match self.state.deferred.as_mut() {
            Some(pending) => {
                debug!("登记延迟导入 {} (导入方 {})", target, source.key());
                pending.push(deferred);
                Ok(())
            }
            None => {
                debug!("分组处理期间发现延迟导入 {}，立即处理", target);
                let groupings = self.group_deferred(vec![deferred]);
                self.process_groupings(groupings, Some(source))
            }
        }
    }

    /// 处理同步阶段收集的全部延迟导入
    pub(crate) fn process_deferred(&mut self) -> ResolutionResult<()> {
        let Some(mut pending) = self.state.deferred.take() else {
            return Ok(());
        };
        if pending.is_empty() {
            self.state.deferred = Some(pending);
            return Ok(());
        }
        pending.sort_by_key(|d| d.selector.order());
        info!("处理 {} 个延迟导入", pending.len());

        let groupings = self.group_deferred(pending);
        let result = self.process_groupings(groupings, None);
        self.state.deferred = Some(Vec::new());
        result
    }

    fn group_deferred(&self, imports: Vec<DeferredImport>) -> IndexMap<DeferredGroupKey, Grouping> {
        let mut groupings: IndexMap<DeferredGroupKey, Grouping> = IndexMap::new();
        for (idx, deferred) in imports.into_iter().enumerate() {
            let key = match deferred.selector.group_key() {
                Some(key) => DeferredGroupKey::Declared(key),
                None => DeferredGroupKey::Single(idx),
            };
            let grouping = groupings.entry(key).or_insert_with_key(|key| Grouping {
                group: match key {
                    DeferredGroupKey::Declared(name) => self.collab.handlers.group_for(name),
                    DeferredGroupKey::Single(_) => Box::new(DefaultImportGroup::new()),
                },
                imports: Vec::new(),
            });
            grouping.imports.push(deferred);
        }
        groupings
    }

    fn process_groupings(
        &mut self,
        groupings: IndexMap<DeferredGroupKey, Grouping>,
        mut current: Option<&mut ConfigurationSource>,
    ) -> ResolutionResult<()> {
        for (key, mut grouping) in groupings {
            let mut filter = self.collab.default_filter.clone();
            {
                let ctx = ImportContext {
                    environment: &*self.environment,
                    registry: &*self.registry,
                    types: self.collab.types.as_ref(),
                };
                for deferred in &grouping.imports {
                    if let Some(extra) = deferred.selector.exclusion_filter() {
                        filter = filter.or(extra);
                    }
                    grouping
                        .group
                        .process(&deferred.importing, deferred.selector.as_ref(), &ctx);
                }
            }

            let entries = grouping.group.select_imports();
            info!(
                "延迟导入分组 {} ({} 个选择器) 产生 {} 个导入",
                key,
                grouping.imports.len(),
                entries.len()
            );
            for entry in entries {
                let importing_key = entry.importing.type_name().to_string();
                match current.as_deref_mut() {
                    Some(source) if source.key() == importing_key => {
                        let view = source.metadata().clone();
                        self.process_imports(source, &view, vec![entry.target], &filter, false)?;
                    }
                    _ => self.process_deferred_entry(&importing_key, entry.target, &filter)?,
                }
            }
        }
        Ok(())
    }

    /// 以配置源表中已有的导入方处理一个分组结果
    fn process_deferred_entry(
        &mut self,
        importing_key: &str,
        target: String,
        filter: &ExclusionFilter,
    ) -> ResolutionResult<()> {
        let Some(mut source) = self.state.sources.get(importing_key).cloned() else {
            self.state.problems.report(Problem::warning(
                ProblemKind::UnknownImportingSource,
                Some(importing_key),
                format!("延迟导入分组返回了未知的导入方，忽略目标 {}", target),
            ));
            return Ok(());
        };

        let registrars_before = source.registrars.len();
        let view = source.metadata().clone();
        self.process_imports(&mut source, &view, vec![target], filter, false)?;

        let added: Vec<_> = source.registrars.drain(registrars_before..).collect();
        if !added.is_empty() {
            if let Some(stored) = self.state.sources.get_mut(importing_key) {
                stored.registrars.extend(added);
            }
        }
        Ok(())
    }
}
