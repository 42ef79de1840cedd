//! 导入处理抽象接口
//!
//! 导入目标分为四类：选择器、延迟选择器、注册器以及普通配置源。
//! 前三类由 [`ImportHandlerFactory`] 按目标类型名提供，其余目标一律视为普通配置源。

use crate::naming::NameGenerator;
use crate::registry::DefinitionRegistry;
use config_abstractions::PropertyResolver;
use infrastructure_common::markers::LOWEST_PRECEDENCE;
use infrastructure_common::{MetadataView, ResolutionError, TypeLoader};
use std::fmt;
use std::sync::Arc;

/// 选择器求值上下文
pub struct ImportContext<'a> {
    pub environment: &'a dyn PropertyResolver,
    pub registry: &'a dyn DefinitionRegistry,
    pub types: &'a dyn TypeLoader,
}

/// 导入候选排除谓词
///
/// 多个谓词以逻辑或组合，任一命中即排除。
#[derive(Clone, Default)]
pub struct ExclusionFilter {
    predicates: Vec<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl ExclusionFilter {
    /// 不排除任何候选
    pub fn none() -> Self {
        Self::default()
    }

    /// 排除带有任一前缀的类型名
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        Self::from_fn(move |name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
    }

    pub fn from_fn(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicates: vec![Arc::new(predicate)],
        }
    }

    /// 与另一谓词做逻辑或
    pub fn or(mut self, other: ExclusionFilter) -> Self {
        self.predicates.extend(other.predicates);
        self
    }

    pub fn matches(&self, type_name: &str) -> bool {
        self.predicates.iter().any(|p| p(type_name))
    }
}

impl fmt::Debug for ExclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionFilter")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// 导入选择器：按需计算进一步的导入目标
pub trait ImportSelector: Send + Sync {
    fn select_imports(&self, importing: &dyn MetadataView, ctx: &ImportContext<'_>) -> Vec<String>;

    /// 追加到当前排除谓词上的谓词
    fn exclusion_filter(&self) -> Option<ExclusionFilter> {
        None
    }
}

/// 延迟导入选择器
///
/// 在全部同步导入处理完成后才被求值，可通过分组键与其他延迟选择器合并结果。
pub trait DeferredImportSelector: Send + Sync {
    fn select_imports(&self, importing: &dyn MetadataView, ctx: &ImportContext<'_>) -> Vec<String>;

    fn exclusion_filter(&self) -> Option<ExclusionFilter> {
        None
    }

    /// 分组键，`None` 表示单独成组
    fn group_key(&self) -> Option<String> {
        None
    }

    /// 顺序值，越小越先处理
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// 延迟导入分组的一条结果
#[derive(Debug, Clone)]
pub struct GroupEntry {
    /// 发起导入的类型元数据
    pub importing: Arc<dyn MetadataView>,
    /// 目标类型名
    pub target: String,
}

/// 延迟导入分组
pub trait DeferredImportGroup: Send {
    /// 消费一个延迟选择器的声明
    fn process(
        &mut self,
        importing: &Arc<dyn MetadataView>,
        selector: &dyn DeferredImportSelector,
        ctx: &ImportContext<'_>,
    );

    /// 分组最终的有序导入结果
    fn select_imports(&mut self) -> Vec<GroupEntry>;
}

/// 定义注册器：向注册表直接添加任意定义
pub trait DefinitionRegistrar: Send + Sync {
    fn register_definitions(
        &self,
        importing: &dyn MetadataView,
        registry: &mut dyn DefinitionRegistry,
        names: &dyn NameGenerator,
    ) -> Result<(), ResolutionError>;
}

/// 导入目标的处理方式
#[derive(Clone)]
pub enum ImportHandler {
    Selector(Arc<dyn ImportSelector>),
    Deferred(Arc<dyn DeferredImportSelector>),
    Registrar(Arc<dyn DefinitionRegistrar>),
}

impl fmt::Debug for ImportHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportHandler::Selector(_) => f.write_str("ImportHandler::Selector"),
            ImportHandler::Deferred(_) => f.write_str("ImportHandler::Deferred"),
            ImportHandler::Registrar(_) => f.write_str("ImportHandler::Registrar"),
        }
    }
}

/// 导入处理器工厂
pub trait ImportHandlerFactory: Send + Sync {
    /// 目标类型对应的处理器，`None` 表示普通配置源
    fn handler_for(&self, target: &str) -> Option<ImportHandler>;

    /// 创建分组键对应的延迟导入分组
    fn group_for(&self, group_key: &str) -> Box<dyn DeferredImportGroup>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_filter_or_combination() {
        let filter = ExclusionFilter::prefixes(["core.annotation."]);
        assert!(filter.matches("core.annotation.Retention"));
        assert!(!filter.matches("app.Config"));

        let combined = filter.or(ExclusionFilter::from_fn(|name| name.ends_with("Internal")));
        assert!(combined.matches("app.ConfigInternal"));
        assert!(combined.matches("core.annotation.Documented"));
        assert!(!combined.matches("app.Config"));
        assert!(!ExclusionFilter::none().matches("anything"));
    }
}
