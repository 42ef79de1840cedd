//! 条件门控抽象接口

use crate::registry::DefinitionRegistry;
use config_abstractions::PropertyResolver;
use infrastructure_common::{Marker, MarkerIndex, MetadataView, MethodMetadata, TypeLoader};

/// 条件求值阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigurationPhase {
    /// 解析配置源时
    ParseConfiguration,
    /// 注册组件定义时
    RegisterDefinition,
}

/// 条件求值目标：类型或工厂方法
#[derive(Debug, Clone, Copy)]
pub enum ConditionTarget<'a> {
    Type(&'a dyn MetadataView),
    Method(&'a MethodMetadata),
}

impl<'a> ConditionTarget<'a> {
    /// 直接声明的标记
    pub fn markers(&self) -> &'a [Marker] {
        match self {
            ConditionTarget::Type(view) => view.markers(),
            ConditionTarget::Method(method) => &method.markers,
        }
    }

    /// 用于日志的可读名称
    pub fn describe(&self) -> String {
        match self {
            ConditionTarget::Type(view) => view.type_name().to_string(),
            ConditionTarget::Method(method) => method.qualified_name(),
        }
    }
}

/// 条件求值上下文
pub struct ConditionContext<'a> {
    pub registry: &'a dyn DefinitionRegistry,
    pub environment: &'a dyn PropertyResolver,
    pub types: &'a dyn TypeLoader,
    pub markers: &'a MarkerIndex,
}

/// 条件门控
pub trait ConditionGate: Send + Sync {
    /// 目标在给定阶段是否应被跳过
    fn should_skip(
        &self,
        target: ConditionTarget<'_>,
        phase: ConfigurationPhase,
        ctx: &ConditionContext<'_>,
    ) -> bool;
}
