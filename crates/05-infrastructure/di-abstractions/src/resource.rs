//! 外部资源读取与配置源增强

use crate::registry::DefinitionRegistry;
use infrastructure_common::ResolutionError;

/// 资源定义读取器
///
/// 从外部资源文件加载组件定义并注册到注册表。
pub trait ResourceDefinitionReader: Send + Sync {
    /// 读取器可处理的文件扩展名
    fn extensions(&self) -> &[&'static str];

    /// 加载并注册定义，返回注册数量
    ///
    /// 文件读取与解析失败以 [`ResolutionError::Config`] 返回。
    fn load_definitions(
        &self,
        location: &str,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<usize, ResolutionError>;
}

/// 配置源增强钩子
///
/// 对完整模式的配置源返回替代类型名，用于拦截工厂方法调用。
pub trait ConfigurationEnhancer: Send + Sync {
    fn enhance(&self, type_name: &str) -> Result<String, ResolutionError>;
}
