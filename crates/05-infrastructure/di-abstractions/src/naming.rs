//! 组件命名策略

use crate::definition::ComponentDefinition;
use crate::registry::DefinitionRegistry;
use infrastructure_common::ResolutionError;

/// 组件名称生成器
///
/// 对相同输入必须给出相同结果。
pub trait NameGenerator: Send + Sync {
    fn generate_name(
        &self,
        definition: &ComponentDefinition,
        registry: &dyn DefinitionRegistry,
    ) -> Result<String, ResolutionError>;
}
