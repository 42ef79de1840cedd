//! 条件门控实现
//!
//! 条件以标记的形式声明：标记名直接对应已登记的条件，或通过
//! `di.context.Conditional` 的 `value` 列出条件名。

use di_abstractions::{ConditionContext, ConditionGate, ConditionTarget, ConfigurationPhase};
use indexmap::IndexMap;
use infrastructure_common::markers::{
    CONDITIONAL, CONDITIONAL_ON_DEFINITION, CONDITIONAL_ON_MISSING_DEFINITION,
    CONDITIONAL_ON_PROPERTY,
};
use infrastructure_common::MarkerAttributes;
use std::sync::Arc;
use tracing::{debug, warn};

/// 条件 trait
pub trait Condition: Send + Sync {
    /// 条件是否满足
    fn matches(&self, ctx: &ConditionContext<'_>, attributes: &MarkerAttributes) -> bool;

    /// 仅在指定阶段求值，`None` 表示所有阶段
    fn phase(&self) -> Option<ConfigurationPhase> {
        None
    }
}

/// 按属性值启用
///
/// 属性：`name`/`value`、`prefix`、`having_value`、`match_if_missing`。
#[derive(Debug, Default, Clone, Copy)]
pub struct OnPropertyCondition;

impl Condition for OnPropertyCondition {
    fn matches(&self, ctx: &ConditionContext<'_>, attributes: &MarkerAttributes) -> bool {
        let names = match attributes.aliased_list("name", "value", CONDITIONAL_ON_PROPERTY, "") {
            Ok(names) => names,
            Err(e) => {
                warn!("属性条件声明无效: {}", e);
                return false;
            }
        };
        if names.is_empty() {
            warn!("属性条件未声明属性名");
            return false;
        }
        let prefix = attributes
            .get_str("prefix")
            .map(|p| p.trim_end_matches('.').to_string());
        let having_value = attributes.get_str("having_value");
        let match_if_missing = attributes.get_bool("match_if_missing", false);

        names.iter().all(|name| {
            let key = match &prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };
            match ctx.environment.get_property(&key) {
                Some(value) => match having_value {
                    Some(expected) => value.eq_ignore_ascii_case(expected),
                    None => !value.eq_ignore_ascii_case("false"),
                },
                None => match_if_missing,
            }
        })
    }
}

/// 按注册表中是否存在定义启用
///
/// 属性：`name` 为组件名列表，`type` 为类型名列表，任一命中即视为存在。
#[derive(Debug, Clone, Copy)]
pub struct OnDefinitionCondition {
    missing: bool,
}

impl OnDefinitionCondition {
    /// 存在时启用
    pub fn present() -> Self {
        Self { missing: false }
    }

    /// 不存在时启用
    pub fn missing() -> Self {
        Self { missing: true }
    }
}

impl Condition for OnDefinitionCondition {
    fn matches(&self, ctx: &ConditionContext<'_>, attributes: &MarkerAttributes) -> bool {
        let names = attributes.get_list("name");
        let types = attributes.get_list("type");
        let found = names.iter().any(|n| ctx.registry.is_name_in_use(n))
            || (!types.is_empty()
                && ctx.registry.names().iter().any(|n| {
                    ctx.registry
                        .get(n)
                        .map(|d| types.contains(&d.type_name))
                        .unwrap_or(false)
                }));
        found != self.missing
    }

    fn phase(&self) -> Option<ConfigurationPhase> {
        Some(ConfigurationPhase::RegisterDefinition)
    }
}

/// 默认条件门控
#[derive(Clone)]
pub struct ConditionEvaluator {
    conditions: IndexMap<String, Arc<dyn Condition>>,
}

impl std::fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator {
    /// 创建带有内置条件的求值器
    pub fn new() -> Self {
        Self::empty()
            .with_condition(CONDITIONAL_ON_PROPERTY, Arc::new(OnPropertyCondition))
            .with_condition(CONDITIONAL_ON_DEFINITION, Arc::new(OnDefinitionCondition::present()))
            .with_condition(
                CONDITIONAL_ON_MISSING_DEFINITION,
                Arc::new(OnDefinitionCondition::missing()),
            )
    }

    /// 不含任何条件
    pub fn empty() -> Self {
        Self {
            conditions: IndexMap::new(),
        }
    }

    /// 以名称登记条件
    pub fn with_condition(
        mut self,
        name: impl Into<String>,
        condition: Arc<dyn Condition>,
    ) -> Self {
        self.conditions.insert(name.into(), condition);
        self
    }

    fn evaluate(
        &self,
        condition_name: &str,
        attributes: &MarkerAttributes,
        phase: ConfigurationPhase,
        ctx: &ConditionContext<'_>,
    ) -> bool {
        let Some(condition) = self.conditions.get(condition_name) else {
            warn!("未登记的条件: {}", condition_name);
            return true;
        };
        match condition.phase() {
            Some(required) if required != phase => true,
            _ => condition.matches(ctx, attributes),
        }
    }
}

impl ConditionGate for ConditionEvaluator {
    fn should_skip(
        &self,
        target: ConditionTarget<'_>,
        phase: ConfigurationPhase,
        ctx: &ConditionContext<'_>,
    ) -> bool {
        for marker in ctx.markers.merged(target.markers()) {
            let matched = if marker.name == CONDITIONAL {
                marker
                    .attributes
                    .get_list("value")
                    .iter()
                    .all(|name| self.evaluate(name, &marker.attributes, phase, ctx))
            } else if self.conditions.contains_key(&marker.name) {
                self.evaluate(&marker.name, &marker.attributes, phase, ctx)
            } else {
                continue;
            };
            if !matched {
                debug!("条件不满足，跳过 {} ({:?}): {}", target.describe(), phase, marker.name);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::registry::DefaultDefinitionRegistry;
    use config_impl::{Environment, MapPropertySource};
    use di_abstractions::{ComponentDefinition, DefinitionRegistry};
    use infrastructure_common::{Marker, MarkerIndex, MethodMetadata};

    struct Fixture {
        registry: DefaultDefinitionRegistry,
        environment: Environment,
        types: Arc<TypeCatalog>,
        markers: MarkerIndex,
    }

    impl Fixture {
        fn new(properties: &[(&str, &str)]) -> Self {
            let mut environment = Environment::new();
            environment.property_sources_mut().add_last(Arc::new(MapPropertySource::from_pairs(
                "test",
                properties.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            )));
            let types = Arc::new(TypeCatalog::new().with_standard_markers());
            Self {
                registry: DefaultDefinitionRegistry::new(),
                environment,
                markers: MarkerIndex::new(types.clone()),
                types,
            }
        }

        fn skip(&self, method: &MethodMetadata, phase: ConfigurationPhase) -> bool {
            let ctx = ConditionContext {
                registry: &self.registry,
                environment: &self.environment,
                types: self.types.as_ref(),
                markers: &self.markers,
            };
            ConditionEvaluator::new().should_skip(ConditionTarget::Method(method), phase, &ctx)
        }
    }

    #[test]
    fn test_property_condition() {
        let fixture = Fixture::new(&[("feature.cache.enabled", "true"), ("mode", "fast")]);
        let enabled = MethodMetadata::new("cache", "app.Cache").with_marker(
            Marker::new(CONDITIONAL_ON_PROPERTY)
                .with("prefix", "feature.cache")
                .with("name", "enabled"),
        );
        assert!(!fixture.skip(&enabled, ConfigurationPhase::ParseConfiguration));

        let wrong_value = MethodMetadata::new("fast", "app.Fast").with_marker(
            Marker::new(CONDITIONAL_ON_PROPERTY)
                .with("name", "mode")
                .with("having_value", "slow"),
        );
        assert!(fixture.skip(&wrong_value, ConfigurationPhase::RegisterDefinition));

        let missing = MethodMetadata::new("m", "app.M").with_marker(
            Marker::new(CONDITIONAL_ON_PROPERTY)
                .with("name", "absent")
                .with("match_if_missing", true),
        );
        assert!(!fixture.skip(&missing, ConfigurationPhase::RegisterDefinition));
    }

    #[test]
    fn test_definition_condition_only_at_register_phase() {
        let mut fixture = Fixture::new(&[]);
        let method = MethodMetadata::new("fallback", "app.DataSource")
            .with_marker(
                Marker::new(CONDITIONAL_ON_MISSING_DEFINITION).with("type", "app.DataSource"),
            );
        assert!(!fixture.skip(&method, ConfigurationPhase::RegisterDefinition));

        fixture
            .registry
            .register("dataSource", ComponentDefinition::new("app.DataSource"))
            .unwrap();
        assert!(fixture.skip(&method, ConfigurationPhase::RegisterDefinition));
        assert!(!fixture.skip(&method, ConfigurationPhase::ParseConfiguration));
    }

    #[test]
    fn test_generic_conditional_marker_lists_conditions() {
        let fixture = Fixture::new(&[]);
        let method = MethodMetadata::new("m", "app.M").with_marker(
            Marker::new(CONDITIONAL)
                .with("value", vec![CONDITIONAL_ON_DEFINITION])
                .with("name", "absent"),
        );
        assert!(fixture.skip(&method, ConfigurationPhase::RegisterDefinition));
    }
}
