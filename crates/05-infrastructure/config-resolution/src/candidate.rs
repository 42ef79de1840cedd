//! 配置源候选检查

use di_abstractions::{ComponentDefinition, ConfigurationMode};
use infrastructure_common::markers::{
    BEAN, COMPONENT, COMPONENT_SCAN, CONFIGURATION, IMPORT, IMPORT_RESOURCE, LOWEST_PRECEDENCE,
    ORDER,
};
use infrastructure_common::{MarkerIndex, MetadataView, TypeLoader};
use tracing::debug;

/// 出现任一即视为轻量配置源的标记
const CANDIDATE_INDICATORS: [&str; 4] = [COMPONENT, COMPONENT_SCAN, IMPORT, IMPORT_RESOURCE];

/// 类型是否可作为配置源（完整或轻量）
pub fn is_configuration_candidate(view: &dyn MetadataView, markers: &MarkerIndex) -> bool {
    classify(view, markers).is_some()
}

/// 判定配置源模式，接口永不作为配置源
pub fn classify(view: &dyn MetadataView, markers: &MarkerIndex) -> Option<ConfigurationMode> {
    if view.is_interface() {
        return None;
    }
    if let Some(attrs) = markers.find(view, CONFIGURATION) {
        if attrs.get_bool("proxy_bean_methods", true) {
            return Some(ConfigurationMode::Full);
        }
        return Some(ConfigurationMode::Lite);
    }
    let indicated = CANDIDATE_INDICATORS
        .iter()
        .any(|indicator| markers.is_present(view, indicator));
    if indicated || !view.methods_with_marker(BEAN).is_empty() {
        Some(ConfigurationMode::Lite)
    } else {
        None
    }
}

/// 是否为完整模式配置源
pub fn is_full(view: &dyn MetadataView, markers: &MarkerIndex) -> bool {
    classify(view, markers) == Some(ConfigurationMode::Full)
}

/// 顺序提示，未声明时为最低优先级
pub fn order_of(view: &dyn MetadataView, markers: &MarkerIndex) -> i32 {
    markers
        .find(view, ORDER)
        .and_then(|attrs| attrs.get_int("value"))
        .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .unwrap_or(LOWEST_PRECEDENCE)
}

/// 检查注册表中的定义是否为配置源候选，是则在定义上记录模式与顺序
///
/// 工厂方法定义与无法加载类型的定义不是候选。
pub fn check_definition(
    definition: &mut ComponentDefinition,
    types: &dyn TypeLoader,
    markers: &MarkerIndex,
) -> bool {
    if definition.is_factory_method() || definition.type_name.is_empty() {
        return false;
    }
    let view = match types.load(&definition.type_name) {
        Ok(view) => view,
        Err(e) => {
            debug!("无法加载定义类型 {}，不作为配置源: {}", definition.type_name, e);
            return false;
        }
    };
    let Some(mode) = classify(view.as_ref(), markers) else {
        return false;
    };
    definition.configuration_mode = Some(mode);
    definition.order = Some(order_of(view.as_ref(), markers));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_impl::{TypeCatalog, TypeDescriptor};
    use infrastructure_common::{Marker, MethodMetadata};
    use std::sync::Arc;

    fn catalog() -> Arc<TypeCatalog> {
        Arc::new(
            TypeCatalog::new()
                .with_standard_markers()
                .with(
                    TypeDescriptor::class("app.Full")
                        .marker(Marker::new(CONFIGURATION))
                        .marker(Marker::new(ORDER).with("value", 5i64)),
                )
                .with(TypeDescriptor::class("app.NoProxy").marker(
                    Marker::new(CONFIGURATION).with("proxy_bean_methods", false),
                ))
                .with(TypeDescriptor::class("app.Service").marker(Marker::new(
                    infrastructure_common::markers::SERVICE,
                )))
                .with(
                    TypeDescriptor::class("app.Factories").method(
                        MethodMetadata::new("clock", "app.Clock").with_marker(Marker::new(BEAN)),
                    ),
                )
                .with(TypeDescriptor::class("app.Plain"))
                .with(TypeDescriptor::interface("app.Api").marker(Marker::new(CONFIGURATION))),
        )
    }

    #[test]
    fn test_classification() {
        let types = catalog();
        let markers = MarkerIndex::new(types.clone());
        let mode = |name: &str| classify(types.load(name).unwrap().as_ref(), &markers);

        assert_eq!(mode("app.Full"), Some(ConfigurationMode::Full));
        assert_eq!(mode("app.NoProxy"), Some(ConfigurationMode::Lite));
        // Service 经由元标记蕴含 Component
        assert_eq!(mode("app.Service"), Some(ConfigurationMode::Lite));
        assert_eq!(mode("app.Factories"), Some(ConfigurationMode::Lite));
        assert_eq!(mode("app.Plain"), None);
        assert_eq!(mode("app.Api"), None);
    }

    #[test]
    fn test_check_definition_records_mode_and_order() {
        let types = catalog();
        let markers = MarkerIndex::new(types.clone());

        let mut full = ComponentDefinition::new("app.Full");
        assert!(check_definition(&mut full, types.as_ref(), &markers));
        assert_eq!(full.configuration_mode, Some(ConfigurationMode::Full));
        assert_eq!(full.order, Some(5));

        let mut lite = ComponentDefinition::new("app.Factories");
        assert!(check_definition(&mut lite, types.as_ref(), &markers));
        assert_eq!(lite.order, Some(LOWEST_PRECEDENCE));

        let mut missing = ComponentDefinition::new("app.Missing");
        assert!(!check_definition(&mut missing, types.as_ref(), &markers));
        assert!(missing.configuration_mode.is_none());
    }
}
