//! 集成测试共用的类型目录构造与日志初始化

#![allow(dead_code)]

use config_resolution::{ConfigurationResolver, ConfigurationResolverBuilder, ResolverSettings};
use di_abstractions::{ComponentDefinition, DefinitionOrigin, DefinitionRegistry};
use di_impl::{DefaultDefinitionRegistry, HandlerCatalog, TypeCatalog, TypeDescriptor};
use infrastructure_common::markers::{BEAN, CONFIGURATION, IMPORT};
use infrastructure_common::{Marker, MethodMetadata};
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

/// 初始化测试日志，多次调用只生效一次
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// 完整模式配置源
pub fn configuration(name: &str) -> TypeDescriptor {
    TypeDescriptor::class(name).marker(Marker::new(CONFIGURATION))
}

/// 导入指定目标的配置源
pub fn importing(name: &str, targets: &[&str]) -> TypeDescriptor {
    configuration(name).marker(Marker::new(IMPORT).with("value", targets.to_vec()))
}

pub fn bean(name: &str, return_type: &str) -> MethodMetadata {
    MethodMetadata::new(name, return_type).with_marker(Marker::new(BEAN))
}

/// 带显式名称（首个为名称，其余为别名）的工厂方法
pub fn named_bean(method: &str, return_type: &str, names: &[&str]) -> MethodMetadata {
    MethodMetadata::new(method, return_type)
        .with_marker(Marker::new(BEAN).with("name", names.to_vec()))
}

pub fn builder(catalog: TypeCatalog, handlers: HandlerCatalog) -> ConfigurationResolverBuilder {
    init_test_logger();
    ConfigurationResolver::for_catalog(Arc::new(catalog.with_standard_markers()))
        .handlers(Arc::new(handlers))
}

/// 不因结构性问题失败的设置
pub fn lenient_settings() -> ResolverSettings {
    ResolverSettings {
        fail_on_problems: false,
        ..ResolverSettings::default()
    }
}

pub fn registry_with(roots: &[(&str, &str)]) -> DefaultDefinitionRegistry {
    let mut registry = DefaultDefinitionRegistry::new();
    for (name, type_name) in roots {
        registry
            .register(name, ComponentDefinition::new(*type_name))
            .expect("register root");
    }
    registry
}

/// 工厂方法定义所在的配置源
pub fn declaring_source(registry: &dyn DefinitionRegistry, name: &str) -> Option<String> {
    match &registry.get(name)?.origin {
        DefinitionOrigin::FactoryMethod { source, .. } => Some(source.clone()),
        _ => None,
    }
}

pub fn sorted_names(registry: &dyn DefinitionRegistry) -> Vec<String> {
    let mut names = registry.names();
    names.sort();
    names
}
