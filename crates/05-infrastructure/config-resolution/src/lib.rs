//! # Configuration Resolution
//!
//! 声明式配置解析引擎。从注册表中的配置源出发，展开嵌套配置源、组件扫描、
//! 导入（普通、选择器、延迟分组、注册器）、导入资源与工厂方法，
//! 在条件门控下把整张配置图转换为组件定义写回注册表，直到不再出现新的配置源。
//!
//! ## 核心组件
//!
//! - [`ConfigurationResolver`] - 不动点驱动与对外入口
//! - [`ConfigurationSource`] - 配置图节点
//! - [`ImportStack`] - 导入栈、导入方索引与导入边
//! - [`ResolverSettings`] - 解析器设置
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! let catalog = Arc::new(TypeCatalog::from_toml_file("types.toml")?);
//! let mut resolver = ConfigurationResolver::for_catalog(catalog).build();
//! let mut registry = DefaultDefinitionRegistry::new();
//! registry.register("app", ComponentDefinition::new("app.AppConfig"))?;
//! let summary = resolver.resolve(&mut registry)?;
//! ```

pub mod candidate;
mod context;
mod deferred;
mod emitter;
pub mod import_stack;
mod imports;
mod parser;
mod property_sources;
pub mod resolver;
pub mod settings;
pub mod source;

pub use import_stack::{ImportEdge, ImportKind, ImportStack};
pub use resolver::{
    ConfigurationResolver, ConfigurationResolverBuilder, ResolutionSummary, FILE_READER,
};
pub use settings::{ResolverSettings, DEFAULT_ENV_PREFIX};
pub use source::{ConfigurationSource, FactoryMethod, RegistrarEntry};
