//! # Configuration Implementation
//!
//! 属性配置的具体实现。
//!
//! ## 主要组件
//!
//! - [`Environment`] - 运行环境，按优先级查找属性并解析占位符
//! - [`MutablePropertySources`] - 可变属性源列表
//! - [`MapPropertySource`] - 内存属性源
//! - [`CompositePropertySource`] - 同名属性源的组合
//! - [`PropertySourceLoader`] - TOML / JSON / YAML / properties 文件加载

pub mod environment;
pub mod providers;

pub use environment::*;
pub use providers::*;
