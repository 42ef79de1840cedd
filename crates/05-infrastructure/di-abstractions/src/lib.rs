//! # Dependency Injection Abstractions
//!
//! 配置解析所依赖的外部协作者接口：组件定义、注册表、命名策略、
//! 条件门控、导入处理、组件扫描与资源读取。
//!
//! ## 核心接口
//!
//! - [`DefinitionRegistry`] - 组件定义注册表接口
//! - [`NameGenerator`] - 组件命名策略
//! - [`ConditionGate`] - 条件门控
//! - [`ImportHandlerFactory`] - 导入目标分类
//! - [`ComponentScanner`] - 组件扫描器接口

pub mod condition;
pub mod definition;
pub mod import;
pub mod naming;
pub mod registry;
pub mod resource;
pub mod scanner;

pub use condition::*;
pub use definition::*;
pub use import::*;
pub use naming::*;
pub use registry::*;
pub use resource::*;
pub use scanner::*;
