//! # 依赖注入协作者默认实现
//!
//! 提供配置解析所需外部协作者的默认实现：定义注册表、命名策略、条件门控、
//! 内存类型目录、导入处理器目录、组件扫描器与定义文件读取器。

pub mod catalog;
pub mod condition;
pub mod handlers;
pub mod naming;
pub mod reader;
pub mod registry;
pub mod scanner;

pub use catalog::{TypeCatalog, TypeDescriptor};
pub use condition::{Condition, ConditionEvaluator, OnDefinitionCondition, OnPropertyCondition};
pub use handlers::{
    DefaultImportGroup, FixedDeferredSelector, FixedImportSelector, HandlerCatalog,
    PropertyListSelector,
};
pub use naming::{decapitalize, FullyQualifiedNameGenerator, MarkerNameGenerator};
pub use reader::FileDefinitionReader;
pub use registry::DefaultDefinitionRegistry;
pub use scanner::CatalogComponentScanner;
