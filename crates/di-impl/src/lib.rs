//! # 依赖注入具体实现
//!
//! 提供对象图容器引擎的具体实现：
//!
//! - [`DefaultContainer`] - 容器门面，按名称获取组件并管理单例生命周期
//! - [`DefaultDescriptorRegistry`] - 描述符、别名和父子合并
//! - [`DefaultSingletonRegistry`] - 单例缓存、早期引用和依赖关系
//! - [`ValueResolver`] - 将描述符中的原始值解析为运行时值
//! - [`ConstructorResolver`] - 在候选构造函数和工厂方法中选择最匹配的一个
//! - [`DefaultTypeConverter`] / [`DefaultTypeCatalog`] - 类型转换和类型目录

pub mod arguments;
pub mod catalog;
pub mod constructor_resolver;
pub mod container;
pub mod converter;
pub mod descriptor_registry;
pub mod singleton_registry;
pub mod value_resolver;

pub use arguments::ArgumentsHolder;
pub use catalog::DefaultTypeCatalog;
pub use constructor_resolver::ConstructorResolver;
pub use container::{DefaultContainer, FACTORY_PREFIX};
pub use converter::DefaultTypeConverter;
pub use descriptor_registry::DefaultDescriptorRegistry;
pub use singleton_registry::DefaultSingletonRegistry;
pub use value_resolver::{ArgumentSite, Resolution, ValueResolver};
