//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义容器引擎与其协作者之间的接口。
//!
//! ## 核心接口
//!
//! - [`DescriptorRegistry`] - 描述符注册表接口
//! - [`SingletonRegistry`] - 单例注册表接口
//! - [`ResolutionCallback`] - 值解析回调接口
//! - [`TypeConverter`] - 类型转换器接口
//! - [`ExecutableProvider`] - 候选可执行体提供者接口
//! - [`ComponentContainer`] - 容器接口

pub mod container;
pub mod conversion;
pub mod factory;
pub mod registry;
pub mod resolver;

pub use container::*;
pub use conversion::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
