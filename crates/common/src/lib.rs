//! # DI Common
//!
//! 对象图容器的公共模型，被抽象层和实现层共同使用。
//!
//! ## 核心类型
//!
//! - [`InstanceDescriptor`] - 组件描述符
//! - [`Value`] - 参数和属性的原始值
//! - [`ComponentType`] / [`Executable`] - 与反射无关的类型模型
//! - [`Instance`] - 运行时实例
//! - [`DependencyError`] - 错误类型

pub mod component;
pub mod descriptor;
pub mod errors;
pub mod instance;
pub mod lifecycle;
pub mod metadata;
pub mod value;

pub use component::*;
pub use descriptor::*;
pub use errors::*;
pub use instance::*;
pub use lifecycle::*;
pub use metadata::*;
pub use value::*;
