//! 组件工厂相关的协作接口
//!
//! 提供候选可执行体、类型目录、早期引用钩子和自定义作用域。

use di_common::{ComponentType, DependencyResult, Executable, Instance, TypeInfo};
use std::sync::Arc;

/// 候选可执行体提供者 trait
///
/// 构造函数解析器通过它枚举某个类型的候选构造函数或工厂方法。
pub trait ExecutableProvider: Send + Sync {
    /// 候选构造函数
    fn constructors(&self, component: &ComponentType) -> Vec<Arc<Executable>>;

    /// 名称匹配且静态/实例属性一致的候选工厂方法
    fn factory_methods(
        &self,
        component: &ComponentType,
        name: &str,
        is_static: bool,
    ) -> Vec<Arc<Executable>>;
}

/// 使用组件类型上声明的可执行体
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredExecutables;

impl ExecutableProvider for DeclaredExecutables {
    fn constructors(&self, component: &ComponentType) -> Vec<Arc<Executable>> {
        component.constructors.clone()
    }

    fn factory_methods(
        &self,
        component: &ComponentType,
        name: &str,
        is_static: bool,
    ) -> Vec<Arc<Executable>> {
        component
            .methods
            .iter()
            .filter(|method| method.name == name && method.is_static() == is_static)
            .cloned()
            .collect()
    }
}

/// 类型目录 trait
///
/// 将描述符中的类型名称解析为组件类型或类型信息。
pub trait TypeCatalog: Send + Sync {
    /// 按名称查找组件类型
    fn component_type(&self, name: &str) -> Option<Arc<ComponentType>>;

    /// 按名称查找类型信息（包括基本类型等非组件类型）
    fn type_info(&self, name: &str) -> Option<TypeInfo>;
}

/// 早期引用钩子 trait
///
/// 单例在原始实例化之后、属性填充之前暴露早期引用，用于打破属性注入形成的循环。
/// 每次创建最多调用一次。
pub trait EarlyReferenceHook: Send + Sync {
    /// 是否处理该组件类型
    fn applies_to(&self, _component: &TypeInfo) -> bool {
        true
    }

    /// 包装原始实例，返回要暴露的引用
    fn expose_early(&self, instance: Instance, name: &str) -> Instance;
}

/// 自定义作用域 trait
pub trait CustomScope: Send + Sync {
    /// 从作用域获取实例，不存在时调用 `create` 创建
    fn get(
        &self,
        name: &str,
        create: &mut dyn FnMut() -> DependencyResult<Instance>,
    ) -> DependencyResult<Instance>;

    /// 从作用域移除实例
    fn remove(&self, _name: &str) -> Option<Instance> {
        None
    }
}
