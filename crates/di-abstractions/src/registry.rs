//! 注册表抽象接口

use di_common::{DependencyResult, Instance, InstanceDescriptor, RootDescriptor};
use std::sync::Arc;

/// 描述符注册表 trait
///
/// 保存命名描述符、别名，并负责父子描述符合并和匿名名称生成。
pub trait DescriptorRegistry: Send + Sync {
    /// 注册描述符，同名描述符按覆盖策略替换
    fn register_descriptor(&self, name: &str, descriptor: InstanceDescriptor) -> DependencyResult<()>;

    /// 移除描述符
    fn remove_descriptor(&self, name: &str) -> DependencyResult<InstanceDescriptor>;

    /// 获取原始（未合并）描述符
    fn descriptor(&self, name: &str) -> Option<InstanceDescriptor>;

    /// 是否包含描述符
    fn contains_descriptor(&self, name: &str) -> bool;

    /// 按注册顺序返回所有描述符名称
    fn descriptor_names(&self) -> Vec<String>;

    /// 描述符数量
    fn descriptor_count(&self) -> usize;

    /// 注册别名
    fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()>;

    /// 沿别名链解析出规范名称
    fn canonical_name(&self, name: &str) -> String;

    /// 指向某个名称的所有别名
    fn aliases(&self, name: &str) -> Vec<String>;

    /// 获取合并后的描述符
    fn merged_descriptor(&self, name: &str) -> DependencyResult<Arc<RootDescriptor>>;

    /// 为顶层匿名描述符生成唯一名称：`<base>#<counter>`
    fn generate_name(&self, descriptor: &InstanceDescriptor) -> DependencyResult<String>;

    /// 为内嵌描述符生成名称：`<base>$<identity-token>`
    fn generate_inner_name(&self, descriptor: &InstanceDescriptor, token: &str) -> String;
}

/// 单例注册表 trait
pub trait SingletonRegistry: Send + Sync {
    /// 直接注册外部构建的实例
    fn register_singleton(&self, name: &str, instance: Instance) -> DependencyResult<()>;

    /// 获取已创建的单例；`allow_early` 时也返回创建中暴露的早期引用。从不触发创建。
    fn singleton(&self, name: &str, allow_early: bool) -> Option<Instance>;

    /// 是否包含已创建的单例
    fn contains_singleton(&self, name: &str) -> bool;

    /// 所有单例名称
    fn singleton_names(&self) -> Vec<String>;

    /// 单例数量
    fn singleton_count(&self) -> usize;

    /// 是否正在创建中
    fn is_in_creation(&self, name: &str) -> bool;
}

/// 依赖边接收器
///
/// 接收值解析过程中产生的依赖关系，用于按顺序销毁。
pub trait DependencyEdgeSink: Send + Sync {
    /// `dependent` 依赖 `dependency`
    fn register_dependent(&self, dependency: &str, dependent: &str);

    /// `contained` 是 `owner` 的内嵌组件
    fn register_contained(&self, contained: &str, owner: &str);
}
