//! 组件描述符
//!
//! [`InstanceDescriptor`] 描述如何构建一个命名组件。描述符由配置解析器产生，注册后不再修改；
//! 解析器只在合并后的 [`RootDescriptor`] 上写入解析缓存。

use crate::component::{ComponentType, Executable};
use crate::errors::{DependencyError, DependencyResult};
use crate::instance::Instance;
use crate::lifecycle::Scope;
use crate::value::Value;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 构造参数值
#[derive(Debug, Clone)]
pub struct ArgumentValue {
    /// 原始值
    pub value: Value,
    /// 声明的类型提示
    pub type_hint: Option<String>,
    /// 声明的参数名称
    pub name: Option<String>,
}

impl ArgumentValue {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            type_hint: None,
            name: None,
        }
    }

    /// 指定类型提示
    pub fn with_type(mut self, type_hint: impl Into<String>) -> Self {
        self.type_hint = Some(type_hint.into());
        self
    }

    /// 指定参数名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// 构造参数集合：按位置索引的参数加上未指定位置的通用参数
#[derive(Debug, Clone, Default)]
pub struct ConstructorArguments {
    pub indexed: BTreeMap<usize, ArgumentValue>,
    pub generic: Vec<ArgumentValue>,
}

impl ConstructorArguments {
    /// 添加按位置索引的参数，同一位置后者覆盖前者
    pub fn add_indexed(&mut self, index: usize, argument: ArgumentValue) {
        self.indexed.insert(index, argument);
    }

    /// 添加通用参数
    pub fn add_generic(&mut self, argument: ArgumentValue) {
        self.generic.push(argument);
    }

    /// 参数总数
    pub fn argument_count(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// 合并子描述符的参数：按位置的参数覆盖，通用参数追加
    pub fn merge(&mut self, child: &ConstructorArguments) {
        for (index, argument) in &child.indexed {
            self.indexed.insert(*index, argument.clone());
        }
        self.generic.extend(child.generic.iter().cloned());
    }
}

/// 自动装配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutowireMode {
    #[default]
    No,
    /// 构造函数/工厂方法中未绑定的参数按类型从容器中查找
    Constructor,
}

/// 属性值
#[derive(Debug, Clone)]
pub struct PropertyValue {
    pub name: String,
    pub value: Value,
}

/// 组件描述符
#[derive(Debug, Clone, Default)]
pub struct InstanceDescriptor {
    /// 父描述符名称
    pub parent: Option<String>,
    /// 目标类型名称
    pub type_name: Option<String>,
    /// 工厂组件名称（实例工厂方法）
    pub factory_owner: Option<String>,
    /// 工厂方法名称
    pub factory_method: Option<String>,
    /// 构造参数
    pub constructor_args: ConstructorArguments,
    /// 属性
    pub properties: Vec<PropertyValue>,
    /// 作用域，未设置时为单例
    pub scope: Option<Scope>,
    /// 是否延迟初始化
    pub lazy_init: Option<bool>,
    /// 自动装配模式
    pub autowire: Option<AutowireMode>,
    /// 是否宽松匹配构造函数
    pub lenient: Option<bool>,
    /// 需要先创建的组件
    pub depends_on: Vec<String>,
    /// 抽象描述符只能作为模板
    pub is_abstract: bool,
    /// 按类型装配时的首选候选
    pub primary: bool,
}

impl InstanceDescriptor {
    /// 通过构造函数创建指定类型
    pub fn of_type(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// 继承父描述符
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    /// 通过类型上的静态工厂方法创建
    pub fn static_factory(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            factory_method: Some(method.into()),
            ..Self::default()
        }
    }

    /// 通过另一个组件的实例工厂方法创建
    pub fn instance_factory(owner: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            factory_owner: Some(owner.into()),
            factory_method: Some(method.into()),
            ..Self::default()
        }
    }

    /// 添加通用参数
    pub fn with_arg(mut self, value: Value) -> Self {
        self.constructor_args.add_generic(ArgumentValue::new(value));
        self
    }

    /// 添加按位置的参数
    pub fn with_indexed_arg(mut self, index: usize, value: Value) -> Self {
        self.constructor_args
            .add_indexed(index, ArgumentValue::new(value));
        self
    }

    /// 添加带类型提示的通用参数
    pub fn with_typed_arg(mut self, value: Value, type_hint: impl Into<String>) -> Self {
        self.constructor_args
            .add_generic(ArgumentValue::new(value).with_type(type_hint));
        self
    }

    /// 添加带名称的通用参数
    pub fn with_named_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.constructor_args
            .add_generic(ArgumentValue::new(value).with_name(name));
        self
    }

    /// 添加属性，同名属性后者覆盖前者
    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.properties.retain(|property| property.name != name);
        self.properties.push(PropertyValue { name, value });
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn prototype(self) -> Self {
        self.with_scope(Scope::Prototype)
    }

    pub fn lazy(mut self) -> Self {
        self.lazy_init = Some(true);
        self
    }

    pub fn autowire_constructor(mut self) -> Self {
        self.autowire = Some(AutowireMode::Constructor);
        self
    }

    pub fn strict(mut self) -> Self {
        self.lenient = Some(false);
        self
    }

    pub fn lenient(mut self) -> Self {
        self.lenient = Some(true);
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// 生效的作用域
    pub fn effective_scope(&self) -> Scope {
        self.scope.clone().unwrap_or_default()
    }

    pub fn is_singleton(&self) -> bool {
        self.effective_scope().is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.effective_scope().is_prototype()
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    /// 是否宽松匹配，未设置时使用容器默认值
    pub fn is_lenient(&self, default: bool) -> bool {
        self.lenient.unwrap_or(default)
    }

    pub fn autowires_constructor(&self) -> bool {
        self.autowire == Some(AutowireMode::Constructor)
    }

    pub fn has_factory_method(&self) -> bool {
        self.factory_method.is_some()
    }

    /// 与父描述符合并，子描述符中设置的字段优先
    pub fn merged_with_parent(&self, parent: &InstanceDescriptor) -> InstanceDescriptor {
        let mut merged = parent.clone();
        merged.parent = None;
        if self.type_name.is_some() {
            merged.type_name.clone_from(&self.type_name);
        }
        if self.factory_method.is_some() {
            merged.factory_owner.clone_from(&self.factory_owner);
            merged.factory_method.clone_from(&self.factory_method);
        }
        merged.constructor_args.merge(&self.constructor_args);
        for property in &self.properties {
            merged.properties.retain(|existing| existing.name != property.name);
            merged.properties.push(property.clone());
        }
        if self.scope.is_some() {
            merged.scope.clone_from(&self.scope);
        }
        if self.lazy_init.is_some() {
            merged.lazy_init = self.lazy_init;
        }
        if self.autowire.is_some() {
            merged.autowire = self.autowire;
        }
        if self.lenient.is_some() {
            merged.lenient = self.lenient;
        }
        if !self.depends_on.is_empty() {
            merged.depends_on.clone_from(&self.depends_on);
        }
        merged.is_abstract = self.is_abstract;
        merged.primary = self.primary;
        merged
    }

    /// 校验合并后的描述符
    pub fn validate(&self, name: &str) -> DependencyResult<()> {
        if self.factory_owner.is_some() && self.factory_method.is_none() {
            return Err(DependencyError::invalid_descriptor(
                name,
                "指定了工厂组件但没有指定工厂方法",
            ));
        }
        if self.factory_owner.as_deref() == Some(name) {
            return Err(DependencyError::invalid_descriptor(
                name,
                "工厂组件不能是自身",
            ));
        }
        if !self.is_abstract && self.type_name.is_none() && self.factory_owner.is_none() {
            return Err(DependencyError::invalid_descriptor(
                name,
                "没有指定类型或工厂组件",
            ));
        }
        Ok(())
    }
}

/// 缓存的参数准备结果
#[derive(Debug, Clone)]
pub enum PreparedArgument {
    /// 已转换的稳定值
    Converted(Option<Instance>),
    /// 每次调用都需要重新解析的原始值
    Raw(Value),
    /// 自动装配的参数，每次调用按类型重新查找
    Autowired,
}

/// 缓存的参数
#[derive(Debug, Clone)]
pub enum CachedArguments {
    /// 全部参数已解析为最终值
    Resolved(Vec<Option<Instance>>),
    /// 参数模板，创建时还需要轻量的解析过程
    Prepared(Vec<PreparedArgument>),
}

impl CachedArguments {
    /// 是否需要重新解析
    pub fn resolve_necessary(&self) -> bool {
        matches!(self, Self::Prepared(_))
    }
}

/// 构造函数/工厂方法的选择结果
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub executable: Arc<Executable>,
    pub arguments: CachedArguments,
}

/// 描述符上的解析缓存
///
/// 保存一个不可变的 [`ResolutionOutcome`]，整体替换。并发写入时后写者生效，
/// 所有写入者由同一个描述符状态推导出同样的结果。
#[derive(Debug, Default)]
pub struct ResolutionCache {
    outcome: RwLock<Option<Arc<ResolutionOutcome>>>,
}

impl ResolutionCache {
    pub fn get(&self) -> Option<Arc<ResolutionOutcome>> {
        self.outcome.read().clone()
    }

    pub fn store(&self, outcome: ResolutionOutcome) {
        *self.outcome.write() = Some(Arc::new(outcome));
    }

    pub fn clear(&self) {
        *self.outcome.write() = None;
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.read().is_some()
    }
}

/// 合并后的描述符，以及解析过程写入的缓存
#[derive(Debug)]
pub struct RootDescriptor {
    pub name: String,
    pub definition: InstanceDescriptor,
    resolved_type: OnceCell<Arc<ComponentType>>,
    cache: ResolutionCache,
}

impl RootDescriptor {
    pub fn new(name: impl Into<String>, definition: InstanceDescriptor) -> Self {
        Self {
            name: name.into(),
            definition,
            resolved_type: OnceCell::new(),
            cache: ResolutionCache::default(),
        }
    }

    /// 已解析的组件类型
    pub fn resolved_type(&self) -> Option<&Arc<ComponentType>> {
        self.resolved_type.get()
    }

    /// 延迟解析组件类型，只解析一次
    pub fn resolve_type_with<F>(&self, resolve: F) -> DependencyResult<Arc<ComponentType>>
    where
        F: FnOnce() -> DependencyResult<Arc<ComponentType>>,
    {
        self.resolved_type.get_or_try_init(resolve).cloned()
    }

    /// 解析缓存
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }
}
