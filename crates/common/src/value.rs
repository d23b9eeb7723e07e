//! 配置值模型
//!
//! [`Value`] 是描述符中参数和属性的原始形式，[`ResolvedValue`] 是值解析之后、类型转换之前的形式。

use crate::descriptor::InstanceDescriptor;
use crate::instance::Instance;
use crate::metadata::TypeInfo;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 原始配置值
#[derive(Debug, Clone)]
pub enum Value {
    /// null
    Null,
    /// 字面量，可能包含表达式
    Literal(String),
    /// 带目标类型的字面量
    Typed(TypedLiteral),
    /// 按名称引用其他组件
    Reference(Reference),
    /// 内嵌的匿名组件描述
    Nested(NestedDescriptor),
    /// 有序列表
    List(ManagedCollection),
    /// 无序集合
    Set(ManagedCollection),
    /// 键值映射
    Map(ManagedMap),
    /// 字符串属性表，每个值单独求值
    Properties(BTreeMap<String, String>),
    /// 已经构建好的实例
    Instance(Instance),
}

impl Value {
    /// 字面量
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// 带目标类型的字面量
    pub fn typed(value: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::Typed(TypedLiteral::new(value, Some(target_type.into())))
    }

    /// 引用
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(Reference {
            name: name.into(),
            to_parent: false,
        })
    }

    /// 引用父容器中的组件
    pub fn parent_reference(name: impl Into<String>) -> Self {
        Self::Reference(Reference {
            name: name.into(),
            to_parent: true,
        })
    }

    /// 匿名内嵌组件
    pub fn nested(descriptor: InstanceDescriptor) -> Self {
        Self::Nested(NestedDescriptor {
            name: None,
            descriptor: Arc::new(descriptor),
        })
    }

    /// 命名内嵌组件
    pub fn named_nested(name: impl Into<String>, descriptor: InstanceDescriptor) -> Self {
        Self::Nested(NestedDescriptor {
            name: Some(name.into()),
            descriptor: Arc::new(descriptor),
        })
    }

    /// 有序列表
    pub fn list(elements: Vec<Value>) -> Self {
        Self::List(ManagedCollection::new(elements))
    }

    /// 无序集合
    pub fn set(elements: Vec<Value>) -> Self {
        Self::Set(ManagedCollection::new(elements))
    }

    /// 键值映射
    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Self::Map(ManagedMap {
            entries,
            key_type: None,
            value_type: None,
        })
    }

    /// 字符串属性表
    pub fn properties<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Properties(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// 已构建的实例
    pub fn instance(instance: Instance) -> Self {
        Self::Instance(instance)
    }

    /// 用于诊断信息的值类型名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Literal(_) | Self::Typed(_) => "String",
            Self::Reference(_) => "reference",
            Self::Nested(_) => "nested",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Properties(_) => "properties",
            Self::Instance(_) => "instance",
        }
    }
}

/// 带目标类型的字面量
#[derive(Debug, Clone)]
pub struct TypedLiteral {
    pub value: String,
    pub target_type: Option<String>,
    dynamic: Arc<AtomicBool>,
}

impl TypedLiteral {
    pub fn new(value: impl Into<String>, target_type: Option<String>) -> Self {
        Self {
            value: value.into(),
            target_type,
            dynamic: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 是否需要每次重新求值
    pub fn is_dynamic(&self) -> bool {
        self.dynamic.load(Ordering::Acquire)
    }

    /// 标记为动态值，此后不再缓存其转换结果
    ///
    /// 标记在克隆之间共享，合并后的描述符也能观察到。
    pub fn mark_dynamic(&self) {
        self.dynamic.store(true, Ordering::Release);
    }
}

/// 组件引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub to_parent: bool,
}

/// 内嵌组件描述
#[derive(Debug, Clone)]
pub struct NestedDescriptor {
    pub name: Option<String>,
    pub descriptor: Arc<InstanceDescriptor>,
}

impl NestedDescriptor {
    /// 标识令牌，同一个内嵌描述在每次解析时保持不变
    pub fn identity_token(&self) -> String {
        format!("{:x}", Arc::as_ptr(&self.descriptor) as usize)
    }
}

/// 列表或集合
#[derive(Debug, Clone)]
pub struct ManagedCollection {
    pub elements: Vec<Value>,
    pub element_type: Option<String>,
}

impl ManagedCollection {
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements,
            element_type: None,
        }
    }

    /// 指定元素类型
    pub fn with_element_type(mut self, element_type: impl Into<String>) -> Self {
        self.element_type = Some(element_type.into());
        self
    }
}

/// 键值映射
#[derive(Debug, Clone)]
pub struct ManagedMap {
    pub entries: Vec<(Value, Value)>,
    pub key_type: Option<String>,
    pub value_type: Option<String>,
}

/// 解析后的值
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Null,
    Text(String),
    Object(Instance),
    List(Vec<ResolvedValue>),
    Set(Vec<ResolvedValue>),
    Map(Vec<(ResolvedValue, ResolvedValue)>),
    Properties(BTreeMap<String, String>),
}

impl ResolvedValue {
    /// 值的类型信息，null 没有类型
    pub fn value_type(&self) -> Option<TypeInfo> {
        match self {
            Self::Null => None,
            Self::Text(_) => Some(TypeInfo::of::<String>()),
            Self::Object(instance) => Some(instance.type_info().clone()),
            Self::List(_) => Some(TypeInfo::concrete("list")),
            Self::Set(_) => Some(TypeInfo::concrete("set")),
            Self::Map(_) => Some(TypeInfo::concrete("map")),
            Self::Properties(_) => Some(TypeInfo::of::<BTreeMap<String, String>>()),
        }
    }

    /// 值的类型名称
    pub fn type_name(&self) -> String {
        self.value_type()
            .map_or_else(|| "null".to_string(), |info| info.short_name().to_string())
    }

    /// 不经转换能否直接赋值给 `target`
    pub fn is_assignable_to(&self, target: &TypeInfo) -> bool {
        match self.value_type() {
            None => !target.is_primitive(),
            Some(value_type) => target.is_assignable_from(&value_type),
        }
    }

    /// 直接取出实例（仅对象和 null 有意义）
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Object(instance) => Some(instance),
            _ => None,
        }
    }
}
