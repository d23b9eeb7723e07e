//! 元数据定义
//!
//! 提供与语言反射无关的类型信息：名称、类型ID、类层级和接口列表。

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// 具体类型
    Concrete,
    /// 基本类型（数值、布尔、字符），不接受 null
    Primitive,
    /// 接口（trait），通过实现列表判断可赋值性
    Interface,
    /// 任意类型，所有值都可以赋值
    Any,
}

/// 类型信息
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// 类型名称
    pub name: Cow<'static, str>,
    /// 类型ID（接口和任意类型没有）
    pub id: Option<TypeId>,
    /// 类型种类
    pub kind: TypeKind,
    /// 父类链，由近及远
    pub superclasses: Vec<Cow<'static, str>>,
    /// 实现的接口
    pub interfaces: Vec<Cow<'static, str>>,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: ?Sized + 'static>() -> Self {
        let id = TypeId::of::<T>();
        Self {
            name: Cow::Borrowed(std::any::type_name::<T>()),
            id: Some(id),
            kind: if is_primitive(id) {
                TypeKind::Primitive
            } else {
                TypeKind::Concrete
            },
            superclasses: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    /// 从类型名称创建具体类型信息（用于配置）
    pub fn concrete(name: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(name, TypeKind::Concrete)
    }

    /// 创建接口类型信息
    pub fn interface(name: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    /// 任意类型
    pub fn any() -> Self {
        Self::with_kind("any", TypeKind::Any)
    }

    fn with_kind(name: impl Into<Cow<'static, str>>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            id: None,
            kind,
            superclasses: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    /// 追加父类
    pub fn extends(mut self, superclass: impl Into<Cow<'static, str>>) -> Self {
        self.superclasses.push(superclass.into());
        self
    }

    /// 追加接口
    pub fn implements(mut self, interface: impl Into<Cow<'static, str>>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        let head = self.name.split('<').next().unwrap_or(&self.name);
        match head.rfind("::") {
            Some(index) => &self.name[index + 2..],
            None => &self.name,
        }
    }

    /// 名称匹配，完整名称或简短名称均可
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.short_name() == name
    }

    /// 是否为基本类型
    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    /// 是否为同一类型
    pub fn same_type(&self, other: &TypeInfo) -> bool {
        match (self.id, other.id) {
            (Some(left), Some(right)) => left == right,
            _ => self.name == other.name,
        }
    }

    /// 判断 `value_type` 的值能否赋值给当前类型
    pub fn is_assignable_from(&self, value_type: &TypeInfo) -> bool {
        if self.same_type(value_type) {
            return true;
        }
        match self.kind {
            TypeKind::Any => true,
            TypeKind::Interface => value_type
                .interfaces
                .iter()
                .any(|interface| self.matches_name(interface)),
            TypeKind::Concrete | TypeKind::Primitive => value_type
                .superclasses
                .iter()
                .any(|superclass| self.matches_name(superclass)),
        }
    }

    /// 计算值类型到当前类型的层级距离
    ///
    /// 同类型为 0；每上溯一级父类加 2；接口加 1。不可赋值时返回 `None`。
    pub fn hierarchy_distance(&self, value_type: &TypeInfo) -> Option<u32> {
        if self.same_type(value_type) {
            return Some(0);
        }
        if !self.is_assignable_from(value_type) {
            return None;
        }
        let steps = match self.kind {
            TypeKind::Any => value_type.superclasses.len() + 1,
            TypeKind::Interface => return Some(1),
            TypeKind::Concrete | TypeKind::Primitive => value_type
                .superclasses
                .iter()
                .position(|superclass| self.matches_name(superclass))
                .map_or(0, |index| index + 1),
        };
        Some(u32::try_from(steps * 2).unwrap_or(u32::MAX))
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

fn is_primitive(id: TypeId) -> bool {
    [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
    ]
    .contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    #[test]
    fn test_short_name_strips_module_path() {
        assert_eq!(TypeInfo::of::<String>().short_name(), "String");
        assert_eq!(TypeInfo::of::<Plain>().short_name(), "Plain");
        assert!(TypeInfo::of::<Vec<String>>().short_name().starts_with("Vec<"));
        assert!(TypeInfo::of::<i32>().matches_name("i32"));
    }

    #[test]
    fn test_primitive_detection() {
        assert!(TypeInfo::of::<i64>().is_primitive());
        assert!(TypeInfo::of::<bool>().is_primitive());
        assert!(!TypeInfo::of::<String>().is_primitive());
    }

    #[test]
    fn test_assignability_through_hierarchy() {
        let service = TypeInfo::concrete("JdbcRepository")
            .extends("AbstractRepository")
            .implements("Repository");

        assert!(TypeInfo::any().is_assignable_from(&service));
        assert!(TypeInfo::interface("Repository").is_assignable_from(&service));
        assert!(TypeInfo::concrete("AbstractRepository").is_assignable_from(&service));
        assert!(!TypeInfo::concrete("Other").is_assignable_from(&service));
    }

    #[test]
    fn test_hierarchy_distance() {
        let value = TypeInfo::concrete("C").extends("B").extends("A");

        assert_eq!(TypeInfo::concrete("C").hierarchy_distance(&value), Some(0));
        assert_eq!(TypeInfo::concrete("B").hierarchy_distance(&value), Some(2));
        assert_eq!(TypeInfo::concrete("A").hierarchy_distance(&value), Some(4));
        assert_eq!(TypeInfo::any().hierarchy_distance(&value), Some(6));
        assert_eq!(TypeInfo::any().hierarchy_distance(&TypeInfo::of::<String>()), Some(2));
        assert_eq!(TypeInfo::concrete("X").hierarchy_distance(&value), None);
    }
}
