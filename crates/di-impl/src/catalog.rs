//! 类型目录实现

use dashmap::DashMap;
use di_abstractions::TypeCatalog;
use di_common::{ComponentType, InstanceList, InstanceMap, TypeInfo};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// 默认类型目录
///
/// 组件类型同时以完整名称和简短名称登记；预置基本类型和常用集合类型的名称。
pub struct DefaultTypeCatalog {
    components: DashMap<String, Arc<ComponentType>>,
    types: DashMap<String, TypeInfo>,
}

impl DefaultTypeCatalog {
    /// 创建新的类型目录
    pub fn new() -> Self {
        let catalog = Self {
            components: DashMap::new(),
            types: DashMap::new(),
        };
        catalog.register_builtin_types();
        catalog
    }

    fn register_builtin_types(&self) {
        self.register_type_info(TypeInfo::of::<bool>());
        self.register_type_info(TypeInfo::of::<char>());
        self.register_type_info(TypeInfo::of::<i8>());
        self.register_type_info(TypeInfo::of::<i16>());
        self.register_type_info(TypeInfo::of::<i32>());
        self.register_type_info(TypeInfo::of::<i64>());
        self.register_type_info(TypeInfo::of::<isize>());
        self.register_type_info(TypeInfo::of::<u8>());
        self.register_type_info(TypeInfo::of::<u16>());
        self.register_type_info(TypeInfo::of::<u32>());
        self.register_type_info(TypeInfo::of::<u64>());
        self.register_type_info(TypeInfo::of::<usize>());
        self.register_type_info(TypeInfo::of::<f32>());
        self.register_type_info(TypeInfo::of::<f64>());
        self.register_type_info(TypeInfo::of::<String>());
        self.register_type("string", TypeInfo::of::<String>());
        self.register_type("any", TypeInfo::any());
        self.register_type("list", TypeInfo::of::<InstanceList>());
        self.register_type("map", TypeInfo::of::<InstanceMap>());
        self.register_type("strings", TypeInfo::of::<Vec<String>>());
        self.register_type("properties", TypeInfo::of::<BTreeMap<String, String>>());
    }

    /// 登记组件类型，返回共享的组件类型
    pub fn register(&self, component: ComponentType) -> Arc<ComponentType> {
        let component = Arc::new(component);
        let full_name = component.info.name.to_string();
        let short_name = component.info.short_name().to_string();

        debug!("登记组件类型: {}", full_name);
        self.register_type_info(component.info.clone());
        if short_name != full_name {
            self.components.insert(short_name, component.clone());
        }
        self.components.insert(full_name, component.clone());
        component
    }

    /// 以指定名称登记组件类型
    pub fn register_as(&self, name: impl Into<String>, component: ComponentType) -> Arc<ComponentType> {
        let name = name.into();
        let component = self.register(component);
        self.types.insert(name.clone(), component.info.clone());
        self.components.insert(name, component.clone());
        component
    }

    /// 以指定名称登记类型信息
    pub fn register_type(&self, name: impl Into<String>, info: TypeInfo) {
        self.types.insert(name.into(), info);
    }

    fn register_type_info(&self, info: TypeInfo) {
        let short_name = info.short_name().to_string();
        if short_name != info.name {
            self.types.insert(short_name, info.clone());
        }
        self.types.insert(info.name.to_string(), info);
    }

    /// 已登记的组件类型数量（按完整名称计）
    pub fn component_count(&self) -> usize {
        self.components
            .iter()
            .filter(|entry| entry.key().as_str() == entry.value().info.name)
            .count()
    }
}

impl Default for DefaultTypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog for DefaultTypeCatalog {
    fn component_type(&self, name: &str) -> Option<Arc<ComponentType>> {
        self.components.get(name).map(|entry| entry.value().clone())
    }

    fn type_info(&self, name: &str) -> Option<TypeInfo> {
        if let Some(component) = self.components.get(name) {
            return Some(component.info.clone());
        }
        self.types.get(name).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Engine;

    #[test]
    fn test_builtin_types() {
        let catalog = DefaultTypeCatalog::new();
        assert_eq!(catalog.type_info("i32"), Some(TypeInfo::of::<i32>()));
        assert_eq!(catalog.type_info("String"), Some(TypeInfo::of::<String>()));
        assert_eq!(catalog.type_info("string"), Some(TypeInfo::of::<String>()));
        assert!(catalog.type_info("Unknown").is_none());
    }

    #[test]
    fn test_component_lookup_by_full_and_short_name() {
        let catalog = DefaultTypeCatalog::new();
        let component = catalog.register(ComponentType::of::<Engine>().implements("Motor"));

        let by_short = catalog.component_type("Engine").unwrap();
        let by_full = catalog.component_type(&component.info.name).unwrap();
        assert!(Arc::ptr_eq(&by_short, &by_full));
        assert_eq!(catalog.type_info("Engine").unwrap().interfaces, vec!["Motor"]);
        assert_eq!(catalog.component_count(), 1);
    }
}
