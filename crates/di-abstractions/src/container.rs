//! 依赖注入容器抽象接口
//!
//! 提供依赖注入容器的核心抽象

use di_common::{
    Args, ConfigError, ConfigResult, DependencyError, DependencyResult, Instance, TypeInfo,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 组件容器 trait
pub trait ComponentContainer: Send + Sync {
    /// 按名称获取组件；`&name` 获取工厂组件本身
    fn get_instance(&self, name: &str) -> DependencyResult<Instance>;

    /// 使用调用时参数创建组件，结果不缓存
    fn get_with_args(&self, name: &str, args: Args) -> DependencyResult<Instance>;

    /// 是否包含组件（描述符或单例）
    fn contains(&self, name: &str) -> bool;

    /// 是否为单例
    fn is_singleton(&self, name: &str) -> DependencyResult<bool>;

    /// 是否为原型
    fn is_prototype(&self, name: &str) -> DependencyResult<bool>;

    /// 预测组件类型，不触发创建
    fn type_of(&self, name: &str) -> Option<TypeInfo>;

    /// 类型可赋值给 `required` 的组件名称
    fn names_for_type(&self, required: &TypeInfo) -> Vec<String>;

    /// 按名称获取类型化组件
    fn get_typed<T: Send + Sync + 'static>(&self, name: &str) -> DependencyResult<Arc<T>>
    where
        Self: Sized,
    {
        let instance = self.get_instance(name)?;
        instance
            .downcast::<T>()
            .map_err(|error| DependencyError::TypeNotFound {
                type_name: error.to_string(),
            })
    }
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 单例在原始实例化后暴露早期引用，允许属性注入形成的循环
    pub allow_circular_references: bool,
    /// 允许同名描述符覆盖
    pub allow_descriptor_overriding: bool,
    /// 描述符未设置时，构造函数解析是否使用宽松模式
    pub lenient_resolution: bool,
    /// 最大解析深度
    pub max_resolution_depth: Option<usize>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_descriptor_overriding: true,
            lenient_resolution: true,
            max_resolution_depth: None,
        }
    }
}

impl ContainerConfig {
    /// 从 TOML 文本加载配置
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|error| ConfigError::ParseError {
            message: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_resolution_depth == Some(0) {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    pub fn with_descriptor_overriding(mut self, allow: bool) -> Self {
        self.allow_descriptor_overriding = allow;
        self
    }

    pub fn with_lenient_resolution(mut self, lenient: bool) -> Self {
        self.lenient_resolution = lenient;
        self
    }

    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = Some(depth);
        self
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStats {
    /// 已注册描述符数量
    pub registered_descriptors: usize,
    /// 活跃单例数量
    pub active_singletons: usize,
    /// 已创建实例数量
    pub instances_created: usize,
    /// 解析缓存命中次数
    pub cache_hits: usize,
    /// 失败的请求数量
    pub failed_requests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContainerConfig::default();
        assert!(config.allow_circular_references);
        assert!(config.allow_descriptor_overriding);
        assert!(config.lenient_resolution);
        assert_eq!(config.max_resolution_depth, None);
    }

    #[test]
    fn test_config_from_toml() {
        let config = ContainerConfig::from_toml_str(
            r#"
            allow_circular_references = false
            max_resolution_depth = 32
            "#,
        )
        .unwrap();

        assert!(!config.allow_circular_references);
        assert!(config.lenient_resolution);
        assert_eq!(config.max_resolution_depth, Some(32));
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        assert!(matches!(
            ContainerConfig::from_toml_str("max_resolution_depth = 0"),
            Err(ConfigError::ValidationError { .. })
        ));
        assert!(matches!(
            ContainerConfig::from_toml_str("lenient_resolution = \"yes\""),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
