//! 组件生命周期管理

use crate::errors::BoxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 组件作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 单例模式 - 每个容器内每个名称只创建一个实例
    #[default]
    Singleton,
    /// 原型模式 - 每次请求都创建新实例
    Prototype,
    /// 由外部注册的自定义作用域
    Custom(String),
}

impl Scope {
    /// 从名称解析作用域
    pub fn parse(name: &str) -> Self {
        match name {
            "" | "singleton" => Self::Singleton,
            "prototype" => Self::Prototype,
            other => Self::Custom(other.to_string()),
        }
    }

    /// 是否为单例
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton)
    }

    /// 是否为原型
    pub fn is_prototype(&self) -> bool {
        matches!(self, Self::Prototype)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => f.write_str("singleton"),
            Self::Prototype => f.write_str("prototype"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// 可销毁组件
///
/// 容器销毁单例时，先销毁依赖它的组件，再调用本组件的 `dispose`。
pub trait Disposable: Send + Sync {
    /// 释放资源
    fn dispose(&self) -> Result<(), BoxError>;
}
