//! 错误类型定义

use std::sync::Arc;
use thiserror::Error;

/// 可跨线程共享的错误来源
///
/// 使用 `Arc` 包装，保证 [`DependencyError`] 可以被 Clone，
/// 以便并发等待同一个单例的调用者观察到同一个错误。
pub type DynError = Arc<dyn std::error::Error + Send + Sync>;

/// 构造函数、工厂方法等用户代码返回的错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 依赖注入错误类型
#[derive(Error, Debug, Clone)]
pub enum DependencyError {
    #[error("组件未注册: {name}")]
    ComponentNotRegistered { name: String },

    #[error("类型未知: {type_name}")]
    TypeNotFound { type_name: String },

    #[error("组件创建失败: {name}, 原因: {source}")]
    ComponentCreationFailed { name: String, source: DynError },

    #[error("找不到匹配的{kind}: 组件 '{name}', 尝试的参数签名 ({signature}){hint}")]
    NoMatchingExecutable {
        name: String,
        kind: &'static str,
        signature: String,
        hint: String,
    },

    #[error("组件 '{name}' 存在多个同样匹配的{kind}: {candidates:?}")]
    AmbiguousExecutable {
        name: String,
        kind: &'static str,
        candidates: Vec<String>,
    },

    #[error("无效的工厂方法: 组件 '{name}' 的工厂方法 '{method}' 需要有返回值")]
    InvalidFactoryMethod { name: String, method: String },

    #[error(
        "参数转换失败: 组件 '{name}' 的{}: 无法将 {source_type} 转换为 {required_type}: {message}",
        describe_argument(.position, .argument)
    )]
    ArgumentConversion {
        name: String,
        position: Option<usize>,
        argument: Option<String>,
        source_type: String,
        required_type: String,
        message: String,
    },

    #[error("检测到循环依赖: '{name}' 正在创建中, 依赖链: {chain}")]
    CircularDependency { name: String, chain: String },

    #[error("组件 '{name}' 引用了父容器中的 '{reference}', 但没有配置父容器")]
    NoParentContainer { name: String, reference: String },

    #[error("重复注册: 名称 '{name}' 已绑定到另一个实例")]
    DuplicateRegistration { name: String },

    #[error("依赖未满足: 组件 '{name}' 的参数 #{position} ({required_type}): {message}")]
    UnsatisfiedDependency {
        name: String,
        position: usize,
        required_type: String,
        message: String,
    },

    #[error("依赖不唯一: 类型 {required_type} 存在多个候选组件: {candidates:?}")]
    NoUniqueCandidate {
        required_type: String,
        candidates: Vec<String>,
    },

    #[error("组件描述无效: {name}, 原因: {message}")]
    InvalidDescriptor { name: String, message: String },

    #[error("表达式求值失败: '{expression}', 原因: {source}")]
    ExpressionEvaluation { expression: String, source: DynError },

    #[error("解析深度超过限制 {limit}: {chain}")]
    ResolutionDepthExceeded { limit: usize, chain: String },
}

impl DependencyError {
    /// 创建组件创建失败错误
    pub fn creation_failed(name: impl Into<String>, source: BoxError) -> Self {
        Self::ComponentCreationFailed {
            name: name.into(),
            source: Arc::from(source),
        }
    }

    /// 创建组件描述无效错误
    pub fn invalid_descriptor(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            name: name.into(),
            message: message.into(),
        }
    }

    /// 将类型转换错误包装为带参数上下文的错误
    pub fn conversion(
        name: impl Into<String>,
        position: Option<usize>,
        argument: Option<String>,
        error: &ConversionError,
    ) -> Self {
        let (source_type, required_type) = error.types();
        Self::ArgumentConversion {
            name: name.into(),
            position,
            argument,
            source_type: source_type.to_string(),
            required_type: required_type.to_string(),
            message: error.to_string(),
        }
    }

    /// 是否为可以尝试下一个候选方法的错误
    ///
    /// 构造函数选择过程中，单个候选的参数绑定失败不会立即终止解析。
    pub fn is_candidate_mismatch(&self) -> bool {
        matches!(
            self,
            Self::ArgumentConversion { .. }
                | Self::UnsatisfiedDependency { .. }
                | Self::NoUniqueCandidate { .. }
        )
    }
}

fn describe_argument(position: &Option<usize>, argument: &Option<String>) -> String {
    match (position, argument) {
        (Some(index), Some(name)) => format!("参数 #{index} ('{name}')"),
        (Some(index), None) => format!("参数 #{index}"),
        (None, Some(name)) => format!("'{name}'"),
        (None, None) => "值".to_string(),
    }
}

/// 类型转换错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("不支持从 {source_type} 转换为 {required_type}")]
    Unsupported {
        source_type: String,
        required_type: String,
    },

    #[error("无法将 '{value}' 解析为 {required_type}: {message}")]
    Parse {
        value: String,
        required_type: String,
        message: String,
    },

    #[error("null 不能赋值给基本类型 {required_type}")]
    NullToPrimitive { required_type: String },
}

impl ConversionError {
    /// 源类型与目标类型名称
    pub fn types(&self) -> (&str, &str) {
        match self {
            Self::Unsupported {
                source_type,
                required_type,
            } => (source_type, required_type),
            Self::Parse { required_type, .. } => ("String", required_type),
            Self::NullToPrimitive { required_type } => ("null", required_type),
        }
    }
}

/// 配置错误类型
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("配置解析失败: {message}")]
    ParseError { message: String },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type ConversionResult<T> = Result<T, ConversionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_is_wrapped_with_argument_context() {
        let error = ConversionError::Parse {
            value: "abc".to_string(),
            required_type: "i32".to_string(),
            message: "invalid digit found in string".to_string(),
        };

        let wrapped = DependencyError::conversion("server", Some(1), Some("port".into()), &error);
        match &wrapped {
            DependencyError::ArgumentConversion {
                position,
                argument,
                source_type,
                required_type,
                ..
            } => {
                assert_eq!(*position, Some(1));
                assert_eq!(argument.as_deref(), Some("port"));
                assert_eq!(source_type, "String");
                assert_eq!(required_type, "i32");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let message = wrapped.to_string();
        assert!(message.contains("#1"));
        assert!(message.contains("'port'"));
    }

    #[test]
    fn test_creation_failure_keeps_source() {
        let error = DependencyError::creation_failed("db", "connection refused".into());
        let cloned = error.clone();
        assert!(cloned.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&cloned).is_some());
    }

    #[test]
    fn test_candidate_mismatch_classification() {
        let unsatisfied = DependencyError::UnsatisfiedDependency {
            name: "a".into(),
            position: 0,
            required_type: "i32".into(),
            message: "missing".into(),
        };
        assert!(unsatisfied.is_candidate_mismatch());
        assert!(!DependencyError::invalid_descriptor("a", "bad").is_candidate_mismatch());
    }
}
