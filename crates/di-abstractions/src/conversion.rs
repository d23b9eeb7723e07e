//! 类型转换与表达式求值抽象接口

use di_common::{BoxError, ConversionResult, Instance, ResolvedValue, TypeInfo};

/// 类型转换器 trait
pub trait TypeConverter: Send + Sync {
    /// 将解析后的值转换为目标类型，null 转换为 `None`
    ///
    /// `hint` 为参数或属性名称，仅用于诊断。
    fn convert(
        &self,
        value: &ResolvedValue,
        target: &TypeInfo,
        hint: Option<&str>,
    ) -> ConversionResult<Option<Instance>>;
}

/// 表达式求值器 trait
pub trait ExpressionEvaluator: Send + Sync {
    /// 对字面量求值，不含表达式时原样返回
    fn evaluate(&self, expression: &str) -> Result<String, BoxError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str) -> Result<String, BoxError> + Send + Sync,
{
    fn evaluate(&self, expression: &str) -> Result<String, BoxError> {
        self(expression)
    }
}
