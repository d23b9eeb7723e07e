//! 组件解析器抽象接口
//!
//! 值解析器通过 [`ResolutionCallback`] 回到容器中获取引用的组件或创建内嵌组件，
//! 解析链由显式传递的 [`ResolveContext`] 记录。

use crate::conversion::{ExpressionEvaluator, TypeConverter};
use crate::registry::DependencyEdgeSink;
use di_common::{DependencyError, DependencyResult, Instance, InstanceDescriptor, TypeInfo};

/// 解析上下文
///
/// 沿递归解析链向下传递，记录当前链上的组件名称。
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// 当前解析链
    pub resolution_chain: Vec<String>,
    /// 最大递归深度
    pub max_depth: Option<usize>,
}

impl ResolveContext {
    /// 创建新的解析上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最大递归深度
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 进入一个组件的解析
    pub fn push_name(&mut self, name: &str) -> DependencyResult<()> {
        if let Some(limit) = self.max_depth {
            if self.resolution_chain.len() >= limit {
                return Err(DependencyError::ResolutionDepthExceeded {
                    limit,
                    chain: self.chain_with(name),
                });
            }
        }
        self.resolution_chain.push(name.to_string());
        Ok(())
    }

    /// 离开当前组件的解析
    pub fn pop_name(&mut self) {
        self.resolution_chain.pop();
    }

    /// 名称是否已经在解析链上
    pub fn contains(&self, name: &str) -> bool {
        self.resolution_chain.iter().any(|entry| entry == name)
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.resolution_chain.len()
    }

    /// 以 `a -> b -> name` 形式描述解析链
    pub fn chain_with(&self, name: &str) -> String {
        let mut chain = self.resolution_chain.clone();
        chain.push(name.to_string());
        chain.join(" -> ")
    }

    /// 构造循环依赖错误
    pub fn circular(&self, name: &str) -> DependencyError {
        DependencyError::CircularDependency {
            name: name.to_string(),
            chain: self.chain_with(name),
        }
    }
}

/// 解析回调
///
/// 通常由容器实现，值解析器和构造函数解析器通过它访问组件空间。
pub trait ResolutionCallback {
    /// 按名称获取组件
    fn resolve_reference(&self, name: &str, ctx: &mut ResolveContext) -> DependencyResult<Instance>;

    /// 在父容器中获取组件，没有父容器时返回 `None`
    fn resolve_parent_reference(&self, name: &str) -> Option<DependencyResult<Instance>>;

    /// 创建内嵌组件
    fn create_nested(
        &self,
        name: &str,
        descriptor: &InstanceDescriptor,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance>;

    /// 按类型查找唯一候选组件，返回组件名称和实例
    fn resolve_by_type(
        &self,
        required: &TypeInfo,
        parameter_name: Option<&str>,
        requesting: &str,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Option<(String, Instance)>>;

    /// 通过类型名称查找类型信息
    fn resolve_type(&self, type_name: &str) -> Option<TypeInfo>;

    /// 沿别名链解析出规范名称
    fn canonical_name(&self, name: &str) -> String;

    /// 为内嵌描述符生成名称
    fn inner_name(&self, descriptor: &InstanceDescriptor, token: &str) -> String;

    /// 依赖边接收器
    fn edge_sink(&self) -> &dyn DependencyEdgeSink;

    /// 类型转换器
    fn converter(&self) -> &dyn TypeConverter;

    /// 表达式求值器，未配置时为 `None`
    fn evaluator(&self) -> Option<&dyn ExpressionEvaluator>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_tracking() {
        let mut ctx = ResolveContext::new();
        ctx.push_name("a").unwrap();
        ctx.push_name("b").unwrap();

        assert!(ctx.contains("a"));
        assert_eq!(ctx.chain_with("a"), "a -> b -> a");
        assert!(matches!(ctx.circular("a"), DependencyError::CircularDependency { .. }));

        ctx.pop_name();
        assert!(!ctx.contains("b"));
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut ctx = ResolveContext::new().with_max_depth(Some(1));
        ctx.push_name("a").unwrap();
        let error = ctx.push_name("b").unwrap_err();
        assert!(matches!(error, DependencyError::ResolutionDepthExceeded { limit: 1, .. }));
    }
}
