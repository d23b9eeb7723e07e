//! 候选可执行体的参数绑定结果与匹配权重

use di_common::{Instance, Parameter, PreparedArgument, ResolvedValue, TypeInfo};

/// 原始值匹配相对于转换后匹配的折扣：同等权重下不需要转换的候选更优
pub const RAW_MATCH_DISCOUNT: i32 = 1024;

/// 一个候选可执行体的参数绑定结果
#[derive(Debug, Clone)]
pub struct ArgumentsHolder {
    /// 转换后的参数
    pub arguments: Vec<Option<Instance>>,
    /// 转换前的参数
    pub raw: Vec<ResolvedValue>,
    /// 用于缓存的参数模板
    pub prepared: Vec<PreparedArgument>,
    /// 是否存在每次调用都需要重新解析的参数
    pub resolve_necessary: bool,
    /// 自动装配使用的组件名称
    pub autowired: Vec<String>,
}

impl ArgumentsHolder {
    /// 创建空的参数绑定
    pub fn with_capacity(size: usize) -> Self {
        Self {
            arguments: Vec::with_capacity(size),
            raw: Vec::with_capacity(size),
            prepared: Vec::with_capacity(size),
            resolve_necessary: false,
            autowired: Vec::new(),
        }
    }

    /// 追加一个参数
    pub fn push(&mut self, argument: Option<Instance>, raw: ResolvedValue, prepared: PreparedArgument) {
        if !matches!(prepared, PreparedArgument::Converted(_)) {
            self.resolve_necessary = true;
        }
        self.arguments.push(argument);
        self.raw.push(raw);
        self.prepared.push(prepared);
    }

    /// 宽松模式的类型差异权重
    ///
    /// 分别计算转换后参数和原始参数的权重，原始参数的权重减去固定折扣，取较小值。
    pub fn type_difference_weight(&self, params: &[Parameter]) -> i32 {
        let converted = type_difference(
            params,
            self.arguments
                .iter()
                .map(|argument| argument.as_ref().map(|instance| instance.type_info().clone())),
        );
        let raw = type_difference(params, self.raw.iter().map(ResolvedValue::value_type));
        converted.min(raw.saturating_sub(RAW_MATCH_DISCOUNT))
    }

    /// 严格模式的可赋值性权重
    ///
    /// 转换后的值不可赋值时候选被淘汰（`i32::MAX`）；原始值不可赋值时权重较高。
    pub fn assignability_weight(&self, params: &[Parameter]) -> i32 {
        for (param, argument) in params.iter().zip(&self.arguments) {
            if !is_assignable(&param.ty, argument.as_ref()) {
                return i32::MAX;
            }
        }
        for (param, raw) in params.iter().zip(&self.raw) {
            if !raw.is_assignable_to(&param.ty) {
                return i32::MAX - 512;
            }
        }
        i32::MAX - RAW_MATCH_DISCOUNT
    }
}

/// 值能否直接赋值给参数类型，null 不能赋值给基本类型
pub fn is_assignable(target: &TypeInfo, value: Option<&Instance>) -> bool {
    match value {
        Some(instance) => target.is_assignable_from(instance.type_info()),
        None => !target.is_primitive(),
    }
}

/// 参数类型与值类型的层级差异之和，不可赋值时为 `i32::MAX`
pub fn type_difference(
    params: &[Parameter],
    value_types: impl Iterator<Item = Option<TypeInfo>>,
) -> i32 {
    let mut weight: i32 = 0;
    for (param, value_type) in params.iter().zip(value_types) {
        match value_type {
            Some(value_type) => match param.ty.hierarchy_distance(&value_type) {
                Some(distance) => {
                    let distance = i32::try_from(distance).unwrap_or(i32::MAX);
                    weight = weight.saturating_add(distance);
                }
                None => return i32::MAX,
            },
            None if param.ty.is_primitive() => return i32::MAX,
            None => {}
        }
    }
    weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(values: Vec<Option<Instance>>, raw: Vec<ResolvedValue>) -> ArgumentsHolder {
        let mut holder = ArgumentsHolder::with_capacity(values.len());
        for (value, raw) in values.into_iter().zip(raw) {
            holder.push(value.clone(), raw, PreparedArgument::Converted(value));
        }
        holder
    }

    #[test]
    fn test_exact_match_beats_widening() {
        let text = Instance::new("a".to_string());
        let exact = [Parameter::of::<String>("value")];
        let widened = [Parameter::new("value", TypeInfo::any())];
        let args = holder(vec![Some(text)], vec![ResolvedValue::Text("a".into())]);

        let exact_weight = args.type_difference_weight(&exact);
        let widened_weight = args.type_difference_weight(&widened);
        assert!(exact_weight < widened_weight);
        assert_eq!(exact_weight, -RAW_MATCH_DISCOUNT);
        assert_eq!(widened_weight, 2 - RAW_MATCH_DISCOUNT);
    }

    #[test]
    fn test_raw_match_discount_prefers_unconverted_values() {
        let params = [Parameter::of::<u16>("port")];
        let converted = holder(
            vec![Some(Instance::new(80_u16))],
            vec![ResolvedValue::Text("80".into())],
        );
        let direct = holder(
            vec![Some(Instance::new(80_u16))],
            vec![ResolvedValue::Object(Instance::new(80_u16))],
        );
        assert_eq!(converted.type_difference_weight(&params), 0);
        assert_eq!(direct.type_difference_weight(&params), -RAW_MATCH_DISCOUNT);
    }

    #[test]
    fn test_assignability_weight() {
        let params = [Parameter::of::<u16>("port")];
        let converted = holder(
            vec![Some(Instance::new(80_u16))],
            vec![ResolvedValue::Text("80".into())],
        );
        assert_eq!(converted.assignability_weight(&params), i32::MAX - 512);

        let direct = holder(
            vec![Some(Instance::new(80_u16))],
            vec![ResolvedValue::Object(Instance::new(80_u16))],
        );
        assert_eq!(direct.assignability_weight(&params), i32::MAX - RAW_MATCH_DISCOUNT);

        let wrong = holder(
            vec![Some(Instance::new("x".to_string()))],
            vec![ResolvedValue::Text("x".into())],
        );
        assert_eq!(wrong.assignability_weight(&params), i32::MAX);
    }

    #[test]
    fn test_null_arguments() {
        let params = [Parameter::of::<String>("name"), Parameter::of::<i32>("count")];
        assert_eq!(type_difference(&params[..1], [None].into_iter()), 0);
        assert_eq!(type_difference(&params[1..], [None].into_iter()), i32::MAX);
        assert!(!is_assignable(&TypeInfo::of::<i32>(), None));
        assert!(is_assignable(&TypeInfo::of::<String>(), None));
    }
}
