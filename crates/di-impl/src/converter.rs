//! 默认类型转换器

use dashmap::DashMap;
use di_abstractions::TypeConverter;
use di_common::{
    ConversionError, ConversionResult, Instance, InstanceList, InstanceMap, ResolvedValue,
    TypeInfo, TypeKind,
};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use tracing::trace;

type Parser = Arc<dyn Fn(&str) -> Result<Instance, String> + Send + Sync>;

/// 默认类型转换器
///
/// - 可直接赋值的值原样通过
/// - 字符串通过登记的 [`FromStr`] 解析器转换为目标类型
/// - 列表/集合转换为 [`InstanceList`] 或 `Vec<String>`
/// - 映射转换为 [`InstanceMap`] 或 `BTreeMap<String, String>`
pub struct DefaultTypeConverter {
    parsers: DashMap<TypeId, Parser>,
}

impl DefaultTypeConverter {
    /// 创建带内置解析器的转换器
    pub fn new() -> Self {
        let converter = Self {
            parsers: DashMap::new(),
        };
        converter.register_parser::<bool>();
        converter.register_parser::<char>();
        converter.register_parser::<i8>();
        converter.register_parser::<i16>();
        converter.register_parser::<i32>();
        converter.register_parser::<i64>();
        converter.register_parser::<isize>();
        converter.register_parser::<u8>();
        converter.register_parser::<u16>();
        converter.register_parser::<u32>();
        converter.register_parser::<u64>();
        converter.register_parser::<usize>();
        converter.register_parser::<f32>();
        converter.register_parser::<f64>();
        converter
    }

    /// 登记基于 [`FromStr`] 的解析器
    pub fn register_parser<T>(&self)
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: Display,
    {
        self.register_with::<T, _>(|text| text.parse::<T>().map_err(|error| error.to_string()));
    }

    /// 登记自定义解析函数
    pub fn register_with<T, F>(&self, parse: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.parsers.insert(
            TypeId::of::<T>(),
            Arc::new(move |text| parse(text).map(Instance::new)),
        );
    }

    fn parse_text(&self, text: &str, target: &TypeInfo) -> ConversionResult<Option<Instance>> {
        let parser = target
            .id
            .and_then(|id| self.parsers.get(&id).map(|entry| entry.value().clone()));
        let Some(parser) = parser else {
            return Err(unsupported("String", target));
        };
        let value = if target.is_primitive() { text.trim() } else { text };
        parser(value)
            .map(Some)
            .map_err(|message| ConversionError::Parse {
                value: text.to_string(),
                required_type: target.short_name().to_string(),
                message,
            })
    }

    fn convert_object(
        &self,
        instance: &Instance,
        target: &TypeInfo,
    ) -> ConversionResult<Option<Instance>> {
        if target.is_assignable_from(instance.type_info()) {
            return Ok(Some(instance.clone()));
        }
        if let Ok(text) = instance.downcast::<String>() {
            return self.parse_text(&text, target);
        }
        Err(unsupported(instance.type_info().short_name(), target))
    }

    fn convert_collection(
        &self,
        source: &ResolvedValue,
        elements: &[ResolvedValue],
        target: &TypeInfo,
    ) -> ConversionResult<Option<Instance>> {
        if target.same_type(&TypeInfo::of::<InstanceList>()) || target.kind == TypeKind::Any {
            let list = elements
                .iter()
                .map(|element| erase(element, target))
                .collect::<ConversionResult<InstanceList>>()?;
            return Ok(Some(Instance::new(list)));
        }
        if target.same_type(&TypeInfo::of::<Vec<String>>()) {
            let strings = elements
                .iter()
                .map(|element| as_text(element).ok_or_else(|| unsupported(&element.type_name(), target)))
                .collect::<ConversionResult<Vec<_>>>()?;
            return Ok(Some(Instance::new(strings)));
        }
        Err(unsupported(&source.type_name(), target))
    }

    fn convert_map(
        &self,
        source: &ResolvedValue,
        entries: &[(ResolvedValue, ResolvedValue)],
        target: &TypeInfo,
    ) -> ConversionResult<Option<Instance>> {
        if target.same_type(&TypeInfo::of::<InstanceMap>()) || target.kind == TypeKind::Any {
            let map = erase_entries(entries, target)?;
            return Ok(Some(Instance::new(map)));
        }
        if target.same_type(&TypeInfo::of::<BTreeMap<String, String>>()) {
            let map = entries
                .iter()
                .map(|(key, value)| match (as_text(key), as_text(value)) {
                    (Some(key), Some(value)) => Ok((key, value)),
                    _ => Err(unsupported(&source.type_name(), target)),
                })
                .collect::<ConversionResult<BTreeMap<_, _>>>()?;
            return Ok(Some(Instance::new(map)));
        }
        Err(unsupported(&source.type_name(), target))
    }
}

impl Default for DefaultTypeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeConverter for DefaultTypeConverter {
    fn convert(
        &self,
        value: &ResolvedValue,
        target: &TypeInfo,
        hint: Option<&str>,
    ) -> ConversionResult<Option<Instance>> {
        trace!(
            "类型转换: {} -> {} ({})",
            value.type_name(),
            target.short_name(),
            hint.unwrap_or("-")
        );
        match value {
            ResolvedValue::Null if target.is_primitive() => Err(ConversionError::NullToPrimitive {
                required_type: target.short_name().to_string(),
            }),
            ResolvedValue::Null => Ok(None),
            ResolvedValue::Object(instance) => self.convert_object(instance, target),
            ResolvedValue::Text(text) => {
                if target.is_assignable_from(&TypeInfo::of::<String>()) {
                    Ok(Some(Instance::new(text.clone())))
                } else {
                    self.parse_text(text, target)
                }
            }
            ResolvedValue::List(elements) | ResolvedValue::Set(elements) => {
                self.convert_collection(value, elements, target)
            }
            ResolvedValue::Map(entries) => self.convert_map(value, entries, target),
            ResolvedValue::Properties(map) => {
                if target.kind == TypeKind::Any
                    || target.same_type(&TypeInfo::of::<BTreeMap<String, String>>())
                {
                    Ok(Some(Instance::new(map.clone())))
                } else {
                    Err(unsupported("properties", target))
                }
            }
        }
    }
}

/// 不做目标类型转换，直接包装为实例；任何层级的映射键都不能为 null
fn erase(value: &ResolvedValue, target: &TypeInfo) -> ConversionResult<Option<Instance>> {
    let erased = match value {
        ResolvedValue::Null => None,
        ResolvedValue::Text(text) => Some(Instance::new(text.clone())),
        ResolvedValue::Object(instance) => Some(instance.clone()),
        ResolvedValue::List(elements) | ResolvedValue::Set(elements) => Some(Instance::new(
            elements
                .iter()
                .map(|element| erase(element, target))
                .collect::<ConversionResult<InstanceList>>()?,
        )),
        ResolvedValue::Map(entries) => Some(Instance::new(erase_entries(entries, target)?)),
        ResolvedValue::Properties(map) => Some(Instance::new(map.clone())),
    };
    Ok(erased)
}

fn erase_entries(
    entries: &[(ResolvedValue, ResolvedValue)],
    target: &TypeInfo,
) -> ConversionResult<InstanceMap> {
    entries
        .iter()
        .map(|(key, value)| {
            let key = erase(key, target)?.ok_or_else(|| unsupported("null", target))?;
            Ok((key, erase(value, target)?))
        })
        .collect()
}

fn as_text(value: &ResolvedValue) -> Option<String> {
    match value {
        ResolvedValue::Text(text) => Some(text.clone()),
        ResolvedValue::Object(instance) => instance
            .downcast::<String>()
            .ok()
            .map(|text| (*text).clone()),
        _ => None,
    }
}

fn unsupported(source_type: &str, target: &TypeInfo) -> ConversionError {
    ConversionError::Unsupported {
        source_type: source_type.to_string(),
        required_type: target.short_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        let converter = DefaultTypeConverter::new();
        let port = converter
            .convert(&ResolvedValue::Text(" 8080 ".into()), &TypeInfo::of::<u16>(), Some("port"))
            .unwrap()
            .unwrap();
        assert_eq!(*port.downcast::<u16>().unwrap(), 8080);

        let error = converter
            .convert(&ResolvedValue::Text("abc".into()), &TypeInfo::of::<i32>(), None)
            .unwrap_err();
        assert!(matches!(error, ConversionError::Parse { .. }));
    }

    #[test]
    fn test_null_handling() {
        let converter = DefaultTypeConverter::new();
        assert!(converter
            .convert(&ResolvedValue::Null, &TypeInfo::of::<String>(), None)
            .unwrap()
            .is_none());
        assert_eq!(
            converter
                .convert(&ResolvedValue::Null, &TypeInfo::of::<i64>(), None)
                .unwrap_err(),
            ConversionError::NullToPrimitive {
                required_type: "i64".into()
            }
        );
    }

    #[test]
    fn test_assignable_objects_pass_through() {
        let converter = DefaultTypeConverter::new();
        let instance = Instance::new(3_i32);
        let converted = converter
            .convert(&ResolvedValue::Object(instance.clone()), &TypeInfo::any(), None)
            .unwrap()
            .unwrap();
        assert!(converted.ptr_eq(&instance));

        let error = converter
            .convert(&ResolvedValue::Object(instance), &TypeInfo::of::<String>(), None)
            .unwrap_err();
        assert!(matches!(error, ConversionError::Unsupported { .. }));
    }

    #[test]
    fn test_collections() {
        let converter = DefaultTypeConverter::new();
        let list = ResolvedValue::List(vec![
            ResolvedValue::Text("a".into()),
            ResolvedValue::Null,
        ]);

        let erased = converter
            .convert(&list, &TypeInfo::of::<InstanceList>(), None)
            .unwrap()
            .unwrap();
        let erased = erased.downcast::<InstanceList>().unwrap();
        assert_eq!(erased.len(), 2);
        assert!(erased[1].is_none());

        assert!(converter
            .convert(&list, &TypeInfo::of::<Vec<String>>(), None)
            .is_err());

        let map = ResolvedValue::Map(vec![(
            ResolvedValue::Text("k".into()),
            ResolvedValue::Text("v".into()),
        )]);
        let text_map = converter
            .convert(&map, &TypeInfo::of::<BTreeMap<String, String>>(), None)
            .unwrap()
            .unwrap();
        assert_eq!(
            text_map.downcast::<BTreeMap<String, String>>().unwrap().get("k").map(String::as_str),
            Some("v")
        );
    }

    #[test]
    fn test_null_map_keys_rejected_at_any_depth() {
        let converter = DefaultTypeConverter::new();
        let null_key = ResolvedValue::Map(vec![(ResolvedValue::Null, ResolvedValue::Text("v".into()))]);

        assert!(matches!(
            converter.convert(&null_key, &TypeInfo::of::<InstanceMap>(), None),
            Err(ConversionError::Unsupported { .. })
        ));

        let nested_map = ResolvedValue::Map(vec![(ResolvedValue::Text("outer".into()), null_key.clone())]);
        assert!(matches!(
            converter.convert(&nested_map, &TypeInfo::of::<InstanceMap>(), None),
            Err(ConversionError::Unsupported { .. })
        ));

        let nested_list = ResolvedValue::List(vec![null_key]);
        assert!(converter
            .convert(&nested_list, &TypeInfo::of::<InstanceList>(), None)
            .is_err());
    }

    #[test]
    fn test_custom_parser() {
        #[derive(Debug, PartialEq)]
        struct Millis(u64);

        let converter = DefaultTypeConverter::new();
        converter.register_with::<Millis, _>(|text| {
            text.trim_end_matches("ms")
                .parse()
                .map(Millis)
                .map_err(|error: std::num::ParseIntError| error.to_string())
        });

        let value = converter
            .convert(&ResolvedValue::Text("250ms".into()), &TypeInfo::of::<Millis>(), None)
            .unwrap()
            .unwrap();
        assert_eq!(*value.downcast::<Millis>().unwrap(), Millis(250));
    }
}
