//! 值解析器
//!
//! 将描述符中的原始 [`Value`] 递归地解析为 [`ResolvedValue`]：引用通过回调获取组件，
//! 内嵌描述符在线创建，集合逐元素解析，字面量经过表达式求值和类型转换。

use di_abstractions::{ResolutionCallback, ResolveContext};
use di_common::{
    DependencyError, DependencyResult, ManagedCollection, ManagedMap, NestedDescriptor, Reference,
    ResolvedValue, TypeInfo, TypedLiteral, Value,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// 参数或属性在所属描述符中的位置，用于错误信息
#[derive(Debug, Clone, Default)]
pub struct ArgumentSite {
    pub position: Option<usize>,
    pub name: Option<String>,
}

impl ArgumentSite {
    /// 构造参数位置
    pub fn argument(position: usize, name: Option<&str>) -> Self {
        Self {
            position: Some(position),
            name: name.map(str::to_string),
        }
    }

    /// 属性位置
    pub fn property(name: &str) -> Self {
        Self {
            position: None,
            name: Some(name.to_string()),
        }
    }
}

/// 一次值解析的结果
#[derive(Debug, Clone)]
pub struct Resolution {
    pub value: ResolvedValue,
    /// 结果是否可以缓存复用：不含引用、内嵌组件和动态字面量
    pub stable: bool,
}

impl Resolution {
    fn stable(value: ResolvedValue) -> Self {
        Self {
            value,
            stable: true,
        }
    }

    fn volatile(value: ResolvedValue) -> Self {
        Self {
            value,
            stable: false,
        }
    }
}

/// 值解析器
pub struct ValueResolver<'a> {
    callback: &'a dyn ResolutionCallback,
    owner: &'a str,
}

impl<'a> ValueResolver<'a> {
    /// 为 `owner` 组件创建值解析器
    pub fn new(callback: &'a dyn ResolutionCallback, owner: &'a str) -> Self {
        Self { callback, owner }
    }

    /// 解析一个值
    pub fn resolve(
        &self,
        value: &Value,
        site: &ArgumentSite,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Resolution> {
        match value {
            Value::Null => Ok(Resolution::stable(ResolvedValue::Null)),
            Value::Instance(instance) => Ok(Resolution::stable(ResolvedValue::Object(instance.clone()))),
            Value::Literal(text) => {
                let (evaluated, changed) = self.evaluate(text)?;
                Ok(Resolution {
                    value: ResolvedValue::Text(evaluated),
                    stable: !changed,
                })
            }
            Value::Typed(literal) => self.resolve_typed(literal, site),
            Value::Reference(reference) => self.resolve_reference(reference, ctx),
            Value::Nested(nested) => self.resolve_nested(nested, ctx),
            Value::List(collection) => self
                .resolve_collection(collection, site, ctx)
                .map(|(elements, stable)| Resolution {
                    value: ResolvedValue::List(elements),
                    stable,
                }),
            Value::Set(collection) => {
                let (elements, stable) = self.resolve_collection(collection, site, ctx)?;
                Ok(Resolution {
                    value: ResolvedValue::Set(deduplicate(elements)),
                    stable,
                })
            }
            Value::Map(map) => self.resolve_map(map, site, ctx),
            Value::Properties(entries) => {
                let mut stable = true;
                let mut resolved = BTreeMap::new();
                for (key, text) in entries {
                    let (evaluated, changed) = self.evaluate(text)?;
                    stable &= !changed;
                    resolved.insert(key.clone(), evaluated);
                }
                Ok(Resolution {
                    value: ResolvedValue::Properties(resolved),
                    stable,
                })
            }
        }
    }

    /// 表达式求值，返回结果和是否发生了变化
    fn evaluate(&self, text: &str) -> DependencyResult<(String, bool)> {
        let Some(evaluator) = self.callback.evaluator() else {
            return Ok((text.to_string(), false));
        };
        let evaluated =
            evaluator
                .evaluate(text)
                .map_err(|source| DependencyError::ExpressionEvaluation {
                    expression: text.to_string(),
                    source: Arc::from(source),
                })?;
        let changed = evaluated != text;
        Ok((evaluated, changed))
    }

    fn target_type(&self, type_name: &str) -> DependencyResult<TypeInfo> {
        self.callback
            .resolve_type(type_name)
            .ok_or_else(|| DependencyError::TypeNotFound {
                type_name: type_name.to_string(),
            })
    }

    fn convert(
        &self,
        value: ResolvedValue,
        target: &TypeInfo,
        site: &ArgumentSite,
    ) -> DependencyResult<ResolvedValue> {
        let converted = self
            .callback
            .converter()
            .convert(&value, target, site.name.as_deref())
            .map_err(|error| {
                DependencyError::conversion(self.owner, site.position, site.name.clone(), &error)
            })?;
        Ok(converted.map_or(ResolvedValue::Null, ResolvedValue::Object))
    }

    fn resolve_typed(&self, literal: &TypedLiteral, site: &ArgumentSite) -> DependencyResult<Resolution> {
        let (evaluated, changed) = self.evaluate(&literal.value)?;
        if changed {
            literal.mark_dynamic();
        }
        let value = match &literal.target_type {
            Some(type_name) => {
                let target = self.target_type(type_name)?;
                self.convert(ResolvedValue::Text(evaluated), &target, site)?
            }
            None => ResolvedValue::Text(evaluated),
        };
        Ok(Resolution {
            value,
            stable: !literal.is_dynamic(),
        })
    }

    fn resolve_reference(
        &self,
        reference: &Reference,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Resolution> {
        trace!("解析引用: {} -> {}", self.owner, reference.name);
        if reference.to_parent {
            let instance = self
                .callback
                .resolve_parent_reference(&reference.name)
                .ok_or_else(|| DependencyError::NoParentContainer {
                    name: self.owner.to_string(),
                    reference: reference.name.clone(),
                })??;
            return Ok(Resolution::volatile(ResolvedValue::Object(instance)));
        }

        let instance = self.callback.resolve_reference(&reference.name, ctx)?;
        let target = self
            .callback
            .canonical_name(reference.name.trim_start_matches('&'));
        self.callback.edge_sink().register_dependent(&target, self.owner);
        Ok(Resolution::volatile(ResolvedValue::Object(instance)))
    }

    fn resolve_nested(
        &self,
        nested: &NestedDescriptor,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Resolution> {
        // 显式名称也带上标识令牌，不同外层组件中的同名内嵌描述互不干扰
        let name = match &nested.name {
            Some(name) => format!("{name}#{}", nested.identity_token()),
            None => self
                .callback
                .inner_name(&nested.descriptor, &nested.identity_token()),
        };
        trace!("解析内嵌组件: {} 内的 {}", self.owner, name);

        let instance = self.callback.create_nested(&name, &nested.descriptor, ctx)?;
        self.callback.edge_sink().register_contained(&name, self.owner);

        let instance = match instance.as_factory() {
            Some(factory) => factory
                .produce()
                .map_err(|source| DependencyError::creation_failed(name.as_str(), source))?,
            None => instance,
        };
        Ok(Resolution::volatile(ResolvedValue::Object(instance)))
    }

    fn resolve_collection(
        &self,
        collection: &ManagedCollection,
        site: &ArgumentSite,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<(Vec<ResolvedValue>, bool)> {
        let element_type = collection
            .element_type
            .as_deref()
            .map(|name| self.target_type(name))
            .transpose()?;

        let mut stable = true;
        let mut elements = Vec::with_capacity(collection.elements.len());
        for element in &collection.elements {
            let resolution = self.resolve(element, site, ctx)?;
            stable &= resolution.stable;
            let value = match &element_type {
                Some(target) => self.convert(resolution.value, target, site)?,
                None => resolution.value,
            };
            elements.push(value);
        }
        Ok((elements, stable))
    }

    fn resolve_map(
        &self,
        map: &ManagedMap,
        site: &ArgumentSite,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Resolution> {
        let key_type = map.key_type.as_deref().map(|name| self.target_type(name)).transpose()?;
        let value_type = map
            .value_type
            .as_deref()
            .map(|name| self.target_type(name))
            .transpose()?;

        let mut stable = true;
        let mut entries = Vec::with_capacity(map.entries.len());
        for (key, value) in &map.entries {
            let key = self.resolve(key, site, ctx)?;
            let value = self.resolve(value, site, ctx)?;
            stable &= key.stable && value.stable;
            let key = match &key_type {
                Some(target) => self.convert(key.value, target, site)?,
                None => key.value,
            };
            let value = match &value_type {
                Some(target) => self.convert(value.value, target, site)?,
                None => value.value,
            };
            entries.push((key, value));
        }
        Ok(Resolution {
            value: ResolvedValue::Map(entries),
            stable,
        })
    }
}

/// 集合去重：对象按同一性，文本按内容，保留第一次出现的位置
fn deduplicate(elements: Vec<ResolvedValue>) -> Vec<ResolvedValue> {
    let mut unique: Vec<ResolvedValue> = Vec::with_capacity(elements.len());
    for element in elements {
        let duplicate = unique.iter().any(|existing| match (existing, &element) {
            (ResolvedValue::Null, ResolvedValue::Null) => true,
            (ResolvedValue::Text(left), ResolvedValue::Text(right)) => left == right,
            (ResolvedValue::Object(left), ResolvedValue::Object(right)) => left.ptr_eq(right),
            _ => false,
        });
        if !duplicate {
            unique.push(element);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::DefaultTypeConverter;
    use di_abstractions::{DependencyEdgeSink, ExpressionEvaluator, TypeConverter};
    use di_common::{BoxError, Instance, InstanceDescriptor};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        dependents: Mutex<Vec<(String, String)>>,
        contained: Mutex<Vec<(String, String)>>,
    }

    impl DependencyEdgeSink for RecordingSink {
        fn register_dependent(&self, dependency: &str, dependent: &str) {
            self.dependents
                .lock()
                .push((dependency.to_string(), dependent.to_string()));
        }

        fn register_contained(&self, contained: &str, owner: &str) {
            self.contained
                .lock()
                .push((contained.to_string(), owner.to_string()));
        }
    }

    struct Evaluator {
        calls: AtomicUsize,
    }

    impl ExpressionEvaluator for Evaluator {
        fn evaluate(&self, expression: &str) -> Result<String, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match expression {
                "${port}" => Ok("9090".to_string()),
                "${broken}" => Err("unknown placeholder".into()),
                other => Ok(other.to_string()),
            }
        }
    }

    struct StubCallback {
        components: HashMap<String, Instance>,
        sink: RecordingSink,
        converter: DefaultTypeConverter,
        evaluator: Option<Evaluator>,
        created: Mutex<Vec<String>>,
    }

    impl StubCallback {
        fn new() -> Self {
            let mut components = HashMap::new();
            components.insert("repository".to_string(), Instance::new("repo".to_string()));
            Self {
                components,
                sink: RecordingSink::default(),
                converter: DefaultTypeConverter::new(),
                evaluator: None,
                created: Mutex::new(Vec::new()),
            }
        }

        fn with_evaluator(mut self) -> Self {
            self.evaluator = Some(Evaluator {
                calls: AtomicUsize::new(0),
            });
            self
        }
    }

    impl ResolutionCallback for StubCallback {
        fn resolve_reference(&self, name: &str, _ctx: &mut ResolveContext) -> DependencyResult<Instance> {
            self.components
                .get(name)
                .cloned()
                .ok_or_else(|| DependencyError::ComponentNotRegistered {
                    name: name.to_string(),
                })
        }

        fn resolve_parent_reference(&self, _name: &str) -> Option<DependencyResult<Instance>> {
            None
        }

        fn create_nested(
            &self,
            name: &str,
            _descriptor: &InstanceDescriptor,
            _ctx: &mut ResolveContext,
        ) -> DependencyResult<Instance> {
            self.created.lock().push(name.to_string());
            Ok(Instance::new(format!("nested:{name}")))
        }

        fn resolve_by_type(
            &self,
            _required: &TypeInfo,
            _parameter_name: Option<&str>,
            _requesting: &str,
            _ctx: &mut ResolveContext,
        ) -> DependencyResult<Option<(String, Instance)>> {
            Ok(None)
        }

        fn resolve_type(&self, type_name: &str) -> Option<TypeInfo> {
            match type_name {
                "u16" => Some(TypeInfo::of::<u16>()),
                "String" => Some(TypeInfo::of::<String>()),
                _ => None,
            }
        }

        fn canonical_name(&self, name: &str) -> String {
            name.to_string()
        }

        fn inner_name(&self, _descriptor: &InstanceDescriptor, token: &str) -> String {
            format!("(inner)${token}")
        }

        fn edge_sink(&self) -> &dyn DependencyEdgeSink {
            &self.sink
        }

        fn converter(&self) -> &dyn TypeConverter {
            &self.converter
        }

        fn evaluator(&self) -> Option<&dyn ExpressionEvaluator> {
            self.evaluator.as_ref().map(|evaluator| evaluator as &dyn ExpressionEvaluator)
        }
    }

    #[test]
    fn test_list_preserves_order_and_records_edges_once() {
        let callback = StubCallback::new();
        let resolver = ValueResolver::new(&callback, "service");
        let value = Value::list(vec![
            Value::reference("repository"),
            Value::nested(InstanceDescriptor::of_type("Cache")),
            Value::literal("tail"),
        ]);

        let resolution = resolver
            .resolve(&value, &ArgumentSite::argument(0, None), &mut ResolveContext::new())
            .unwrap();

        assert!(!resolution.stable);
        let ResolvedValue::List(elements) = resolution.value else {
            panic!("expected list");
        };
        assert_eq!(elements.len(), 3);
        let first = elements[0].as_instance().unwrap().downcast::<String>().unwrap();
        assert_eq!(first.as_str(), "repo");
        let second = elements[1].as_instance().unwrap().downcast::<String>().unwrap();
        assert!(second.starts_with("nested:(inner)$"));
        assert!(matches!(&elements[2], ResolvedValue::Text(text) if text == "tail"));

        assert_eq!(
            *callback.sink.dependents.lock(),
            vec![("repository".to_string(), "service".to_string())]
        );
        assert_eq!(callback.sink.contained.lock().len(), 1);
    }

    #[test]
    fn test_set_deduplicates_identical_references() {
        let callback = StubCallback::new();
        let resolver = ValueResolver::new(&callback, "service");
        let value = Value::set(vec![
            Value::reference("repository"),
            Value::reference("repository"),
            Value::literal("a"),
            Value::literal("a"),
        ]);

        let resolution = resolver
            .resolve(&value, &ArgumentSite::default(), &mut ResolveContext::new())
            .unwrap();
        let ResolvedValue::Set(elements) = resolution.value else {
            panic!("expected set");
        };
        assert_eq!(elements.len(), 2);
    }

    #[test]
    fn test_typed_literal_conversion_and_errors() {
        let callback = StubCallback::new();
        let resolver = ValueResolver::new(&callback, "server");

        let port = resolver
            .resolve(
                &Value::typed("8080", "u16"),
                &ArgumentSite::argument(1, Some("port")),
                &mut ResolveContext::new(),
            )
            .unwrap();
        assert!(port.stable);
        assert_eq!(*port.value.as_instance().unwrap().downcast::<u16>().unwrap(), 8080);

        let error = resolver
            .resolve(
                &Value::typed("eighty", "u16"),
                &ArgumentSite::argument(1, Some("port")),
                &mut ResolveContext::new(),
            )
            .unwrap_err();
        match error {
            DependencyError::ArgumentConversion {
                name,
                position,
                argument,
                source_type,
                ..
            } => {
                assert_eq!(name, "server");
                assert_eq!(position, Some(1));
                assert_eq!(argument.as_deref(), Some("port"));
                assert_eq!(source_type, "String");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            resolver.resolve(
                &Value::typed("1", "Unknown"),
                &ArgumentSite::default(),
                &mut ResolveContext::new()
            ),
            Err(DependencyError::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_dynamic_literal_is_marked_and_reevaluated() {
        let callback = StubCallback::new().with_evaluator();
        let resolver = ValueResolver::new(&callback, "server");
        let value = Value::typed("${port}", "u16");

        for _ in 0..3 {
            let resolution = resolver
                .resolve(&value, &ArgumentSite::default(), &mut ResolveContext::new())
                .unwrap();
            assert!(!resolution.stable);
            assert_eq!(
                *resolution.value.as_instance().unwrap().downcast::<u16>().unwrap(),
                9090
            );
        }

        let Value::Typed(literal) = &value else {
            unreachable!()
        };
        assert!(literal.is_dynamic());
        let calls = callback.evaluator.as_ref().unwrap().calls.load(Ordering::SeqCst);
        assert_eq!(calls, 3);

        let plain = resolver
            .resolve(&Value::literal("plain"), &ArgumentSite::default(), &mut ResolveContext::new())
            .unwrap();
        assert!(plain.stable);
    }

    #[test]
    fn test_evaluation_failure_and_missing_parent() {
        let callback = StubCallback::new().with_evaluator();
        let resolver = ValueResolver::new(&callback, "server");

        assert!(matches!(
            resolver.resolve(&Value::literal("${broken}"), &ArgumentSite::default(), &mut ResolveContext::new()),
            Err(DependencyError::ExpressionEvaluation { .. })
        ));
        assert!(matches!(
            resolver.resolve(
                &Value::parent_reference("shared"),
                &ArgumentSite::default(),
                &mut ResolveContext::new()
            ),
            Err(DependencyError::NoParentContainer { .. })
        ));
    }

    #[test]
    fn test_properties_and_map() {
        let callback = StubCallback::new().with_evaluator();
        let resolver = ValueResolver::new(&callback, "server");

        let properties = resolver
            .resolve(
                &Value::properties([("port", "${port}"), ("host", "localhost")]),
                &ArgumentSite::default(),
                &mut ResolveContext::new(),
            )
            .unwrap();
        assert!(!properties.stable);
        let ResolvedValue::Properties(map) = properties.value else {
            panic!("expected properties");
        };
        assert_eq!(map["port"], "9090");

        let map = resolver
            .resolve(
                &Value::map(vec![(Value::literal("repo"), Value::reference("repository"))]),
                &ArgumentSite::default(),
                &mut ResolveContext::new(),
            )
            .unwrap();
        assert!(!map.stable);
        assert!(matches!(map.value, ResolvedValue::Map(entries) if entries.len() == 1));
    }
}
