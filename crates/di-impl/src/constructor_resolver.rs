//! 构造函数与工厂方法解析器
//!
//! 在多个候选可执行体中选择与配置参数最匹配的一个：
//! 1. 先解析描述符上配置的参数，得到最少参数数量
//! 2. 候选按公开优先、参数多者优先排序
//! 3. 逐个候选绑定参数（按索引、按类型/名称、自动装配），绑定失败的候选被跳过
//! 4. 宽松模式按类型差异权重选最小者，严格模式按可赋值性并拒绝平局
//!
//! 选择结果缓存到 [`RootDescriptor`] 上，后续创建直接复用。

use crate::arguments::ArgumentsHolder;
use crate::value_resolver::{ArgumentSite, Resolution, ValueResolver};
use di_abstractions::{ExecutableProvider, ResolutionCallback, ResolveContext, TypeCatalog};
use di_common::{
    Args, CachedArguments, ComponentType, DependencyError, DependencyResult, Executable,
    ExecutableKind, Instance, Parameter, PreparedArgument, ResolutionOutcome, ResolvedValue,
    RootDescriptor, TypeInfo, Value,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// 解析后的配置参数
#[derive(Debug, Clone)]
struct ConfiguredArgument {
    original: Value,
    resolution: Resolution,
    type_hint: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default)]
struct ConfiguredArguments {
    indexed: BTreeMap<usize, ConfiguredArgument>,
    generic: Vec<ConfiguredArgument>,
}

impl ConfiguredArguments {
    fn count(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    fn describe(&self) -> String {
        self.indexed
            .values()
            .chain(&self.generic)
            .map(|argument| {
                argument
                    .type_hint
                    .clone()
                    .unwrap_or_else(|| argument.resolution.value.type_name())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 参数来源：调用时显式传入，或描述符上的配置
enum ArgumentSource<'s> {
    Explicit(&'s Args),
    Configured(ConfiguredArguments),
}

impl ArgumentSource<'_> {
    fn describe(&self) -> String {
        match self {
            Self::Explicit(args) => args
                .values()
                .iter()
                .map(|value| match value {
                    Some(instance) => instance.type_info().short_name().to_string(),
                    None => "null".to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Self::Configured(configured) => configured.describe(),
        }
    }
}

/// 构造函数解析器
///
/// 每次创建组件时临时构造，借用容器的各个协作组件。
pub struct ConstructorResolver<'a> {
    callback: &'a dyn ResolutionCallback,
    provider: &'a dyn ExecutableProvider,
    catalog: &'a dyn TypeCatalog,
    lenient_default: bool,
    cache_hits: &'a AtomicUsize,
}

impl<'a> ConstructorResolver<'a> {
    /// 创建解析器
    pub fn new(
        callback: &'a dyn ResolutionCallback,
        provider: &'a dyn ExecutableProvider,
        catalog: &'a dyn TypeCatalog,
        lenient_default: bool,
        cache_hits: &'a AtomicUsize,
    ) -> Self {
        Self {
            callback,
            provider,
            catalog,
            lenient_default,
            cache_hits,
        }
    }

    /// 选择构造函数并创建实例
    pub fn autowire_constructor(
        &self,
        root: &RootDescriptor,
        component: &ComponentType,
        explicit: Option<&Args>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        if explicit.is_none() {
            if let Some(instance) = self.instantiate_from_cache(root, None, ctx)? {
                return Ok(instance);
            }
        }

        let candidates = self.provider.constructors(component);
        self.resolve_and_invoke(
            root,
            candidates,
            None,
            ExecutableKind::Constructor,
            explicit,
            ctx,
        )
    }

    /// 选择工厂方法并调用
    ///
    /// 描述符有工厂组件时调用其实例方法，否则调用组件类型上的静态方法。
    pub fn instantiate_using_factory_method(
        &self,
        root: &RootDescriptor,
        explicit: Option<&Args>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        let name = root.name.as_str();
        let definition = &root.definition;
        let method = definition
            .factory_method
            .as_deref()
            .ok_or_else(|| DependencyError::invalid_descriptor(name, "没有指定工厂方法"))?;

        let (component, target, kind) = match definition.factory_owner.as_deref() {
            Some(owner) => {
                let owner_name = self.callback.canonical_name(owner);
                if owner_name == name {
                    return Err(DependencyError::invalid_descriptor(
                        name,
                        "工厂组件不能是自身",
                    ));
                }
                let owner_instance = self.callback.resolve_reference(owner, ctx)?;
                self.callback.edge_sink().register_dependent(&owner_name, name);
                let owner_type = owner_instance.type_info().name.to_string();
                let component = self
                    .catalog
                    .component_type(&owner_type)
                    .ok_or(DependencyError::TypeNotFound {
                        type_name: owner_type,
                    })?;
                (component, Some(owner_instance), ExecutableKind::InstanceMethod)
            }
            None => {
                let type_name = definition.type_name.as_deref().ok_or_else(|| {
                    DependencyError::invalid_descriptor(name, "静态工厂方法需要组件类型")
                })?;
                let component = root.resolve_type_with(|| {
                    self.catalog
                        .component_type(type_name)
                        .ok_or_else(|| DependencyError::TypeNotFound {
                            type_name: type_name.to_string(),
                        })
                })?;
                (component, None, ExecutableKind::StaticMethod)
            }
        };

        if explicit.is_none() {
            if let Some(instance) = self.instantiate_from_cache(root, target.as_ref(), ctx)? {
                return Ok(instance);
            }
        }

        let is_static = kind == ExecutableKind::StaticMethod;
        let candidates = self.provider.factory_methods(&component, method, is_static);
        if candidates.is_empty() {
            return Err(DependencyError::NoMatchingExecutable {
                name: name.to_string(),
                kind: kind.describe(),
                signature: String::new(),
                hint: format!(
                    ": 类型 {} 上没有名为 '{}' 的{}方法",
                    component.name(),
                    method,
                    if is_static { "静态" } else { "实例" }
                ),
            });
        }

        self.resolve_and_invoke(root, candidates, target.as_ref(), kind, explicit, ctx)
    }

    /// 使用缓存的选择结果创建实例
    fn instantiate_from_cache(
        &self,
        root: &RootDescriptor,
        target: Option<&Instance>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Option<Instance>> {
        let Some(outcome) = root.cache().get() else {
            return Ok(None);
        };
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        trace!(
            "使用缓存的{}: {} -> {}",
            outcome.executable.kind.describe(),
            root.name,
            outcome.executable.signature()
        );

        let arguments = match &outcome.arguments {
            CachedArguments::Resolved(arguments) => arguments.clone(),
            CachedArguments::Prepared(prepared) => {
                self.resolve_prepared(root, &outcome.executable, prepared, ctx)?
            }
        };
        self.invoke(root, &outcome.executable, target, arguments)
            .map(Some)
    }

    /// 重新解析缓存中需要每次解析的参数
    fn resolve_prepared(
        &self,
        root: &RootDescriptor,
        executable: &Executable,
        prepared: &[PreparedArgument],
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Vec<Option<Instance>>> {
        let name = root.name.as_str();
        let resolver = ValueResolver::new(self.callback, name);
        let mut arguments = Vec::with_capacity(prepared.len());

        for (index, (argument, param)) in prepared.iter().zip(&executable.params).enumerate() {
            let value = match argument {
                PreparedArgument::Converted(value) => value.clone(),
                PreparedArgument::Raw(value) => {
                    let site = ArgumentSite::argument(index, param.name.as_deref());
                    let resolution = resolver.resolve(value, &site, ctx)?;
                    self.convert(name, index, param, &resolution.value)?
                }
                PreparedArgument::Autowired => {
                    let (_, instance) = self.autowire(name, index, param, ctx)?;
                    Some(instance)
                }
            };
            arguments.push(value);
        }
        Ok(arguments)
    }

    fn resolve_and_invoke(
        &self,
        root: &RootDescriptor,
        mut candidates: Vec<Arc<Executable>>,
        target: Option<&Instance>,
        kind: ExecutableKind,
        explicit: Option<&Args>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        let name = root.name.as_str();
        let definition = &root.definition;

        if candidates.is_empty() {
            return Err(DependencyError::NoMatchingExecutable {
                name: name.to_string(),
                kind: kind.describe(),
                signature: String::new(),
                hint: ": 组件类型没有声明任何候选".to_string(),
            });
        }

        if explicit.is_none()
            && candidates.len() == 1
            && definition.constructor_args.is_empty()
            && candidates[0].parameter_count() == 0
        {
            let executable = candidates.remove(0);
            ensure_returns_value(name, &executable)?;
            root.cache().store(ResolutionOutcome {
                executable: executable.clone(),
                arguments: CachedArguments::Resolved(Vec::new()),
            });
            return self.invoke(root, &executable, target, Vec::new());
        }

        let lenient = definition.is_lenient(self.lenient_default);
        let autowiring = explicit.is_none() && definition.autowires_constructor();
        let (min_args, source) = match explicit {
            Some(args) => (args.len(), ArgumentSource::Explicit(args)),
            None => {
                let (min_args, configured) = self.resolve_configured_arguments(root, ctx)?;
                (min_args, ArgumentSource::Configured(configured))
            }
        };

        sort_candidates(&mut candidates);

        let mut chosen: Option<(Arc<Executable>, ArgumentsHolder)> = None;
        let mut min_weight = i32::MAX;
        let mut ambiguous: Vec<Arc<Executable>> = Vec::new();
        let mut causes: Vec<DependencyError> = Vec::new();

        for candidate in &candidates {
            let count = candidate.parameter_count();
            if let Some((_, holder)) = &chosen {
                if holder.arguments.len() > count {
                    break;
                }
            }
            if count < min_args {
                continue;
            }

            let bound = match &source {
                ArgumentSource::Explicit(args) => {
                    if count != args.len() {
                        continue;
                    }
                    self.bind_explicit(name, candidate, args)
                }
                ArgumentSource::Configured(configured) => {
                    self.create_argument_array(name, candidate, configured, autowiring, ctx)
                }
            };
            let holder = match bound {
                Ok(holder) => holder,
                Err(error) if error.is_candidate_mismatch() => {
                    trace!("候选 {} 不匹配: {}", candidate.signature(), error);
                    causes.push(error);
                    continue;
                }
                Err(error) => return Err(error),
            };

            let weight = if lenient {
                holder.type_difference_weight(&candidate.params)
            } else {
                holder.assignability_weight(&candidate.params)
            };
            trace!("候选 {} 的匹配权重: {}", candidate.signature(), weight);

            if weight < min_weight {
                min_weight = weight;
                chosen = Some((candidate.clone(), holder));
                ambiguous.clear();
            } else if weight == min_weight {
                if let Some((best, _)) = &chosen {
                    if ambiguous.is_empty() {
                        ambiguous.push(best.clone());
                    }
                    ambiguous.push(candidate.clone());
                }
            }
        }

        let Some((executable, holder)) = chosen else {
            if causes.len() == 1 {
                return Err(causes.remove(0));
            }
            let mut hint = String::new();
            if matches!(&source, ArgumentSource::Configured(configured) if configured.count() > 0)
            {
                hint.push_str(" (提示: 为简单类型参数指定 index/type/name 以避免类型歧义)");
            }
            if let Some(cause) = causes.last() {
                hint.push_str(&format!(", 最后一个错误: {cause}"));
            }
            return Err(DependencyError::NoMatchingExecutable {
                name: name.to_string(),
                kind: kind.describe(),
                signature: source.describe(),
                hint,
            });
        };

        if !ambiguous.is_empty() {
            let signatures = ambiguous
                .iter()
                .map(|candidate| candidate.signature())
                .collect::<Vec<_>>();
            if !lenient {
                return Err(DependencyError::AmbiguousExecutable {
                    name: name.to_string(),
                    kind: kind.describe(),
                    candidates: signatures,
                });
            }
            debug!(
                "组件 '{}' 有多个同样匹配的{}, 选择第一个: {:?}",
                name,
                kind.describe(),
                signatures
            );
        }

        ensure_returns_value(name, &executable)?;

        if explicit.is_none() {
            let arguments = if holder.resolve_necessary {
                CachedArguments::Prepared(holder.prepared.clone())
            } else {
                CachedArguments::Resolved(holder.arguments.clone())
            };
            root.cache().store(ResolutionOutcome {
                executable: executable.clone(),
                arguments,
            });
        }

        debug!("组件 '{}' 使用{}: {}", name, kind.describe(), executable.signature());
        if !holder.autowired.is_empty() {
            debug!("组件 '{}' 自动装配了: {:?}", name, holder.autowired);
        }
        self.invoke(root, &executable, target, holder.arguments)
    }

    /// 解析描述符上配置的参数，返回最少参数数量
    fn resolve_configured_arguments(
        &self,
        root: &RootDescriptor,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<(usize, ConfiguredArguments)> {
        let arguments = &root.definition.constructor_args;
        let resolver = ValueResolver::new(self.callback, &root.name);
        let mut min_args = arguments.argument_count();
        let mut configured = ConfiguredArguments::default();

        for (index, argument) in &arguments.indexed {
            min_args = min_args.max(index + 1);
            let site = ArgumentSite::argument(*index, argument.name.as_deref());
            let resolution = resolver.resolve(&argument.value, &site, ctx)?;
            configured.indexed.insert(
                *index,
                ConfiguredArgument {
                    original: argument.value.clone(),
                    resolution,
                    type_hint: argument.type_hint.clone(),
                    name: argument.name.clone(),
                },
            );
        }

        for argument in &arguments.generic {
            let site = ArgumentSite {
                position: None,
                name: argument.name.clone(),
            };
            let resolution = resolver.resolve(&argument.value, &site, ctx)?;
            configured.generic.push(ConfiguredArgument {
                original: argument.value.clone(),
                resolution,
                type_hint: argument.type_hint.clone(),
                name: argument.name.clone(),
            });
        }

        Ok((min_args, configured))
    }

    /// 为一个候选绑定配置参数
    fn create_argument_array(
        &self,
        name: &str,
        candidate: &Executable,
        configured: &ConfiguredArguments,
        autowiring: bool,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<ArgumentsHolder> {
        let mut holder = ArgumentsHolder::with_capacity(candidate.parameter_count());
        let mut used: HashSet<usize> = HashSet::new();

        for (index, param) in candidate.params.iter().enumerate() {
            let mut argument = configured
                .indexed
                .get(&index)
                .filter(|argument| self.indexed_matches(argument, param));

            if argument.is_none() {
                if let Some(position) = self.find_generic(configured, param, &used) {
                    used.insert(position);
                    argument = configured.generic.get(position);
                }
            }

            if argument.is_none()
                && (!autowiring || candidate.parameter_count() == configured.count())
            {
                let position = configured
                    .generic
                    .iter()
                    .enumerate()
                    .find(|(position, argument)| {
                        !used.contains(position)
                            && argument.type_hint.is_none()
                            && argument.name.is_none()
                    })
                    .map(|(position, _)| position);
                if let Some(position) = position {
                    used.insert(position);
                    argument = configured.generic.get(position);
                }
            }

            match argument {
                Some(argument) => {
                    let raw = argument.resolution.value.clone();
                    let converted = self.convert(name, index, param, &raw)?;
                    let prepared = if argument.resolution.stable {
                        PreparedArgument::Converted(converted.clone())
                    } else {
                        PreparedArgument::Raw(argument.original.clone())
                    };
                    trace!("绑定参数 #{}: {} -> {}", index, raw.type_name(), param.ty);
                    holder.push(converted, raw, prepared);
                }
                None if autowiring => {
                    let (dependency, instance) = self.autowire(name, index, param, ctx)?;
                    holder.push(
                        Some(instance.clone()),
                        ResolvedValue::Object(instance),
                        PreparedArgument::Autowired,
                    );
                    holder.autowired.push(dependency);
                }
                None => {
                    return Err(unsatisfied(
                        name,
                        index,
                        &param.ty,
                        "没有匹配的参数值, 且未启用自动装配",
                    ));
                }
            }
        }

        Ok(holder)
    }

    /// 为一个候选绑定显式传入的参数
    fn bind_explicit(
        &self,
        name: &str,
        candidate: &Executable,
        args: &Args,
    ) -> DependencyResult<ArgumentsHolder> {
        let mut holder = ArgumentsHolder::with_capacity(args.len());
        for (index, (param, value)) in candidate.params.iter().zip(args.values()).enumerate() {
            let raw = match value {
                Some(instance) => ResolvedValue::Object(instance.clone()),
                None => ResolvedValue::Null,
            };
            let converted = self.convert(name, index, param, &raw)?;
            holder.push(converted.clone(), raw, PreparedArgument::Converted(converted));
        }
        Ok(holder)
    }

    /// 索引参数的类型提示和名称是否与参数声明一致
    fn indexed_matches(&self, argument: &ConfiguredArgument, param: &Parameter) -> bool {
        let type_matches = argument
            .type_hint
            .as_deref()
            .map_or(true, |hint| self.hint_matches(hint, &param.ty));
        let name_matches = match (&argument.name, &param.name) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => true,
        };
        type_matches && name_matches
    }

    /// 查找第一个匹配的未使用通用参数
    fn find_generic(
        &self,
        configured: &ConfiguredArguments,
        param: &Parameter,
        used: &HashSet<usize>,
    ) -> Option<usize> {
        configured
            .generic
            .iter()
            .enumerate()
            .filter(|(position, _)| !used.contains(position))
            .find(|(_, argument)| {
                if let Some(expected) = &argument.name {
                    if param.name.as_ref().is_some_and(|actual| actual != expected) {
                        return false;
                    }
                }
                match &argument.type_hint {
                    Some(hint) => self.hint_matches(hint, &param.ty),
                    None if argument.name.is_none() => {
                        argument.resolution.value.is_assignable_to(&param.ty)
                    }
                    None => true,
                }
            })
            .map(|(position, _)| position)
    }

    fn hint_matches(&self, hint: &str, ty: &TypeInfo) -> bool {
        ty.matches_name(hint)
            || self
                .catalog
                .type_info(hint)
                .is_some_and(|info| info.same_type(ty))
    }

    fn convert(
        &self,
        name: &str,
        index: usize,
        param: &Parameter,
        value: &ResolvedValue,
    ) -> DependencyResult<Option<Instance>> {
        self.callback
            .converter()
            .convert(value, &param.ty, param.name.as_deref())
            .map_err(|error| DependencyError::conversion(name, Some(index), param.name.clone(), &error))
    }

    fn autowire(
        &self,
        name: &str,
        index: usize,
        param: &Parameter,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<(String, Instance)> {
        self.callback
            .resolve_by_type(&param.ty, param.name.as_deref(), name, ctx)?
            .ok_or_else(|| unsatisfied(name, index, &param.ty, "容器中没有匹配类型的组件"))
    }

    fn invoke(
        &self,
        root: &RootDescriptor,
        executable: &Executable,
        target: Option<&Instance>,
        arguments: Vec<Option<Instance>>,
    ) -> DependencyResult<Instance> {
        executable
            .invoke(target, &Args::new(arguments))
            .map_err(|error| DependencyError::creation_failed(root.name.as_str(), error))
    }
}

/// 公开的候选在前，同可见性下参数多的在前；排序稳定，保留声明顺序
fn sort_candidates(candidates: &mut [Arc<Executable>]) {
    candidates.sort_by(|a, b| {
        a.visibility
            .cmp(&b.visibility)
            .then(b.parameter_count().cmp(&a.parameter_count()))
    });
}

fn ensure_returns_value(name: &str, executable: &Executable) -> DependencyResult<()> {
    if executable.kind != ExecutableKind::Constructor && executable.is_void() {
        return Err(DependencyError::InvalidFactoryMethod {
            name: name.to_string(),
            method: executable.name.clone(),
        });
    }
    Ok(())
}

fn unsatisfied(name: &str, index: usize, ty: &TypeInfo, message: &str) -> DependencyError {
    DependencyError::UnsatisfiedDependency {
        name: name.to_string(),
        position: index,
        required_type: ty.short_name().to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executable(params: Vec<Parameter>) -> Arc<Executable> {
        Arc::new(Executable::constructor(params, |_| Ok(())))
    }

    #[test]
    fn test_candidates_sorted_public_first_then_by_arity() {
        let mut candidates = vec![
            executable(vec![Parameter::of::<String>("a")]),
            Arc::new(
                Executable::constructor(
                    vec![
                        Parameter::of::<String>("a"),
                        Parameter::of::<i32>("b"),
                        Parameter::of::<i32>("c"),
                    ],
                    |_| Ok(()),
                )
                .non_public(),
            ),
            executable(vec![]),
            executable(vec![Parameter::of::<String>("a"), Parameter::of::<i32>("b")]),
        ];

        sort_candidates(&mut candidates);

        let counts = candidates
            .iter()
            .map(|candidate| (candidate.is_public(), candidate.parameter_count()))
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![(true, 2), (true, 1), (true, 0), (false, 3)]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_arity() {
        let first = executable(vec![Parameter::of::<String>("a")]);
        let second = executable(vec![Parameter::of::<i32>("a")]);
        let mut candidates = vec![first.clone(), second.clone()];

        sort_candidates(&mut candidates);

        assert!(Arc::ptr_eq(&candidates[0], &first));
        assert!(Arc::ptr_eq(&candidates[1], &second));
    }

    #[test]
    fn test_void_factory_method_rejected() {
        let method = Executable::static_method("init", vec![], None, |_| Ok(Instance::new(())));
        let error = ensure_returns_value("service", &method).unwrap_err();
        assert!(matches!(error, DependencyError::InvalidFactoryMethod { .. }));

        let constructor = Executable::constructor(vec![], |_| Ok(()));
        assert!(ensure_returns_value("service", &constructor).is_ok());
    }
}
