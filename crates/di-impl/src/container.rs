//! 依赖注入容器
//!
//! [`DefaultContainer`] 组合描述符注册表、单例注册表、类型目录和两个解析器，
//! 对外提供按名称获取组件的入口，对内实现 [`ResolutionCallback`] 供解析器回调。

use crate::catalog::DefaultTypeCatalog;
use crate::constructor_resolver::ConstructorResolver;
use crate::converter::DefaultTypeConverter;
use crate::descriptor_registry::DefaultDescriptorRegistry;
use crate::singleton_registry::DefaultSingletonRegistry;
use crate::value_resolver::{ArgumentSite, ValueResolver};
use dashmap::DashMap;
use di_abstractions::{
    ComponentContainer, ContainerConfig, ContainerStats, CustomScope, DeclaredExecutables,
    DependencyEdgeSink, DescriptorRegistry, EarlyReferenceHook, ExecutableProvider,
    ExpressionEvaluator, ResolutionCallback, ResolveContext, SingletonRegistry, TypeCatalog,
    TypeConverter,
};
use di_common::{
    Args, ComponentType, DependencyError, DependencyResult, Instance, InstanceDescriptor,
    RootDescriptor, Scope, TypeInfo,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 获取工厂组件本身时使用的名称前缀
pub const FACTORY_PREFIX: char = '&';

/// 默认依赖注入容器
pub struct DefaultContainer {
    config: ContainerConfig,
    registry: DefaultDescriptorRegistry,
    singletons: DefaultSingletonRegistry,
    catalog: Arc<DefaultTypeCatalog>,
    provider: Arc<dyn ExecutableProvider>,
    converter: Arc<dyn TypeConverter>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    early_hooks: RwLock<Vec<Arc<dyn EarlyReferenceHook>>>,
    scopes: DashMap<String, Arc<dyn CustomScope>>,
    parent: Option<Arc<dyn ComponentContainer>>,
    nested_roots: DashMap<String, Arc<RootDescriptor>>,
    factory_products: DashMap<String, Instance>,
    instances_created: AtomicUsize,
    cache_hits: AtomicUsize,
    failed_requests: AtomicUsize,
}

impl DefaultContainer {
    /// 使用默认配置创建容器
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// 使用指定配置创建容器
    pub fn with_config(config: ContainerConfig) -> Self {
        info!("创建依赖注入容器: {:?}", config);
        Self {
            registry: DefaultDescriptorRegistry::new(config.allow_descriptor_overriding),
            config,
            singletons: DefaultSingletonRegistry::new(),
            catalog: Arc::new(DefaultTypeCatalog::new()),
            provider: Arc::new(DeclaredExecutables),
            converter: Arc::new(DefaultTypeConverter::new()),
            evaluator: None,
            early_hooks: RwLock::new(Vec::new()),
            scopes: DashMap::new(),
            parent: None,
            nested_roots: DashMap::new(),
            factory_products: DashMap::new(),
            instances_created: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
        }
    }

    /// 共享类型目录（例如与父容器共享）
    pub fn with_catalog(mut self, catalog: Arc<DefaultTypeCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// 设置候选可执行体提供者
    pub fn with_executable_provider(mut self, provider: Arc<dyn ExecutableProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// 设置类型转换器
    pub fn with_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// 设置字面量表达式求值器
    pub fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// 设置父容器
    pub fn with_parent(mut self, parent: Arc<dyn ComponentContainer>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 类型目录
    pub fn catalog(&self) -> &Arc<DefaultTypeCatalog> {
        &self.catalog
    }

    /// 添加早期引用钩子
    pub fn add_early_reference_hook(&self, hook: Arc<dyn EarlyReferenceHook>) {
        self.early_hooks.write().push(hook);
    }

    /// 注册自定义作用域
    pub fn register_scope(&self, name: impl Into<String>, scope: Arc<dyn CustomScope>) -> DependencyResult<()> {
        let name = name.into();
        if matches!(Scope::parse(&name), Scope::Singleton | Scope::Prototype) {
            return Err(DependencyError::invalid_descriptor(
                name,
                "不能替换内置作用域",
            ));
        }
        info!("注册作用域: {}", name);
        self.scopes.insert(name, scope);
        Ok(())
    }

    /// 登记组件类型
    pub fn register_type(&self, component: ComponentType) -> Arc<ComponentType> {
        self.catalog.register(component)
    }

    /// 注册组件描述符
    ///
    /// 覆盖已有描述符时，旧的单例及依赖它的单例会被销毁。
    pub fn register_descriptor(&self, name: &str, descriptor: InstanceDescriptor) -> DependencyResult<()> {
        let existed = self.registry.contains_descriptor(name);
        self.registry.register_descriptor(name, descriptor)?;
        if existed || self.singletons.contains_singleton(name) {
            self.reset_component(name);
        }
        Ok(())
    }

    /// 使用生成的名称注册匿名描述符，返回生成的名称
    pub fn register_anonymous(&self, descriptor: InstanceDescriptor) -> DependencyResult<String> {
        self.registry.register_with_generated_name(descriptor)
    }

    /// 注册别名
    pub fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()> {
        self.registry.register_alias(name, alias)
    }

    /// 规范名称的所有别名
    pub fn aliases(&self, name: &str) -> Vec<String> {
        self.registry.aliases(&self.registry.canonical_name(name))
    }

    /// 注册外部构建的单例
    pub fn register_singleton(&self, name: &str, instance: Instance) -> DependencyResult<()> {
        self.singletons.register_singleton(name, instance)
    }

    /// 移除描述符并销毁对应的单例
    pub fn remove_descriptor(&self, name: &str) -> DependencyResult<InstanceDescriptor> {
        let descriptor = self.registry.remove_descriptor(name)?;
        self.reset_component(name);
        Ok(descriptor)
    }

    /// 获取合并后的描述符
    pub fn merged_descriptor(&self, name: &str) -> DependencyResult<Arc<RootDescriptor>> {
        self.registry.merged_descriptor(name)
    }

    /// 所有描述符名称
    pub fn descriptor_names(&self) -> Vec<String> {
        self.registry.descriptor_names()
    }

    /// 依赖 `name` 的组件
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.singletons.dependents_of(&self.registry.canonical_name(name))
    }

    /// `name` 依赖的组件
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.singletons.dependencies_of(&self.registry.canonical_name(name))
    }

    fn reset_component(&self, name: &str) {
        for destroyed in self.singletons.destroy_singleton(name) {
            self.factory_products.remove(&destroyed);
        }
        self.factory_products.remove(name);
        self.nested_roots.clear();
    }

    /// 创建所有非延迟、非抽象的单例
    pub fn pre_instantiate_singletons(&self) -> DependencyResult<()> {
        let names = self.registry.descriptor_names();
        let mut created = 0_usize;
        for name in names {
            let root = self.registry.merged_descriptor(&name)?;
            let definition = &root.definition;
            if definition.is_abstract || !definition.is_singleton() || definition.is_lazy() {
                continue;
            }
            self.top_level(|ctx| self.get_raw(&name, &root, None, ctx))?;
            created += 1;
        }
        info!("预实例化 {} 个单例", created);
        Ok(())
    }

    /// 按依赖顺序销毁所有单例，返回销毁顺序
    pub fn destroy_singletons(&self) -> Vec<String> {
        let order = self.singletons.destroy_singletons();
        self.factory_products.clear();
        info!("已销毁单例: {:?}", order);
        order
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registered_descriptors: self.registry.descriptor_count(),
            active_singletons: self.singletons.singleton_count(),
            instances_created: self.instances_created.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }

    fn top_level<R>(&self, action: impl FnOnce(&mut ResolveContext) -> DependencyResult<R>) -> DependencyResult<R> {
        let mut ctx = ResolveContext::new().with_max_depth(self.config.max_resolution_depth);
        let result = action(&mut ctx);
        if let Err(error) = &result {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
            warn!("组件获取失败: {}", error);
        }
        result
    }

    fn do_get(&self, name: &str, explicit: Option<&Args>, ctx: &mut ResolveContext) -> DependencyResult<Instance> {
        let (dereference, bare) = match name.strip_prefix(FACTORY_PREFIX) {
            Some(bare) => (true, bare),
            None => (false, name),
        };
        let canonical = self.registry.canonical_name(bare);

        if explicit.is_none() {
            if let Some(instance) = self.singletons.singleton(&canonical, true) {
                trace!("返回已缓存的单例: {}", canonical);
                let shared = self.singletons.contains_singleton(&canonical);
                return self.object_for_instance(&canonical, instance, dereference, shared);
            }
        }

        if !self.registry.contains_descriptor(&canonical) {
            if let Some(parent) = &self.parent {
                debug!("组件 {} 未在本容器注册, 委托给父容器", canonical);
                return match explicit {
                    Some(args) => parent.get_with_args(name, args.clone()),
                    None => parent.get_instance(name),
                };
            }
            return Err(DependencyError::ComponentNotRegistered {
                name: bare.to_string(),
            });
        }

        let root = self.registry.merged_descriptor(&canonical)?;
        let instance = self.get_raw(&canonical, &root, explicit, ctx)?;
        self.object_for_instance(&canonical, instance, dereference, root.definition.is_singleton())
    }

    fn get_raw(
        &self,
        name: &str,
        root: &RootDescriptor,
        explicit: Option<&Args>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        let definition = &root.definition;
        if ctx.contains(name) {
            return Err(ctx.circular(name));
        }
        if definition.is_abstract {
            return Err(DependencyError::invalid_descriptor(name, "抽象描述符不能实例化"));
        }

        for dependency in &definition.depends_on {
            let dependency = self.registry.canonical_name(dependency);
            if self.singletons.is_dependent(name, &dependency) {
                return Err(DependencyError::CircularDependency {
                    name: name.to_string(),
                    chain: format!("{name} -> {dependency} -> {name} (depends-on)"),
                });
            }
            self.singletons.register_dependent(&dependency, name);
            self.do_get(&dependency, None, ctx)?;
        }

        ctx.push_name(name)?;
        let result = match definition.effective_scope() {
            Scope::Singleton => self
                .singletons
                .get_or_create(name, || self.create_instance(root, explicit, ctx)),
            Scope::Prototype => self.create_instance(root, explicit, ctx),
            Scope::Custom(scope_name) => match self.scopes.get(&scope_name).map(|entry| entry.value().clone()) {
                Some(scope) => {
                    let mut create = || self.create_instance(root, explicit, ctx);
                    scope.get(name, &mut create)
                }
                None => Err(DependencyError::invalid_descriptor(
                    name,
                    format!("作用域 '{scope_name}' 没有注册"),
                )),
            },
        };
        ctx.pop_name();
        result
    }

    /// 工厂型组件返回其产品；`&name` 返回工厂本身
    fn object_for_instance(
        &self,
        name: &str,
        instance: Instance,
        dereference: bool,
        shared: bool,
    ) -> DependencyResult<Instance> {
        if dereference {
            if instance.as_factory().is_none() {
                return Err(DependencyError::invalid_descriptor(
                    name,
                    format!("组件不是工厂型组件, 不能使用 '{FACTORY_PREFIX}' 前缀获取"),
                ));
            }
            return Ok(instance);
        }
        let Some(factory) = instance.as_factory().cloned() else {
            return Ok(instance);
        };

        if shared && factory.is_shared() {
            return self.singletons.with_creation_lock(|| {
                if let Some(product) = self.factory_products.get(name) {
                    return Ok(product.value().clone());
                }
                let product = factory
                    .produce()
                    .map_err(|error| DependencyError::creation_failed(name, error))?;
                debug!("缓存工厂产品: {}", name);
                self.factory_products.insert(name.to_string(), product.clone());
                Ok(product)
            });
        }
        factory
            .produce()
            .map_err(|error| DependencyError::creation_failed(name, error))
    }

    fn component_type(&self, root: &RootDescriptor) -> DependencyResult<Arc<ComponentType>> {
        let type_name = root
            .definition
            .type_name
            .as_deref()
            .ok_or_else(|| DependencyError::invalid_descriptor(root.name.as_str(), "描述符没有指定组件类型"))?;
        root.resolve_type_with(|| {
            self.catalog
                .component_type(type_name)
                .ok_or_else(|| DependencyError::TypeNotFound {
                    type_name: type_name.to_string(),
                })
        })
    }

    /// 实例化、暴露早期引用、填充属性
    fn create_instance(
        &self,
        root: &RootDescriptor,
        explicit: Option<&Args>,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        let name = root.name.as_str();
        let definition = &root.definition;
        debug!("创建组件实例: {}", name);

        let resolver = ConstructorResolver::new(
            self,
            self.provider.as_ref(),
            self.catalog.as_ref(),
            self.config.lenient_resolution,
            &self.cache_hits,
        );
        let instance = if definition.has_factory_method() {
            resolver.instantiate_using_factory_method(root, explicit, ctx)?
        } else {
            let component = self.component_type(root)?;
            resolver.autowire_constructor(root, &component, explicit, ctx)?
        };
        let instance = self.with_declared_type(instance);

        let early_exposed = definition.is_singleton()
            && self.config.allow_circular_references
            && self.singletons.is_in_creation(name);
        if early_exposed {
            let hooks: Vec<Arc<dyn EarlyReferenceHook>> = self
                .early_hooks
                .read()
                .iter()
                .filter(|hook| hook.applies_to(instance.type_info()))
                .cloned()
                .collect();
            let raw = instance.clone();
            let owner = name.to_string();
            self.singletons.add_early_factory(
                name,
                Box::new(move || {
                    hooks
                        .iter()
                        .fold(raw, |current, hook| hook.expose_early(current, &owner))
                }),
            );
            trace!("登记早期引用工厂: {}", name);
        }

        self.populate_properties(root, &instance, ctx)?;

        let exposed = if early_exposed {
            self.singletons.early_reference(name).unwrap_or(instance)
        } else {
            instance
        };
        self.instances_created.fetch_add(1, Ordering::Relaxed);
        Ok(exposed)
    }

    /// 类型目录中登记了父类和接口的类型，用登记的类型信息替换
    fn with_declared_type(&self, instance: Instance) -> Instance {
        match self.catalog.component_type(&instance.type_info().name) {
            Some(component) if component.info.same_type(instance.type_info()) => {
                instance.retyped(component.info.clone())
            }
            _ => instance,
        }
    }

    fn populate_properties(
        &self,
        root: &RootDescriptor,
        instance: &Instance,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<()> {
        let name = root.name.as_str();
        let properties = &root.definition.properties;
        if properties.is_empty() {
            return Ok(());
        }

        let type_name = instance.type_info().name.to_string();
        let component = self.catalog.component_type(&type_name).ok_or_else(|| {
            DependencyError::invalid_descriptor(name, format!("类型 {type_name} 没有登记, 无法设置属性"))
        })?;
        let resolver = ValueResolver::new(self, name);

        for property in properties {
            let setter = component.setter(&property.name).ok_or_else(|| {
                DependencyError::invalid_descriptor(
                    name,
                    format!("类型 {} 没有可写属性 '{}'", component.name(), property.name),
                )
            })?;
            let site = ArgumentSite::property(&property.name);
            let resolution = resolver.resolve(&property.value, &site, ctx)?;
            let value = self
                .converter
                .convert(&resolution.value, &setter.ty, Some(&property.name))
                .map_err(|error| {
                    DependencyError::conversion(name, None, Some(property.name.clone()), &error)
                })?;
            setter
                .apply(instance, value.as_ref())
                .map_err(|error| DependencyError::creation_failed(name, error))?;
            trace!("设置属性: {}.{}", name, property.name);
        }
        Ok(())
    }

    /// 预测组件类型；`visiting` 记录工厂所属组件链，出现重复时放弃预测
    fn predict_type(&self, name: &str, visiting: &mut Vec<String>) -> Option<TypeInfo> {
        let (dereference, bare) = match name.strip_prefix(FACTORY_PREFIX) {
            Some(bare) => (true, bare),
            None => (false, name),
        };
        let canonical = self.registry.canonical_name(bare);

        if let Some(instance) = self.singletons.singleton(&canonical, false) {
            return Some(self.instance_type(&instance, dereference));
        }
        if !self.registry.contains_descriptor(&canonical) {
            return self.parent.as_ref().and_then(|parent| parent.type_of(name));
        }
        if visiting.contains(&canonical) {
            debug!("工厂所属组件形成循环, 无法预测类型: {}", canonical);
            return None;
        }

        let root = self.registry.merged_descriptor(&canonical).ok()?;
        let definition = &root.definition;
        if definition.is_abstract {
            return None;
        }
        if definition.has_factory_method() {
            visiting.push(canonical);
            let predicted = self.factory_method_type(definition, visiting);
            visiting.pop();
            return predicted;
        }
        let type_name = definition.type_name.as_deref()?;
        self.catalog
            .component_type(type_name)
            .map(|component| component.info.clone())
            .or_else(|| self.catalog.type_info(type_name))
    }

    /// 预测工厂方法的返回类型
    fn factory_method_type(
        &self,
        definition: &InstanceDescriptor,
        visiting: &mut Vec<String>,
    ) -> Option<TypeInfo> {
        let method = definition.factory_method.as_deref()?;
        let (component, is_static) = match definition.factory_owner.as_deref() {
            Some(owner) => {
                let owner_type = self.predict_type(owner, visiting)?;
                (self.catalog.component_type(&owner_type.name)?, false)
            }
            None => (
                self.catalog
                    .component_type(definition.type_name.as_deref()?)?,
                true,
            ),
        };
        self.provider
            .factory_methods(&component, method, is_static)
            .iter()
            .find_map(|candidate| candidate.return_type.clone())
    }

    fn is_primary(&self, name: &str) -> bool {
        self.registry
            .merged_descriptor(name)
            .map(|root| root.definition.primary)
            .unwrap_or(false)
    }

    fn instance_type(&self, instance: &Instance, dereference: bool) -> TypeInfo {
        match instance.as_factory() {
            Some(factory) if !dereference => factory
                .product_type()
                .unwrap_or_else(|| instance.type_info().clone()),
            _ => instance.type_info().clone(),
        }
    }
}

impl Default for DefaultContainer {
    fn default() -> Self {
        Self::new()
    }
}

/// 在多个候选中选出唯一一个：首选组件优先，其次名称与参数名一致
fn select_candidate(
    required: &TypeInfo,
    candidates: Vec<String>,
    parameter_name: Option<&str>,
    is_primary: impl Fn(&str) -> bool,
) -> DependencyResult<Option<String>> {
    if candidates.len() <= 1 {
        return Ok(candidates.into_iter().next());
    }

    let primaries: Vec<&String> = candidates.iter().filter(|name| is_primary(name)).collect();
    match primaries.as_slice() {
        [only] => return Ok(Some((*only).clone())),
        [] => {}
        _ => {
            return Err(DependencyError::NoUniqueCandidate {
                required_type: required.short_name().to_string(),
                candidates: primaries.into_iter().cloned().collect(),
            });
        }
    }

    if let Some(parameter_name) = parameter_name {
        if let Some(matched) = candidates.iter().find(|name| name.as_str() == parameter_name) {
            return Ok(Some(matched.clone()));
        }
    }

    Err(DependencyError::NoUniqueCandidate {
        required_type: required.short_name().to_string(),
        candidates,
    })
}

impl ResolutionCallback for DefaultContainer {
    fn resolve_reference(&self, name: &str, ctx: &mut ResolveContext) -> DependencyResult<Instance> {
        self.do_get(name, None, ctx)
    }

    fn resolve_parent_reference(&self, name: &str) -> Option<DependencyResult<Instance>> {
        self.parent.as_ref().map(|parent| parent.get_instance(name))
    }

    fn create_nested(
        &self,
        name: &str,
        descriptor: &InstanceDescriptor,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Instance> {
        let root = match self.nested_roots.get(name).map(|entry| entry.value().clone()) {
            Some(root) => root,
            None => {
                let definition = match descriptor.parent.as_deref() {
                    Some(parent) => {
                        let parent = self.registry.merged_descriptor(parent)?;
                        descriptor.merged_with_parent(&parent.definition)
                    }
                    None => descriptor.clone(),
                };
                definition.validate(name)?;
                let root = Arc::new(RootDescriptor::new(name, definition));
                self.nested_roots.insert(name.to_string(), root.clone());
                root
            }
        };

        if root.definition.is_abstract {
            return Err(DependencyError::invalid_descriptor(name, "抽象描述符不能实例化"));
        }
        if ctx.contains(name) {
            return Err(ctx.circular(name));
        }

        ctx.push_name(name)?;
        let result = if descriptor.scope == Some(Scope::Singleton) {
            self.singletons
                .get_or_create(name, || self.create_instance(&root, None, ctx))
        } else {
            self.create_instance(&root, None, ctx)
        };
        ctx.pop_name();
        result
    }

    fn resolve_by_type(
        &self,
        required: &TypeInfo,
        parameter_name: Option<&str>,
        requesting: &str,
        ctx: &mut ResolveContext,
    ) -> DependencyResult<Option<(String, Instance)>> {
        let candidates: Vec<String> = self
            .names_for_type(required)
            .into_iter()
            .filter(|name| name != requesting)
            .collect();

        if candidates.is_empty() {
            let Some(parent) = &self.parent else {
                return Ok(None);
            };
            let inherited = parent.names_for_type(required);
            let Some(chosen) = select_candidate(required, inherited, parameter_name, |_| false)? else {
                return Ok(None);
            };
            debug!("按类型 {} 在父容器中找到组件: {}", required.short_name(), chosen);
            let instance = parent.get_instance(&chosen)?;
            return Ok(Some((chosen, instance)));
        }

        let Some(chosen) =
            select_candidate(required, candidates, parameter_name, |name| self.is_primary(name))?
        else {
            return Ok(None);
        };
        debug!("按类型 {} 装配组件: {} -> {}", required.short_name(), chosen, requesting);
        let instance = self.do_get(&chosen, None, ctx)?;
        self.singletons.register_dependent(&chosen, requesting);
        Ok(Some((chosen, instance)))
    }

    fn resolve_type(&self, type_name: &str) -> Option<TypeInfo> {
        self.catalog.type_info(type_name)
    }

    fn canonical_name(&self, name: &str) -> String {
        self.registry.canonical_name(name)
    }

    fn inner_name(&self, descriptor: &InstanceDescriptor, token: &str) -> String {
        self.registry.generate_inner_name(descriptor, token)
    }

    fn edge_sink(&self) -> &dyn DependencyEdgeSink {
        &self.singletons
    }

    fn converter(&self) -> &dyn TypeConverter {
        self.converter.as_ref()
    }

    fn evaluator(&self) -> Option<&dyn ExpressionEvaluator> {
        self.evaluator.as_deref()
    }
}

impl ComponentContainer for DefaultContainer {
    fn get_instance(&self, name: &str) -> DependencyResult<Instance> {
        self.top_level(|ctx| self.do_get(name, None, ctx))
    }

    fn get_with_args(&self, name: &str, args: Args) -> DependencyResult<Instance> {
        self.top_level(|ctx| self.do_get(name, Some(&args), ctx))
    }

    fn contains(&self, name: &str) -> bool {
        let bare = name.trim_start_matches(FACTORY_PREFIX);
        let canonical = self.registry.canonical_name(bare);
        self.registry.contains_descriptor(&canonical)
            || self.singletons.contains_singleton(&canonical)
            || self.parent.as_ref().is_some_and(|parent| parent.contains(name))
    }

    fn is_singleton(&self, name: &str) -> DependencyResult<bool> {
        let canonical = self.registry.canonical_name(name.trim_start_matches(FACTORY_PREFIX));
        if self.registry.contains_descriptor(&canonical) {
            return Ok(self.registry.merged_descriptor(&canonical)?.definition.is_singleton());
        }
        if self.singletons.contains_singleton(&canonical) {
            return Ok(true);
        }
        match &self.parent {
            Some(parent) => parent.is_singleton(name),
            None => Err(DependencyError::ComponentNotRegistered { name: canonical }),
        }
    }

    fn is_prototype(&self, name: &str) -> DependencyResult<bool> {
        let canonical = self.registry.canonical_name(name.trim_start_matches(FACTORY_PREFIX));
        if self.registry.contains_descriptor(&canonical) {
            return Ok(self.registry.merged_descriptor(&canonical)?.definition.is_prototype());
        }
        if self.singletons.contains_singleton(&canonical) {
            return Ok(false);
        }
        match &self.parent {
            Some(parent) => parent.is_prototype(name),
            None => Err(DependencyError::ComponentNotRegistered { name: canonical }),
        }
    }

    fn type_of(&self, name: &str) -> Option<TypeInfo> {
        self.predict_type(name, &mut Vec::new())
    }

    fn names_for_type(&self, required: &TypeInfo) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .descriptor_names()
            .into_iter()
            .filter(|name| {
                self.registry
                    .merged_descriptor(name)
                    .map(|root| !root.definition.is_abstract)
                    .unwrap_or(false)
            })
            .collect();
        for singleton in self.singletons.singleton_names() {
            if !self.registry.contains_descriptor(&singleton) {
                names.push(singleton);
            }
        }

        names
            .into_iter()
            .filter(|name| {
                self.type_of(name)
                    .is_some_and(|info| required.is_assignable_from(&info))
            })
            .collect()
    }
}
