//! 单例注册表实现
//!
//! 已创建的单例保存在无锁读取的 `DashMap` 中；创建过程、早期引用和依赖边的修改
//! 都在一个注册表级的可重入互斥锁下进行。同一线程在创建过程中递归获取其他单例时可以重入，
//! 其他线程则阻塞到创建完成或失败，从而对每个名称保证只有一个线程执行构造。

use dashmap::{DashMap, DashSet};
use di_abstractions::{DependencyEdgeSink, SingletonRegistry};
use di_common::{DependencyError, DependencyResult, Instance};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// 早期引用工厂，在循环依赖第一次请求早期引用时调用
pub type EarlyReferenceFactory = Box<dyn FnOnce() -> Instance + Send>;

#[derive(Default)]
struct CreationState {
    early_factories: HashMap<String, EarlyReferenceFactory>,
    early_objects: HashMap<String, Instance>,
}

/// 一次失败的创建
struct CreationFailure {
    generation: u64,
    error: DependencyError,
}

/// 默认单例注册表
pub struct DefaultSingletonRegistry {
    singleton_objects: DashMap<String, Instance>,
    in_creation: DashSet<String>,
    creation: ReentrantMutex<RefCell<CreationState>>,
    registration_order: Mutex<Vec<String>>,
    failures: DashMap<String, CreationFailure>,
    failure_generation: AtomicU64,
    /// 被依赖者 -> 依赖它的组件
    dependents: DashMap<String, BTreeSet<String>>,
    /// 组件 -> 它依赖的组件
    dependencies: DashMap<String, BTreeSet<String>>,
    /// 外层组件 -> 内嵌组件
    contained: DashMap<String, BTreeSet<String>>,
}

/// 创建过程守卫
///
/// 无论创建成功、失败还是 panic，离开作用域时都清除创建中标记和早期引用状态。
struct CreationGuard<'a> {
    registry: &'a DefaultSingletonRegistry,
    name: &'a str,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.registry.in_creation.remove(self.name);
        let guard = self.registry.creation.lock();
        let mut state = guard.borrow_mut();
        state.early_factories.remove(self.name);
        state.early_objects.remove(self.name);
    }
}

impl DefaultSingletonRegistry {
    /// 创建新的单例注册表
    pub fn new() -> Self {
        Self {
            singleton_objects: DashMap::new(),
            in_creation: DashSet::new(),
            creation: ReentrantMutex::new(RefCell::new(CreationState::default())),
            registration_order: Mutex::new(Vec::new()),
            failures: DashMap::new(),
            failure_generation: AtomicU64::new(0),
            dependents: DashMap::new(),
            dependencies: DashMap::new(),
            contained: DashMap::new(),
        }
    }

    fn cached(&self, name: &str) -> Option<Instance> {
        self.singleton_objects.get(name).map(|entry| entry.value().clone())
    }

    /// 获取单例，不存在时在注册表锁内调用 `create` 创建
    ///
    /// 并发请求同一名称时只有一个线程执行 `create`；等待中的线程观察到同一个实例，
    /// 或者同一个错误。之后的请求会重新尝试创建。
    pub fn get_or_create<F>(&self, name: &str, create: F) -> DependencyResult<Instance>
    where
        F: FnOnce() -> DependencyResult<Instance>,
    {
        if let Some(instance) = self.cached(name) {
            return Ok(instance);
        }
        let entered = self.failure_generation.load(Ordering::Acquire);
        let _lock = self.creation.lock();

        if let Some(instance) = self.cached(name) {
            return Ok(instance);
        }
        if let Some(failure) = self.failures.get(name) {
            if failure.generation > entered {
                debug!("单例 {} 在等待期间创建失败, 返回同一错误", name);
                return Err(failure.error.clone());
            }
        }

        self.before_creation(name)?;
        let guard = CreationGuard {
            registry: self,
            name,
        };
        debug!("开始创建单例: {}", name);
        let result = create();

        match result {
            Ok(instance) => {
                self.add_singleton(name, instance.clone());
                self.failures.remove(name);
                drop(guard);
                debug!("单例创建完成: {}", name);
                Ok(instance)
            }
            Err(error) => {
                drop(guard);
                let generation = self.failure_generation.fetch_add(1, Ordering::AcqRel) + 1;
                self.failures.insert(
                    name.to_string(),
                    CreationFailure {
                        generation,
                        error: error.clone(),
                    },
                );
                debug!("单例创建失败: {}, 原因: {}", name, error);
                Err(error)
            }
        }
    }

    fn before_creation(&self, name: &str) -> DependencyResult<()> {
        if !self.in_creation.insert(name.to_string()) {
            return Err(DependencyError::CircularDependency {
                name: name.to_string(),
                chain: format!("单例 '{name}' 正在创建中, 且没有可用的早期引用"),
            });
        }
        Ok(())
    }

    fn add_singleton(&self, name: &str, instance: Instance) {
        let previous = self.singleton_objects.insert(name.to_string(), instance);
        if previous.is_none() {
            self.registration_order.lock().push(name.to_string());
        }
    }

    /// 登记早期引用工厂
    ///
    /// 只在单例创建期间有效；创建结束后由守卫清除。
    pub fn add_early_factory(&self, name: &str, factory: EarlyReferenceFactory) {
        let guard = self.creation.lock();
        if self.singleton_objects.contains_key(name) {
            return;
        }
        let mut state = guard.borrow_mut();
        state.early_objects.remove(name);
        state.early_factories.insert(name.to_string(), factory);
    }

    /// 已经交出的早期引用（不会触发早期引用工厂）
    pub fn early_reference(&self, name: &str) -> Option<Instance> {
        let guard = self.creation.lock();
        let state = guard.borrow();
        state.early_objects.get(name).cloned()
    }

    /// 在注册表锁内执行
    pub fn with_creation_lock<R>(&self, action: impl FnOnce() -> R) -> R {
        let _lock = self.creation.lock();
        action()
    }

    /// `dependent` 是否（传递地）依赖 `name`
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut visited = HashSet::new();
        self.is_dependent_inner(name, dependent, &mut visited)
    }

    fn is_dependent_inner(&self, name: &str, dependent: &str, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(name.to_string()) {
            return false;
        }
        let direct: Vec<String> = match self.dependents.get(name) {
            Some(entry) => entry.value().iter().cloned().collect(),
            None => return false,
        };
        if direct.iter().any(|entry| entry == dependent) {
            return true;
        }
        direct
            .iter()
            .any(|transitive| self.is_dependent_inner(transitive, dependent, visited))
    }

    /// 依赖 `name` 的组件
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.dependents
            .get(name)
            .map(|entry| entry.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `name` 依赖的组件
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.dependencies
            .get(name)
            .map(|entry| entry.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 销毁单个单例，先销毁依赖它的组件，返回销毁顺序
    pub fn destroy_singleton(&self, name: &str) -> Vec<String> {
        let _lock = self.creation.lock();
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.destroy_inner(name, &mut order, &mut visited);
        self.failures.remove(name);
        order
    }

    fn destroy_inner(&self, name: &str, order: &mut Vec<String>, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let instance = self.singleton_objects.remove(name).map(|(_, instance)| instance);
        if instance.is_some() {
            self.registration_order.lock().retain(|entry| entry != name);
        }

        let dependents = self
            .dependents
            .remove(name)
            .map(|(_, dependents)| dependents)
            .unwrap_or_default();
        for dependent in &dependents {
            self.destroy_inner(dependent, order, visited);
        }

        if let Some(instance) = instance {
            if let Some(disposable) = instance.as_disposable() {
                debug!("调用销毁回调: {}", name);
                if let Err(error) = disposable.dispose() {
                    warn!("组件 {} 的销毁回调失败: {}", name, error);
                }
            }
            order.push(name.to_string());
        }

        let contained = self
            .contained
            .remove(name)
            .map(|(_, contained)| contained)
            .unwrap_or_default();
        for inner in &contained {
            self.destroy_inner(inner, order, visited);
        }

        for mut entry in self.dependents.iter_mut() {
            entry.value_mut().remove(name);
        }
        self.dependencies.remove(name);
    }

    /// 按依赖顺序销毁所有单例：依赖者先于被依赖者销毁
    pub fn destroy_singletons(&self) -> Vec<String> {
        let _lock = self.creation.lock();
        let names: Vec<String> = self.registration_order.lock().iter().rev().cloned().collect();
        info!("销毁 {} 个单例", names.len());

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        for name in names {
            self.destroy_inner(&name, &mut order, &mut visited);
        }

        self.singleton_objects.clear();
        self.registration_order.lock().clear();
        self.dependents.clear();
        self.dependencies.clear();
        self.contained.clear();
        self.failures.clear();
        order
    }
}

impl Default for DefaultSingletonRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SingletonRegistry for DefaultSingletonRegistry {
    fn register_singleton(&self, name: &str, instance: Instance) -> DependencyResult<()> {
        let _lock = self.creation.lock();
        if let Some(existing) = self.cached(name) {
            if existing.ptr_eq(&instance) {
                return Ok(());
            }
            return Err(DependencyError::DuplicateRegistration {
                name: name.to_string(),
            });
        }
        info!("注册单例实例: {}", name);
        self.add_singleton(name, instance);
        Ok(())
    }

    fn singleton(&self, name: &str, allow_early: bool) -> Option<Instance> {
        if let Some(instance) = self.cached(name) {
            return Some(instance);
        }
        if !self.in_creation.contains(name) {
            return None;
        }

        let guard = self.creation.lock();
        if let Some(instance) = self.cached(name) {
            return Some(instance);
        }
        if let Some(early) = guard.borrow().early_objects.get(name) {
            return Some(early.clone());
        }
        if !allow_early {
            return None;
        }
        let factory = guard.borrow_mut().early_factories.remove(name)?;
        let early = factory();
        debug!("暴露早期引用: {}", name);
        guard
            .borrow_mut()
            .early_objects
            .insert(name.to_string(), early.clone());
        Some(early)
    }

    fn contains_singleton(&self, name: &str) -> bool {
        self.singleton_objects.contains_key(name)
    }

    fn singleton_names(&self) -> Vec<String> {
        self.registration_order.lock().clone()
    }

    fn singleton_count(&self) -> usize {
        self.singleton_objects.len()
    }

    fn is_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }
}

impl DependencyEdgeSink for DefaultSingletonRegistry {
    fn register_dependent(&self, dependency: &str, dependent: &str) {
        let _lock = self.creation.lock();
        let added = self
            .dependents
            .entry(dependency.to_string())
            .or_default()
            .insert(dependent.to_string());
        if added {
            debug!("登记依赖关系: {} -> {}", dependent, dependency);
        }
        self.dependencies
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    fn register_contained(&self, contained: &str, owner: &str) {
        {
            let _lock = self.creation.lock();
            self.contained
                .entry(owner.to_string())
                .or_default()
                .insert(contained.to_string());
        }
        self.register_dependent(contained, owner);
    }
}
