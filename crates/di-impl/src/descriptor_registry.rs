//! 描述符注册表实现

use dashmap::DashMap;
use di_abstractions::DescriptorRegistry;
use di_common::{DependencyError, DependencyResult, InstanceDescriptor, RootDescriptor};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 顶层匿名名称分隔符
pub const GENERATED_NAME_SEPARATOR: char = '#';

/// 内嵌组件名称分隔符
pub const INNER_NAME_SEPARATOR: char = '$';

/// 无法从类型推导名称时使用的内嵌组件名称前缀
pub const INNER_NAME_PREFIX: &str = "(inner)";

/// 默认描述符注册表
pub struct DefaultDescriptorRegistry {
    descriptors: DashMap<String, InstanceDescriptor>,
    names: RwLock<Vec<String>>,
    aliases: DashMap<String, String>,
    merged: DashMap<String, Arc<RootDescriptor>>,
    allow_overriding: bool,
}

impl DefaultDescriptorRegistry {
    /// 创建新的注册表
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            descriptors: DashMap::new(),
            names: RwLock::new(Vec::new()),
            aliases: DashMap::new(),
            merged: DashMap::new(),
            allow_overriding,
        }
    }

    /// 清除某个名称及以它为父描述符的所有合并缓存
    fn invalidate(&self, name: &str) {
        self.merged.remove(name);
        let children: Vec<String> = self
            .descriptors
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .parent
                    .as_deref()
                    .is_some_and(|parent| self.canonical_name(parent) == name)
            })
            .map(|entry| entry.key().clone())
            .collect();
        for child in children {
            if child != name {
                debug!("父描述符 {} 已变更, 清除合并缓存: {}", name, child);
                self.invalidate(&child);
            }
        }
    }

    fn merge(&self, name: &str, visiting: &mut Vec<String>) -> DependencyResult<Arc<RootDescriptor>> {
        if let Some(merged) = self.merged.get(name) {
            return Ok(merged.value().clone());
        }
        if visiting.iter().any(|entry| entry == name) {
            visiting.push(name.to_string());
            return Err(DependencyError::invalid_descriptor(
                name,
                format!("父描述符形成循环: {}", visiting.join(" -> ")),
            ));
        }
        let descriptor = self
            .descriptors
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DependencyError::ComponentNotRegistered {
                name: name.to_string(),
            })?;

        let definition = match &descriptor.parent {
            Some(parent) => {
                let parent_name = self.canonical_name(parent);
                visiting.push(name.to_string());
                let parent_root = self.merge(&parent_name, visiting).map_err(|error| match error {
                    DependencyError::ComponentNotRegistered { .. } => {
                        DependencyError::invalid_descriptor(
                            name,
                            format!("父描述符 '{parent}' 不存在"),
                        )
                    }
                    other => other,
                })?;
                visiting.pop();
                descriptor.merged_with_parent(&parent_root.definition)
            }
            None => descriptor,
        };
        definition.validate(name)?;

        let root = Arc::new(RootDescriptor::new(name, definition));
        self.merged.insert(name.to_string(), root.clone());
        Ok(root)
    }

    fn base_name(descriptor: &InstanceDescriptor) -> Option<String> {
        if let Some(type_name) = &descriptor.type_name {
            return Some(type_name.clone());
        }
        if let Some(parent) = &descriptor.parent {
            return Some(format!("{parent}{INNER_NAME_SEPARATOR}child"));
        }
        descriptor
            .factory_owner
            .as_ref()
            .map(|owner| format!("{owner}{INNER_NAME_SEPARATOR}created"))
    }

    fn is_name_in_use(&self, name: &str) -> bool {
        self.descriptors.contains_key(name) || self.aliases.contains_key(name)
    }

    /// 使用生成的名称注册匿名描述符
    pub fn register_with_generated_name(
        &self,
        descriptor: InstanceDescriptor,
    ) -> DependencyResult<String> {
        let name = self.generate_name(&descriptor)?;
        self.register_descriptor(&name, descriptor)?;
        Ok(name)
    }
}

impl Default for DefaultDescriptorRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DescriptorRegistry for DefaultDescriptorRegistry {
    fn register_descriptor(&self, name: &str, descriptor: InstanceDescriptor) -> DependencyResult<()> {
        if name.is_empty() {
            return Err(DependencyError::invalid_descriptor(name, "名称不能为空"));
        }
        if self.descriptors.contains_key(name) {
            if !self.allow_overriding {
                return Err(DependencyError::invalid_descriptor(
                    name,
                    "已存在同名描述符, 且不允许覆盖",
                ));
            }
            warn!("覆盖组件描述符: {}", name);
        } else {
            if self.aliases.remove(name).is_some() {
                warn!("描述符名称 {} 与已有别名冲突, 移除该别名", name);
            }
            self.names.write().push(name.to_string());
        }

        info!("注册组件描述符: {}", name);
        self.descriptors.insert(name.to_string(), descriptor);
        self.invalidate(name);
        Ok(())
    }

    fn remove_descriptor(&self, name: &str) -> DependencyResult<InstanceDescriptor> {
        let (_, descriptor) =
            self.descriptors
                .remove(name)
                .ok_or_else(|| DependencyError::ComponentNotRegistered {
                    name: name.to_string(),
                })?;
        self.names.write().retain(|entry| entry != name);
        self.invalidate(name);
        info!("移除组件描述符: {}", name);
        Ok(descriptor)
    }

    fn descriptor(&self, name: &str) -> Option<InstanceDescriptor> {
        self.descriptors.get(name).map(|entry| entry.value().clone())
    }

    fn contains_descriptor(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    fn descriptor_names(&self) -> Vec<String> {
        self.names.read().clone()
    }

    fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    fn register_alias(&self, name: &str, alias: &str) -> DependencyResult<()> {
        if alias == name {
            self.aliases.remove(alias);
            return Ok(());
        }
        if let Some(existing) = self.aliases.get(alias).map(|entry| entry.value().clone()) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(DependencyError::invalid_descriptor(
                    alias,
                    format!("别名已指向 '{existing}', 且不允许覆盖"),
                ));
            }
        }
        if self.canonical_name(name) == alias {
            return Err(DependencyError::invalid_descriptor(
                alias,
                format!("别名 '{alias}' -> '{name}' 形成循环"),
            ));
        }

        debug!("注册别名: {} -> {}", alias, name);
        self.aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    fn canonical_name(&self, name: &str) -> String {
        let mut canonical = name.to_string();
        while let Some(target) = self.aliases.get(&canonical).map(|entry| entry.value().clone()) {
            canonical = target;
        }
        canonical
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        // 先释放迭代持有的分片读锁，再逐个解析别名链
        let keys: Vec<String> = self.aliases.iter().map(|entry| entry.key().clone()).collect();
        let mut aliases: Vec<String> = keys
            .into_iter()
            .filter(|alias| self.canonical_name(alias) == name)
            .collect();
        aliases.sort();
        aliases
    }

    fn merged_descriptor(&self, name: &str) -> DependencyResult<Arc<RootDescriptor>> {
        let canonical = self.canonical_name(name);
        self.merge(&canonical, &mut Vec::new())
    }

    fn generate_name(&self, descriptor: &InstanceDescriptor) -> DependencyResult<String> {
        let base = Self::base_name(descriptor).ok_or_else(|| {
            DependencyError::invalid_descriptor(
                "",
                "无法生成名称: 描述符没有类型、父描述符或工厂组件",
            )
        })?;
        let mut counter = 0_usize;
        loop {
            let candidate = format!("{base}{GENERATED_NAME_SEPARATOR}{counter}");
            if !self.is_name_in_use(&candidate) {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    fn generate_inner_name(&self, descriptor: &InstanceDescriptor, token: &str) -> String {
        let base = Self::base_name(descriptor).unwrap_or_else(|| INNER_NAME_PREFIX.to_string());
        format!("{base}{INNER_NAME_SEPARATOR}{token}")
    }
}
