//! 运行时实例
//!
//! 容器中的所有对象都以 [`Instance`] 的形式流转：类型信息加上类型擦除的共享指针。

use crate::errors::BoxError;
use crate::lifecycle::Disposable;
use crate::metadata::TypeInfo;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 类型擦除的共享对象
pub type AnyObject = Arc<dyn Any + Send + Sync>;

/// 列表类型参数接收的值
pub type InstanceList = Vec<Option<Instance>>;

/// 映射类型参数接收的值
pub type InstanceMap = Vec<(Instance, Option<Instance>)>;

/// 工厂型组件
///
/// 实现此 trait 的实例按名称获取时返回其产品，而不是工厂本身。
pub trait InstanceFactory: Send + Sync {
    /// 创建产品
    fn produce(&self) -> Result<Instance, BoxError>;

    /// 产品类型（用于按类型查找）
    fn product_type(&self) -> Option<TypeInfo> {
        None
    }

    /// 产品是否可以缓存复用
    fn is_shared(&self) -> bool {
        true
    }
}

/// 组件实例
#[derive(Clone)]
pub struct Instance {
    info: Arc<TypeInfo>,
    object: AnyObject,
    factory: Option<Arc<dyn InstanceFactory>>,
    disposer: Option<Arc<dyn Disposable>>,
}

impl Instance {
    /// 包装一个值
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// 包装一个已共享的值
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            info: Arc::new(TypeInfo::of::<T>()),
            object: value,
            factory: None,
            disposer: None,
        }
    }

    /// 使用指定的类型信息包装对象
    pub fn with_type(info: TypeInfo, object: AnyObject) -> Self {
        Self {
            info: Arc::new(info),
            object,
            factory: None,
            disposer: None,
        }
    }

    /// 包装一个工厂型组件
    pub fn factory<F: InstanceFactory + 'static>(factory: F) -> Self {
        let factory = Arc::new(factory);
        Self {
            info: Arc::new(TypeInfo::of::<F>()),
            object: factory.clone(),
            factory: Some(factory),
            disposer: None,
        }
    }

    /// 包装一个可销毁组件
    pub fn disposable<D: Disposable + 'static>(value: D) -> Self {
        let value = Arc::new(value);
        Self {
            info: Arc::new(TypeInfo::of::<D>()),
            object: value.clone(),
            factory: None,
            disposer: Some(value),
        }
    }

    /// 替换类型信息，保留对象与能力
    pub fn retyped(mut self, info: TypeInfo) -> Self {
        self.info = Arc::new(info);
        self
    }

    /// 类型信息
    pub fn type_info(&self) -> &TypeInfo {
        &self.info
    }

    /// 底层对象
    pub fn object(&self) -> &AnyObject {
        &self.object
    }

    /// 工厂能力
    pub fn as_factory(&self) -> Option<&Arc<dyn InstanceFactory>> {
        self.factory.as_ref()
    }

    /// 销毁能力
    pub fn as_disposable(&self) -> Option<&Arc<dyn Disposable>> {
        self.disposer.as_ref()
    }

    /// 向下转型
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, DowncastError> {
        Arc::downcast::<T>(self.object.clone()).map_err(|_| DowncastError {
            required_type: std::any::type_name::<T>(),
            actual_type: self.info.name.to_string(),
        })
    }

    /// 是否为同一个对象
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.info.name)
            .field("factory", &self.factory.is_some())
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// 向下转型失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("向下转型失败, 需要: '{required_type}' 实际: '{actual_type}'")]
pub struct DowncastError {
    pub required_type: &'static str,
    pub actual_type: String,
}

/// 参数访问错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentAccessError {
    #[error("参数 #{index} 不存在")]
    Missing { index: usize },

    #[error("参数 #{index} 为 null")]
    Null { index: usize },

    #[error("参数 #{index}: {source}")]
    Downcast {
        index: usize,
        source: DowncastError,
    },
}

/// 调用构造函数或工厂方法时传入的参数
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Option<Instance>>,
}

impl Args {
    /// 创建参数列表
    pub fn new(values: Vec<Option<Instance>>) -> Self {
        Self { values }
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 全部参数
    pub fn values(&self) -> &[Option<Instance>] {
        &self.values
    }

    /// 取出全部参数
    pub fn into_inner(self) -> Vec<Option<Instance>> {
        self.values
    }

    /// 获取非 null 参数
    pub fn instance(&self, index: usize) -> Result<&Instance, ArgumentAccessError> {
        match self.values.get(index) {
            Some(Some(instance)) => Ok(instance),
            Some(None) => Err(ArgumentAccessError::Null { index }),
            None => Err(ArgumentAccessError::Missing { index }),
        }
    }

    /// 获取类型化参数
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, ArgumentAccessError> {
        self.instance(index)?
            .downcast::<T>()
            .map_err(|source| ArgumentAccessError::Downcast { index, source })
    }

    /// 获取可为 null 的类型化参数
    pub fn optional<T: Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> Result<Option<Arc<T>>, ArgumentAccessError> {
        match self.values.get(index) {
            Some(Some(instance)) => instance
                .downcast::<T>()
                .map(Some)
                .map_err(|source| ArgumentAccessError::Downcast { index, source }),
            Some(None) => Ok(None),
            None => Err(ArgumentAccessError::Missing { index }),
        }
    }

    /// 获取参数的副本
    pub fn cloned<T: Clone + Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> Result<T, ArgumentAccessError> {
        self.get::<T>(index).map(|value| (*value).clone())
    }
}
