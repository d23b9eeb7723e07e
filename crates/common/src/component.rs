//! 组件类型模型
//!
//! 用与语言反射无关的方式描述一个组件类型：可调用的构造函数、工厂方法以及属性设置器。
//! 构造函数选择算法只依赖这里的签名信息（参数类型、数量、可见性）。

use crate::errors::BoxError;
use crate::instance::{Args, Instance};
use crate::metadata::TypeInfo;
use std::fmt;
use std::sync::Arc;

/// 可执行体的调用函数
///
/// 第一个参数为实例方法的目标对象，构造函数和静态方法为 `None`。
pub type Invoker =
    Arc<dyn Fn(Option<&Instance>, &Args) -> Result<Instance, BoxError> + Send + Sync>;

/// 属性设置函数
pub type SetterFn = Arc<dyn Fn(&Instance, Option<&Instance>) -> Result<(), BoxError> + Send + Sync>;

/// 可执行体种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutableKind {
    Constructor,
    StaticMethod,
    InstanceMethod,
}

impl ExecutableKind {
    /// 用于错误信息的名称
    pub fn describe(self) -> &'static str {
        match self {
            Self::Constructor => "构造函数",
            Self::StaticMethod | Self::InstanceMethod => "工厂方法",
        }
    }
}

/// 可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Visibility {
    Public,
    NonPublic,
}

/// 参数声明
#[derive(Debug, Clone)]
pub struct Parameter {
    /// 参数名称（可能不可用）
    pub name: Option<String>,
    /// 参数类型
    pub ty: TypeInfo,
}

impl Parameter {
    /// 创建命名参数
    pub fn new(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    /// 使用 Rust 类型创建命名参数
    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeInfo::of::<T>())
    }

    /// 创建匿名参数
    pub fn unnamed(ty: TypeInfo) -> Self {
        Self { name: None, ty }
    }
}

/// 可执行体：构造函数或工厂方法
#[derive(Clone)]
pub struct Executable {
    /// 声明类型
    pub declaring_type: TypeInfo,
    /// 名称
    pub name: String,
    /// 种类
    pub kind: ExecutableKind,
    /// 可见性
    pub visibility: Visibility,
    /// 参数列表
    pub params: Vec<Parameter>,
    /// 返回类型，`None` 表示无返回值
    pub return_type: Option<TypeInfo>,
    invoker: Invoker,
}

impl Executable {
    /// 创建构造函数
    pub fn constructor<T, F>(params: Vec<Parameter>, create: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let mut executable =
            Self::raw_constructor(params, move |args| create(args).map(Instance::new));
        executable.return_type = Some(TypeInfo::of::<T>());
        executable.declaring_type = TypeInfo::of::<T>();
        executable
    }

    /// 创建返回已包装实例的构造函数（用于工厂型或可销毁组件）
    pub fn raw_constructor<F>(params: Vec<Parameter>, create: F) -> Self
    where
        F: Fn(&Args) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            declaring_type: TypeInfo::any(),
            name: "new".to_string(),
            kind: ExecutableKind::Constructor,
            visibility: Visibility::Public,
            params,
            return_type: Some(TypeInfo::any()),
            invoker: Arc::new(move |_, args| create(args)),
        }
    }

    /// 创建静态工厂方法
    pub fn static_method<F>(
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: Option<TypeInfo>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&Args) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            declaring_type: TypeInfo::any(),
            name: name.into(),
            kind: ExecutableKind::StaticMethod,
            visibility: Visibility::Public,
            params,
            return_type,
            invoker: Arc::new(move |_, args| invoke(args)),
        }
    }

    /// 创建实例工厂方法
    pub fn instance_method<F>(
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: Option<TypeInfo>,
        invoke: F,
    ) -> Self
    where
        F: Fn(&Instance, &Args) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        Self {
            declaring_type: TypeInfo::any(),
            name: name.into(),
            kind: ExecutableKind::InstanceMethod,
            visibility: Visibility::Public,
            params,
            return_type,
            invoker: Arc::new(move |target, args| match target {
                Some(target) => invoke(target, args),
                None => Err("实例方法缺少目标对象".into()),
            }),
        }
    }

    /// 标记为非公开
    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    /// 调用
    pub fn invoke(&self, target: Option<&Instance>, args: &Args) -> Result<Instance, BoxError> {
        (self.invoker)(target, args)
    }

    /// 参数数量
    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    /// 是否公开
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// 是否为静态方法
    pub fn is_static(&self) -> bool {
        self.kind == ExecutableKind::StaticMethod
    }

    /// 是否无返回值
    pub fn is_void(&self) -> bool {
        self.return_type.is_none()
    }

    /// 签名，如 `Server.new(String, u16)`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|param| param.ty.short_name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}.{}({})", self.declaring_type.short_name(), self.name, params)
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("signature", &self.signature())
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// 属性设置器
#[derive(Clone)]
pub struct Setter {
    /// 属性名称
    pub name: String,
    /// 属性类型
    pub ty: TypeInfo,
    apply: SetterFn,
}

impl Setter {
    /// 创建类型化设置器，null 值视为错误
    pub fn new<T, V, F>(name: impl Into<String>, apply: F) -> Self
    where
        T: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: Fn(&T, Arc<V>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let name = name.into();
        let property = name.clone();
        Self {
            name,
            ty: TypeInfo::of::<V>(),
            apply: Arc::new(move |target, value| {
                let target = target.downcast::<T>()?;
                let value = value
                    .ok_or_else(|| format!("属性 '{property}' 不接受 null"))?
                    .downcast::<V>()?;
                apply(&target, value)
            }),
        }
    }

    /// 使用指定类型信息创建设置器
    pub fn raw<F>(name: impl Into<String>, ty: TypeInfo, apply: F) -> Self
    where
        F: Fn(&Instance, Option<&Instance>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ty,
            apply: Arc::new(apply),
        }
    }

    /// 应用属性值
    pub fn apply(&self, target: &Instance, value: Option<&Instance>) -> Result<(), BoxError> {
        (self.apply)(target, value)
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("name", &self.name)
            .field("type", &self.ty.name)
            .finish()
    }
}

/// 组件类型
#[derive(Debug, Clone)]
pub struct ComponentType {
    /// 类型信息
    pub info: TypeInfo,
    /// 构造函数，按声明顺序
    pub constructors: Vec<Arc<Executable>>,
    /// 方法（静态和实例工厂方法），按声明顺序
    pub methods: Vec<Arc<Executable>>,
    /// 属性设置器
    pub setters: Vec<Arc<Setter>>,
}

impl ComponentType {
    /// 创建组件类型
    pub fn new(info: TypeInfo) -> Self {
        Self {
            info,
            constructors: Vec::new(),
            methods: Vec::new(),
            setters: Vec::new(),
        }
    }

    /// 使用 Rust 类型创建组件类型
    pub fn of<T: 'static>() -> Self {
        Self::new(TypeInfo::of::<T>())
    }

    /// 追加父类
    pub fn extends(mut self, superclass: &'static str) -> Self {
        self.info = self.info.extends(superclass);
        self
    }

    /// 追加接口
    pub fn implements(mut self, interface: &'static str) -> Self {
        self.info = self.info.implements(interface);
        self
    }

    /// 添加构造函数
    pub fn with_constructor(mut self, mut constructor: Executable) -> Self {
        constructor.declaring_type = self.info.clone();
        constructor.kind = ExecutableKind::Constructor;
        if constructor.return_type.is_some() {
            constructor.return_type = Some(self.info.clone());
        }
        self.constructors.push(Arc::new(constructor));
        self
    }

    /// 添加方法
    pub fn with_method(mut self, mut method: Executable) -> Self {
        method.declaring_type = self.info.clone();
        self.methods.push(Arc::new(method));
        self
    }

    /// 添加属性设置器
    pub fn with_setter(mut self, setter: Setter) -> Self {
        self.setters.push(Arc::new(setter));
        self
    }

    /// 按名称查找设置器
    pub fn setter(&self, name: &str) -> Option<&Arc<Setter>> {
        self.setters.iter().find(|setter| setter.name == name)
    }

    /// 类型名称
    pub fn name(&self) -> &str {
        &self.info.name
    }
}
