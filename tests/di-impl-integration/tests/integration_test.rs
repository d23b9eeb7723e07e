//! 容器的并发与配置集成测试

use di_abstractions::{ComponentContainer, ContainerConfig};
use di_common::{
    BoxError, ComponentType, DependencyError, Disposable, Executable, Instance, InstanceDescriptor,
    Parameter, TypeInfo, Value,
};
use di_impl::DefaultContainer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;
use std::time::Duration;

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .try_init()
            .ok();
    });
}

const THREADS: usize = 8;

#[derive(Debug)]
struct Service {
    name: String,
}

/// 构造较慢并统计构造次数的组件
fn slow_service_type(created: Arc<AtomicUsize>, fail: bool) -> ComponentType {
    ComponentType::of::<Service>().with_constructor(Executable::constructor(
        vec![Parameter::of::<String>("name")],
        move |args| {
            created.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            if fail {
                return Err("后端不可用".into());
            }
            Ok(Service {
                name: args.cloned::<String>(0)?,
            })
        },
    ))
}

/// 测试并发获取同一单例时只构造一次
#[test]
fn test_concurrent_singleton_is_created_once() {
    init_test_logger();
    let created = Arc::new(AtomicUsize::new(0));
    let container = Arc::new(DefaultContainer::new());
    container.register_type(slow_service_type(created.clone(), false));
    container
        .register_descriptor(
            "service",
            InstanceDescriptor::of_type("Service").with_arg(Value::literal("primary")),
        )
        .expect("注册描述符应该成功");

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get_typed::<Service>("service")
            })
        })
        .collect();

    let services: Vec<Arc<Service>> = handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .expect("线程不应该 panic")
                .expect("获取单例应该成功")
        })
        .collect();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(services.iter().all(|service| Arc::ptr_eq(service, &services[0])));
    assert_eq!(services[0].name, "primary");
    assert_eq!(container.stats().active_singletons, 1);
}

/// 测试等待中的调用者观察到同一个创建错误，之后的请求重新尝试
#[test]
fn test_concurrent_failure_is_shared_with_waiters() {
    init_test_logger();
    let created = Arc::new(AtomicUsize::new(0));
    let container = Arc::new(DefaultContainer::new());
    container.register_type(slow_service_type(created.clone(), true));
    container
        .register_descriptor(
            "service",
            InstanceDescriptor::of_type("Service").with_arg(Value::literal("primary")),
        )
        .expect("注册描述符应该成功");

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get_instance("service")
            })
        })
        .collect();

    let errors: Vec<DependencyError> = handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .expect("线程不应该 panic")
                .expect_err("创建应该失败")
        })
        .collect();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    for error in &errors {
        assert!(
            matches!(error, DependencyError::ComponentCreationFailed { name, .. } if name == "service"),
            "unexpected error: {error}"
        );
        assert!(error.to_string().contains("后端不可用"));
    }

    // 失败不会被永久记住
    assert!(container.get_instance("service").is_err());
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert_eq!(container.stats().active_singletons, 0);
}

/// 测试在 tokio 阻塞线程池中共享容器
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_container_shared_across_blocking_tasks() -> anyhow::Result<()> {
    init_test_logger();
    let created = Arc::new(AtomicUsize::new(0));
    let container = Arc::new(DefaultContainer::new());
    container.register_type(slow_service_type(created.clone(), false));
    container.register_descriptor(
        "service",
        InstanceDescriptor::of_type("Service").with_arg(Value::literal("shared")),
    )?;
    container.register_descriptor(
        "worker",
        InstanceDescriptor::of_type("Service")
            .with_arg(Value::literal("worker"))
            .prototype(),
    )?;

    let mut tasks = Vec::new();
    for _ in 0..THREADS {
        let container = container.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let shared = container.get_typed::<Service>("service")?;
            let worker = container.get_typed::<Service>("worker")?;
            Ok::<_, DependencyError>((shared, worker))
        }));
    }

    let mut shared = Vec::new();
    let mut workers = Vec::new();
    for task in tasks {
        let (service, worker) = task.await??;
        shared.push(service);
        workers.push(worker);
    }

    assert!(shared.iter().all(|service| Arc::ptr_eq(service, &shared[0])));
    assert!(!Arc::ptr_eq(&workers[0], &workers[1]));
    assert_eq!(created.load(Ordering::SeqCst), 1 + THREADS);
    Ok(())
}

/// 记录销毁次数的连接
struct Connection {
    disposed: Arc<AtomicUsize>,
}

impl Disposable for Connection {
    fn dispose(&self) -> Result<(), BoxError> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn connection_type(disposed: Arc<AtomicUsize>) -> ComponentType {
    ComponentType::new(TypeInfo::concrete("Connection")).with_constructor(Executable::raw_constructor(
        vec![],
        move |_| {
            Ok(Instance::disposable(Connection {
                disposed: disposed.clone(),
            }))
        },
    ))
}

/// 测试销毁后重新获取会创建新的单例
#[test]
fn test_destroy_and_recreate_singletons() -> anyhow::Result<()> {
    init_test_logger();
    let disposed = Arc::new(AtomicUsize::new(0));
    let container = DefaultContainer::new();
    container.register_type(connection_type(disposed.clone()));
    container.register_descriptor("connection", InstanceDescriptor::of_type("Connection"))?;

    container.pre_instantiate_singletons()?;
    let first = container.get_instance("connection")?;
    assert_eq!(container.stats().active_singletons, 1);

    let order = container.destroy_singletons();
    assert_eq!(order, vec!["connection".to_string()]);
    assert_eq!(disposed.load(Ordering::SeqCst), 1);
    assert_eq!(container.stats().active_singletons, 0);

    let second = container.get_instance("connection")?;
    assert!(!first.ptr_eq(&second));
    assert_eq!(container.stats().instances_created, 2);
    Ok(())
}

/// 测试 TOML 配置驱动容器行为
#[test]
fn test_container_configured_from_toml() -> anyhow::Result<()> {
    init_test_logger();
    let config = ContainerConfig::from_toml_str(
        r#"
        allow_descriptor_overriding = false
        lenient_resolution = false
        max_resolution_depth = 8
        "#,
    )?;
    assert!(config.allow_circular_references);

    let container = DefaultContainer::with_config(config.clone());
    assert_eq!(container.config(), &config);

    let created = Arc::new(AtomicUsize::new(0));
    container.register_type(slow_service_type(created, false));
    container.register_descriptor(
        "service",
        InstanceDescriptor::of_type("Service").with_arg(Value::literal("configured")),
    )?;

    let error = container
        .register_descriptor("service", InstanceDescriptor::of_type("Service"))
        .unwrap_err();
    assert!(matches!(error, DependencyError::InvalidDescriptor { .. }));

    let service = container.get_typed::<Service>("service")?;
    assert_eq!(service.name, "configured");
    Ok(())
}
