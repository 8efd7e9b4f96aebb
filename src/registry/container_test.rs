#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::runtime::Handle;
    use tokio::time::timeout;

    use crate::registry::{
        Batch, InjectorBinding, Mode, RegistrationError, Service, ServiceContainer,
        ServiceDescriptor, ServiceListener, ServiceName, ServiceRegistry, ServiceState,
        ServiceValue, StartError,
    };

    type Log = Arc<Mutex<Vec<String>>>;

    struct Probe {
        log: Log,
        fail: bool,
        value: Option<ServiceValue>,
    }

    impl Probe {
        fn ok(log: &Log) -> Arc<Self> {
            Arc::new(Self {
                log: log.clone(),
                fail: false,
                value: None,
            })
        }

        fn failing(log: &Log) -> Arc<Self> {
            Arc::new(Self {
                log: log.clone(),
                fail: true,
                value: None,
            })
        }

        fn with_value(log: &Log, value: ServiceValue) -> Arc<Self> {
            Arc::new(Self {
                log: log.clone(),
                fail: false,
                value: Some(value),
            })
        }
    }

    #[async_trait]
    impl Service for Probe {
        async fn start(&self, name: &ServiceName) -> Result<(), StartError> {
            self.log.lock().push(format!("start:{}", name.simple_name()));
            if self.fail {
                return Err(StartError::failed("boom"));
            }
            Ok(())
        }

        async fn stop(&self, name: &ServiceName) {
            self.log.lock().push(format!("stop:{}", name.simple_name()));
        }

        fn value(&self) -> Option<ServiceValue> {
            self.value.clone()
        }
    }

    #[derive(Default)]
    struct Events {
        added: Mutex<Vec<ServiceName>>,
        started: Mutex<Vec<ServiceName>>,
        failed: Mutex<Vec<(ServiceName, StartError)>>,
        passive: Mutex<Vec<ServiceName>>,
        removed: Mutex<Vec<ServiceName>>,
    }

    impl ServiceListener for Events {
        fn service_added(&self, name: &ServiceName) {
            self.added.lock().push(name.clone());
        }

        fn service_started(&self, name: &ServiceName) {
            self.started.lock().push(name.clone());
        }

        fn service_failed(&self, name: &ServiceName, cause: &StartError) {
            self.failed.lock().push((name.clone(), cause.clone()));
        }

        fn service_passive(&self, name: &ServiceName) {
            self.passive.lock().push(name.clone());
        }

        fn service_removed(&self, name: &ServiceName) {
            self.removed.lock().push(name.clone());
        }
    }

    fn name(s: &str) -> ServiceName {
        ServiceName::of(["test", s])
    }

    async fn wait_settled(container: &ServiceContainer, name: &ServiceName) -> ServiceState {
        timeout(Duration::from_secs(2), async {
            loop {
                if let Some(handle) = container.lookup(name) {
                    let state = handle.state();
                    if state.is_settled() {
                        return state;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("service did not settle in time")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_immediate_service_demands_on_demand_dependency() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let events = Arc::new(Events::default());

        let mut batch = Batch::new();
        batch.add_listener(events.clone());
        batch.add_service(ServiceDescriptor::new(name("mount"), Probe::ok(&log)).with_mode(Mode::OnDemand));
        batch.add_service(ServiceDescriptor::new(name("unit"), Probe::ok(&log)).depends_on(name("mount")));
        tokio_test::assert_ok!(container.install(batch));

        assert_eq!(wait_settled(&container, &name("unit")).await, ServiceState::Up);
        assert_eq!(wait_settled(&container, &name("mount")).await, ServiceState::Up);
        assert_eq!(*log.lock(), vec!["start:mount".to_string(), "start:unit".to_string()]);
        assert_eq!(events.added.lock().len(), 2);
        assert_eq!(events.started.lock().len(), 2);
        assert!(events.passive.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_undemanded_on_demand_service_is_passive() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let events = Arc::new(Events::default());

        let mut batch = Batch::new();
        batch.add_listener(events.clone());
        batch.add_service(ServiceDescriptor::new(name("lazy"), Probe::ok(&log)).with_mode(Mode::OnDemand));
        tokio_test::assert_ok!(container.install(batch));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let handle = container.lookup(&name("lazy")).expect("installed");
        assert_eq!(handle.state(), ServiceState::Down);
        assert_eq!(*events.passive.lock(), vec![name("lazy")]);
        assert!(log.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_duplicate_name_rejects_whole_batch() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();

        let mut first = Batch::new();
        first.add_service(ServiceDescriptor::new(name("a"), Probe::ok(&log)));
        tokio_test::assert_ok!(container.install(first));

        let mut second = Batch::new();
        second.add_service(ServiceDescriptor::new(name("b"), Probe::ok(&log)));
        second.add_service(ServiceDescriptor::new(name("a"), Probe::ok(&log)));
        let err = container.install(second).unwrap_err();

        assert_eq!(err, RegistrationError::DuplicateService(name("a")));
        assert!(container.lookup(&name("b")).is_none());
        assert_eq!(container.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_missing_dependency_and_cycle_are_rejected() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();

        let mut missing = Batch::new();
        missing.add_service(ServiceDescriptor::new(name("a"), Probe::ok(&log)).depends_on(name("ghost")));
        assert_eq!(
            container.install(missing).unwrap_err(),
            RegistrationError::MissingDependency {
                service: name("a"),
                dependency: name("ghost"),
            }
        );

        let mut cyclic = Batch::new();
        cyclic.add_service(ServiceDescriptor::new(name("x"), Probe::ok(&log)).depends_on(name("y")));
        cyclic.add_service(ServiceDescriptor::new(name("y"), Probe::ok(&log)).depends_on(name("x")));
        assert!(matches!(
            container.install(cyclic).unwrap_err(),
            RegistrationError::CyclicDependency(_)
        ));
        assert!(container.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_start_failure_propagates_to_dependents() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let events = Arc::new(Events::default());

        let mut batch = Batch::new();
        batch.add_listener(events.clone());
        batch.add_service(ServiceDescriptor::new(name("base"), Probe::failing(&log)));
        batch.add_service(ServiceDescriptor::new(name("top"), Probe::ok(&log)).depends_on(name("base")));
        tokio_test::assert_ok!(container.install(batch));

        assert_eq!(
            wait_settled(&container, &name("top")).await,
            ServiceState::Failed(StartError::DependencyFailed(name("base")))
        );
        assert!(matches!(
            wait_settled(&container, &name("base")).await,
            ServiceState::Failed(StartError::Failed(_))
        ));
        assert_eq!(events.failed.lock().len(), 2);
        assert!(!log.lock().contains(&"start:top".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_injector_binding_translates_dependency_value() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let injected = Arc::new(AtomicUsize::new(0));

        let slot = injected.clone();
        let binding = InjectorBinding::translating::<String, usize, _, _>(
            "length",
            |s| Ok(s.len()),
            move |n| slot.store(n, Ordering::SeqCst),
        );

        let mut batch = Batch::new();
        batch.add_service(ServiceDescriptor::new(
            name("provider"),
            Probe::with_value(&log, Arc::new("hello".to_string())),
        ));
        batch.add_service(ServiceDescriptor::new(name("consumer"), Probe::ok(&log)).inject_from(name("provider"), binding));
        tokio_test::assert_ok!(container.install(batch));

        assert_eq!(wait_settled(&container, &name("consumer")).await, ServiceState::Up);
        assert_eq!(injected.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_injection_without_value_fails_dependent() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let binding = InjectorBinding::new("anything", |_| Ok(()));

        let mut batch = Batch::new();
        batch.add_service(ServiceDescriptor::new(name("blank"), Probe::ok(&log)));
        batch.add_service(ServiceDescriptor::new(name("needy"), Probe::ok(&log)).inject_from(name("blank"), binding));
        tokio_test::assert_ok!(container.install(batch));

        assert!(matches!(
            wait_settled(&container, &name("needy")).await,
            ServiceState::Failed(StartError::Injection { property: "anything", .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_all_goes_dependents_first_and_drops_orphans() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let events = Arc::new(Events::default());

        let mut batch = Batch::new();
        batch.add_listener(events.clone());
        batch.add_service(ServiceDescriptor::new(name("mount"), Probe::ok(&log)).with_mode(Mode::OnDemand));
        batch.add_service(ServiceDescriptor::new(name("unit"), Probe::ok(&log)).depends_on(name("mount")));
        batch.add_service(ServiceDescriptor::new(name("item"), Probe::ok(&log)).depends_on(name("unit")));
        tokio_test::assert_ok!(container.install(batch));
        assert_eq!(wait_settled(&container, &name("item")).await, ServiceState::Up);

        let hook_ran = Arc::new(AtomicBool::new(false));
        let flag = hook_ran.clone();
        container
            .stop_all(vec![name("unit")], Box::new(move || flag.store(true, Ordering::SeqCst)))
            .await;

        assert!(hook_ran.load(Ordering::SeqCst));
        assert!(container.is_empty());
        let stops: Vec<String> = log.lock().iter().filter(|e| e.starts_with("stop:")).cloned().collect();
        assert_eq!(stops, vec!["stop:item", "stop:unit", "stop:mount"]);
        assert_eq!(events.removed.lock().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stop_all_keeps_shared_on_demand_dependency() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();

        let mut batch = Batch::new();
        batch.add_service(ServiceDescriptor::new(name("shared"), Probe::ok(&log)).with_mode(Mode::OnDemand));
        batch.add_service(ServiceDescriptor::new(name("one"), Probe::ok(&log)).depends_on(name("shared")));
        batch.add_service(ServiceDescriptor::new(name("two"), Probe::ok(&log)).depends_on(name("shared")));
        tokio_test::assert_ok!(container.install(batch));
        assert_eq!(wait_settled(&container, &name("one")).await, ServiceState::Up);
        assert_eq!(wait_settled(&container, &name("two")).await, ServiceState::Up);

        container.stop_all(vec![name("one")], Box::new(|| {})).await;

        assert!(container.lookup(&name("one")).is_none());
        assert_eq!(container.lookup(&name("shared")).map(|h| h.state()), Some(ServiceState::Up));
        assert_eq!(container.lookup(&name("two")).map(|h| h.state()), Some(ServiceState::Up));
    }

    #[tokio::test]
    async fn test_stop_before_start_settles_as_removed() {
        let container = ServiceContainer::new(Handle::current());
        let log = Log::default();
        let events = Arc::new(Events::default());

        let mut batch = Batch::new();
        batch.add_listener(events.clone());
        batch.add_service(ServiceDescriptor::new(name("mount"), Probe::ok(&log)).with_mode(Mode::OnDemand));
        batch.add_service(ServiceDescriptor::new(name("unit"), Probe::ok(&log)).depends_on(name("mount")));
        tokio_test::assert_ok!(container.install(batch));

        // Single-threaded runtime: the start task of "unit" has not been polled yet.
        container.stop_all(vec![name("unit")], Box::new(|| {})).await;
        tokio::task::yield_now().await;

        assert!(container.is_empty());
        assert!(log.lock().is_empty(), "nothing was started");
        assert!(events.started.lock().is_empty());
        let mut failed = events.failed.lock().clone();
        failed.sort_by_key(|(n, _)| n.to_string());
        assert_eq!(
            failed,
            vec![
                (name("mount"), StartError::Removed(name("mount"))),
                (name("unit"), StartError::Removed(name("unit"))),
            ]
        );
        assert_eq!(events.removed.lock().len(), 2);
    }
}
