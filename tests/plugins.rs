/// Plugin extension composition tests
///
/// Plugins are discovered through the locator, contribute a registry each,
/// and are composed into the root in discovery order.
use service_registry::{
    compose_extensions, DiError, DiResult, Implementation, Key, PluginServiceRegistry, Resolver, ServiceLocator,
    ServiceRegistry, StaticSearchContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const PLUGIN_RESOURCE: &str = "META-INF/services/service_registry.PluginServiceRegistry";

struct Logger {
    name: &'static str,
}

struct Service {
    logger: Arc<Logger>,
}

trait Formatter: Send + Sync {
    fn id(&self) -> &'static str;
}

struct Fmt(&'static str);
impl Formatter for Fmt {
    fn id(&self) -> &'static str {
        self.0
    }
}

/// Contributes `Service`, built from the root's `Logger`.
struct ServicePlugin;

impl PluginServiceRegistry for ServicePlugin {
    fn create_services(&self, root: &ServiceRegistry) -> DiResult<ServiceRegistry> {
        let services = root.create_child("service-plugin");
        services.add_factory::<Service, _>(|r| {
            Ok(Service {
                logger: r.get::<Logger>()?,
            })
        })?;
        Ok(services)
    }
}

/// Contributes a singular formatter binding.
struct FormatterPlugin(&'static str);

impl PluginServiceRegistry for FormatterPlugin {
    fn create_services(&self, root: &ServiceRegistry) -> DiResult<ServiceRegistry> {
        let services = root.create_child(format!("{}-plugin", self.0));
        let id = self.0;
        services.add_factory_trait::<dyn Formatter, _>(move |_| Ok(Arc::new(Fmt(id)) as Arc<dyn Formatter>))?;
        Ok(services)
    }
}

struct BrokenPlugin;

impl PluginServiceRegistry for BrokenPlugin {
    fn create_services(&self, _root: &ServiceRegistry) -> DiResult<ServiceRegistry> {
        Err(DiError::msg("missing license file"))
    }
}

fn plugin<P>(name: &'static str, build: fn() -> P) -> Implementation
where
    P: PluginServiceRegistry + 'static,
{
    Implementation::new(name).constructor::<dyn PluginServiceRegistry, _>(&[], move |_| {
        Ok(Arc::new(build()) as Arc<dyn PluginServiceRegistry>)
    })
}

#[test]
fn test_plugin_service_uses_root_logger() {
    let root = ServiceRegistry::named("root");
    root.add_instance(Logger { name: "L1" }).unwrap();

    let context = StaticSearchContext::new("plugins")
        .with_resource(PLUGIN_RESOURCE, "org.example.ServicePlugin\n")
        .with_implementation(plugin("org.example.ServicePlugin", || ServicePlugin));

    let extensions = compose_extensions(&root, &ServiceLocator::new(), &context).unwrap();
    assert_eq!(extensions.plugin_names(), vec!["org.example.ServicePlugin"]);

    let child = &extensions.contributions()[0].registry;
    let service = child.get_required::<Service>();
    assert_eq!(service.logger.name, "L1");
    assert!(Arc::ptr_eq(&service.logger, &root.get_required::<Logger>()));
    assert!(Arc::ptr_eq(&service, &child.get_required::<Service>()));

    // The root sees the contribution through composition
    assert!(Arc::ptr_eq(&service, &root.get_required::<Service>()));

    root.close().unwrap();
}

#[test]
fn test_plugins_compose_in_discovery_order() {
    let root = ServiceRegistry::named("root");
    let context = StaticSearchContext::new("plugins")
        .with_resource(PLUGIN_RESOURCE, "org.example.Yaml\norg.example.Json\n")
        .with_implementation(plugin("org.example.Json", || FormatterPlugin("json")))
        .with_implementation(plugin("org.example.Yaml", || FormatterPlugin("yaml")));

    let extensions = compose_extensions(&root, &ServiceLocator::new(), &context).unwrap();
    assert_eq!(extensions.len(), 2);

    let ids: Vec<&str> = root
        .get_all_trait::<dyn Formatter>()
        .unwrap()
        .iter()
        .map(|f| f.id())
        .collect();
    assert_eq!(ids, vec!["yaml", "json"]);

    match root.get_trait::<dyn Formatter>() {
        Err(DiError::AmbiguousService { key, candidates }) => {
            assert_eq!(key, Key::of_trait::<dyn Formatter>());
            assert_eq!(candidates, vec!["yaml-plugin", "json-plugin"]);
        }
        other => panic!("expected AmbiguousService, got {:?}", other.map(|_| ())),
    }

    root.close().unwrap();
}

#[test]
fn test_failing_plugin_aborts_composition() {
    let root = ServiceRegistry::named("root");
    let context = StaticSearchContext::new("plugins")
        .with_resource(PLUGIN_RESOURCE, "org.example.Json\norg.example.Broken\n")
        .with_implementation(plugin("org.example.Json", || FormatterPlugin("json")))
        .with_implementation(plugin("org.example.Broken", || BrokenPlugin));

    match compose_extensions(&root, &ServiceLocator::new(), &context) {
        Err(DiError::PluginContribution { plugin, cause }) => {
            assert_eq!(plugin, "org.example.Broken");
            assert!(cause.to_string().contains("missing license file"));
        }
        other => panic!("expected PluginContribution, got {:?}", other.map(|_| ())),
    }

    // Nothing was composed
    assert!(root.composed().is_empty());
    assert!(root.get_trait::<dyn Formatter>().is_err());
}

#[test]
fn test_locator_errors_propagate_unchanged() {
    let root = ServiceRegistry::named("root");
    let context = StaticSearchContext::new("plugins").with_resource(PLUGIN_RESOURCE, "org.example.NotShipped\n");

    let err = compose_extensions(&root, &ServiceLocator::new(), &context).unwrap_err();
    assert!(matches!(err, DiError::ServiceImplementation { .. }));
}

#[test]
fn test_plugin_constructor_injection_from_root() {
    struct Settings(&'static str);

    struct ConfiguredPlugin(Arc<Settings>);

    impl PluginServiceRegistry for ConfiguredPlugin {
        fn create_services(&self, root: &ServiceRegistry) -> DiResult<ServiceRegistry> {
            let services = root.create_child("configured");
            services.add_instance(format!("configured with {}", self.0 .0))?;
            Ok(services)
        }
    }

    let root = ServiceRegistry::named("root");
    root.add_instance(Settings("release")).unwrap();

    let context = StaticSearchContext::new("plugins")
        .with_resource(PLUGIN_RESOURCE, "org.example.Configured\n")
        .with_implementation(
            Implementation::new("org.example.Configured").constructor::<dyn PluginServiceRegistry, _>(
                &[Key::of::<Settings>()],
                |r| Ok(Arc::new(ConfiguredPlugin(r.get::<Settings>()?)) as Arc<dyn PluginServiceRegistry>),
            ),
        );

    compose_extensions(&root, &ServiceLocator::new(), &context).unwrap();
    assert_eq!(*root.get_required::<String>(), "configured with release");

    root.close().unwrap();
}

#[test]
fn test_no_plugins_is_not_an_error() {
    let root = ServiceRegistry::named("root");
    let extensions = compose_extensions(&root, &ServiceLocator::new(), &StaticSearchContext::new("none")).unwrap();
    assert!(extensions.is_empty());
}

#[test]
fn test_closing_extensions_closes_contributions_newest_first() {
    use service_registry::{BoxError, Dispose};
    use std::sync::Mutex;

    static ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
    static CLOSED: AtomicUsize = AtomicUsize::new(0);

    struct Resource(&'static str);
    impl Dispose for Resource {
        fn dispose(&self) -> Result<(), BoxError> {
            ORDER.lock().unwrap().push(self.0);
            CLOSED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ResourcePlugin(&'static str);
    impl PluginServiceRegistry for ResourcePlugin {
        fn create_services(&self, root: &ServiceRegistry) -> DiResult<ServiceRegistry> {
            let services = root.create_child(self.0);
            let name = self.0;
            services.add_disposable_factory::<Resource, _>(move |_| Ok(Resource(name)))?;
            services.get::<Resource>()?;
            Ok(services)
        }
    }

    let root = ServiceRegistry::named("root");
    let context = StaticSearchContext::new("plugins")
        .with_resource(PLUGIN_RESOURCE, "org.example.A\norg.example.B\n")
        .with_implementation(plugin("org.example.A", || ResourcePlugin("a")))
        .with_implementation(plugin("org.example.B", || ResourcePlugin("b")));

    let extensions = compose_extensions(&root, &ServiceLocator::new(), &context).unwrap();
    extensions.close().unwrap();

    assert_eq!(*ORDER.lock().unwrap(), vec!["b", "a"]);
    assert_eq!(CLOSED.load(Ordering::SeqCst), 2);
    assert!(extensions.contributions().iter().all(|c| c.registry.is_closed()));

    // Closing the root afterwards is harmless
    root.close().unwrap();
}
