/// Property-based tests for service resolution
///
/// These tests verify that resolution behavior follows the documented rules
/// regardless of the specific services or configuration used.
use proptest::prelude::*;
use service_registry::{
    BoxError, DiError, Dispose, Implementation, Resolver, ServiceContract, ServiceLocator, ServiceRegistry,
    StaticSearchContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct ServiceA {
    value: String,
}

const NAMES: [&str; 6] = ["zero", "one", "two", "three", "four", "five"];

// Property: a factory-bound key always resolves to the same instance and the factory runs once
proptest! {
    #[test]
    fn singleton_resolution_consistency(service_value in "\\PC{0,50}", lookups in 1usize..20) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let value = service_value.clone();

        let registry = ServiceRegistry::new();
        registry.add_factory::<ServiceA, _>(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(ServiceA { value: value.clone() })
        }).unwrap();

        let first = registry.get_required::<ServiceA>();
        for _ in 0..lookups {
            prop_assert!(Arc::ptr_eq(&first, &registry.get_required::<ServiceA>()));
        }
        prop_assert_eq!(&first.value, &service_value);
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

// Property: failures are cached and never retried
proptest! {
    #[test]
    fn idempotent_failure(message in "[a-z]{1,20}", lookups in 1usize..10) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let msg = message.clone();

        let registry = ServiceRegistry::new();
        registry.add_factory::<ServiceA, _>(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Err(DiError::msg(msg.clone()))
        }).unwrap();

        for _ in 0..lookups {
            let err = registry.get::<ServiceA>().unwrap_err();
            prop_assert!(err.to_string().ends_with(&message));
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

// Property: exactly one composed candidate wins, two or more are ambiguous in composition order
proptest! {
    #[test]
    fn composition_precedence(binds in prop::collection::vec(any::<bool>(), 1..6)) {
        let root = ServiceRegistry::named("root");
        for (i, bound) in binds.iter().enumerate() {
            let sibling = ServiceRegistry::named(NAMES[i]);
            if *bound {
                sibling.add_instance(i).unwrap();
            }
            root.compose(sibling).unwrap();
        }

        let binders: Vec<usize> = binds.iter().enumerate().filter(|(_, b)| **b).map(|(i, _)| i).collect();
        match (binders.as_slice(), root.get::<usize>()) {
            ([], Err(DiError::UnknownService { .. })) => {}
            ([only], Ok(value)) => prop_assert_eq!(*value, *only),
            (many, Err(DiError::AmbiguousService { candidates, .. })) if many.len() > 1 => {
                let expected: Vec<String> = many.iter().map(|i| NAMES[*i].to_string()).collect();
                prop_assert_eq!(candidates, expected);
            }
            (binders, other) => {
                return Err(TestCaseError::fail(format!(
                    "binders {:?} produced {:?}",
                    binders,
                    other.map(|v| *v)
                )));
            }
        }

        let all: Vec<usize> = root.get_all::<usize>().unwrap().iter().map(|v| **v).collect();
        prop_assert_eq!(all, binders);
    }
}

trait Step: Send + Sync {}

impl ServiceContract for dyn Step {
    const NAME: &'static str = "org.example.Step";
}

struct Noop;
impl Step for Noop {}

// Property: discovery order is first-occurrence order across resources, each instantiated once
proptest! {
    #[test]
    fn locator_determinism(
        resources in prop::collection::vec(prop::collection::vec(0usize..6, 0..6), 0..4),
        repeats in 1usize..4,
    ) {
        let builds = Arc::new(AtomicUsize::new(0));
        let mut context = StaticSearchContext::new("prop");
        for name in NAMES {
            let b = builds.clone();
            context = context.with_implementation(Implementation::new(name).constructor::<dyn Step, _>(&[], move |_| {
                b.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Noop) as Arc<dyn Step>)
            }));
        }
        for lines in &resources {
            let content: String = lines.iter().map(|i| format!("{}\n", NAMES[*i])).collect();
            context = context.with_resource("META-INF/services/org.example.Step", content);
        }

        let mut expected: Vec<&str> = Vec::new();
        for i in resources.iter().flatten() {
            if !expected.contains(&NAMES[*i]) {
                expected.push(NAMES[*i]);
            }
        }

        let locator = ServiceLocator::new();
        let registry = ServiceRegistry::new();
        for _ in 0..repeats {
            let found: Vec<String> = locator
                .find_all::<dyn Step>(&context, &registry)
                .unwrap()
                .into_iter()
                .map(|l| l.implementation)
                .collect();
            prop_assert_eq!(&found, &expected);
        }
        prop_assert_eq!(builds.load(Ordering::SeqCst), expected.len());
    }
}

struct Link {
    index: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Dispose for Link {
    fn dispose(&self) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(self.index);
        Ok(())
    }
}

// Property: a chain where each service depends on the previous one is released back to front
proptest! {
    #[test]
    fn close_releases_dependents_first(length in 1usize..6) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ServiceRegistry::new();

        for index in 0..length {
            let log = log.clone();
            registry.add_named_factory::<usize, _>(NAMES[index], move |r| {
                if index > 0 {
                    r.get_named::<usize>(NAMES[index - 1])?;
                }
                r.register_disposer(Arc::new(Link { index, log: log.clone() }));
                Ok(index)
            }).unwrap();
        }

        let last = registry.get_named_required::<usize>(NAMES[length - 1]);
        prop_assert_eq!(*last, length - 1);

        registry.close().unwrap();
        let expected: Vec<usize> = (0..length).rev().collect();
        prop_assert_eq!(&*log.lock().unwrap(), &expected);
    }
}
