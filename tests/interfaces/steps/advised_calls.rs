//! Advised call step definitions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use cucumber::{given, then, when, World};
use interpose::args;
use interpose::error::InvocationResult;
use interpose::pointcut::{NameMatch, Pointcut};
use interpose::{Aspect, AutoProxyCreator, ChainResolver, ProxyHandle, RuleRegistry, Value};

use crate::common::{NotFound, OrderRepo, Recorder};

/// Test context for advised call scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct AdvisedCallWorld {
    registry: Arc<RuleRegistry>,
    repo: Option<Arc<OrderRepo>>,
    log: Recorder,
    results: Vec<InvocationResult<Value>>,
}

impl fmt::Debug for AdvisedCallWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedCallWorld")
            .field("rules", &self.registry.len())
            .field("log", &self.log.events())
            .field("results", &self.results.len())
            .finish()
    }
}

impl AdvisedCallWorld {
    fn new() -> Self {
        Self {
            registry: Arc::new(RuleRegistry::new()),
            repo: None,
            log: Recorder::new(),
            results: Vec::new(),
        }
    }

    fn repo(&self) -> Arc<OrderRepo> {
        self.repo.clone().expect("Repository not set up")
    }

    fn proxy(&self) -> ProxyHandle {
        AutoProxyCreator::new(Arc::new(ChainResolver::new(self.registry.clone())))
            .wrap_if_necessary(self.repo(), "orderRepo")
            .expect("Wrapping failed")
            .into_proxy()
            .expect("Repository should be proxied")
    }
}

/// Lookups already served, by order id.
#[derive(Default)]
struct Cache {
    entries: Mutex<HashMap<String, Value>>,
}

// ==========================================================================
// Given Steps
// ==========================================================================

#[given(expr = "a repository holding order {string} as {string}")]
async fn given_repository(world: &mut AdvisedCallWorld, key: String, value: String) {
    world.repo = Some(OrderRepo::with_order(&key, &value));
}

#[given(expr = "a logging unit with order {int}")]
async fn given_logging_unit(world: &mut AdvisedCallWorld, order: i32) {
    let log = world.log.clone();
    world
        .registry
        .register_aspect(
            Aspect::builder("Logger", || ())
                .order(order)
                .before("logCall", Pointcut::always(), move |_, inv| {
                    log.push(inv.method().name());
                    Ok(())
                })
                .build(),
        )
        .expect("Failed to register logger");
}

#[given(expr = "a caching unit with order {int}")]
async fn given_caching_unit(world: &mut AdvisedCallWorld, order: i32) {
    world
        .registry
        .register_aspect(
            Aspect::builder("Cache", Cache::default)
                .order(order)
                .around(
                    "cacheGet",
                    Pointcut::for_methods(NameMatch::new(["get"])),
                    |cache: &Cache, inv| {
                        let key = inv.arguments().get::<String>("get", 0)?.clone();
                        if let Some(hit) = cache.entries.lock().unwrap().get(&key) {
                            return Ok(hit.clone());
                        }
                        let value = inv.proceed()?;
                        cache.entries.lock().unwrap().insert(key, value.clone());
                        Ok(value)
                    },
                )
                .build(),
        )
        .expect("Failed to register cache");
}

// ==========================================================================
// When Steps
// ==========================================================================

#[when(expr = "{string} is called with {string} {int} times")]
async fn when_called(world: &mut AdvisedCallWorld, method: String, key: String, times: usize) {
    let proxy = world.proxy();
    for _ in 0..times {
        world
            .results
            .push(proxy.call_by_name(&method, args![key.clone()]));
    }
}

// ==========================================================================
// Then Steps
// ==========================================================================

#[then(expr = "every call returns {string}")]
async fn then_every_call_returns(world: &mut AdvisedCallWorld, expected: String) {
    assert!(!world.results.is_empty(), "No calls were made");
    for result in &world.results {
        let value = result.as_ref().expect("Call should succeed");
        assert_eq!(value.get::<String>().unwrap(), &expected);
    }
}

#[then("every call fails with not found")]
async fn then_every_call_fails(world: &mut AdvisedCallWorld) {
    assert!(!world.results.is_empty(), "No calls were made");
    for result in &world.results {
        let err = result.as_ref().err().expect("Call should fail");
        assert!(err.is::<NotFound>(), "Unexpected error: {err}");
    }
}

#[then(regex = r"^the repository was called (\d+) times?$")]
async fn then_repository_called(world: &mut AdvisedCallWorld, expected: usize) {
    assert_eq!(world.repo().calls(), expected);
}

#[then(regex = r"^the log holds (\d+) entr(?:y|ies)$")]
async fn then_log_holds(world: &mut AdvisedCallWorld, expected: usize) {
    assert_eq!(world.log.events().len(), expected);
}
