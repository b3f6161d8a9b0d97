//! Introduction step definitions.

use std::fmt;
use std::sync::Arc;

use cucumber::{given, then, when, World};
use interpose::args;
use interpose::pointcut::TypeNameFilter;
use interpose::{
    Aspect, AutoProxyCreator, ChainResolver, Introduction, ProxyHandle, RuleRegistry, Wrapped,
};

use crate::common::{BufferWriter, OrderRepo, BUFFER_WRITER, WRITER};

/// Test context for introduction scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct IntroductionWorld {
    registry: Arc<RuleRegistry>,
    repo: Option<Arc<OrderRepo>>,
    wrapped: Option<Wrapped>,
}

impl fmt::Debug for IntroductionWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntroductionWorld")
            .field("rules", &self.registry.len())
            .field("proxied", &self.wrapped.as_ref().map(Wrapped::is_proxy))
            .finish()
    }
}

impl IntroductionWorld {
    fn new() -> Self {
        Self {
            registry: Arc::new(RuleRegistry::new()),
            repo: None,
            wrapped: None,
        }
    }

    /// Wraps the repository on first use.
    fn wrapped(&mut self) -> &Wrapped {
        if self.wrapped.is_none() {
            let repo = self.repo.clone().expect("Repository not set up");
            let resolver = ChainResolver::new(self.registry.clone());
            let creator = AutoProxyCreator::new(Arc::new(resolver));
            self.wrapped = Some(
                creator
                    .wrap_if_necessary(repo, "orderRepo")
                    .expect("Wrapping failed"),
            );
        }
        self.wrapped.as_ref().expect("Wrapped above")
    }

    fn proxy(&mut self) -> ProxyHandle {
        self.wrapped()
            .as_proxy()
            .cloned()
            .expect("Repository should be proxied")
    }
}

#[given(expr = "a repository holding order {string} as {string}")]
async fn given_repository(world: &mut IntroductionWorld, key: String, value: String) {
    world.repo = Some(OrderRepo::with_order(&key, &value));
}

#[given(expr = "a unit introducing {string} into {string} classes")]
async fn given_introducing_unit(world: &mut IntroductionWorld, capability: String, types: String) {
    assert_eq!(capability, WRITER.name(), "Only the Writer capability is wired");
    world
        .registry
        .register_aspect(
            Aspect::builder("Journal", || ())
                .declare_parents(
                    "journalWriter",
                    TypeNameFilter::new(types),
                    Introduction::per_proxy(
                        WRITER.clone(),
                        BUFFER_WRITER.clone(),
                        BufferWriter::default,
                    ),
                )
                .build(),
        )
        .expect("Failed to register journal");
}

#[when(expr = "the proxy is written {string}")]
async fn when_written(world: &mut IntroductionWorld, line: String) {
    world
        .proxy()
        .call_by_name("write", args![line])
        .expect("Write should succeed");
}

#[then(expr = "the proxy implements {string}")]
async fn then_implements(world: &mut IntroductionWorld, capability: String) {
    assert!(world.proxy().implements(&capability));
}

#[then(expr = "the introduced writer holds {string}")]
async fn then_writer_holds(world: &mut IntroductionWorld, line: String) {
    let writer = world
        .proxy()
        .introduced::<BufferWriter>()
        .expect("Writer should be introduced");
    assert_eq!(*writer.lines.lock().unwrap(), vec![line]);
}

#[then(expr = "{string} with {string} still returns {string}")]
async fn then_still_returns(
    world: &mut IntroductionWorld,
    method: String,
    key: String,
    expected: String,
) {
    let value = world
        .proxy()
        .call_by_name(&method, args![key])
        .expect("Call should succeed");
    assert_eq!(value.get::<String>().unwrap(), &expected);
}

#[then("the target is not proxied")]
async fn then_not_proxied(world: &mut IntroductionWorld) {
    assert!(!world.wrapped().is_proxy());
}
