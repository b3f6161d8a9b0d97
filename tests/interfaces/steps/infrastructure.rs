//! Infrastructure pass-through step definitions.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cucumber::{given, then, when, World};
use interpose::pointcut::{simple_match, ExpressionEvaluator, Pointcut};
use interpose::rule::Rule;
use interpose::target::{Arguments, Method, Target, TargetClass};
use interpose::{Advice, AutoProxyCreator, ChainResolver, RuleRegistry, Wrapped};

use crate::common::{OrderRepo, TimingRule};

/// Expression evaluator matching method names and counting every query.
#[derive(Default)]
struct CountingEvaluator {
    queries: AtomicUsize,
}

impl CountingEvaluator {
    fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl ExpressionEvaluator for CountingEvaluator {
    fn matches_type(&self, _expression: &str, _class: &TargetClass) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn evaluate_method_match(
        &self,
        expression: &str,
        method: &Method,
        _class: &TargetClass,
        _args: Option<&Arguments>,
    ) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        simple_match(expression, method.name())
    }
}

/// Test context for infrastructure scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct InfrastructureWorld {
    registry: Arc<RuleRegistry>,
    evaluator: Arc<CountingEvaluator>,
    repo: Option<Arc<OrderRepo>>,
    wrapped: Option<Wrapped>,
}

impl fmt::Debug for InfrastructureWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfrastructureWorld")
            .field("rules", &self.registry.len())
            .field("queries", &self.evaluator.queries())
            .field("proxied", &self.wrapped.as_ref().map(Wrapped::is_proxy))
            .finish()
    }
}

impl InfrastructureWorld {
    fn new() -> Self {
        Self {
            registry: Arc::new(RuleRegistry::new()),
            evaluator: Arc::new(CountingEvaluator::default()),
            repo: None,
            wrapped: None,
        }
    }

    fn wrap(&mut self, target: Arc<dyn Target>, key: &str) {
        let creator = AutoProxyCreator::new(Arc::new(ChainResolver::new(self.registry.clone())));
        self.wrapped = Some(creator.wrap_if_necessary(target, key).expect("Wrapping failed"));
    }

    fn wrapped(&self) -> &Wrapped {
        self.wrapped.as_ref().expect("Nothing wrapped yet")
    }
}

#[given(expr = "an expression rule matching {string}")]
async fn given_expression_rule(world: &mut InfrastructureWorld, expression: String) {
    let rule = Rule::builder("getters", Advice::before(|_| Ok(())))
        .pointcut(Pointcut::expression(expression, world.evaluator.clone()))
        .build()
        .expect("Failed to build rule");
    world.registry.register(rule).expect("Failed to register rule");
}

#[given(expr = "a repository holding order {string} as {string}")]
async fn given_repository(world: &mut InfrastructureWorld, key: String, value: String) {
    world.repo = Some(OrderRepo::with_order(&key, &value));
}

#[when("an infrastructure class is wrapped")]
async fn when_infrastructure_wrapped(world: &mut InfrastructureWorld) {
    world.wrap(Arc::new(TimingRule), "timingRule");
}

#[when("the repository is wrapped")]
async fn when_repository_wrapped(world: &mut InfrastructureWorld) {
    let repo = world.repo.clone().expect("Repository not set up");
    world.wrap(repo, "orderRepo");
}

#[then("the target is not proxied")]
async fn then_not_proxied(world: &mut InfrastructureWorld) {
    assert!(!world.wrapped().is_proxy());
}

#[then("the target is proxied")]
async fn then_proxied(world: &mut InfrastructureWorld) {
    assert!(world.wrapped().is_proxy());
}

#[then("the expression evaluator was never consulted")]
async fn then_never_consulted(world: &mut InfrastructureWorld) {
    assert_eq!(world.evaluator.queries(), 0);
}

#[then("the expression evaluator was consulted")]
async fn then_consulted(world: &mut InfrastructureWorld) {
    assert!(world.evaluator.queries() > 0);
}
