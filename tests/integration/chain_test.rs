//! Chain execution: ordering of behaviors, short-circuit, retry, and the
//! error path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use interpose::advice::Instrumented;
use interpose::args;
use interpose::error::InvocationError;
use interpose::pointcut::{NameMatch, Pointcut, RuntimeMatcher, TrueFilter};
use interpose::proxy::ProxyHandle;
use interpose::rule::Rule;
use interpose::target::{Arguments, Method};
use interpose::{Advice, Aspect, AutoProxyCreator, ChainResolver, ProxyFactory, RuleRegistry, Value};

use crate::common::{NotFound, OrderRepo, Recorder};

fn proxy_with(repo: Arc<OrderRepo>, advice: Vec<Advice>) -> ProxyHandle {
    advice
        .into_iter()
        .fold(ProxyFactory::new(repo), |factory, a| factory.advice(a))
        .build()
        .unwrap()
}

/// One unit declaring every advice kind, proxied through the auto-proxy path.
fn audited_repo(recorder: &Recorder, repo: Arc<OrderRepo>) -> ProxyHandle {
    let registry = Arc::new(RuleRegistry::new());
    let rec = recorder.clone();
    let (r1, r2, r3, r4) = (rec.clone(), rec.clone(), rec.clone(), rec.clone());
    registry
        .register_aspect(
            Aspect::builder("Audit", || ())
                .around("timing", Pointcut::always(), move |_, inv| {
                    rec.push("around:enter");
                    let result = inv.proceed();
                    rec.push("around:exit");
                    result
                })
                .before("check", Pointcut::always(), move |_, _| {
                    r1.push("before");
                    Ok(())
                })
                .after("cleanup", Pointcut::always(), move |_, _| {
                    r2.push("after");
                    Ok(())
                })
                .after_returning("onReturn", Pointcut::always(), move |_, _, _| {
                    r3.push("afterReturning");
                    Ok(())
                })
                .after_throwing("onError", Pointcut::always(), move |_, _, _| {
                    r4.push("afterThrowing");
                    None
                })
                .build(),
        )
        .unwrap();

    let creator = AutoProxyCreator::new(Arc::new(ChainResolver::new(registry)));
    creator
        .wrap_if_necessary(repo, "orderRepo")
        .unwrap()
        .into_proxy()
        .unwrap()
}

#[test]
fn test_after_cleanup_runs_after_after_returning() {
    let recorder = Recorder::new();
    let proxy = audited_repo(&recorder, OrderRepo::with_order("o-1", "book"));

    proxy.call_by_name("get", args!["o-1".to_string()]).unwrap();
    assert_eq!(
        recorder.events(),
        vec!["around:enter", "before", "afterReturning", "after", "around:exit"]
    );
}

#[test]
fn test_after_cleanup_runs_after_after_throwing() {
    let recorder = Recorder::new();
    let proxy = audited_repo(&recorder, OrderRepo::new());

    let err = proxy
        .call_by_name("get", args!["missing".to_string()])
        .unwrap_err();
    assert!(err.is::<NotFound>());
    assert_eq!(
        recorder.events(),
        vec!["around:enter", "before", "afterThrowing", "after", "around:exit"]
    );
}

#[test]
fn test_thrown_error_reaches_caller_unchanged_and_cleanup_runs_once() {
    let recorder = Recorder::new();
    let original = Arc::new(std::sync::Mutex::new(None::<InvocationError>));
    let capture = original.clone();
    let proxy = proxy_with(
        OrderRepo::new(),
        vec![
            recorder.after("after"),
            recorder.after_throwing("afterThrowing"),
            Advice::after_throwing(move |e, _| {
                *capture.lock().unwrap() = Some(e.clone());
                None
            }),
        ],
    );

    let err = proxy
        .call_by_name("get", args!["missing".to_string()])
        .unwrap_err();
    let seen = original.lock().unwrap().clone().unwrap();
    assert!(err.same_as(&seen));
    assert_eq!(recorder.count("after"), 1);
    assert_eq!(recorder.count("afterThrowing"), 1);
}

#[test]
fn test_after_throwing_may_translate_the_error() {
    #[derive(Debug, thiserror::Error)]
    #[error("translated")]
    struct Translated;

    let proxy = proxy_with(
        OrderRepo::new(),
        vec![Advice::after_throwing(|e, _| {
            e.is::<NotFound>()
                .then(|| InvocationError::thrown(Translated))
        })],
    );

    let err = proxy
        .call_by_name("get", args!["missing".to_string()])
        .unwrap_err();
    assert!(err.is::<Translated>());
}

#[test]
fn test_failing_cleanup_replaces_the_outcome() {
    #[derive(Debug, thiserror::Error)]
    #[error("cleanup failed")]
    struct CleanupFailed;

    let proxy = proxy_with(
        OrderRepo::with_order("o-1", "book"),
        vec![Advice::after(|_| Err(InvocationError::thrown(CleanupFailed)))],
    );

    let err = proxy.call_by_name("get", args!["o-1".to_string()]).unwrap_err();
    assert!(err.is::<CleanupFailed>());
}

#[test]
fn test_around_short_circuit_skips_downstream_and_target() {
    let recorder = Recorder::new();
    let repo = OrderRepo::with_order("o-1", "book");
    let proxy = proxy_with(
        repo.clone(),
        vec![
            Advice::around_fn(|_| Ok(Value::of("cached".to_string()))),
            recorder.before("before"),
        ],
    );

    let value = proxy.call_by_name("get", args!["o-1".to_string()]).unwrap();
    assert_eq!(value.get::<String>().unwrap(), "cached");
    assert_eq!(repo.calls(), 0);
    assert!(recorder.events().is_empty());
}

#[test]
fn test_before_error_prevents_target_call() {
    #[derive(Debug, thiserror::Error)]
    #[error("denied")]
    struct Denied;

    let recorder = Recorder::new();
    let repo = OrderRepo::with_order("o-1", "book");
    let proxy = proxy_with(
        repo.clone(),
        vec![
            recorder.after("after"),
            Advice::before(|_| Err(InvocationError::thrown(Denied))),
        ],
    );

    let err = proxy.call_by_name("get", args!["o-1".to_string()]).unwrap_err();
    assert!(err.is::<Denied>());
    assert_eq!(repo.calls(), 0);
    assert_eq!(recorder.count("after"), 1);
}

#[test]
fn test_around_retry_reinvokes_the_rest_of_the_chain() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let repo = OrderRepo::new();
    let proxy = proxy_with(
        repo.clone(),
        vec![
            Advice::around_fn(|inv| match inv.proceed() {
                Err(e) if e.is::<NotFound>() => {
                    inv.set_argument(0, Value::of("o-1".to_string()))?;
                    inv.proceed()
                }
                other => other,
            }),
            Advice::before(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ],
    );
    proxy.call_by_name("save", args!["o-1".to_string()]).unwrap();
    attempts.store(0, Ordering::SeqCst);

    let value = proxy
        .call_by_name("get", args!["missing".to_string()])
        .unwrap();
    assert_eq!(value.get::<String>().unwrap(), "order o-1");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_runtime_matcher_decides_per_call() {
    let recorder = Recorder::new();
    let vip = Rule::builder("vip", recorder.before("vip"))
        .pointcut(Pointcut::for_methods(RuntimeMatcher::new(
            NameMatch::new(["get"]),
            |_m: &Method, args: &Arguments| {
                args.get::<String>("get", 0)
                    .map(|key| key.starts_with("vip-"))
                    .unwrap_or(false)
            },
        )))
        .build()
        .unwrap();
    let repo = OrderRepo::with_order("vip-1", "gold");
    let proxy = ProxyFactory::new(repo.clone())
        .rule(Arc::new(vip))
        .build()
        .unwrap();

    let _ = proxy.call_by_name("get", args!["o-1".to_string()]);
    assert_eq!(recorder.count("vip"), 0);
    proxy.call_by_name("get", args!["vip-1".to_string()]).unwrap();
    assert_eq!(recorder.count("vip"), 1);
}

#[test]
fn test_method_matcher_limits_chain_per_method() {
    let recorder = Recorder::new();
    let saves = Rule::builder("saves", recorder.before("save"))
        .pointcut(Pointcut::new(TrueFilter, NameMatch::new(["save"])))
        .build()
        .unwrap();
    let proxy = ProxyFactory::new(OrderRepo::new())
        .rule(Arc::new(saves))
        .build()
        .unwrap();

    proxy.call_by_name("save", args!["o-1".to_string()]).unwrap();
    proxy.call_by_name("get", args!["o-1".to_string()]).unwrap();
    assert_eq!(recorder.events(), vec!["save"]);
}

#[test]
fn test_instrumented_does_not_change_outcome() {
    let proxy = ProxyFactory::new(OrderRepo::with_order("o-1", "book"))
        .advice(Advice::around(Instrumented::new("repo")))
        .advice(Advice::around(Instrumented::wrap(
            interpose::advice::Proceed,
            "inner",
        )))
        .build()
        .unwrap();

    let value = proxy.call_by_name("get", args!["o-1".to_string()]).unwrap();
    assert_eq!(value.get::<String>().unwrap(), "book");
    let err = proxy
        .call_by_name("get", args!["missing".to_string()])
        .unwrap_err();
    assert!(err.is::<NotFound>());
}
