//! Call-scoped context: current proxy and current join point.

use std::sync::{Arc, LazyLock, Mutex};

use interpose::args;
use interpose::error::{InvocationError, InvocationResult};
use interpose::pointcut::Pointcut;
use interpose::target::{unsupported, Arguments, Method, Target, TargetClass};
use interpose::{
    current_join_point, current_proxy, Advice, AopError, Aspect, AutoProxyCreator,
    ChainResolver, ProxyFactory, ProxyHandle, RuleRegistry, Value,
};
use uuid::Uuid;

use crate::common::{NotFound, OrderRepo, Recorder};

static FACADE: LazyLock<Arc<TargetClass>> = LazyLock::new(|| {
    TargetClass::builder("OrderFacade")
        .method(Method::new("lookup").param("String"))
        .build()
        .unwrap()
});

/// Calls an inner proxy and records which proxy is current around that call.
struct Facade {
    inner: ProxyHandle,
    seen: Mutex<Vec<(&'static str, Option<Uuid>)>>,
}

impl Facade {
    fn note(&self, at: &'static str) {
        let current = current_proxy().ok().map(|p| p.id());
        self.seen.lock().unwrap().push((at, current));
    }
}

impl Target for Facade {
    fn class(&self) -> &Arc<TargetClass> {
        &FACADE
    }

    fn invoke(&self, method: &Method, args: &Arguments) -> InvocationResult<Value> {
        match method.name() {
            "lookup" => {
                self.note("before-inner");
                let result = self.inner.call_by_name("get", args.clone());
                self.note("after-inner");
                result
            }
            _ => Err(unsupported(self.class(), method)),
        }
    }
}

fn exposing() -> ProxyFactory {
    ProxyFactory::new(OrderRepo::with_order("o-1", "book")).expose_proxy(true)
}

fn nested() -> (ProxyHandle, ProxyHandle, Arc<Facade>, Arc<Mutex<Vec<Option<Uuid>>>>) {
    let inside = Arc::new(Mutex::new(Vec::new()));
    let record = inside.clone();
    let inner = exposing()
        .advice(Advice::before(move |_| {
            record.lock().unwrap().push(current_proxy().ok().map(|p| p.id()));
            Ok(())
        }))
        .build()
        .unwrap();

    let facade = Arc::new(Facade {
        inner: inner.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let outer = ProxyFactory::new(facade.clone())
        .expose_proxy(true)
        .build()
        .unwrap();
    (outer, inner, facade, inside)
}

#[test]
fn test_no_context_outside_a_call() {
    assert!(matches!(current_proxy(), Err(AopError::IllegalState(_))));
    assert!(matches!(current_join_point(), Err(AopError::IllegalState(_))));
}

#[test]
fn test_nested_calls_restore_outer_proxy() {
    let (outer, inner, facade, inside) = nested();

    let value = outer.call_by_name("lookup", args!["o-1".to_string()]).unwrap();
    assert_eq!(value.get::<String>().unwrap(), "book");

    assert_eq!(*inside.lock().unwrap(), vec![Some(inner.id())]);
    assert_eq!(
        *facade.seen.lock().unwrap(),
        vec![("before-inner", Some(outer.id())), ("after-inner", Some(outer.id()))]
    );
    assert!(current_proxy().is_err());
}

#[test]
fn test_failing_inner_call_still_restores_outer_proxy() {
    let (outer, _inner, facade, _) = nested();

    let err = outer
        .call_by_name("lookup", args!["missing".to_string()])
        .unwrap_err();
    assert!(err.is::<NotFound>());
    assert_eq!(
        facade.seen.lock().unwrap().last().cloned(),
        Some(("after-inner", Some(outer.id())))
    );
    assert!(current_proxy().is_err());
}

#[test]
fn test_join_point_exposed_to_unit_behaviors() {
    let recorder = Recorder::new();
    let rec = recorder.clone();
    let registry = Arc::new(RuleRegistry::new());
    registry
        .register_aspect(
            Aspect::builder("Tracing", || ())
                .before("trace", Pointcut::always(), move |_, _| {
                    let jp = current_join_point()
                        .map_err(|e| InvocationError::TargetUnavailable(e.to_string()))?;
                    rec.push(jp.short_string());
                    Ok(())
                })
                .build(),
        )
        .unwrap();
    let creator = AutoProxyCreator::new(Arc::new(ChainResolver::new(registry)));
    let proxy = creator
        .wrap_if_necessary(OrderRepo::with_order("o-1", "book"), "orderRepo")
        .unwrap()
        .into_proxy()
        .unwrap();

    proxy.call_by_name("get", args!["o-1".to_string()]).unwrap();
    assert_eq!(recorder.events(), vec!["OrderRepo.get(String)"]);
    assert!(current_join_point().is_err());
}

#[test]
fn test_join_point_absent_without_exposure_rule() {
    let proxy = ProxyFactory::new(OrderRepo::with_order("o-1", "book"))
        .advice(Advice::before(|_| {
            assert!(current_join_point().is_err());
            Ok(())
        }))
        .build()
        .unwrap();
    proxy.call_by_name("get", args!["o-1".to_string()]).unwrap();
}
