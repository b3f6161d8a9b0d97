//! Rule ordering across static rules and declaring units.

use std::sync::Arc;

use interpose::invocation::ExposeJoinPoint;
use interpose::pointcut::{NameMatch, Pointcut};
use interpose::rule::Rule;
use interpose::{Advice, Aspect, ChainResolver, RuleRegistry};

use crate::common::ORDER_REPO;

fn noop() -> Advice {
    Advice::before(|_| Ok(()))
}

fn resolved_names(resolver: &ChainResolver) -> Vec<String> {
    resolver
        .resolve(&ORDER_REPO, "orderRepo")
        .unwrap()
        .iter()
        .map(|r| r.to_string())
        .collect()
}

#[test]
fn test_explicit_order_ascending_with_absent_last() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .register(Rule::builder("C", noop()).build().unwrap())
        .unwrap();
    registry
        .register(Rule::builder("B", noop()).order(2).build().unwrap())
        .unwrap();
    registry
        .register(Rule::builder("A", noop()).order(1).build().unwrap())
        .unwrap();

    let resolver = ChainResolver::new(registry);
    assert_eq!(resolved_names(&resolver), vec!["A", "B", "C"]);
}

#[test]
fn test_units_with_equal_order_follow_registration() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .register_aspect(
            Aspect::builder("Second", || ())
                .order(5)
                .before("log", Pointcut::always(), |_, _| Ok(()))
                .build(),
        )
        .unwrap();
    registry
        .register_aspect(
            Aspect::builder("First", || ())
                .order(5)
                .before("log", Pointcut::always(), |_, _| Ok(()))
                .build(),
        )
        .unwrap();

    let resolver = ChainResolver::new(registry);
    assert_eq!(
        resolved_names(&resolver),
        vec![ExposeJoinPoint::RULE_NAME, "Second.log", "First.log"]
    );
}

#[test]
fn test_unit_rules_follow_kind_priority_then_name() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .register_aspect(
            Aspect::builder("Audit", || ())
                .after_throwing("onError", Pointcut::always(), |_, _, _| None)
                .after_returning("onReturn", Pointcut::always(), |_, _, _| Ok(()))
                .after("cleanup", Pointcut::always(), |_, _| Ok(()))
                .before("zeta", Pointcut::always(), |_, _| Ok(()))
                .before("alpha", Pointcut::always(), |_, _| Ok(()))
                .around("timing", Pointcut::always(), |_, inv| inv.proceed())
                .build(),
        )
        .unwrap();

    let resolver = ChainResolver::new(registry);
    assert_eq!(
        resolved_names(&resolver),
        vec![
            ExposeJoinPoint::RULE_NAME,
            "Audit.timing",
            "Audit.alpha",
            "Audit.zeta",
            "Audit.cleanup",
            "Audit.onReturn",
            "Audit.onError",
        ]
    );
}

#[test]
fn test_explicit_unit_order_beats_registration() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .register(Rule::builder("static", noop()).build().unwrap())
        .unwrap();
    registry
        .register_aspect(
            Aspect::builder("Security", || ())
                .order(-100)
                .before("check", Pointcut::always(), |_, _| Ok(()))
                .build(),
        )
        .unwrap();

    let resolver = ChainResolver::new(registry);
    assert_eq!(
        resolved_names(&resolver),
        vec![ExposeJoinPoint::RULE_NAME, "Security.check", "static"]
    );
}

#[test]
fn test_rules_that_match_no_method_are_not_eligible() {
    let registry = Arc::new(RuleRegistry::new());
    registry
        .register(
            Rule::builder("deletes", noop())
                .pointcut(Pointcut::for_methods(NameMatch::new(["delete*"])))
                .build()
                .unwrap(),
        )
        .unwrap();

    let resolver = ChainResolver::new(registry);
    assert!(resolved_names(&resolver).is_empty());
}
