//! Randomized tests for classification and parameter rewriting.
//!
//! Generates random library failures and named-parameter queries to check
//! that classification is total and rewriting is stable.

mod common;

use common::FakeLibrary;
use mysql_drivers::db::backends::{MysqlClientDriver, PureMysqlDriver, UltraMysqlDriver};
use mysql_drivers::db::params::rewrite_named;
use mysql_drivers::db::{DriverAdapter, RewriteCache, classify_error, classify_exception};
use mysql_drivers::models::{ErrorClass, FaultKind, HostRuntime, LibraryError, Params, Value};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_error() -> LibraryError {
    let mut rng = rand::thread_rng();
    let class = *ErrorClass::ALL.choose(&mut rng).unwrap();
    let message = match rng.gen_range(0..4) {
        0 => "Socket receive buffer full".to_string(),
        1 => "cursor closed".to_string(),
        2 => String::new(),
        _ => random_string(rng.gen_range(1..64)),
    };
    let err = LibraryError::new(class, message);
    match rng.gen_range(0..3) {
        0 => err,
        1 => err.with_code(0),
        _ => err.with_code(rng.gen_range(-1..5000)),
    }
}

fn adapters() -> Vec<Box<dyn DriverAdapter>> {
    vec![
        Box::new(MysqlClientDriver::new(Arc::new(FakeLibrary::new()))),
        Box::new(PureMysqlDriver::new(
            Arc::new(FakeLibrary::new()),
            &HostRuntime::reference(),
        )),
        Box::new(UltraMysqlDriver::new(Arc::new(FakeLibrary::new()))),
    ]
}

#[test]
fn fuzz_classification_is_stable() {
    let adapters = adapters();
    for _ in 0..2000 {
        let err = random_error();
        for adapter in &adapters {
            let first = classify_exception(adapter.as_ref(), &err);
            let second = classify_exception(adapter.as_ref(), &err);
            assert_eq!(first, second, "{err}");
            assert_eq!(
                classify_error(adapter.as_ref(), err.clone()).fault_kind(),
                first,
                "{err}"
            );
            if first == FaultKind::PayloadTooLarge {
                assert_eq!(adapter.name(), "UltraMySQL");
            }
        }
    }
}

#[test]
fn fuzz_named_rewrite_orders_values_by_placeholder() {
    let mut rng = rand::thread_rng();
    let cache = RewriteCache::new();

    for _ in 0..500 {
        let names: Vec<String> = (0..rng.gen_range(1..6))
            .map(|i| format!("p{i}_{}", random_string(4)))
            .collect();
        let mut order: Vec<&String> = names.iter().collect();
        order.shuffle(&mut rng);

        let sql = order
            .iter()
            .map(|n| format!("col_{n} = %({n})s"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let values: HashMap<String, Value> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), Value::Int(i as i64)))
            .collect();

        let (rewritten, params) = cache.to_positional(&sql, &Params::Named(values.clone())).unwrap();
        assert!(!rewritten.contains("%("), "{rewritten}");
        assert_eq!(rewritten.matches("%s").count(), order.len());

        let expected: Vec<Value> = order.iter().map(|n| values[*n].clone()).collect();
        assert_eq!(params, Params::Positional(expected));

        // Rewriting is a pure function of the query text.
        assert_eq!(rewrite_named(&sql).sql(), rewritten);
        let again = cache.to_positional(&sql, &Params::Named(values)).unwrap();
        assert_eq!(again.0, rewritten);
    }
}

#[test]
fn fuzz_queries_without_placeholders_are_unchanged() {
    for _ in 0..500 {
        let sql = format!("SELECT '{}'", random_string(32));
        let query = rewrite_named(&sql);
        assert_eq!(query.sql(), sql);
        assert!(query.names().is_empty());
    }
}
