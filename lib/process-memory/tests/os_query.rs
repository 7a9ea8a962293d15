//! Queries against the real operating system tools.
//!
//! These spawn the platform command for the test process itself, so they depend on `ps` (or `tasklist`) being present
//! on the host.

use process_memory::{get_process_memory_usage, MemoryQuery as _, Strategy, StrategyKind};

#[test]
fn reports_plausible_usage() {
    let usage = get_process_memory_usage().unwrap();

    // A test binary should sit comfortably between 1 MB and 1 GB.
    assert!(usage > 1_000_000, "usage too small: {}", usage);
    assert!(usage < 1_000_000_000, "usage too large: {}", usage);
    assert_eq!(usage % 1024, 0);
}

#[test]
fn global_strategy_matches_host() {
    assert_eq!(Strategy::global().kind(), StrategyKind::detect());
    assert!(Strategy::global().query_current().unwrap() > 0);
}

#[test]
fn back_to_back_queries_are_stable() {
    let first = get_process_memory_usage().unwrap();
    let second = get_process_memory_usage().unwrap();

    let (low, high) = (first.min(second) as f64, first.max(second) as f64);
    assert!(high / low < 1.25, "first: {}, second: {}", first, second);
}
