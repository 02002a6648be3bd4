//! Tests for utility functions

use prometheus_execution_engine::util::{elapsed_ms, now_ms, resident_memory_mb};

#[test]
fn test_clock_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert_eq!(elapsed_ms(a, b), b - a);
}

#[test]
fn test_elapsed_saturates() {
    assert_eq!(elapsed_ms(10, 5), 0);
}

#[test]
fn test_resident_memory_is_non_negative() {
    let mb = resident_memory_mb();
    assert!(mb >= 0.0);
    #[cfg(target_os = "linux")]
    assert!(mb > 0.0);
}
