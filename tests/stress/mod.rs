//! Stress tests
//!
//! ## What We Test
//!
//! - **High volume**: hundreds of thousands of breaker calls
//! - **High concurrency**: many threads and tasks sharing one breaker or client
//! - **State consistency**: no outcome is lost under contention

pub mod circuitbreaker;
