// src/exec/mod.rs

//! Task execution layer.
//!
//! This module runs submitted tasks and reports their completion records back
//! to the runtime via `RuntimeEvent`s.
//!
//! - [`backend`] provides the `ExecutorGateway` trait and the production
//!   `ProcessGateway`, which tests can replace with a fake implementation.
//! - [`executor_loop`] owns the intake loop, worker slots, accelerator
//!   leases and retries.
//! - [`task_runner`] runs one attempt of one task as a shell process.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorGateway, ProcessGateway};
pub use executor_loop::spawn_executor;
pub use task_runner::WorkerSettings;
