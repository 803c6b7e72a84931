// src/runtime/mod.rs

//! Edge runtime lifecycle.
//!
//! - [`mounts`] turns the function table and import graphs into bind mounts.
//! - [`backend`] provides the `RuntimeBackend` trait and a process-based
//!   implementation.
//! - [`driver`] consumes restart signals and recreates the runtime.

pub mod backend;
pub mod driver;
pub mod mounts;

pub use backend::{MOUNT_PLAN_ENV, ProcessRuntimeBackend, RuntimeBackend};
pub use driver::RestartDriver;
pub use mounts::{Bind, FunctionMount, MountPlan, container_path, plan_mounts};
