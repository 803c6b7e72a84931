// src/watch/mod.rs

//! Hot reload for edge functions.
//!
//! This module is responsible for:
//! - Classifying raw filesystem events ([`filter`]).
//! - Discovering what each function imports ([`resolver`]).
//! - Turning the function table into a set of watch targets ([`planner`]).
//! - Debouncing events into restart signals ([`event_loop`], [`watcher`]).
//! - Keeping the targets current as imports change ([`edge`]).
//!
//! It does **not** restart anything itself; consumers read the restart
//! channel (see [`crate::runtime::driver`]).

pub mod edge;
pub mod event_loop;
pub mod filter;
pub mod path_utils;
pub mod planner;
pub mod resolver;
pub mod watcher;

pub use edge::EdgeFunctionWatcher;
pub use event_loop::{DEFAULT_DEBOUNCE, EventGate, WatcherConfig, run_event_loop};
pub use filter::{FsEvent, Op, is_ignored_dir, is_ignored_file_event, is_significant};
pub use planner::{DEFAULT_WATCH_LIMIT, PlanOutcome, WATCH_LIMIT_ENV, WatchSetPlanner};
pub use resolver::{DependencyEdge, ImportMap, ImportResolver, Resolution};
pub use watcher::{GenericWatcher, WatchChannels};
