// src/config/mod.rs

//! Loading of `supabase/config.toml` and resolution of the function table.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{discover_functions, load_and_validate, load_from_path, load_function_table};
pub use model::{ConfigFile, EdgeRuntimeSection, FunctionSection, RawConfigFile};
