//! Plugin invocation
//!
//! Provides:
//! - Plugin lookup across an ordered list of directories
//! - The environment contract passed to plugins (`CNI_*` variables)
//! - Subprocess execution with timeout and cancellation
//! - Decoding of results and structured plugin errors

pub mod args;
pub mod exec;
pub mod find;

pub use args::{parse_plugin_args, plugin_args_string, InvokeArgs, Verb};
pub use exec::{
    exec_plugin, exec_plugin_with_result, exec_plugin_without_result, CancelToken, ExecLimits,
};
pub use find::find_in_path;
