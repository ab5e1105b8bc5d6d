// Utils module - process execution and polling helpers shared by the adapters
pub mod exec;
pub mod poll;

pub use exec::{CommandExecutor, LocalExecutor, ensure_success, stderr_string, stdout_string};
pub use poll::wait_until;
