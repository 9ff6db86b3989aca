//! The built-in tools. A session registers exactly one of them.

mod shell;
mod write_file;

pub use shell::{ShellTool, ShellToolParameters, StderrPolicy};
pub use write_file::{WriteFileParameters, WriteFileTool};
