//! 工具层：调用与待确认写入、分派、注册表与执行器、向模型声明的函数

pub mod dispatcher;
pub mod executor;
pub mod invocation;
pub mod memory_search;
pub mod python;
pub mod registry;
pub mod schema;

pub use dispatcher::{classify, DispatchPlan};
pub use executor::{ToolExecutionResult, ToolExecutor};
pub use invocation::{
    PendingWrite, PendingWriteError, ToolInvocation, EXECUTE_PYTHON_SCRIPT, MAX_IMPORTANCE,
    MIN_IMPORTANCE, SAVE_CORE_MEMORY, SEARCH_LONG_TERM_MEMORY,
};
pub use memory_search::MemorySearchTool;
pub use python::{PythonScriptTool, PYTHON_SUCCESS_OUTPUT};
pub use registry::{Tool, ToolRegistry};
pub use schema::{save_core_memory_declaration, tool_declarations, ToolDeclaration};
