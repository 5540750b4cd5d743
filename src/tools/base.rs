//! base 技能的工具集
//!
//! 每次运行创建一份新的注册表，挂在进程内 MCP 传输上；待办列表由调用方传入，以便续跑时恢复。

use std::path::Path;

use crate::tools::completion::AttemptCompletionTool;
use crate::tools::files::{ListDirectoryTool, ReadImageFileTool, ReadPdfFileTool, ReadTextFileTool};
use crate::tools::filesystem::SafeFs;
use crate::tools::think::ThinkTool;
use crate::tools::todo::{ClearTodoTool, TodoList, TodoTool};
use crate::tools::ToolRegistry;

pub const BASE_SKILL_NAME: &str = "base";

pub fn base_tool_registry(workspace_root: impl AsRef<Path>, todos: TodoList) -> ToolRegistry {
    let fs = SafeFs::new(workspace_root);

    let mut registry = ToolRegistry::new();
    registry.register(AttemptCompletionTool::new(todos.clone()));
    registry.register(ThinkTool);
    registry.register(TodoTool::new(todos.clone()));
    registry.register(ClearTodoTool::new(todos));
    registry.register(ReadTextFileTool::new(fs.clone()));
    registry.register(ReadImageFileTool::new(fs.clone()));
    registry.register(ReadPdfFileTool::new(fs.clone()));
    registry.register(ListDirectoryTool::new(fs));
    registry
}
