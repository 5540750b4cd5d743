//! 待办列表工具：todo / clearTodo
//!
//! TodoList 是单次运行内的状态，由该运行的 base 技能实例持有，attemptCompletion 通过它检查未完成项。
//! 协调器把列表写进每个快照，运行驱动续跑时再用快照里的列表重建。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::model::TodoItem;
use crate::tools::registry::{parse_args, schema_for};
use crate::tools::Tool;

#[derive(Debug, Clone, Default)]
pub struct TodoList {
    items: Arc<Mutex<Vec<TodoItem>>>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<TodoItem>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
        }
    }

    pub fn items(&self) -> Vec<TodoItem> {
        self.items.lock().map(|items| items.clone()).unwrap_or_default()
    }

    /// 追加新待办、标记完成，返回更新后的列表
    pub fn update(&self, new_todos: &[String], completed: &[u32]) -> Vec<TodoItem> {
        let Ok(mut items) = self.items.lock() else {
            return Vec::new();
        };
        let mut next_id = items.iter().map(|t| t.id + 1).max().unwrap_or(0);
        for title in new_todos {
            items.push(TodoItem {
                id: next_id,
                title: title.clone(),
                completed: false,
            });
            next_id += 1;
        }
        for item in items.iter_mut() {
            if completed.contains(&item.id) {
                item.completed = true;
            }
        }
        items.clone()
    }

    pub fn clear(&self) {
        if let Ok(mut items) = self.items.lock() {
            items.clear();
        }
    }

    pub fn remaining(&self) -> Vec<TodoItem> {
        self.items
            .lock()
            .map(|items| items.iter().filter(|t| !t.completed).cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct TodoArgs {
    /// 新增的待办标题
    #[serde(default)]
    new_todos: Vec<String>,
    /// 标记为完成的待办 id
    #[serde(default)]
    completed_todos: Vec<u32>,
}

pub struct TodoTool {
    list: TodoList,
}

impl TodoTool {
    pub fn new(list: TodoList) -> Self {
        Self { list }
    }
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Manage the task's todo list. Add new todos with newTodos and mark todos done by id with completedTodos. Returns the full list."
    }

    fn parameters_schema(&self) -> Value {
        schema_for::<TodoArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: TodoArgs = parse_args(self.name(), args)?;
        let todos = self.list.update(&args.new_todos, &args.completed_todos);
        tracing::info!(total = todos.len(), "todo tool execute");
        serde_json::to_string(&serde_json::json!({ "todos": todos })).map_err(|e| e.to_string())
    }
}

pub struct ClearTodoTool {
    list: TodoList,
}

impl ClearTodoTool {
    pub fn new(list: TodoList) -> Self {
        Self { list }
    }
}

#[async_trait]
impl Tool for ClearTodoTool {
    fn name(&self) -> &str {
        "clearTodo"
    }

    fn description(&self) -> &str {
        "Clear the todo list."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        self.list.clear();
        Ok(r#"{"todos":[]}"#.to_string())
    }
}
