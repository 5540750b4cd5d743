//! hive CLI
//!
//! `hive run <expert> <query>` 启动一次运行；`hive resume` 从已存储的快照续跑（交互式工具结果或新的提问）。
//! `--json` 时每个事件以一行 JSON 写到 stdout，日志始终写 stderr。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use hive::config::{load_config, HiveConfig};
use hive::events::{Event, EventEmitter};
use hive::llm::OpenAiExecutor;
use hive::model::{
    Checkpoint, CheckpointStatus, InteractiveToolCallResult, RunInput, RunSetting,
};
use hive::skills::load_experts;
use hive::storage::{CheckpointStore, EventLog, FileCheckpointStore};
use hive::{run, RunParams};

/// Hive - run Experts that call tools, delegate and resume
#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to config/hive.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print every event as one JSON line on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new job
    Run {
        /// Expert key
        expert: String,
        /// The task for the expert
        query: String,
        /// Stop after this many steps
        #[arg(long)]
        max_steps: Option<u32>,
    },
    /// Continue a job from a stored checkpoint
    Resume {
        #[arg(long)]
        job: String,
        #[arg(long)]
        checkpoint: String,
        /// Answer for the first pending interactive tool call
        #[arg(long, conflicts_with = "query")]
        tool_result: Option<String>,
        /// New user message for a finished checkpoint
        #[arg(long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.clone()).context("Failed to load config")?;
    let experts_file = config
        .experts_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("config/experts.toml"));
    let experts = load_experts(&experts_file)
        .with_context(|| format!("Failed to load experts from {}", experts_file.display()))?;
    let store = Arc::new(FileCheckpointStore::new(&config.storage.base_dir));

    let (setting, checkpoint) = match cli.command {
        Command::Run {
            expert,
            query,
            max_steps,
        } => {
            if !experts.contains_key(&expert) {
                bail!("Unknown expert: {}", expert);
            }
            let job_id = hive::model::new_id();
            let mut setting = base_setting(&config, job_id, expert, experts, RunInput::text(query));
            if max_steps.is_some() {
                setting.max_steps = max_steps;
            }
            (setting, None)
        }
        Command::Resume {
            job,
            checkpoint,
            tool_result,
            query,
        } => {
            let checkpoint = store
                .retrieve_checkpoint(&job, &checkpoint)
                .await
                .context("Failed to load checkpoint")?;
            let input = resume_input(&checkpoint, tool_result, query)?;
            let mut setting = base_setting(&config, job, checkpoint.expert.key.clone(), experts, input);
            if setting.input.interactive_tool_call_result.is_some() {
                setting.run_id = checkpoint.run_id.clone();
            }
            (setting, Some(checkpoint))
        }
    };

    let mut emitter = EventEmitter::new().with_listener(EventLog::new(&config.storage.base_dir));
    if cli.json {
        emitter = emitter.with_listener(|event: &Event| {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{}", line);
            }
        });
    }

    let supervisor = config.runtime.supervisor();
    let cancel = supervisor.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current transition");
            cancel.cancel();
        }
    });

    let llm = Arc::new(OpenAiExecutor::new(config.llm.base_url.as_deref(), config.llm.api_key()));
    let job_id = setting.job_id.clone();
    let finished = run(RunParams {
        setting,
        checkpoint,
        llm,
        store,
        emitter,
        policy: Arc::new(supervisor),
        options: config.runtime.run_options(),
    })
    .await
    .context("Run failed")?;

    report(&job_id, &finished, cli.json)
}

fn base_setting(
    config: &HiveConfig,
    job_id: String,
    expert_key: String,
    experts: std::collections::HashMap<String, hive::model::Expert>,
    input: RunInput,
) -> RunSetting {
    let mut setting = RunSetting::new(job_id, expert_key, experts, config.llm.model.clone(), input);
    setting.max_steps = config.runtime.max_steps;
    setting.max_retries = config.runtime.max_retries;
    setting.timeout = config.runtime.timeout_ms;
    setting.context_window = config.llm.context_window;
    setting.provider_config.provider_name = config.llm.provider.clone();
    setting.provider_config.base_url = config.llm.base_url.clone();
    setting.env = std::env::vars().collect();
    setting
}

fn resume_input(
    checkpoint: &Checkpoint,
    tool_result: Option<String>,
    query: Option<String>,
) -> anyhow::Result<RunInput> {
    if let Some(text) = tool_result {
        let call = checkpoint
            .pending_tool_calls
            .as_ref()
            .and_then(|calls| calls.first())
            .context("Checkpoint has no pending tool call")?;
        return Ok(RunInput::tool_result(InteractiveToolCallResult {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            skill_name: call.skill_name.clone(),
            text,
        }));
    }
    match query {
        Some(query) => Ok(RunInput::text(query)),
        None => bail!("resume needs --tool-result or --query"),
    }
}

fn report(job_id: &str, checkpoint: &Checkpoint, json: bool) -> anyhow::Result<()> {
    if !json {
        match checkpoint.status {
            CheckpointStatus::Completed => {
                println!("{}", checkpoint.last_message_text().unwrap_or_default());
            }
            CheckpointStatus::StoppedByInteractiveTool => {
                for call in checkpoint.pending_tool_calls.iter().flatten() {
                    println!("Waiting for {} ({}): {}", call.tool_name, call.id, call.args);
                }
            }
            _ => {}
        }
    }
    eprintln!(
        "job {} checkpoint {} status {} (step {}, {} tokens)",
        job_id,
        checkpoint.id,
        checkpoint.status.as_str(),
        checkpoint.step_number,
        checkpoint.usage.total_tokens
    );
    if checkpoint.status == CheckpointStatus::StoppedByError {
        bail!("Run stopped by error");
    }
    Ok(())
}
