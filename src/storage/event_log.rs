//! 事件日志：把事件追加为 JSON 行
//!
//! `<base>/jobs/<jobId>/runs/<runId>/events.jsonl`；监听回调是同步的，写入失败只记日志。

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::events::{Event, EventListener};

#[derive(Debug)]
pub struct EventLog {
    base_dir: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn log_path(&self, job_id: &str, run_id: &str) -> PathBuf {
        self.base_dir
            .join("jobs")
            .join(job_id)
            .join("runs")
            .join(run_id)
            .join("events.jsonl")
    }

    fn append(&self, event: &Event) -> std::io::Result<()> {
        let path = self.log_path(event.job_id(), event.run_id());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(event)?;
        let _guard = self.lock.lock().map_err(|_| std::io::Error::other("event log lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", line)
    }
}

impl EventListener for EventLog {
    fn on_event(&self, event: &Event) {
        if let Err(e) = self.append(event) {
            tracing::warn!(event_type = event.event_type(), error = %e, "failed to append event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RuntimeEvent, RuntimeEventKind};

    #[test]
    fn test_events_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path());
        for name in ["a", "b"] {
            log.on_event(&Event::Runtime(RuntimeEvent::new(
                "job",
                "run",
                RuntimeEventKind::SkillDisconnected {
                    skill_name: name.to_string(),
                },
            )));
        }
        let content = std::fs::read_to_string(log.log_path("job", "run")).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "skillDisconnected");
        assert_eq!(lines[1]["skillName"], "b");
    }
}
