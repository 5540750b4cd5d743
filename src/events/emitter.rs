//! 事件分发：一个 EventEmitter 扇出到多个 EventListener
//!
//! 监听者同步调用、按注册顺序执行；监听者内部出错只记日志，不影响运行。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::events::{Event, RunEvent, RuntimeEvent, RuntimeEventKind};

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventListener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// 转发到 mpsc 通道（CLI 打印、测试收集）
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }

    /// 创建监听者与接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn on_event(&self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!(event_type = event.event_type(), "event receiver dropped");
        }
    }
}

/// 可 clone 的事件发射器（技能管理器持有副本以发出运行时事件）
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: impl EventListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: Event) {
        tracing::debug!(
            event_type = event.event_type(),
            run_id = %event.run_id(),
            "emit"
        );
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    pub fn emit_run(&self, event: RunEvent) {
        self.emit(Event::Run(event));
    }

    pub fn emit_runtime(&self, event: RuntimeEvent) {
        self.emit(Event::Runtime(event));
    }

    /// 绑定 job / run，得到给技能管理器使用的运行时事件出口
    pub fn scoped(&self, job_id: impl Into<String>, run_id: impl Into<String>) -> RuntimeEventSink {
        RuntimeEventSink {
            emitter: self.clone(),
            job_id: job_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// 已绑定 job / run 的运行时事件出口
#[derive(Clone)]
pub struct RuntimeEventSink {
    emitter: EventEmitter,
    job_id: String,
    run_id: String,
}

impl RuntimeEventSink {
    pub fn emit(&self, kind: RuntimeEventKind) {
        self.emitter
            .emit_runtime(RuntimeEvent::new(self.job_id.clone(), self.run_id.clone(), kind));
    }

    /// 不连接任何监听者（测试、独立使用技能管理器时）
    pub fn detached() -> Self {
        EventEmitter::new().scoped("", "")
    }
}
