//! 领域事件：类型定义与扇出

pub mod emitter;
pub mod types;

pub use emitter::{ChannelListener, EventEmitter, EventListener, RuntimeEventSink};
pub use types::{Event, RunEvent, RunEventKind, RuntimeEvent, RuntimeEventKind};
