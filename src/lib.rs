pub mod config;
pub mod frame;
pub mod proxy;
pub mod resolver;

pub use frame::{FrameError, FRAME_LEN, FRAME_MAGIC, MAX_ID_LEN};
pub use proxy::{Listener, ListenerConfig, ListenerStats, PipelineError};
pub use resolver::{FileResolver, Resolve, ResolveError, StaticResolver};
