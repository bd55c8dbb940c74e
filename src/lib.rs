//! Cadenza — streaming assistant-turn execution engine.
//!
//! Consumes the content blocks of an in-flight assistant turn as an
//! external decoder produces them, presents narrative text incrementally,
//! and executes embedded tool-use requests under an approval protocol,
//! while keeping presentation serialized, reentrant-safe, idempotent
//! against partial blocks, and bounded to one tool result per turn.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cadenza::prelude::*;
//!
//! # async fn example() -> cadenza::error::Result<()> {
//! let registry = Arc::new(ToolRegistry::new());
//! let approvals = Arc::new(StaticApprovals::approve_all());
//! let engine = Engine::new(EngineConfig::default(), registry, approvals);
//!
//! let session = engine.new_session();
//! session.append_block(ContentBlock::text("Hello!", false));
//! session.set_stream_complete();
//! engine.present(&session).await?;
//! assert!(session.is_turn_ready());
//! # Ok(())
//! # }
//! ```

pub mod approval;
pub mod block;
pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod events;
pub mod host;
pub mod prelude;
pub mod repetition;
pub mod session;
pub mod text;
pub mod tools;

mod pipeline;
