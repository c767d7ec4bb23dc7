//! Async runtime facade for the audiobook streaming core.
//!
//! Every `core-*` crate goes through this crate for tasks, timers and
//! synchronization primitives instead of naming Tokio directly, so the
//! executor can be swapped in one place.
//!
//! # Modules
//!
//! - `task`: Task spawning, including blocking work for CPU-bound decoding
//! - `time`: Sleep, timeouts, durations
//! - `sync`: Async-aware primitives and the chapter-scoped `CancellationToken`
//! - `runtime`: Handles for code that runs outside an async context
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{timeout, Duration};
//!
//! async fn example() {
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!
//!     let handle = core_async::spawn(async move {
//!         child.cancelled().await;
//!     });
//!
//!     token.cancel();
//!     let _ = timeout(Duration::from_secs(1), handle).await;
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
