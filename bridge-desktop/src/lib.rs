//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`
//! - `MediaRegistry` kept in process memory
//! - `PlaybackElement` without an audio device, for headless hosts and tests
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_desktop::{HeadlessPlaybackElement, InMemoryMediaRegistry, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = Arc::new(ReqwestHttpClient::new());
//!     let registry = Arc::new(InMemoryMediaRegistry::new());
//!     let element = Arc::new(HeadlessPlaybackElement::new(registry.clone()));
//!
//!     // Hand these to the stream controller
//! }
//! ```

mod http;
mod media;

pub use http::ReqwestHttpClient;
pub use media::{HeadlessPlaybackElement, InMemoryMediaRegistry};
