//! # addrun
//!
//! Adds two numbers inside an embedded Wasm runtime that arrives late.
//!
//! ## Architecture
//!
//! - **RuntimeLoader**: waits for the host to publish a bootstrap entry point,
//!   boots it, registers the `add_numbers` definition and flips to ready.
//! - **BridgeInvoker**: once ready, performs typed `add_numbers(a, b)` calls
//!   against the loaded runtime.
//!
//! Around the core sit the input layer (text fields to finite numbers), the
//! status categories the display layer renders, and a canned self-test suite.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use addrun::BridgeInvoker;
//! use addrun::EntryRegistry;
//! use addrun::LoaderConfig;
//! use addrun::RuntimeLoader;
//! use addrun::WasmEntry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoaderConfig::default();
//! let registry = EntryRegistry::new();
//! registry.publish(Arc::new(WasmEntry::new(config.image.clone())));
//!
//! let loader = RuntimeLoader::new(config, registry);
//! loader.bootstrap().await?;
//!
//! let bridge = BridgeInvoker::new(loader);
//! let sum = bridge.invoke(5.0, 3.0).await?;
//! assert_eq!(sum.value, 8.0);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod entry;
pub mod image;
pub mod input;
pub mod loader;
pub mod runtime;
pub mod selftest;
pub mod status;

pub use bridge::BridgeInvoker;
pub use bridge::Invocation;
pub use bridge::InvokeError;
pub use config::LoaderConfig;
pub use config::PollPolicy;
pub use entry::EntryPoint;
pub use entry::EntryRegistry;
pub use entry::WasmEntry;
pub use image::ImageLocation;
pub use input::InputError;
pub use loader::LoadError;
pub use loader::LoaderState;
pub use loader::RuntimeLoader;
pub use runtime::RuntimeHandle;
pub use selftest::SelfTestReport;
pub use selftest::run_self_tests;
pub use status::InvokeStatus;
pub use status::LoaderStatus;
