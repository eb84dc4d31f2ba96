//! npm-name-check - npm package name availability checker.
//!
//! This library keeps a local snapshot of every package name on the npm
//! registry and checks candidate names against it:
//! - Validates names against npm naming rules
//! - Refreshes the snapshot by full download or by replaying the change feed,
//!   whichever is cheaper
//! - Flags existing names that differ only by punctuation or a plural `s`
//!
//! # Example
//!
//! ```no_run
//! use npm_name_check::config::SyncConfig;
//! use npm_name_check::registry::client::{ClientOptions, DEFAULT_ALL_DOCS_URL, DEFAULT_INFO_URL};
//! use npm_name_check::registry::RegistryEndpoints;
//! use npm_name_check::Validator;
//!
//! #[tokio::main]
//! async fn main() {
//!     let endpoints = RegistryEndpoints::new(DEFAULT_INFO_URL, DEFAULT_ALL_DOCS_URL, None).unwrap();
//!     let mut validator =
//!         Validator::connect(SyncConfig::default(), endpoints, &ClientOptions::default()).unwrap();
//!     let result = validator.validate("my-package").await.unwrap();
//!     println!("{:?}: {:?}", result.status, result.conflicting_names);
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod name;
pub mod notify;
pub mod registry;
pub mod snapshot;
pub mod sync;
pub mod types;
pub mod validator;

pub use cancel::CancelToken;
pub use config::{Config, SyncConfig};
pub use validator::{check_syntax_only, Validator};
pub use types::{
    ChangeRecord, NameCheckError, RemoteInfo, Result, Snapshot, ValidationResult,
    ValidationStatus,
};
