//! Hemmer provider for the Taikun cloud platform.
//!
//! The provider manages Taikun objects as declarative resources and exposes
//! read-only data sources over them. Every managed object belongs to a
//! *family*:
//!
//! - cloud credentials for AWS, Azure, GCP, OpenStack and Proxmox
//! - billing and showback credentials
//! - Kubernetes, access, OPA and standalone profiles
//! - users
//!
//! Each family contributes one resource, one singular data source under the
//! same name and one plural data source listing every object, optionally
//! scoped to an organization.
//!
//! # Quick Start
//!
//! ```ignore
//! use hemmer_provider_taikun::{init_logging, ProviderService, TaikunProvider};
//! use hemmer_provider_taikun::context::OperationContext;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let provider = TaikunProvider::new();
//!     let ctx = OperationContext::background();
//!     provider
//!         .configure(&ctx, json!({"access_key": "key", "secret_key": "secret"}))
//!         .await?;
//!     let created = provider
//!         .create(&ctx, "taikun_billing_credential", json!({
//!             "name": "billing-a",
//!             "prometheus_username": "user",
//!             "prometheus_password": "password",
//!             "prometheus_url": "https://prometheus.example.com",
//!         }))
//!         .await?;
//!     println!("{:?}", created.state);
//!     Ok(())
//! }
//! ```
//!
//! # Consistency
//!
//! The Taikun API may not list an object right after it was written. Create
//! and update keep reading until it shows up, adding one
//! `NotFoundAfterCreateOrUpdate` warning per retry; see [`lifecycle`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attributes;
pub mod client;
pub mod config;
pub mod context;
pub mod convert;
pub mod data_source;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod paging;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

pub use attributes::AttributeBag;
pub use client::TaikunClient;
pub use config::{ProviderConfig, RetryPolicy};
pub use context::{OperationContext, OperationTimeouts};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::TaikunProvider;
pub use schema::{Diagnostic, ProviderSchema};
pub use service::ProviderService;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    StateResult,
};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
pub use serde_json;
pub use tracing;
