//! # LMS Client
//!
//! Client library for the learning-management backend API: course catalog,
//! cart and orders, enrollment and progress, reviews and Q&A, wishlist,
//! instructor dashboards and account management.
//!
//! ## Architecture
//!
//! Every request goes through the authenticated request pipeline in
//! [`pipeline`]:
//!
//! - **Attach**: the stored access token is sent as `Authorization: Bearer`
//! - **Check**: the token's `exp` claim is decoded locally, no network call
//! - **Renew**: an expired or undecodable token is exchanged exactly once for
//!   a new pair, which is persisted before the request leaves
//! - **Degrade**: if renewal fails the request is sent anyway with the stale
//!   token; the backend's 401 is the caller's signal
//!
//! Session state lives in a [`SessionManager`] shared by reference between
//! all clients, which also lets concurrent requests share one renewal.
//!
//! ## Example
//!
//! ```no_run
//! use lms_client::{ApiClient, ClientConfig, SessionManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env(None, None)?;
//!     let session = Arc::new(SessionManager::from_config(&config));
//!     let client = ApiClient::new(config, session)?;
//!
//!     client.login("student@example.com", "StrongPass123!").await?;
//!     let enrollments = client.enrollments().await?;
//!     println!("{enrollments}");
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod claims;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod session;

pub use api::LessonProgress;
pub use auth::{PasswordResetConfirm, RegisterRequest, UserData};
pub use claims::{Claims, CredentialPair, decode, is_access_token_expired};
pub use config::{ClientConfig, ConfigError, RefreshPolicy};
pub use errors::{ClientError, ClientResult, DecodeError, SessionError};
pub use pipeline::ApiClient;
pub use session::{FileStore, MemoryStore, SessionManager, SessionStore, SessionTokens, StorageExpiry};
