//! lessonkit-client: Backend integration for lessonkit.
//!
//! Implements the `AnswerValidator` trait against the remote AI validation
//! endpoints, fetches lesson content, and manages the bearer token and
//! configuration the requests are built from.

pub mod api;
pub mod config;
pub mod content;
pub mod error;
pub mod mock;
pub mod token;
pub mod validator;

pub use api::ApiClient;
pub use config::{create_api_client, create_token_store, load_config, load_config_from, LessonkitConfig};
pub use content::ContentClient;
pub use error::ClientError;
pub use validator::HttpValidator;
