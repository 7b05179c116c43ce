pub mod config;
pub mod error;
pub mod generation;
pub mod server;

pub use config::{ApiToken, AppConfig, OutputMode};
pub use error::ServiceError;
pub use generation::{GeneratedImage, GenerationRequest, GenerationResponse, ImageRelay};
pub use server::build_router;
