pub mod api_keys;
pub mod config;
pub mod error;
pub mod geo;
pub mod preferences;
pub mod protocol;
pub mod region;
pub mod scoring;
pub mod types;

pub use api_keys::ApiKeyRing;
pub use config::Config;
pub use error::GameError;
pub use geo::*;
pub use preferences::*;
pub use region::*;
pub use scoring::*;
pub use types::*;
