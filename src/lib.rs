pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod features;
pub mod logging;
pub mod scripts;
pub mod signals;
pub mod structural;
pub mod text;
pub mod url_context;

pub use config::ExtractorConfig;
pub use error::{ConfigError, SignalError};
pub use extractor::FeatureExtractor;
pub use features::{FeatureValue, FeatureVector, SCHEMA, SCHEMA_VERSION};
pub use url_context::UrlContext;
