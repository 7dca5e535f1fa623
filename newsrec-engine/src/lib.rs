pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod index;
pub mod model;
pub mod protocol;
pub mod query;
pub mod registry;
pub mod server;
pub mod similarity;
pub mod stopwords;
pub mod topic;
pub mod transport;
pub mod types;
pub mod vectorizer;

pub use config::{DedupPolicy, ModelConfig, Preset};
pub use error::RecommendError;
pub use model::{build, build_from_path, Model, ModelHandle};
pub use registry::ModelRegistry;
pub use types::{Article, Category, RawArticle, RecommendOptions, RecommendationEntry, Sentiment};
