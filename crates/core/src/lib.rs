pub mod config;
pub mod domain;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::chat::{ChatMessage, Role, ThreadId, ToolCall};
pub use domain::product::{Prices, Product, ProductId, Review};
