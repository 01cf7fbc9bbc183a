pub mod config;
pub mod secret;
pub mod token;

pub use config::{ConfigEntry, ConfigInput, ConfigResponse, PlatformType, DEFAULT_CONFIG_NAME};
pub use secret::{LeasedSecret, RevokeMetadata, RevokeTarget};
pub use token::{AccessToken, MintedToken, TokenType};
