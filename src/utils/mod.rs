pub mod logger;
pub mod pkce;
