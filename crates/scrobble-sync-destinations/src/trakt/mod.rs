pub mod auth;
pub mod client;

pub use auth::{authorization_url, verify_state, OAUTH_STATE};
pub use client::TraktClient;

pub const API_URL: &str = "https://api.trakt.tv";
