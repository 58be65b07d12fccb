//! Conversion configuration.

use serde::{Deserialize, Serialize};

/// Origin used when no configuration is supplied.
pub const DEFAULT_ORIGIN: &str = "https://scrapbox.io";

/// Settings shared by the whole conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the wiki the pages come from. Source-URL fields,
    /// icon images and page links are all built against it.
    #[serde(default = "default_origin")]
    pub origin: String,
}

fn default_origin() -> String {
    String::from(DEFAULT_ORIGIN)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: default_origin(),
        }
    }
}

impl Config {
    /// The origin without any trailing slash, ready for path joining.
    pub fn normalized_origin(&self) -> String {
        normalize_origin(&self.origin)
    }
}

/// Strip trailing slashes so joined URLs never double them.
pub fn normalize_origin(origin: &str) -> String {
    origin.trim_end_matches('/').to_string()
}
