use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

impl Config {
    pub fn load() -> crate::Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR")
                    .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            },
        };

        if config.server.addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(crate::Error::Config(format!(
                "SERVER_ADDR '{}' is not a valid socket address",
                config.server.addr
            )));
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8080".to_string(),
            },
        }
    }
}
