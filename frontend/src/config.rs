use client::ClientConfig;

pub struct Config {
    pub api_base_url: &'static str,
    /// Key under which the access credential is kept in `sessionStorage`.
    pub credential_key: &'static str,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            api_base_url: "/api",
            credential_key: "voting.credential",
        }
    }

    pub fn client(&self) -> ClientConfig {
        ClientConfig::new(self.api_base_url)
    }
}

pub const CONFIG: Config = Config::new();
