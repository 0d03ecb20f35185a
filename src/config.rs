use clap::Parser;

/// GW2 WvW match companion for a watchface device
#[derive(Parser, Debug, Clone)]
#[command(name = "wvw-companion", version, about)]
pub struct Config {
    /// GW2 API base URL
    #[arg(long, env = "GW2_API_URL", default_value = "https://api.guildwars2.com")]
    pub api_url: String,

    /// Language code for world names
    #[arg(long, env = "GW2_LANG", default_value = "en")]
    pub lang: String,

    /// Device bridge listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:9601")]
    pub listen_addr: String,

    /// Outbound API request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("api_url must not be empty");
        }
        if self.lang.is_empty() {
            anyhow::bail!("lang must not be empty");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        Ok(())
    }
}
