use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub admin_id: i64,
    pub bot_token: Option<String>,
    pub bot_api_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
        let admin_id = std::env::var("ADMIN_ID")
            .map_err(|_| anyhow::anyhow!("ADMIN_ID is not set"))?
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("ADMIN_ID must be a numeric user id"))?;
        let bot_token = std::env::var("BOT_TOKEN").ok();
        let bot_api_url =
            std::env::var("BOT_API_URL").unwrap_or_else(|_| "https://api.telegram.org".into());
        Ok(Self {
            database_url,
            admin_id,
            bot_token,
            bot_api_url,
        })
    }
}
