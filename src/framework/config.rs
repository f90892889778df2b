use poise::serenity_prelude::{ActivityData, ChannelId, GuildId};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub bot: BotConfig,

    #[serde(default)]
    anilist: AniListConfig,

    #[serde(default)]
    pixiv: PixivConfig,

    #[serde(default)]
    store: StoreConfig,
}

impl Config {
    pub fn anilist_token(&self) -> Option<&str> {
        if self.anilist.token.is_none() {
            warn!("no anilist.token in config, review lookups will be disabled");
        }

        self.anilist.token.as_deref()
    }

    pub fn pixiv_refresh_token(&self) -> Option<&str> {
        if self.pixiv.refresh_token.is_none() {
            warn!("no pixiv.refresh_token in config, image commands will be disabled");
        }

        self.pixiv.refresh_token.as_deref()
    }

    pub fn store_path(&self) -> &str {
        &self.store.path
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BotConfig {
    token: String,
    prefix: String,
    testing_server: Option<GuildId>,
    activity: Option<String>,
    status_channel: Option<ChannelId>,
}

impl BotConfig {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn testing_server(&self) -> Option<&GuildId> {
        if self.testing_server.is_none() {
            warn!("no testing server set in config, slash commands will only register globally");
        }

        self.testing_server.as_ref()
    }

    pub fn status_channel(&self) -> Option<ChannelId> {
        self.status_channel
    }

    pub fn activity(&self) -> Option<ActivityData> {
        let activity = self.activity.as_deref()?;

        if activity.is_empty() {
            warn!("bot.activity provided in config as empty string, defaulting to none");
            return None;
        }

        let parsed_activity = if let Some(name) = activity.strip_prefix("playing ") {
            ActivityData::playing(name)
        } else if let Some(name) = activity.strip_prefix("listening to ") {
            ActivityData::listening(name)
        } else if let Some(name) = activity.strip_prefix("watching ") {
            ActivityData::watching(name)
        } else if let Some(name) = activity.strip_prefix("competing in ") {
            ActivityData::competing(name)
        } else {
            error!("bot.activity in config could not be parsed - must start with `playing`, `listening to`, `watching` or `competing in`");
            warn!("disabling bot activity");
            return None;
        };

        debug!(
            "bot.activity parsed as {:?}: {}",
            parsed_activity.kind, parsed_activity.name
        );
        info!("successfully parsed bot activity from config");

        Some(parsed_activity)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
struct AniListConfig {
    token: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct PixivConfig {
    refresh_token: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
struct StoreConfig {
    path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./yukina_store.toml".to_owned(),
        }
    }
}
