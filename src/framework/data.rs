use tracing::{info, warn};

use crate::{
    api::{anilist::AniList, mal::Mal, pixiv::Pixiv},
    store::{ConfigStore, Scope, Store},
    tasks::Tasks,
};

use super::Config;

pub type Result<T, E = DataError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("config file could not be loaded: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("config store could not be opened: {0}")]
    Store(#[from] crate::store::Error),
}

#[derive(Debug, Clone)]
pub struct Data {
    config: Config,
    store: Store,

    anilist: AniList,
    mal: Mal,
    pixiv: Pixiv,

    tasks: Tasks,
}

impl Data {
    pub async fn new() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_file = if let Ok(path) = std::env::var("YUKINA_TOML") {
            info!(path, "looking for config file with YUKINA_TOML...");
            path
        } else {
            let path = "./yukina.toml".to_owned();
            warn!(path, "YUKINA_TOML env unset, using default path");
            path
        };

        let config: Config = ::config::Config::builder()
            .add_source(::config::File::new(&config_file, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        info!("config loaded");

        let store = Store::open(config.store_path())?;

        let anilist = AniList::new(config.anilist_token().map(ToOwned::to_owned));
        let mal = Mal::new();

        // a token refreshed on a previous run takes precedence over the one
        // in the config file
        let refresh_token = match store.get::<String>(Scope::Global, Pixiv::TOKEN_KEY).await? {
            Some(stored) => Some(stored),
            None => config.pixiv_refresh_token().map(ToOwned::to_owned),
        };

        let pixiv = Pixiv::new(refresh_token, store.clone());

        Ok(Self {
            config,
            store,

            anilist,
            mal,
            pixiv,

            tasks: Tasks::new(),
        })
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub const fn anilist(&self) -> &AniList {
        &self.anilist
    }

    pub const fn mal(&self) -> &Mal {
        &self.mal
    }

    pub const fn pixiv(&self) -> &Pixiv {
        &self.pixiv
    }

    pub const fn tasks(&self) -> &Tasks {
        &self.tasks
    }
}
