//! Durable key-value storage for state the bot mutates at runtime: callable
//! role sets, call messages, rotated pixiv tokens. Values are TOML, scoped
//! either globally or per guild, and the whole store is one file rewritten
//! on every write. The bot's own config file stays read-only.

use std::{path::PathBuf, sync::Arc};

use poise::serenity_prelude::GuildId;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not access the store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not valid toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("value could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("stored value has the wrong shape: {0}")]
    Deserialize(toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Guild(GuildId),
}

impl Scope {
    fn table_key(&self) -> String {
        match self {
            Self::Global => "global".to_owned(),
            Self::Guild(id) => format!("guild_{id}"),
        }
    }
}

/// The seam commands talk through, so their logic can run against an
/// in-memory store in tests.
pub trait ConfigStore {
    async fn get<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Result<Option<T>, Error>;

    async fn set<T: Serialize + Sync>(
        &self,
        scope: Scope,
        key: &str,
        value: &T,
    ) -> Result<(), Error>;

    async fn remove(&self, scope: Scope, key: &str) -> Result<bool, Error>;
}

/// File-backed store. All clones share one table; writes persist the whole
/// table before returning.
#[derive(Debug, Clone)]
pub struct Store {
    path: Arc<PathBuf>,
    table: Arc<RwLock<toml::Table>>,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();

        let table = match std::fs::read_to_string(&path) {
            Ok(text) => text.parse::<toml::Table>()?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no store file yet, starting empty");
                toml::Table::new()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path: Arc::new(path),
            table: Arc::new(RwLock::new(table)),
        })
    }

    async fn persist(&self, table: &toml::Table) -> Result<(), Error> {
        let text = toml::to_string_pretty(table)?;
        tokio::fs::write(self.path.as_ref(), text).await?;
        Ok(())
    }
}

fn scope_table(table: &mut toml::Table, scope: Scope) -> &mut toml::Table {
    let entry = table
        .entry(scope.table_key())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));

    if !entry.is_table() {
        // a corrupted scope entry gets replaced rather than wedging every
        // write to that scope
        *entry = toml::Value::Table(toml::Table::new());
    }

    entry
        .as_table_mut()
        .expect("entry was just ensured to be a table")
}

impl ConfigStore for Store {
    async fn get<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Result<Option<T>, Error> {
        let table = self.table.read().await;

        let Some(value) = table
            .get(&scope.table_key())
            .and_then(|scope| scope.get(key))
        else {
            return Ok(None);
        };

        value
            .clone()
            .try_into()
            .map(Some)
            .map_err(Error::Deserialize)
    }

    async fn set<T: Serialize + Sync>(
        &self,
        scope: Scope,
        key: &str,
        value: &T,
    ) -> Result<(), Error> {
        let value = toml::Value::try_from(value)?;

        let mut table = self.table.write().await;
        scope_table(&mut table, scope).insert(key.to_owned(), value);

        self.persist(&table).await
    }

    async fn remove(&self, scope: Scope, key: &str) -> Result<bool, Error> {
        let mut table = self.table.write().await;

        let removed = table
            .get_mut(&scope.table_key())
            .and_then(|scope| scope.as_table_mut())
            .and_then(|scope| scope.remove(key))
            .is_some();

        if removed {
            self.persist(&table).await?;
        }

        Ok(removed)
    }
}

/// Store for tests: same semantics, no file.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Arc<RwLock<toml::Table>>,
}

#[cfg(test)]
impl ConfigStore for MemoryStore {
    async fn get<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Result<Option<T>, Error> {
        let table = self.table.read().await;

        let Some(value) = table
            .get(&scope.table_key())
            .and_then(|scope| scope.get(key))
        else {
            return Ok(None);
        };

        value
            .clone()
            .try_into()
            .map(Some)
            .map_err(Error::Deserialize)
    }

    async fn set<T: Serialize + Sync>(
        &self,
        scope: Scope,
        key: &str,
        value: &T,
    ) -> Result<(), Error> {
        let value = toml::Value::try_from(value)?;

        let mut table = self.table.write().await;
        scope_table(&mut table, scope).insert(key.to_owned(), value);

        Ok(())
    }

    async fn remove(&self, scope: Scope, key: &str) -> Result<bool, Error> {
        let mut table = self.table.write().await;

        Ok(table
            .get_mut(&scope.table_key())
            .and_then(|scope| scope.as_table_mut())
            .and_then(|scope| scope.remove(key))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GUILD_A: Scope = Scope::Guild(GuildId::new(100));
    const GUILD_B: Scope = Scope::Guild(GuildId::new(200));

    #[tokio::test]
    async fn scopes_do_not_leak_into_each_other() {
        let store = MemoryStore::default();

        store.set(GUILD_A, "greeting", &"hello").await.unwrap();
        store.set(Scope::Global, "greeting", &"hi all").await.unwrap();

        assert_eq!(
            store.get::<String>(GUILD_A, "greeting").await.unwrap(),
            Some("hello".to_owned())
        );
        assert_eq!(store.get::<String>(GUILD_B, "greeting").await.unwrap(), None);
        assert_eq!(
            store.get::<String>(Scope::Global, "greeting").await.unwrap(),
            Some("hi all".to_owned())
        );
    }

    #[tokio::test]
    async fn structured_values_round_trip() {
        let store = MemoryStore::default();
        let roles: Vec<u64> = vec![1, 2, 3];

        store.set(GUILD_A, "roles", &roles).await.unwrap();

        assert_eq!(
            store.get::<Vec<u64>>(GUILD_A, "roles").await.unwrap(),
            Some(roles)
        );
    }

    #[tokio::test]
    async fn remove_reports_whether_anything_was_there() {
        let store = MemoryStore::default();

        store.set(GUILD_A, "key", &1u64).await.unwrap();

        assert!(store.remove(GUILD_A, "key").await.unwrap());
        assert!(!store.remove(GUILD_A, "key").await.unwrap());
        assert_eq!(store.get::<u64>(GUILD_A, "key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_a_reopen() {
        let dir = std::env::temp_dir().join(format!("yukina-store-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("store.toml");

        {
            let store = Store::open(&path).unwrap();
            store.set(Scope::Global, "token", &"abc").await.unwrap();
        }

        let reopened = Store::open(&path).unwrap();
        assert_eq!(
            reopened.get::<String>(Scope::Global, "token").await.unwrap(),
            Some("abc".to_owned())
        );

        std::fs::remove_dir_all(dir).unwrap();
    }
}
