//! Operator-curated list of game date-keys excluded from missing-in-source
//! reporting, per (team, module). Known future tournament placeholders live
//! here.

use crate::error::Result;
use crate::models::rule::ModuleKind;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[async_trait]
pub trait IgnoredGameStore: Send + Sync {
    async fn is_ignored(&self, team_id: &str, module: ModuleKind, date_key: &str) -> Result<bool>;

    async fn add(
        &self,
        team_id: &str,
        module: ModuleKind,
        date_key: &str,
        note: Option<&str>,
    ) -> Result<()>;

    /// Returns true when an entry was actually removed.
    async fn remove(&self, team_id: &str, module: ModuleKind, date_key: &str) -> Result<bool>;

    async fn list(&self, team_id: &str, module: ModuleKind) -> Result<Vec<String>>;
}

type Key = (String, &'static str);

/// Map-backed store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryIgnoredGames {
    entries: RwLock<HashMap<Key, HashMap<String, Option<String>>>>,
}

impl InMemoryIgnoredGames {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(team_id: &str, module: ModuleKind) -> Key {
        (team_id.to_string(), module.as_str())
    }
}

#[async_trait]
impl IgnoredGameStore for InMemoryIgnoredGames {
    async fn is_ignored(&self, team_id: &str, module: ModuleKind, date_key: &str) -> Result<bool> {
        Ok(self
            .entries
            .read()
            .get(&Self::key(team_id, module))
            .map_or(false, |dates| dates.contains_key(date_key)))
    }

    async fn add(
        &self,
        team_id: &str,
        module: ModuleKind,
        date_key: &str,
        note: Option<&str>,
    ) -> Result<()> {
        self.entries
            .write()
            .entry(Self::key(team_id, module))
            .or_default()
            .insert(date_key.to_string(), note.map(str::to_string));
        Ok(())
    }

    async fn remove(&self, team_id: &str, module: ModuleKind, date_key: &str) -> Result<bool> {
        Ok(self
            .entries
            .write()
            .get_mut(&Self::key(team_id, module))
            .map_or(false, |dates| dates.remove(date_key).is_some()))
    }

    async fn list(&self, team_id: &str, module: ModuleKind) -> Result<Vec<String>> {
        let mut dates: Vec<String> = self
            .entries
            .read()
            .get(&Self::key(team_id, module))
            .map(|dates| dates.keys().cloned().collect())
            .unwrap_or_default();
        dates.sort();
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_list_remove() {
        let store = InMemoryIgnoredGames::new();
        store
            .add("t1", ModuleKind::Schedule, "2026-03-15", Some("tournament TBD"))
            .await
            .unwrap();

        assert!(store
            .is_ignored("t1", ModuleKind::Schedule, "2026-03-15")
            .await
            .unwrap());
        assert!(!store
            .is_ignored("t1", ModuleKind::Roster, "2026-03-15")
            .await
            .unwrap());
        assert!(!store
            .is_ignored("t2", ModuleKind::Schedule, "2026-03-15")
            .await
            .unwrap());

        assert_eq!(
            store.list("t1", ModuleKind::Schedule).await.unwrap(),
            vec!["2026-03-15".to_string()]
        );

        assert!(store
            .remove("t1", ModuleKind::Schedule, "2026-03-15")
            .await
            .unwrap());
        assert!(!store
            .remove("t1", ModuleKind::Schedule, "2026-03-15")
            .await
            .unwrap());
    }
}
