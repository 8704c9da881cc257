use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::ports::{Query, Row, Store};
use crate::utils::error::{AppError, Result};

/// Tables of JSON rows kept in process. Same equality semantics as the REST store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<&'static str, Vec<serde_json::Value>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(Vec::len).unwrap_or(0)
    }
}

fn id_of(row: &serde_json::Value) -> Option<&str> {
    row.get("id").and_then(|v| v.as_str())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn select<T: Row>(&self, query: &Query) -> Result<Vec<T>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(T::TABLE) else {
            return Ok(Vec::new());
        };

        rows.iter()
            .filter(|row| query.matches(row))
            .map(|row| serde_json::from_value(row.clone()).map_err(AppError::from))
            .collect()
    }

    async fn insert<T: Row>(&self, row: &T) -> Result<T> {
        let value = serde_json::to_value(row)?;
        let id = row.id().to_string();

        let mut tables = self.tables.write().await;
        let rows = tables.entry(T::TABLE).or_default();
        if rows.iter().any(|r| id_of(r) == Some(id.as_str())) {
            return Err(AppError::Backend {
                status: 409,
                message: format!("duplicate key value violates unique constraint \"{}_pkey\"", T::TABLE),
            });
        }
        rows.push(value);
        Ok(row.clone())
    }

    async fn update<T: Row>(&self, row: &T) -> Result<T> {
        let value = serde_json::to_value(row)?;
        let id = row.id().to_string();

        let mut tables = self.tables.write().await;
        let slot = tables
            .get_mut(T::TABLE)
            .and_then(|rows| rows.iter_mut().find(|r| id_of(r) == Some(id.as_str())))
            .ok_or_else(|| AppError::not_found(T::TABLE, &id))?;
        *slot = value;
        Ok(row.clone())
    }

    async fn delete<T: Row>(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(T::TABLE) {
            rows.retain(|r| id_of(r) != Some(id.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Broker;
    use chrono::Utc;

    fn broker(name: &str, is_active: bool) -> Broker {
        Broker {
            id: Uuid::new_v4(),
            name: name.to_string(),
            referral_link: None,
            is_active,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_select_update_delete() {
        let store = InMemoryStore::new();
        let exness = store.insert(&broker("Exness", true)).await.unwrap();
        store.insert(&broker("XM", false)).await.unwrap();

        let active: Vec<Broker> = store.select(&Query::new().eq("is_active", true)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Exness");

        let mut renamed = exness.clone();
        renamed.name = "Exness Global".to_string();
        store.update(&renamed).await.unwrap();
        let fetched: Option<Broker> = store.fetch(exness.id).await.unwrap();
        assert_eq!(fetched.unwrap().name, "Exness Global");

        store.delete::<Broker>(exness.id).await.unwrap();
        assert_eq!(store.row_count("brokers").await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryStore::new();
        let row = broker("Exness", true);
        store.insert(&row).await.unwrap();
        assert!(matches!(
            store.insert(&row).await,
            Err(AppError::Backend { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.update(&broker("Ghost", true)).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_select_on_empty_table() {
        let store = InMemoryStore::new();
        let rows: Vec<Broker> = store.list().await.unwrap();
        assert!(rows.is_empty());
    }
}
