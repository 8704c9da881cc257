use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A typed row of one table in the hosted database.
pub trait Row: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn id(&self) -> Uuid;
}

/// Equality filters, `column = value`, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    /// 以 JSON 列比對，數字與布林以字串形式比較
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        self.filters.iter().all(|(column, expected)| {
            match row.get(column) {
                Some(serde_json::Value::String(s)) => s == expected,
                Some(serde_json::Value::Null) | None => expected == "null",
                Some(other) => other.to_string() == *expected,
            }
        })
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn select<T: Row>(&self, query: &Query) -> Result<Vec<T>>;

    async fn insert<T: Row>(&self, row: &T) -> Result<T>;

    /// Replaces the row with the same id.
    async fn update<T: Row>(&self, row: &T) -> Result<T>;

    async fn delete<T: Row>(&self, id: Uuid) -> Result<()>;

    async fn fetch<T: Row>(&self, id: Uuid) -> Result<Option<T>> {
        Ok(self.select::<T>(&Query::by_id(id)).await?.into_iter().next())
    }

    async fn list<T: Row>(&self) -> Result<Vec<T>> {
        self.select::<T>(&Query::new()).await
    }
}

pub trait ConfigProvider: Send + Sync {
    /// Key expected in `x-api-key`; `None` leaves the verify endpoint open.
    fn verify_api_key(&self) -> Option<&str>;
    /// Bearer token for the admin API; `None` disables it.
    fn admin_token(&self) -> Option<&str>;
    fn default_commission_rate(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches_strings_numbers_and_nulls() {
        let row = json!({
            "id": "7d1f0f8e-0000-4000-8000-000000000001",
            "account_number": "50123456",
            "duration_months": 3,
            "is_active": true,
            "referred_by": null
        });

        assert!(Query::new().eq("account_number", "50123456").matches(&row));
        assert!(Query::new().eq("duration_months", 3).matches(&row));
        assert!(Query::new().eq("is_active", true).matches(&row));
        assert!(Query::new().eq("referred_by", "null").matches(&row));
        assert!(!Query::new()
            .eq("account_number", "50123456")
            .eq("is_active", false)
            .matches(&row));
        assert!(Query::new().matches(&row));
    }
}
