//! Client for the hosted database's REST data API (PostgREST dialect).

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::ports::{Query, Row, Store};
use crate::utils::error::{AppError, Result};

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn eq_params(query: &Query) -> Vec<(String, String)> {
        query
            .filters()
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
            .collect()
    }

    async fn rows<T: Row>(response: Response) -> Result<Vec<T>> {
        let response = check_status(response).await?;
        Ok(response.json::<Vec<T>>().await?)
    }
}

/// 非 2xx 回應轉成 Backend 錯誤，盡量取出 API 的 message 欄位
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);

    tracing::warn!("Database API error {}: {}", status.as_u16(), message);
    Err(AppError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Store for RestStore {
    async fn select<T: Row>(&self, query: &Query) -> Result<Vec<T>> {
        tracing::debug!("SELECT {} where {:?}", T::TABLE, query.filters());
        let response = self
            .request(Method::GET, T::TABLE)
            .query(&[("select", "*")])
            .query(&Self::eq_params(query))
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn insert<T: Row>(&self, row: &T) -> Result<T> {
        tracing::debug!("INSERT {} id={}", T::TABLE, row.id());
        let response = self
            .request(Method::POST, T::TABLE)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(row)
            .send()
            .await?;
        Self::rows::<T>(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Backend {
                status: 200,
                message: format!("insert into {} returned no row", T::TABLE),
            })
    }

    async fn update<T: Row>(&self, row: &T) -> Result<T> {
        tracing::debug!("UPDATE {} id={}", T::TABLE, row.id());
        let response = self
            .request(Method::PATCH, T::TABLE)
            .header("Prefer", RETURN_REPRESENTATION)
            .query(&[("id", format!("eq.{}", row.id()))])
            .json(row)
            .send()
            .await?;
        Self::rows::<T>(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found(T::TABLE, row.id()))
    }

    async fn delete<T: Row>(&self, id: Uuid) -> Result<()> {
        tracing::debug!("DELETE {} id={}", T::TABLE, id);
        let response = self
            .request(Method::DELETE, T::TABLE)
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
