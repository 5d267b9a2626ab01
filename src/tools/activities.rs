// Activity search against the hosted PostgREST (Supabase) activities view

use super::{ToolError, check_status, endpoint_url, parse_endpoint};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Filter built by the model from the user's request. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivityFilter {
    pub category: Option<String>,
    pub difficulty: Option<i64>,
    pub duration_min: Option<i64>,
    pub length_m: Option<i64>,
    pub ascent_m: Option<i64>,
    pub descent_m: Option<i64>,
    pub min_altitude: Option<i64>,
    pub max_altitude: Option<i64>,
    pub experience: Option<i64>,
    pub region: Option<String>,
    pub primary_region: Option<String>,
    pub limit: Option<u32>,
}

impl ActivityFilter {
    /// PostgREST query pairs: text fields use case-insensitive pattern
    /// matching, numeric fields a range or equality check
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();

        let text_fields = [
            ("category", &self.category),
            ("region", &self.region),
            ("primary_region", &self.primary_region),
        ];
        for (field, value) in text_fields {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((field.to_string(), format!("ilike.*{}*", value)));
            }
        }

        let numeric_fields = [
            ("difficulty", "eq", self.difficulty),
            ("experience", "eq", self.experience),
            ("duration_min", "gte", self.duration_min),
            ("length_m", "gte", self.length_m),
            ("ascent_m", "gte", self.ascent_m),
            ("min_altitude", "gte", self.min_altitude),
            ("max_altitude", "lte", self.max_altitude),
            ("descent_m", "lte", self.descent_m),
        ];
        for (field, op, value) in numeric_fields {
            if let Some(value) = value {
                pairs.push((field.to_string(), format!("{}.{}", op, value)));
            }
        }

        pairs
    }
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Matching activity rows, as returned by the store
    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<serde_json::Value>, ToolError>;
}

pub struct SupabaseStore {
    client: reqwest::Client,
    url: Url,
    api_key: String,
    table: String,
    select: String,
    default_limit: u32,
}

impl SupabaseStore {
    pub fn new(config: &DatabaseConfig) -> Result<Self, ToolError> {
        let url = config
            .url
            .clone()
            .ok_or(ToolError::MissingCredential("SUPABASE_URL"))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or(ToolError::MissingCredential("SUPABASE_API_KEY"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            url: parse_endpoint(&url)?,
            api_key,
            table: config.table.clone(),
            select: config.select.clone(),
            default_limit: config.default_limit,
        })
    }

    fn table_url(&self) -> Result<Url, ToolError> {
        endpoint_url(&self.url, &["rest", "v1", self.table.as_str()])
    }

    fn query_pairs(&self, filter: &ActivityFilter) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.replace(' ', ""))];
        pairs.extend(filter.to_query_pairs());
        let limit = filter.limit.unwrap_or(self.default_limit);
        pairs.push(("limit".to_string(), limit.to_string()));
        pairs
    }
}

#[async_trait]
impl ActivityStore for SupabaseStore {
    async fn query(&self, filter: &ActivityFilter) -> Result<Vec<serde_json::Value>, ToolError> {
        let response = self
            .client
            .get(self.table_url()?)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&self.query_pairs(filter))
            .send()
            .await?;

        let rows: Vec<serde_json::Value> = check_status(response).await?.json().await?;
        tracing::debug!(rows = rows.len(), "activity query returned");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_operators() {
        let filter: ActivityFilter = serde_json::from_value(serde_json::json!({
            "category": "Hiking",
            "difficulty": 1,
            "duration_min": 180,
            "max_altitude": 2500,
            "region": "Garda"
        }))
        .unwrap();

        let pairs = filter.to_query_pairs();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(field, _)| field == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("category"), Some("ilike.*Hiking*"));
        assert_eq!(get("region"), Some("ilike.*Garda*"));
        assert_eq!(get("difficulty"), Some("eq.1"));
        assert_eq!(get("duration_min"), Some("gte.180"));
        assert_eq!(get("max_altitude"), Some("lte.2500"));
        assert_eq!(get("experience"), None);
        assert_eq!(pairs.len(), 5);
    }

    #[test]
    fn test_blank_text_filters_are_skipped() {
        let filter = ActivityFilter {
            category: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(filter.to_query_pairs().is_empty());
    }

    #[test]
    fn test_store_adds_select_and_limit() {
        let config = DatabaseConfig {
            url: Some("https://example.supabase.co/".to_string()),
            api_key: Some("key".to_string()),
            ..DatabaseConfig::default()
        };
        let store = SupabaseStore::new(&config).unwrap();
        assert_eq!(
            store.table_url().unwrap().as_str(),
            "https://example.supabase.co/rest/v1/random_hiking_routes"
        );

        let pairs = store.query_pairs(&ActivityFilter::default());
        assert_eq!(pairs[0], ("select".to_string(), "title,region,length_m,difficulty".to_string()));
        assert_eq!(pairs.last().unwrap(), &("limit".to_string(), "5".to_string()));

        let limited = ActivityFilter {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(store.query_pairs(&limited).last().unwrap().1, "2");
    }

    #[test]
    fn test_missing_credentials() {
        let result = SupabaseStore::new(&DatabaseConfig::default());
        assert!(matches!(result, Err(ToolError::MissingCredential("SUPABASE_URL"))));
    }
}
