//! Supabase REST (PostgREST) backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::RemoteEndpoint;
use crate::error::{Error, Result};
use crate::models::{Collection, OrderBy};
use crate::util::compact_text;

use super::{RemoteChange, RemoteError, RemoteResult, RemoteStore};

const HTTP_TIMEOUT_SECS: u64 = 15;
const CHANNEL_CAPACITY: usize = 64;

/// Remote store talking to `{project}/rest/v1/{table}`.
///
/// There is no realtime socket here; the host forwards change events
/// through [`PostgrestRemote::notify_changed`].
pub struct PostgrestRemote {
    endpoint: RemoteEndpoint,
    client: Client,
    channels: HashMap<Collection, broadcast::Sender<RemoteChange>>,
}

impl PostgrestRemote {
    pub fn new(endpoint: RemoteEndpoint) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Configuration(format!("failed to build HTTP client: {error}")))?;
        let channels = Collection::ALL
            .into_iter()
            .map(|collection| (collection, broadcast::channel(CHANNEL_CAPACITY).0))
            .collect();

        Ok(Self {
            endpoint,
            client,
            channels,
        })
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Publish a change event received out of band
    pub fn notify_changed(&self, collection: Collection) {
        if let Some(channel) = self.channels.get(&collection) {
            let _ = channel.send(RemoteChange { collection });
        }
    }

    fn table_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.endpoint.rest_url, collection.remote_table())
    }

    fn row_url(&self, collection: Collection, id: &str) -> String {
        format!(
            "{}?id=eq.{}",
            self.table_url(collection),
            urlencoding::encode(id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.endpoint.anon_key)
            .bearer_auth(self.endpoint.bearer())
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| RemoteError::Unreachable(error.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            status: Some(status.as_u16()),
            message: parse_api_error(status, &body),
        })
    }
}

fn order_param(order: OrderBy) -> String {
    let direction = if order.ascending { "asc" } else { "desc" };
    format!("{}.{direction}", order.column)
}

#[async_trait]
impl RemoteStore for PostgrestRemote {
    async fn select_all(
        &self,
        collection: Collection,
        order_by: Option<OrderBy>,
    ) -> RemoteResult<Vec<Value>> {
        let mut query = vec![("select", "*".to_string())];
        if let Some(order) = order_by {
            query.push(("order", order_param(order)));
        }
        let request = self
            .client
            .get(self.table_url(collection))
            .header("Accept", "application/json")
            .query(&query);

        let response = self.send(request).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|error| RemoteError::Decode(error.to_string()))
    }

    async fn insert(&self, collection: Collection, payload: Value) -> RemoteResult<Value> {
        let request = self
            .client
            .post(self.table_url(collection))
            .header("Prefer", "return=representation")
            .json(&payload);

        let response = self.send(request).await?;
        let mut rows = response
            .json::<Vec<Value>>()
            .await
            .map_err(|error| RemoteError::Decode(error.to_string()))?;
        if rows.is_empty() {
            return Err(RemoteError::Decode(format!(
                "insert into {} returned no row",
                collection.remote_table()
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> RemoteResult<()> {
        let request = self
            .client
            .patch(self.row_url(collection, id))
            .header("Prefer", "return=minimal")
            .json(&patch);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> RemoteResult<()> {
        let request = self.client.delete(self.row_url(collection, id));
        self.send(request).await?;
        Ok(())
    }

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<RemoteChange> {
        self.channels.get(&collection).map_or_else(
            || broadcast::channel(1).1,
            broadcast::Sender::subscribe,
        )
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.details).or(payload.hint) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{trimmed} ({})", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use pretty_assertions::assert_eq;

    fn remote() -> PostgrestRemote {
        let endpoint = RemoteConfig {
            supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_anon_key: Some("anon".to_string()),
            access_token: None,
        }
        .resolve()
        .unwrap()
        .unwrap();
        PostgrestRemote::new(endpoint).unwrap()
    }

    #[test]
    fn endpoint_keeps_normalized_rest_url() {
        assert_eq!(
            remote().endpoint().rest_url,
            "https://project.supabase.co/rest/v1"
        );
    }

    #[test]
    fn config_collection_uses_remote_table_name() {
        assert_eq!(
            remote().table_url(Collection::Config),
            "https://project.supabase.co/rest/v1/campaign_config"
        );
    }

    #[test]
    fn row_filter_encodes_id() {
        assert_eq!(
            remote().row_url(Collection::Members, "a b&c"),
            "https://project.supabase.co/rest/v1/members?id=eq.a%20b%26c"
        );
    }

    #[test]
    fn order_param_formats_direction() {
        assert_eq!(order_param(OrderBy::descending("date")), "date.desc");
        assert_eq!(order_param(OrderBy::ascending("created_at")), "created_at.asc");
    }

    #[test]
    fn api_errors_prefer_message_field() {
        let message = parse_api_error(
            StatusCode::CONFLICT,
            r#"{"code":"23505","message":"duplicate key value","details":null}"#,
        );
        assert_eq!(message, "duplicate key value (409)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[tokio::test]
    async fn notify_changed_reaches_subscribers() {
        let remote = remote();
        let mut changes = remote.subscribe(Collection::Attendance);
        remote.notify_changed(Collection::Attendance);
        assert_eq!(
            changes.recv().await.unwrap().collection,
            Collection::Attendance
        );
    }
}
