use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn send_event(
        &self,
        session_id: &str,
        data: Value,
        event: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<StatusCode> {
        let url = format!("{}/stream/{}/events", self.base_url, session_id);

        let mut body = json!({ "data": data });
        if let Some(event) = event {
            body["event"] = json!(event);
        }
        if let Some(event_id) = event_id {
            body["event_id"] = json!(event_id);
        }

        let response = self.client.post(&url).json(&body).send().await?;
        Ok(response.status())
    }

    pub async fn send_comment(&self, session_id: &str, text: &str) -> Result<StatusCode> {
        let url = format!("{}/stream/{}/comments", self.base_url, session_id);

        let response = self
            .client
            .post(&url)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        Ok(response.status())
    }

    pub async fn subscribe(&self, session_id: &str, event_type: &str) -> Result<StatusCode> {
        let url = format!(
            "{}/stream/{}/subscriptions/{}",
            self.base_url, session_id, event_type
        );

        let response = self.client.put(&url).send().await?;
        Ok(response.status())
    }

    pub async fn unsubscribe(&self, session_id: &str, event_type: &str) -> Result<StatusCode> {
        let url = format!(
            "{}/stream/{}/subscriptions/{}",
            self.base_url, session_id, event_type
        );

        let response = self.client.delete(&url).send().await?;
        Ok(response.status())
    }

    /// Acknowledge an event id; returns whether the server had an entry.
    pub async fn acknowledge(&self, session_id: &str, event_id: &str) -> Result<bool> {
        let url = format!(
            "{}/stream/{}/acknowledgements/{}",
            self.base_url, session_id, event_id
        );

        let response = self.client.post(&url).send().await?;
        let body: Value = response.json().await?;

        body["data"]["acknowledged"]
            .as_bool()
            .context("No acknowledged flag in response")
    }
}
