//! Admin/teammate directory pagination.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{info, warn};

use crate::IntercomClient;

fn id_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn collect_page(body: &Value, admins: &mut HashMap<String, String>) {
    let list = body
        .get("admins")
        .or_else(|| body.get("data"))
        .and_then(|v| v.as_array());
    let Some(list) = list else { return };

    for admin in list {
        let id = admin
            .get("id")
            .or_else(|| admin.get("admin_id"))
            .and_then(id_as_string);
        let Some(id) = id else { continue };
        let name = admin
            .get("name")
            .or_else(|| admin.get("email"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        admins.insert(id, name);
    }
}

fn next_page_url(body: &Value) -> Option<String> {
    body.get("pages")
        .and_then(|p| p.get("next"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl IntercomClient {
    /// Build the id → display-name lookup table by walking `/admins` pages.
    ///
    /// A failed page fetch stops pagination and returns whatever was gathered;
    /// downstream normalization degrades to sentinel names instead of failing
    /// the run.
    pub async fn fetch_admins_map(&self) -> HashMap<String, String> {
        let mut admins = HashMap::new();
        let mut url = format!("{}?per_page=50", self.url("/admins"));

        loop {
            let resp = match self
                .http()
                .get(&url)
                .headers(self.auth_headers("application/json"))
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => resp,
                Ok(resp) => {
                    warn!(status = resp.status().as_u16(), "admin page fetch failed; using partial map");
                    break;
                }
                Err(err) => {
                    warn!(%err, "admin page fetch failed; using partial map");
                    break;
                }
            };

            let body: Value = match resp.json().await {
                Ok(body) => body,
                Err(err) => {
                    warn!(%err, "admin page decode failed; using partial map");
                    break;
                }
            };

            collect_page(&body, &mut admins);
            match next_page_url(&body) {
                Some(next) => url = next,
                None => break,
            }
        }

        info!(count = admins.len(), "fetched admin directory");
        admins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntercomConfig;
    use serde_json::json;

    fn client(base_url: &str) -> IntercomClient {
        IntercomClient::new(IntercomConfig::new("t").with_base_url(base_url)).unwrap()
    }

    #[test]
    fn page_entries_fall_back_to_email_then_id() {
        let mut admins = HashMap::new();
        collect_page(
            &json!({"admins": [
                {"id": 1, "name": "Amy"},
                {"id": "2", "email": "bo@example.com"},
                {"admin_id": 3},
                {"name": "no id, skipped"},
            ]}),
            &mut admins,
        );
        assert_eq!(admins["1"], "Amy");
        assert_eq!(admins["2"], "bo@example.com");
        assert_eq!(admins["3"], "3");
        assert_eq!(admins.len(), 3);
    }

    #[tokio::test]
    async fn pagination_follows_next_links() {
        let mut server = mockito::Server::new_async().await;
        let page2_url = format!("{}/admins_page_2", server.url());
        server
            .mock("GET", "/admins")
            .match_query(mockito::Matcher::UrlEncoded("per_page".into(), "50".into()))
            .with_status(200)
            .with_body(
                json!({
                    "admins": [{"id": 1, "name": "Amy"}],
                    "pages": {"next": page2_url}
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/admins_page_2")
            .with_status(200)
            .with_body(json!({"admins": [{"id": 2, "name": "Bo"}]}).to_string())
            .create_async()
            .await;

        let admins = client(&server.url()).fetch_admins_map().await;
        assert_eq!(admins.len(), 2);
        assert_eq!(admins["2"], "Bo");
    }

    #[tokio::test]
    async fn failed_page_returns_partial_map() {
        let mut server = mockito::Server::new_async().await;
        let page2_url = format!("{}/admins_page_2", server.url());
        server
            .mock("GET", "/admins")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "admins": [{"id": 1, "name": "Amy"}],
                    "pages": {"next": page2_url}
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/admins_page_2")
            .with_status(500)
            .create_async()
            .await;

        let admins = client(&server.url()).fetch_admins_map().await;
        assert_eq!(admins.len(), 1);
        assert_eq!(admins["1"], "Amy");
    }
}
