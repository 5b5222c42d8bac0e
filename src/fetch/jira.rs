//! Blocking Jira REST client.

use super::IssueSource;
use crate::error::{ExtractError, Result};
use crate::model::RawIssueRecord;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("jx/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(120);

/// A board returned by the agile API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Board {
    #[serde(deserialize_with = "board_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

fn board_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Credentials for HTTP basic auth.
#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// Client for one Jira server.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl JiraClient {
    /// Build a client for `server`. Basic auth is used when a username is
    /// given.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be built.
    pub fn connect(server: &str, username: Option<&str>, password: Option<&str>) -> Result<Self> {
        let base_url = server.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|err| {
            ExtractError::validation("server", format!("'{server}' is not a URL: {err}"))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;

        let credentials = username
            .filter(|name| !name.is_empty())
            .map(|name| Credentials {
                username: name.to_string(),
                password: password.map(str::to_string),
            });

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, creds.password.as_ref()),
            None => request,
        }
    }

    /// GET `path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Api`] for a non-success status, or a transport
    /// or decode error.
    pub fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        debug!(url = %url, ?query, "GET");
        let response = self
            .authorize(self.http.get(&url).query(query))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(ExtractError::Api {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let text = response.text()?;
        serde_json::from_str(&text).map_err(|err| ExtractError::UnexpectedResponse {
            url,
            reason: format!("invalid JSON: {err}"),
        })
    }

    /// All boards, following `startAt` / `isLast`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be retrieved.
    pub fn boards(&self) -> Result<Vec<Board>> {
        let path = "rest/agile/1.0/board";
        let mut boards = Vec::new();
        loop {
            let page = self.get_json(path, &[("startAt", boards.len().to_string())])?;
            let values = array_field(&page, "values", &self.url(path))?;
            let count = values.len();
            for value in values {
                let board: Board = serde_json::from_value(value.clone()).map_err(|err| {
                    ExtractError::UnexpectedResponse {
                        url: self.url(path),
                        reason: format!("invalid board: {err}"),
                    }
                })?;
                boards.push(board);
            }
            let is_last = page.get("isLast").and_then(Value::as_bool).unwrap_or(true);
            if is_last || count == 0 {
                break;
            }
        }
        Ok(boards)
    }

    /// One page of a board's issues as raw `{key, fields}` objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be retrieved.
    pub fn board_issues(
        &self,
        board_id: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<Vec<RawIssueRecord>> {
        let path = format!("rest/agile/1.0/board/{board_id}/issue");
        let page = self.get_json(
            &path,
            &[
                ("startAt", start_at.to_string()),
                ("maxResults", max_results.to_string()),
            ],
        )?;
        decode_issues(&page, &self.url(&path))
    }

    fn search_page(
        &self,
        jql: &str,
        start_at: usize,
        max_results: usize,
    ) -> Result<(Vec<RawIssueRecord>, Option<usize>)> {
        let path = "rest/api/2/search";
        let page = self.get_json(
            path,
            &[
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", max_results.to_string()),
                ("expand", "changelog".to_string()),
            ],
        )?;
        let total = page
            .get("total")
            .and_then(Value::as_u64)
            .and_then(|t| usize::try_from(t).ok());
        Ok((decode_issues(&page, &self.url(path))?, total))
    }
}

impl IssueSource for JiraClient {
    fn projects(&self) -> Result<Vec<String>> {
        let path = "rest/api/2/project";
        let body = self.get_json(path, &[])?;
        let Value::Array(projects) = body else {
            return Err(ExtractError::UnexpectedResponse {
                url: self.url(path),
                reason: "expected a list of projects".to_string(),
            });
        };
        Ok(projects
            .iter()
            .filter_map(|p| p.get("key").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    /// Servers cap `maxResults` (often at 100), so a block is assembled from
    /// as many server pages as needed.
    fn search(&self, jql: &str, start_at: usize, max_results: usize) -> Result<Vec<RawIssueRecord>> {
        let mut block = Vec::new();
        while block.len() < max_results {
            let offset = start_at + block.len();
            let (page, total) = self.search_page(jql, offset, max_results - block.len())?;
            let received = page.len();
            block.extend(page);
            if received == 0 || total.is_some_and(|total| offset + received >= total) {
                break;
            }
        }
        block.truncate(max_results);
        Ok(block)
    }
}

fn array_field<'a>(page: &'a Value, name: &str, url: &str) -> Result<&'a Vec<Value>> {
    page.get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractError::UnexpectedResponse {
            url: url.to_string(),
            reason: format!("missing '{name}' array"),
        })
}

fn decode_issues(page: &Value, url: &str) -> Result<Vec<RawIssueRecord>> {
    array_field(page, "issues", url)?
        .iter()
        .map(|issue| {
            serde_json::from_value(issue.clone()).map_err(|err| ExtractError::UnexpectedResponse {
                url: url.to_string(),
                reason: format!("invalid issue: {err}"),
            })
        })
        .collect()
}
