//! GitHub contents API implementation of [`RemoteStore`].
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | identity | `GET /user` |
//! | repository check | `GET /repos/{owner}/{repo}` |
//! | listing | `GET /repos/{owner}/{repo}/contents/{path}` |
//! | raw content | `GET {download_url}` |
//! | head commit | `GET /repos/{owner}/{repo}/commits?per_page=1` |
//! | save | `PUT /repos/{owner}/{repo}/contents/{path}` |
//!
//! Every response updates the last seen `X-RateLimit-*` budget.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::{RateLimitInfo, RemoteFileInfo, RemoteStore};
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const AGENT: &str = concat!("portfolio-sync/", env!("CARGO_PKG_VERSION"));

pub struct GitHubRemote {
    client: reqwest::Client,
    api_url: String,
    token: String,
    rate_limit: RwLock<Option<RateLimitInfo>>,
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct Commit {
    sha: String,
}

#[derive(Deserialize)]
struct ExistingFile {
    sha: String,
}

#[derive(Deserialize)]
struct SaveResponse {
    content: SavedContent,
}

#[derive(Deserialize)]
struct SavedContent {
    html_url: Option<String>,
}

impl GitHubRemote {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_api_url(token, DEFAULT_API_URL, timeout)
    }

    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            rate_limit: RwLock::new(None),
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.authorized(self.client.get(url))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, AGENT)
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}", self.api_url)
    }

    /// Send, record the rate-limit headers and map error statuses.
    /// 404 is returned to the caller as `Ok` so each endpoint can decide.
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = req.send().await.map_err(transport)?;
        let rate = parse_rate_limit(resp.headers());
        if let Some(rate) = &rate {
            *self.rate_limit.write() = Some(rate.clone());
        }

        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(resp);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(Error::Authentication(format!("{what}: credential rejected"))),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if rate.as_ref().is_some_and(|r| r.remaining == 0) =>
            {
                Err(Error::RateLimited {
                    reset_at: rate.map_or_else(Utc::now, |r| r.reset_at),
                })
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Remote {
                    status: Some(status.as_u16()),
                    message: format!("{what}: {}", body.trim()),
                })
            }
        }
    }
}

#[async_trait]
impl RemoteStore for GitHubRemote {
    async fn authenticated_username(&self) -> Result<String> {
        let resp = self.send(self.get(&format!("{}/user", self.api_url)), "identity").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::Authentication("identity endpoint unavailable".into()));
        }
        let user: User = resp.json().await.map_err(transport)?;
        Ok(user.login)
    }

    async fn repository_exists(&self, owner: &str, repo: &str) -> Result<bool> {
        let resp = self.send(self.get(&self.repo_url(owner, repo)), "repository").await?;
        Ok(resp.status() != StatusCode::NOT_FOUND)
    }

    async fn list_directory(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RemoteFileInfo>> {
        let url = format!("{}/contents/{path}", self.repo_url(owner, repo));
        let resp = self.send(self.get(&url), "listing").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("directory {path}")));
        }
        resp.json().await.map_err(transport)
    }

    async fn fetch_content(&self, download_url: &str) -> Result<String> {
        let resp = self.send(self.get(download_url), "download").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("url {download_url}")));
        }
        resp.text().await.map_err(transport)
    }

    async fn latest_commit_sha(&self, owner: &str, repo: &str) -> Result<Option<String>> {
        let url = format!("{}/commits?per_page=1", self.repo_url(owner, repo));
        let resp = self.send(self.get(&url), "commits").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let commits: Vec<Commit> = resp.json().await.map_err(transport)?;
        Ok(commits.into_iter().next().map(|c| c.sha))
    }

    async fn save_element(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String> {
        let url = format!("{}/contents/{path}", self.repo_url(owner, repo));

        let existing = self.send(self.get(&url), "lookup").await?;
        let sha = if existing.status() == StatusCode::NOT_FOUND {
            None
        } else {
            existing.json::<ExistingFile>().await.ok().map(|f| f.sha)
        };

        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let resp = self.send(self.authorized(self.client.put(&url)).json(&body), "save").await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(Error::RepositoryNotFound(format!("{owner}/{repo}")));
        }
        let saved: SaveResponse = resp.json().await.map_err(transport)?;
        Ok(saved
            .content
            .html_url
            .unwrap_or_else(|| format!("https://github.com/{owner}/{repo}/blob/main/{path}")))
    }

    fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.rate_limit.read().clone()
    }
}

fn transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::Remote { status: None, message: format!("request timed out: {e}") };
    }
    Error::Remote {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let num = |name: &str| -> Option<i64> { headers.get(name)?.to_str().ok()?.trim().parse().ok() };
    Some(RateLimitInfo {
        limit: u32::try_from(num("x-ratelimit-limit")?).ok()?,
        remaining: u32::try_from(num("x-ratelimit-remaining")?).ok()?,
        reset_at: DateTime::from_timestamp(num("x-ratelimit-reset")?, 0)?,
    })
}
