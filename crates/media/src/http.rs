//! Shared outbound HTTP: one client, bounded concurrency, retries.

use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};

use {
    scrapbook_common::Platform,
    scrapbook_config::{HttpConfig, RetryConfig},
    serde::de::DeserializeOwned,
    tokio::{
        sync::{Semaphore, SemaphorePermit},
        time::Instant,
    },
    tracing::{debug, warn},
    url::Url,
};

use crate::error::FetchError;

/// Exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base: Duration::from_millis(config.backoff_base_ms),
            max: Duration::from_millis(config.backoff_max_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// A fetched page.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL after redirects.
    pub url: Url,
    /// Lowercased `Content-Type` without parameters.
    pub content_type: String,
    /// Text body; empty for `image/*` and `video/*` responses, which are
    /// never read.
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn is_media(&self) -> bool {
        self.content_type.starts_with("image/") || self.content_type.starts_with("video/")
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Connection pool shared by every extractor.
///
/// Each call holds a per-platform permit and a global permit for its whole
/// duration, redirects and body included.
pub struct FetchPool {
    client: reqwest::Client,
    global: Semaphore,
    per_platform: HashMap<Platform, Semaphore>,
    max_redirects: u8,
    max_body_bytes: usize,
    block_private_hosts: bool,
    retry: RetryPolicy,
}

impl FetchPool {
    pub fn new(http: &HttpConfig, retry: &RetryConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(Duration::from_secs(http.request_timeout_secs.max(1)))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(FetchError::transport)?;

        let per_platform = Platform::ALL
            .into_iter()
            .map(Platform::family)
            .map(|family| (family, Semaphore::new(http.per_platform_limit.max(1))))
            .collect();

        Ok(Self {
            client,
            global: Semaphore::new(http.max_connections.max(1)),
            per_platform,
            max_redirects: http.max_redirects,
            max_body_bytes: http.max_body_bytes.max(1),
            block_private_hosts: http.block_private_hosts,
            retry: RetryPolicy::from_config(retry),
        })
    }

    pub fn shared(http: &HttpConfig, retry: &RetryConfig) -> Result<Arc<Self>, FetchError> {
        Self::new(http, retry).map(Arc::new)
    }

    /// Free global slots, for diagnostics and tests.
    #[must_use]
    pub fn available_connections(&self) -> usize {
        self.global.available_permits()
    }

    /// GET `url` on behalf of `platform`, retrying transient failures until
    /// `deadline`.
    pub async fn get(
        &self,
        platform: Platform,
        url: &str,
        deadline: Instant,
    ) -> Result<FetchResponse, FetchError> {
        let mut attempt = 0u32;
        loop {
            let result = self.get_once(platform, url, deadline).await;
            let err = match result {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };
            if !err.is_transient() || attempt >= self.retry.max_retries {
                return Err(err);
            }
            let delay = self.retry.delay(attempt);
            if Instant::now() + delay >= deadline {
                debug!(%url, error = %err, "no time left to retry");
                return Err(err);
            }
            attempt += 1;
            warn!(%url, %platform, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying request");
            tokio::time::sleep(delay).await;
        }
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        platform: Platform,
        url: &str,
        deadline: Instant,
    ) -> Result<T, FetchError> {
        self.get(platform, url, deadline).await?.json()
    }

    async fn get_once(
        &self,
        platform: Platform,
        url: &str,
        deadline: Instant,
    ) -> Result<FetchResponse, FetchError> {
        if Instant::now() >= deadline {
            return Err(FetchError::Timeout);
        }
        match tokio::time::timeout_at(deadline, self.fetch_following_redirects(platform, url))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    async fn acquire(
        &self,
        platform: Platform,
    ) -> Result<(SemaphorePermit<'_>, Option<SemaphorePermit<'_>>), FetchError> {
        let platform_permit = match self.per_platform.get(&platform.family()) {
            Some(sem) => Some(sem.acquire().await.map_err(FetchError::transport)?),
            None => None,
        };
        let global = self.global.acquire().await.map_err(FetchError::transport)?;
        Ok((global, platform_permit))
    }

    async fn fetch_following_redirects(
        &self,
        platform: Platform,
        url: &str,
    ) -> Result<FetchResponse, FetchError> {
        let _permits = self.acquire(platform).await?;

        let mut current = Url::parse(url).map_err(|e| FetchError::transport(format!("invalid URL {url}: {e}")))?;
        let mut visited: Vec<String> = Vec::new();
        let mut hops = 0u8;

        loop {
            match current.scheme() {
                "http" | "https" => {},
                s => return Err(FetchError::blocked(format!("unsupported URL scheme: {s}"))),
            }
            if self.block_private_hosts {
                ssrf_check(&current).await?;
            }
            visited.push(current.to_string());

            debug!(url = %current, %platform, hops, "fetching");
            let resp = self.client.get(current.as_str()).send().await?;
            let status = resp.status();

            if status.is_redirection() {
                if hops >= self.max_redirects {
                    return Err(FetchError::transport(format!(
                        "too many redirects ({} hops, max {})",
                        hops + 1,
                        self.max_redirects
                    )));
                }
                let location = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::transport("redirect without Location header"))?;
                let next = current
                    .join(location)
                    .map_err(|e| FetchError::transport(format!("bad redirect target: {e}")))?;
                if visited.contains(&next.to_string()) {
                    return Err(FetchError::transport(format!(
                        "redirect loop detected: {current} -> {next}"
                    )));
                }
                current = next;
                hops += 1;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: current.to_string(),
                });
            }

            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();

            let mut response = FetchResponse {
                url: current,
                content_type,
                body: String::new(),
            };
            if !response.is_media() {
                response.body = self.read_body(resp).await?;
            }
            return Ok(response);
        }
    }

    async fn read_body(&self, mut resp: reqwest::Response) -> Result<String, FetchError> {
        let mut bytes: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp.chunk().await? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > self.max_body_bytes {
                truncated = true;
                break;
            }
        }
        let text = String::from_utf8_lossy(&bytes);
        if truncated {
            debug!(url = %resp.url(), limit = self.max_body_bytes, "response body truncated");
            return Ok(truncate_at_char_boundary(&text, self.max_body_bytes));
        }
        Ok(text.into_owned())
    }
}

/// Resolve the URL host and reject private, loopback and link-local
/// addresses.
async fn ssrf_check(url: &Url) -> Result<(), FetchError> {
    let host = url
        .host_str()
        .ok_or_else(|| FetchError::blocked("URL has no host"))?;
    let bare = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare.parse::<IpAddr>() {
        if is_private_ip(&ip) {
            return Err(FetchError::blocked(format!("{host} is a private address")));
        }
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs: Vec<_> = tokio::net::lookup_host((bare, port))
        .await
        .map_err(|e| FetchError::transport(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(FetchError::transport(format!("DNS resolution failed for {host}")));
    }
    if let Some(addr) = addrs.iter().find(|a| is_private_ip(&a.ip())) {
        return Err(FetchError::blocked(format!(
            "{host} resolves to private address {}",
            addr.ip()
        )));
    }
    Ok(())
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (CGNAT)
                || (o[0] == 100 && (o[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (o[0] == 192 && o[1] == 0 && o[2] == 0)
        },
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                // fe80::/10
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        },
    }
}

/// Truncate a string at a char boundary, not mid-UTF-8.
fn truncate_at_char_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.into();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
