use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Report, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::source::{IssueSource, Page, RepoRef};
use super::types::{Commit, IssueData, TimelineEvent};

const API_URL: &str = "https://api.github.com/";

/// GitHub REST API client
#[derive(Clone)]
pub struct GitHubClient {
  http: reqwest::Client,
  base: Url,
}

impl GitHubClient {
  pub fn new(token: &str) -> Result<Self> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|_| eyre!("GitHub token contains characters not allowed in a header"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(
      USER_AGENT,
      HeaderValue::from_static(concat!("ghpulse/", env!("CARGO_PKG_VERSION"))),
    );

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    let base = Url::parse(API_URL).map_err(|e| eyre!("Invalid API url {}: {}", API_URL, e))?;

    Ok(Self { http, base })
  }

  /// GET one page of a JSON array endpoint.
  async fn get_page<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<Page<T>> {
    let mut url = self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid request path {}: {}", path, e))?;
    url.query_pairs_mut().extend_pairs(query);

    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("GET {} failed: {}", url, e))?;

    let status = response.status();
    let next_page = response
      .headers()
      .get(LINK)
      .and_then(|v| v.to_str().ok())
      .map(next_page_from_link)
      .unwrap_or(0);

    let body = response
      .text()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?;

    if !status.is_success() {
      return Err(status_error(&url, status, &body));
    }

    let items: Vec<T> = serde_json::from_str(&body)
      .map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))?;

    Ok(Page { items, next_page })
  }
}

fn status_error(url: &Url, status: StatusCode, body: &str) -> Report {
  eyre!("GET {} returned {}: {}", url, status, body.trim())
}

fn page_query(page: u32, per_page: u32) -> Vec<(&'static str, String)> {
  vec![("page", page.to_string()), ("per_page", per_page.to_string())]
}

/// Every issue and pull request, oldest first, updated at or after `since`.
fn issues_query(
  since: Option<DateTime<Utc>>,
  page: u32,
  per_page: u32,
) -> Vec<(&'static str, String)> {
  let mut query = vec![("state", "all".to_string()), ("direction", "asc".to_string())];
  if let Some(since) = since {
    query.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
  }
  query.extend(page_query(page, per_page));
  query
}

impl IssueSource for GitHubClient {
  async fn list_issues(
    &self,
    repo: RepoRef<'_>,
    since: Option<DateTime<Utc>>,
    page: u32,
    per_page: u32,
  ) -> Result<Page<IssueData>> {
    let path = format!("repos/{}/{}/issues", repo.owner, repo.repo);
    self.get_page(&path, &issues_query(since, page, per_page)).await
  }

  async fn list_timeline(
    &self,
    repo: RepoRef<'_>,
    number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Page<TimelineEvent>> {
    let path = format!("repos/{}/{}/issues/{}/timeline", repo.owner, repo.repo, number);
    self.get_page(&path, &page_query(page, per_page)).await
  }

  async fn list_pr_commits(
    &self,
    repo: RepoRef<'_>,
    number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Page<Commit>> {
    let path = format!("repos/{}/{}/pulls/{}/commits", repo.owner, repo.repo, number);
    self.get_page(&path, &page_query(page, per_page)).await
  }
}

/// Extract the `page` parameter of the `rel="next"` entry of a Link header.
///
/// Returns 0 when there is no next page.
fn next_page_from_link(header: &str) -> u32 {
  for entry in header.split(',') {
    let mut parts = entry.split(';');
    let target = match parts.next() {
      Some(t) => t.trim().trim_start_matches('<').trim_end_matches('>'),
      None => continue,
    };
    if !parts.any(|p| p.trim() == r#"rel="next""#) {
      continue;
    }
    let page = Url::parse(target).ok().and_then(|url| {
      url
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
    });
    return page.unwrap_or(0);
  }
  0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_next_page_from_link() {
    let header = r#"<https://api.github.com/repositories/1/issues?state=all&page=3&per_page=100>; rel="next", <https://api.github.com/repositories/1/issues?state=all&page=9&per_page=100>; rel="last""#;
    assert_eq!(next_page_from_link(header), 3);
  }

  #[test]
  fn test_no_next_on_last_page() {
    let header = r#"<https://api.github.com/repositories/1/issues?page=1>; rel="first", <https://api.github.com/repositories/1/issues?page=8>; rel="prev""#;
    assert_eq!(next_page_from_link(header), 0);
  }

  #[test]
  fn test_garbage_link_header() {
    assert_eq!(next_page_from_link(""), 0);
    assert_eq!(next_page_from_link(r#"<not a url>; rel="next""#), 0);
  }

  fn pairs(query: &[(&str, String)]) -> Vec<(String, String)> {
    query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
  }

  #[test]
  fn test_first_listing_omits_since() {
    let query = issues_query(None, 1, 100);
    assert_eq!(
      pairs(&query),
      vec![
        ("state".to_string(), "all".to_string()),
        ("direction".to_string(), "asc".to_string()),
        ("page".to_string(), "1".to_string()),
        ("per_page".to_string(), "100".to_string()),
      ]
    );
  }

  #[test]
  fn test_incremental_listing_sends_rfc3339_since() {
    let since: DateTime<Utc> = "2018-03-04T05:06:07.891Z".parse().unwrap();
    let query = issues_query(Some(since), 3, 50);

    let mut url = Url::parse("https://api.github.com/repos/o/r/issues").unwrap();
    url.query_pairs_mut().extend_pairs(&query);
    assert_eq!(
      url.query(),
      Some("state=all&direction=asc&since=2018-03-04T05%3A06%3A07Z&page=3&per_page=50")
    );
  }

  #[test]
  fn test_error_status_carries_status_and_body() {
    let url = Url::parse("https://api.github.com/repos/o/r/issues?page=2").unwrap();
    let body = "{\"message\": \"Bad credentials\"}\n";
    let err = status_error(&url, StatusCode::UNAUTHORIZED, body);
    let text = err.to_string();
    assert!(text.contains("401 Unauthorized"), "{}", text);
    assert!(text.contains(r#"{"message": "Bad credentials"}"#), "{}", text);
    assert!(text.contains("page=2"), "{}", text);
  }

  #[test]
  fn test_client_rejects_bad_token() {
    assert!(GitHubClient::new("bad\ntoken").is_err());
  }
}
