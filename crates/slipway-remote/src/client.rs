//! REST implementation of the core API traits.
//!
//! Paths follow the `_apis/git` / `_apis/wit` layout of the remote service;
//! wire DTOs are private and mapped into `slipway-core` domain types at the
//! boundary. Every call goes through [`with_backoff`].

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use slipway_core::api::{ApiError, ApiResult, SourceControlApi, WorkTrackingApi};
use slipway_core::model::{Commit, GitRef, TagObject, WorkItem, WorkItemId};

use crate::config::RemoteConfig;
use crate::retry::{with_backoff, RetryPolicy};

const API_VERSION: &str = "7.0";
const ZERO_OBJECT_ID: &str = "0000000000000000000000000000000000000000";

/// REST client for the remote source-control/work-tracking service.
pub struct RestClient {
    config: RemoteConfig,
    policy: RetryPolicy,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(config: RemoteConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("slipway/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            config,
            policy: RetryPolicy::default(),
            http,
        }
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Self {
        Self::new(RemoteConfig::from_env())
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn git_url(&self, repo: &str, rest: &str) -> String {
        format!(
            "{}/{}/_apis/git/repositories/{}/{}",
            self.config.base_url, self.config.project, repo, rest
        )
    }

    fn wit_url(&self, rest: &str) -> String {
        format!(
            "{}/{}/_apis/wit/{}",
            self.config.base_url, self.config.project, rest
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .query(&[("api-version", API_VERSION)]);
        if let Some(token) = &self.config.token {
            req = req.basic_auth("", Some(token));
        }
        req
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> ApiResult<T> {
        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Remote(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(
                response.url().path().to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Remote(format!("HTTP {status}: {body}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Remote(format!("malformed response: {e}")))
    }
}

// Wire DTOs.

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default)]
    value: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefDto {
    name: String,
    object_id: String,
}

impl From<RefDto> for GitRef {
    fn from(dto: RefDto) -> Self {
        GitRef {
            name: dto.name,
            object_id: dto.object_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitDto {
    commit_id: String,
    #[serde(default)]
    author: Option<AuthorDto>,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    work_items: Vec<ResourceRefDto>,
}

#[derive(Debug, Deserialize)]
struct AuthorDto {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceRefDto {
    id: serde_json::Value,
}

impl ResourceRefDto {
    /// The service reports linked ids as strings in some endpoints and
    /// numbers in others.
    fn work_item_id(&self) -> Option<WorkItemId> {
        match &self.id {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl From<CommitDto> for Commit {
    fn from(dto: CommitDto) -> Self {
        let linked = dto
            .work_items
            .iter()
            .filter_map(ResourceRefDto::work_item_id)
            .collect();
        Commit {
            id: dto.commit_id,
            author: dto.author.map(|a| a.name).unwrap_or_default(),
            message: dto.comment,
            linked_work_items: linked,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotatedTagDto {
    object_id: String,
    tagged_object: TaggedObjectDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaggedObjectDto {
    object_id: String,
}

impl From<AnnotatedTagDto> for TagObject {
    fn from(dto: AnnotatedTagDto) -> Self {
        TagObject {
            object_id: dto.object_id,
            target_object_id: dto.tagged_object.object_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkItemDto {
    id: WorkItemId,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    url: String,
}

impl From<WorkItemDto> for WorkItem {
    fn from(dto: WorkItemDto) -> Self {
        let text = |key: &str| {
            dto.fields
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        WorkItem {
            id: dto.id,
            kind: text("System.WorkItemType"),
            title: text("System.Title"),
            description: dto
                .fields
                .get("System.Description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            state: text("System.State"),
            url: dto.url,
        }
    }
}

#[async_trait]
impl SourceControlApi for RestClient {
    async fn list_refs(&self, repo: &str, filter: &str) -> ApiResult<Vec<GitRef>> {
        let url = self.git_url(repo, "refs");
        let envelope: ListEnvelope<RefDto> = with_backoff(self.policy, "list_refs", || {
            self.send_json(
                self.request(reqwest::Method::GET, &url)
                    .query(&[("filter", filter)]),
            )
        })
        .await?;
        Ok(envelope.value.into_iter().map(GitRef::from).collect())
    }

    async fn branch_head(&self, repo: &str, branch: &str) -> ApiResult<Option<String>> {
        let filter = format!("heads/{branch}");
        let wanted = format!("refs/heads/{branch}");
        let refs = self.list_refs(repo, &filter).await?;
        Ok(refs.into_iter().find(|r| r.name == wanted).map(|r| r.object_id))
    }

    async fn compare_commits(
        &self,
        repo: &str,
        base: &str,
        target: &str,
    ) -> ApiResult<Vec<Commit>> {
        let url = self.git_url(repo, "commits");
        let envelope: ListEnvelope<CommitDto> =
            with_backoff(self.policy, "compare_commits", || {
                self.send_json(self.request(reqwest::Method::GET, &url).query(&[
                    ("searchCriteria.itemVersion.version", base),
                    ("searchCriteria.itemVersion.versionType", "branch"),
                    ("searchCriteria.compareVersion.version", target),
                    ("searchCriteria.compareVersion.versionType", "branch"),
                ]))
            })
            .await?;
        debug!(repo, base, target, commits = envelope.value.len(), "compared branches");
        Ok(envelope.value.into_iter().map(Commit::from).collect())
    }

    async fn list_commits_from(
        &self,
        repo: &str,
        commit: &str,
        max: usize,
    ) -> ApiResult<Vec<Commit>> {
        let url = self.git_url(repo, "commits");
        let top = max.to_string();
        let envelope: ListEnvelope<CommitDto> =
            with_backoff(self.policy, "list_commits_from", || {
                self.send_json(self.request(reqwest::Method::GET, &url).query(&[
                    ("searchCriteria.itemVersion.version", commit),
                    ("searchCriteria.itemVersion.versionType", "commit"),
                    ("searchCriteria.$top", top.as_str()),
                ]))
            })
            .await?;
        Ok(envelope.value.into_iter().map(Commit::from).collect())
    }

    async fn create_ref(&self, repo: &str, name: &str, object_id: &str) -> ApiResult<GitRef> {
        let url = self.git_url(repo, "refs");
        let body = serde_json::json!([{
            "name": name,
            "oldObjectId": ZERO_OBJECT_ID,
            "newObjectId": object_id,
        }]);
        let envelope: ListEnvelope<RefDto> = with_backoff(self.policy, "create_ref", || {
            self.send_json(self.request(reqwest::Method::POST, &url).json(&body))
        })
        .await?;
        envelope
            .value
            .into_iter()
            .next()
            .map(GitRef::from)
            .ok_or_else(|| ApiError::Remote(format!("ref update rejected: {name}")))
    }

    async fn create_annotated_tag(
        &self,
        repo: &str,
        name: &str,
        target_object_id: &str,
        message: &str,
    ) -> ApiResult<TagObject> {
        let url = self.git_url(repo, "annotatedtags");
        let body = serde_json::json!({
            "name": name,
            "message": message,
            "taggedObject": { "objectId": target_object_id },
        });
        let dto: AnnotatedTagDto = with_backoff(self.policy, "create_annotated_tag", || {
            self.send_json(self.request(reqwest::Method::POST, &url).json(&body))
        })
        .await?;
        Ok(dto.into())
    }

    async fn get_annotated_tag(&self, repo: &str, object_id: &str) -> ApiResult<TagObject> {
        let url = self.git_url(repo, &format!("annotatedtags/{object_id}"));
        let dto: AnnotatedTagDto = with_backoff(self.policy, "get_annotated_tag", || {
            self.send_json(self.request(reqwest::Method::GET, &url))
        })
        .await?;
        Ok(dto.into())
    }

    async fn commit_work_item_links(
        &self,
        repo: &str,
        commit_id: &str,
    ) -> ApiResult<Vec<WorkItemId>> {
        let url = self.git_url(repo, &format!("commits/{commit_id}/workitems"));
        let envelope: ListEnvelope<ResourceRefDto> =
            with_backoff(self.policy, "commit_work_item_links", || {
                self.send_json(self.request(reqwest::Method::GET, &url))
            })
            .await?;
        Ok(envelope
            .value
            .iter()
            .filter_map(ResourceRefDto::work_item_id)
            .collect())
    }

    async fn pull_request_work_item_links(
        &self,
        repo: &str,
        pull_request_id: u64,
    ) -> ApiResult<Vec<WorkItemId>> {
        let url = self.git_url(repo, &format!("pullRequests/{pull_request_id}/workitems"));
        let envelope: ListEnvelope<ResourceRefDto> =
            with_backoff(self.policy, "pull_request_work_item_links", || {
                self.send_json(self.request(reqwest::Method::GET, &url))
            })
            .await?;
        Ok(envelope
            .value
            .iter()
            .filter_map(ResourceRefDto::work_item_id)
            .collect())
    }
}

#[async_trait]
impl WorkTrackingApi for RestClient {
    async fn work_item(&self, id: WorkItemId) -> ApiResult<WorkItem> {
        let url = self.wit_url(&format!("workitems/{id}"));
        let dto: WorkItemDto = with_backoff(self.policy, "work_item", || {
            self.send_json(self.request(reqwest::Method::GET, &url))
        })
        .await?;
        Ok(dto.into())
    }

    async fn update_work_item_field(
        &self,
        id: WorkItemId,
        field: &str,
        value: &str,
    ) -> ApiResult<()> {
        let url = self.wit_url(&format!("workitems/{id}"));
        let patch = serde_json::json!([{
            "op": "add",
            "path": format!("/fields/{field}"),
            "value": value,
        }]);
        let _: WorkItemDto = with_backoff(self.policy, "update_work_item_field", || {
            self.send_json(
                self.request(reqwest::Method::PATCH, &url)
                    .header("Content-Type", "application/json-patch+json")
                    .json(&patch),
            )
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_dto_maps_to_domain() {
        let dto: RefDto = serde_json::from_value(serde_json::json!({
            "name": "refs/heads/release/1.2",
            "objectId": "abc123",
        }))
        .unwrap();
        let r: GitRef = dto.into();
        assert_eq!(r.name, "refs/heads/release/1.2");
        assert_eq!(r.object_id, "abc123");
    }

    #[test]
    fn test_commit_dto_collects_linked_work_items() {
        let dto: CommitDto = serde_json::from_value(serde_json::json!({
            "commitId": "c1",
            "author": { "name": "dev" },
            "comment": "Merged PR 4: fix",
            "workItems": [{ "id": "301" }, { "id": 302 }, { "id": null }],
        }))
        .unwrap();
        let commit: Commit = dto.into();
        assert_eq!(commit.linked_work_items, vec![301, 302]);
        assert_eq!(commit.author, "dev");
    }

    #[test]
    fn test_commit_dto_tolerates_missing_fields() {
        let dto: CommitDto =
            serde_json::from_value(serde_json::json!({ "commitId": "c2" })).unwrap();
        let commit: Commit = dto.into();
        assert_eq!(commit.id, "c2");
        assert!(commit.author.is_empty());
        assert!(commit.linked_work_items.is_empty());
    }

    #[test]
    fn test_work_item_dto_reads_system_fields() {
        let dto: WorkItemDto = serde_json::from_value(serde_json::json!({
            "id": 42,
            "fields": {
                "System.WorkItemType": "Bug",
                "System.Title": "crash on save",
                "System.State": "Resolved",
                "System.Description": "stack trace attached",
            },
            "url": "https://dev.example.com/_apis/wit/workItems/42",
        }))
        .unwrap();
        let item: WorkItem = dto.into();
        assert_eq!(item.id, 42);
        assert_eq!(item.kind, "Bug");
        assert_eq!(item.title, "crash on save");
        assert_eq!(item.description.as_deref(), Some("stack trace attached"));
    }

    #[test]
    fn test_annotated_tag_dto_maps_target() {
        let dto: AnnotatedTagDto = serde_json::from_value(serde_json::json!({
            "objectId": "tag-obj",
            "taggedObject": { "objectId": "commit-7" },
        }))
        .unwrap();
        let tag: TagObject = dto.into();
        assert_eq!(tag.object_id, "tag-obj");
        assert_eq!(tag.target_object_id, "commit-7");
    }

    #[test]
    fn test_urls_are_rooted_at_project() {
        let client = RestClient::new(RemoteConfig::new("https://dev.example.com/acme", "payments"));
        assert_eq!(
            client.git_url("billing", "refs"),
            "https://dev.example.com/acme/payments/_apis/git/repositories/billing/refs"
        );
        assert_eq!(
            client.wit_url("workitems/9"),
            "https://dev.example.com/acme/payments/_apis/wit/workitems/9"
        );
    }
}
