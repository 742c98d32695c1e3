//! Persistence transport used by the mutation controller.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::api::ApiResponse;
use crate::error::{BoardError, BoardResult};
use crate::model::{BoardSnapshot, NewTask, Task, TaskList, TaskPatch};
use crate::sync::OrderBatch;

/// Remote board operations the controller depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn load_board(&self, board_id: Uuid) -> BoardResult<BoardSnapshot>;

    async fn create_list(&self, board_id: Uuid, title: &str) -> BoardResult<TaskList>;

    async fn rename_list(&self, id: Uuid, title: &str) -> BoardResult<TaskList>;

    async fn delete_list(&self, id: Uuid) -> BoardResult<()>;

    async fn create_task(&self, list_id: Uuid, task: &NewTask) -> BoardResult<Task>;

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> BoardResult<Task>;

    /// Returns every id removed (the task and, with `cascade`, its sub-tree).
    async fn delete_task(&self, id: Uuid, cascade: bool) -> BoardResult<Vec<Uuid>>;

    async fn upsert_order(&self, batch: &OrderBatch) -> BoardResult<()>;
}

#[derive(serde::Deserialize)]
struct Deleted {
    deleted: Vec<Uuid>,
}

/// `Transport` over the JSON HTTP API.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send and unwrap the response envelope. Error bodies carry the server's error kind.
    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> BoardResult<T> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| BoardError::PersistenceFailure(format!("Request failed: {}", e)))?;
        let status = resp.status();
        let body: ApiResponse<T> = resp.json().await.map_err(|e| {
            BoardError::PersistenceFailure(format!(
                "Unreadable response (HTTP {}): {}",
                status, e
            ))
        })?;
        body.into_result()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn load_board(&self, board_id: Uuid) -> BoardResult<BoardSnapshot> {
        self.send(self.client.get(self.url(&format!("/boards/{}", board_id))))
            .await
    }

    async fn create_list(&self, board_id: Uuid, title: &str) -> BoardResult<TaskList> {
        self.send(
            self.client
                .post(self.url(&format!("/boards/{}/lists", board_id)))
                .json(&json!({ "title": title })),
        )
        .await
    }

    async fn rename_list(&self, id: Uuid, title: &str) -> BoardResult<TaskList> {
        self.send(
            self.client
                .patch(self.url(&format!("/lists/{}", id)))
                .json(&json!({ "title": title })),
        )
        .await
    }

    async fn delete_list(&self, id: Uuid) -> BoardResult<()> {
        let _: Deleted = self
            .send(self.client.delete(self.url(&format!("/lists/{}", id))))
            .await?;
        Ok(())
    }

    async fn create_task(&self, list_id: Uuid, task: &NewTask) -> BoardResult<Task> {
        self.send(
            self.client
                .post(self.url(&format!("/lists/{}/tasks", list_id)))
                .json(task),
        )
        .await
    }

    async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> BoardResult<Task> {
        self.send(
            self.client
                .patch(self.url(&format!("/tasks/{}", id)))
                .json(patch),
        )
        .await
    }

    async fn delete_task(&self, id: Uuid, cascade: bool) -> BoardResult<Vec<Uuid>> {
        let deleted: Deleted = self
            .send(
                self.client
                    .delete(self.url(&format!("/tasks/{}", id)))
                    .query(&[("cascade", cascade)]),
            )
            .await?;
        Ok(deleted.deleted)
    }

    async fn upsert_order(&self, batch: &OrderBatch) -> BoardResult<()> {
        let _: usize = self
            .send(self.client.post(self.url("/order")).json(batch))
            .await?;
        Ok(())
    }
}
