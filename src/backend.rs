use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::code_tools::{GeneratedCode, Health, RefactorKind};
use crate::config::AppConfig;
use crate::error::BackendError;
use crate::models::{Model, ModelEntry, Provider, merge_listings};

const LENGTH_RATIO: f64 = 1.2;
const MIN_NEW_WORDS: usize = 5;
const COMBINE_SEPARATOR: &str = "\n\n--- Additional information from the remote server ---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

pub trait ChatBackend: Send + Sync {
    fn send_chat(&self, messages: &[ChatMessage], model: Option<&str>)
    -> Result<String, BackendError>;

    fn list_models(&self) -> Result<Vec<Model>, BackendError>;

    /// Short label for status lines and logs.
    fn describe(&self) -> String;

    fn health(&self) -> Result<Health, BackendError> {
        Err(self.unsupported("health checks"))
    }

    fn generate_code(
        &self,
        _prompt: &str,
        _language: &str,
        _model: Option<&str>,
    ) -> Result<GeneratedCode, BackendError> {
        Err(self.unsupported("code generation"))
    }

    /// Explains a file the backend can read at `path`.
    fn explain_file(&self, _path: &str, _model: Option<&str>) -> Result<String, BackendError> {
        Err(self.unsupported("code explanation"))
    }

    /// Returns the refactored contents of the file at `path`.
    fn refactor_file(
        &self,
        _path: &str,
        _kind: RefactorKind,
        _model: Option<&str>,
    ) -> Result<String, BackendError> {
        Err(self.unsupported("refactoring"))
    }

    fn unsupported(&self, feature: &'static str) -> BackendError {
        BackendError::Unsupported {
            backend: self.describe(),
            feature,
        }
    }
}

/// Picks the backend arrangement the configuration asks for.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn ChatBackend>, BackendError> {
    let remote = RemoteBackend::new(
        &config.backend.url,
        config.backend.api_key.clone(),
        Duration::from_secs(config.backend.timeout_secs),
    )?;
    if !config.local.enabled {
        return Ok(Arc::new(remote));
    }
    let local = OllamaBackend::new(
        &config.local.url,
        Duration::from_secs(config.local.timeout_secs),
    )?;
    if config.local.parallel {
        Ok(Arc::new(ParallelBackend::new(
            Box::new(local),
            Box::new(remote),
        )))
    } else {
        Ok(Arc::new(local))
    }
}

fn build_client(url: &str, timeout: Duration) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| transport(url, err))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

fn transport(url: &str, err: reqwest::Error) -> BackendError {
    BackendError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn decode(url: &str, err: reqwest::Error) -> BackendError {
    BackendError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Turns a non-success response into `BackendError::Status`, surfacing the
/// server's `detail` field when there is one.
fn error_for_status(url: &str, response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.detail)
        .map(|detail| match detail {
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().chars().take(300).collect());
    Err(BackendError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        detail,
    })
}

#[derive(Debug, Serialize)]
struct RemoteChatRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RemoteChatResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    auto_save: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplainResponse {
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefactorRequest<'a> {
    file_path: &'a str,
    refactor_type: RefactorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RefactorResponse {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

/// Client for the remote chat API.
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(base_url, timeout)?,
            base_url: base_url.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn with_key(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self
            .with_key(request)
            .send()
            .map_err(|err| transport(url, err))?;
        error_for_status(url, response)?
            .json()
            .map_err(|err| decode(url, err))
    }

    /// `/api/explain/{path}` with the whole path as one encoded segment.
    fn explain_url(&self, path: &str) -> Result<Url, BackendError> {
        let base = endpoint(&self.base_url, "/api/explain");
        let invalid = |message: String| BackendError::Transport {
            url: base.clone(),
            message,
        };
        let mut url = Url::parse(&base).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("base URL cannot carry a path".to_string()))?
            .push(path);
        Ok(url)
    }
}

impl ChatBackend for RemoteBackend {
    fn send_chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<String, BackendError> {
        let url = endpoint(&self.base_url, "/api/chat");
        debug!(%url, messages = messages.len(), "sending remote chat");
        let body: RemoteChatResponse = self.fetch(
            &url,
            self.client
                .post(&url)
                .json(&RemoteChatRequest { messages, model }),
        )?;
        body.response.ok_or_else(|| BackendError::Decode {
            url,
            message: "reply has no `response` field".to_string(),
        })
    }

    fn list_models(&self) -> Result<Vec<Model>, BackendError> {
        let url = endpoint(&self.base_url, "/api/models");
        let body: RemoteModelsResponse = self.fetch(&url, self.client.get(&url))?;
        Ok(body
            .models
            .into_iter()
            .filter_map(|entry| entry.into_model(Provider::Remote))
            .collect())
    }

    fn describe(&self) -> String {
        format!("remote {}", self.base_url)
    }

    fn health(&self) -> Result<Health, BackendError> {
        let url = endpoint(&self.base_url, "/health");
        self.fetch(&url, self.client.get(&url))
    }

    fn generate_code(
        &self,
        prompt: &str,
        language: &str,
        model: Option<&str>,
    ) -> Result<GeneratedCode, BackendError> {
        let url = endpoint(&self.base_url, "/api/generate");
        let body: GenerateResponse = self.fetch(
            &url,
            self.client.post(&url).json(&GenerateRequest {
                prompt,
                language,
                model,
                auto_save: false,
            }),
        )?;
        match body.code.filter(|code| !code.trim().is_empty()) {
            Some(code) => Ok(GeneratedCode {
                code,
                explanation: body.explanation,
            }),
            None => Err(match body.error {
                Some(message) => BackendError::Rejected { url, message },
                None => BackendError::EmptyReply(url),
            }),
        }
    }

    fn explain_file(&self, path: &str, model: Option<&str>) -> Result<String, BackendError> {
        let url = self.explain_url(path)?;
        let label = url.to_string();
        let mut request = self.client.get(url);
        if let Some(model) = model {
            request = request.query(&[("model", model)]);
        }
        let body: ExplainResponse = self.fetch(&label, request)?;
        body.explanation
            .filter(|text| !text.trim().is_empty())
            .ok_or(BackendError::EmptyReply(label))
    }

    fn refactor_file(
        &self,
        path: &str,
        kind: RefactorKind,
        model: Option<&str>,
    ) -> Result<String, BackendError> {
        let url = endpoint(&self.base_url, "/api/refactor");
        let body: RefactorResponse = self.fetch(
            &url,
            self.client.post(&url).json(&RefactorRequest {
                file_path: path,
                refactor_type: kind,
                model,
            }),
        )?;
        body.code
            .filter(|code| !code.trim().is_empty())
            .ok_or(BackendError::EmptyReply(url))
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_ctx: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaTag {
    name: String,
}

/// Client for a local Ollama server.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(base_url, timeout)?,
            base_url: base_url.to_string(),
        })
    }
}

impl ChatBackend for OllamaBackend {
    fn send_chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<String, BackendError> {
        let model = model
            .filter(|model| !model.trim().is_empty())
            .ok_or(BackendError::ModelRequired)?;
        let url = endpoint(&self.base_url, "/api/chat");
        debug!(%url, model, messages = messages.len(), "sending local chat");
        let response = self
            .client
            .post(&url)
            .json(&OllamaChatRequest {
                model,
                messages,
                stream: false,
                options: OllamaOptions {
                    num_ctx: 4096,
                    temperature: 0.7,
                    top_p: 0.9,
                },
            })
            .send()
            .map_err(|err| transport(&url, err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::ModelNotFound(model.to_string()));
        }
        let body: OllamaChatResponse = error_for_status(&url, response)?
            .json()
            .map_err(|err| decode(&url, err))?;
        Ok(body
            .message
            .map(|message| message.content)
            .filter(|content| !content.is_empty())
            .or(body.response)
            .unwrap_or_default())
    }

    fn list_models(&self) -> Result<Vec<Model>, BackendError> {
        let url = endpoint(&self.base_url, "/api/tags");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| transport(&url, err))?;
        let body: OllamaTagsResponse = error_for_status(&url, response)?
            .json()
            .map_err(|err| decode(&url, err))?;
        Ok(body
            .models
            .into_iter()
            .filter(|tag| !tag.name.trim().is_empty())
            .map(|tag| Model::new(tag.name, Provider::Local))
            .collect())
    }

    fn describe(&self) -> String {
        format!("local {}", self.base_url)
    }
}

/// How a parallel request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinChoice {
    LocalLonger,
    RemoteLonger,
    Combined,
    LocalOnly,
    RemoteOnly,
}

/// Sends every chat to a local and a remote backend at once and settles the
/// two results into one reply.
pub struct ParallelBackend {
    local: Box<dyn ChatBackend>,
    remote: Box<dyn ChatBackend>,
}

impl ParallelBackend {
    pub fn new(local: Box<dyn ChatBackend>, remote: Box<dyn ChatBackend>) -> Self {
        Self { local, remote }
    }
}

impl ChatBackend for ParallelBackend {
    fn send_chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<String, BackendError> {
        let (local, remote) = thread::scope(|scope| {
            let local = scope.spawn(|| self.local.send_chat(messages, model));
            let remote = self.remote.send_chat(messages, model);
            let local = local.join().unwrap_or_else(|_| {
                Err(BackendError::Transport {
                    url: self.local.describe(),
                    message: "request thread panicked".to_string(),
                })
            });
            (local, remote)
        });
        let (reply, choice) = settle(local, remote)?;
        info!(?choice, "parallel request settled");
        Ok(reply)
    }

    fn list_models(&self) -> Result<Vec<Model>, BackendError> {
        let (local, remote) = thread::scope(|scope| {
            let local = scope.spawn(|| self.local.list_models());
            let remote = self.remote.list_models();
            let local = local.join().unwrap_or_else(|_| Ok(Vec::new()));
            (local, remote)
        });
        match (local, remote) {
            (Err(local), Err(remote)) => Err(BackendError::BothFailed {
                local: local.to_string(),
                remote: remote.to_string(),
            }),
            (local, remote) => {
                if let Err(err) = &local {
                    warn!(error = %err, "local model listing failed");
                }
                if let Err(err) = &remote {
                    warn!(error = %err, "remote model listing failed");
                }
                Ok(merge_listings([
                    local.unwrap_or_default(),
                    remote.unwrap_or_default(),
                ]))
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "parallel ({} + {})",
            self.local.describe(),
            self.remote.describe()
        )
    }

    fn health(&self) -> Result<Health, BackendError> {
        self.remote.health()
    }

    fn generate_code(
        &self,
        prompt: &str,
        language: &str,
        model: Option<&str>,
    ) -> Result<GeneratedCode, BackendError> {
        self.remote.generate_code(prompt, language, model)
    }

    fn explain_file(&self, path: &str, model: Option<&str>) -> Result<String, BackendError> {
        self.remote.explain_file(path, model)
    }

    fn refactor_file(
        &self,
        path: &str,
        kind: RefactorKind,
        model: Option<&str>,
    ) -> Result<String, BackendError> {
        self.remote.refactor_file(path, kind, model)
    }
}

/// Resolves the two halves of a parallel request. An empty reply counts as a
/// failure of that side.
pub fn settle(
    local: Result<String, BackendError>,
    remote: Result<String, BackendError>,
) -> Result<(String, JoinChoice), BackendError> {
    let local = local.and_then(|text| non_empty(text, "local backend"));
    let remote = remote.and_then(|text| non_empty(text, "remote backend"));
    match (local, remote) {
        (Ok(local), Ok(remote)) => {
            let local_len = local.chars().count() as f64;
            let remote_len = remote.chars().count() as f64;
            if local_len > remote_len * LENGTH_RATIO {
                Ok((local, JoinChoice::LocalLonger))
            } else if remote_len > local_len * LENGTH_RATIO {
                Ok((remote, JoinChoice::RemoteLonger))
            } else {
                Ok((combine(local, &remote), JoinChoice::Combined))
            }
        }
        (Ok(local), Err(err)) => {
            warn!(error = %err, "remote half of parallel request failed");
            Ok((local, JoinChoice::LocalOnly))
        }
        (Err(err), Ok(remote)) => {
            warn!(error = %err, "local half of parallel request failed");
            Ok((remote, JoinChoice::RemoteOnly))
        }
        (Err(local), Err(remote)) => Err(BackendError::BothFailed {
            local: local.to_string(),
            remote: remote.to_string(),
        }),
    }
}

fn non_empty(text: String, source: &str) -> Result<String, BackendError> {
    if text.trim().is_empty() {
        Err(BackendError::EmptyReply(source.to_string()))
    } else {
        Ok(text)
    }
}

/// Keeps the local reply and appends the remote one only when it brings
/// enough new words.
fn combine(local: String, remote: &str) -> String {
    if local.trim() == remote.trim() {
        return local;
    }
    let local_lower = local.to_lowercase();
    let known: HashSet<&str> = local_lower.split_whitespace().collect();
    let remote_lower = remote.to_lowercase();
    let new_words = remote_lower
        .split_whitespace()
        .filter(|word| word.chars().count() > 3 && !known.contains(word))
        .count();
    if new_words > MIN_NEW_WORDS {
        format!("{local}{COMBINE_SEPARATOR}{remote}")
    } else {
        local
    }
}


#[cfg(test)]
#[path = "../tests/unit/backend_tests.rs"]
mod tests;
