//! Jenkins REST adapter
//!
//! A thin wrapper over the Jenkins JSON API exposing four tools:
//!
//! | Tool | Jenkins call | Side effects |
//! |---|---|---|
//! | `list_jobs` | `GET {folder}/api/json` | none |
//! | `get_job_status` | `GET job/{job}/api/json` | none |
//! | `get_build_log` | `GET job/{job}/{build}/consoleText` | none |
//! | `trigger_build` | `POST job/{job}/build[WithParameters]` | queues a build |
//!
//! Job names use `/` to address jobs inside folders (`team/app` maps to
//! `job/team/job/app`).

use crate::adapter::{AdapterError, ToolAdapter};
use async_trait::async_trait;
use buildgate_protocol::{Tool, ToolAnnotations};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

const DEFAULT_TAIL_LINES: usize = 200;
const MAX_TAIL_LINES: u64 = 2000;
const ERROR_BODY_LIMIT: usize = 200;
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Connection settings for a Jenkins controller
#[derive(Clone)]
pub struct JenkinsConfig {
    pub base_url: Url,
    pub user: Option<String>,
    pub api_token: Option<String>,
    /// Per-request HTTP timeout; keep it below the bridge's tool timeout
    pub request_timeout: Duration,
}

impl JenkinsConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            user: None,
            api_token: None,
            request_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, api_token: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.api_token = Some(api_token.into());
        self
    }
}

impl std::fmt::Debug for JenkinsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JenkinsConfig")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ListJobsArgs {
    folder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobArgs {
    job: String,
}

#[derive(Debug, Deserialize)]
struct BuildLogArgs {
    job: String,
    build: Option<u64>,
    tail_lines: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TriggerBuildArgs {
    job: String,
    #[serde(default)]
    parameters: Map<String, Value>,
}

/// [`ToolAdapter`] backed by the Jenkins REST API
#[derive(Debug, Clone)]
pub struct JenkinsAdapter {
    client: Client,
    config: JenkinsConfig,
}

impl JenkinsAdapter {
    pub fn new(config: JenkinsConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("buildgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdapterError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// `base_url` + `job/<a>/job/<b>` for `a/b` + `tail`
    fn url(&self, job: Option<&str>, tail: &[&str]) -> Result<Url, AdapterError> {
        let mut url = self.config.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AdapterError::internal("Jenkins base URL cannot carry a path"))?;
            segments.pop_if_empty();

            if let Some(job) = job {
                for part in job.split('/') {
                    if part.is_empty() || part == "." || part == ".." {
                        return Err(AdapterError::invalid_arguments(format!(
                            "Invalid job name: {job}"
                        )));
                    }
                    segments.push("job").push(part);
                }
            }
            segments.extend(tail);
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.user, &self.config.api_token) {
            (Some(user), Some(token)) => request.basic_auth(user, Some(token)),
            _ => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<reqwest::Response, AdapterError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| AdapterError::upstream(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(AdapterError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Status {
                status: status.as_u16(),
                message: truncate(body.trim(), ERROR_BODY_LIMIT),
            });
        }
        Ok(response)
    }

    async fn get_json(&self, mut url: Url, tree: &str, what: &str) -> Result<Value, AdapterError> {
        url.query_pairs_mut().append_pair("tree", tree);
        debug!(path = url.path(), "GET");

        self.send(self.client.get(url), what)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| AdapterError::upstream(format!("Invalid JSON from Jenkins: {e}")))
    }

    #[instrument(skip(self))]
    async fn list_jobs(&self, args: ListJobsArgs) -> Result<Value, AdapterError> {
        let what = args.folder.as_deref().unwrap_or("root folder");
        let url = self.url(args.folder.as_deref(), &["api", "json"])?;
        let body = self.get_json(url, "jobs[name,url,color]", what).await?;

        let jobs: Vec<Value> = body
            .get("jobs")
            .and_then(Value::as_array)
            .map(|jobs| {
                jobs.iter()
                    .map(|job| {
                        let color = job.get("color").and_then(Value::as_str);
                        json!({
                            "name": job.get("name").cloned().unwrap_or(Value::Null),
                            "url": job.get("url").cloned().unwrap_or(Value::Null),
                            "status": color.map(status_from_color),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(json!({ "count": jobs.len(), "jobs": jobs }))
    }

    #[instrument(skip(self))]
    async fn get_job_status(&self, args: JobArgs) -> Result<Value, AdapterError> {
        let url = self.url(Some(&args.job), &["api", "json"])?;
        let body = self
            .get_json(
                url,
                "name,color,buildable,inQueue,lastBuild[number,result,building,timestamp,duration,url]",
                &args.job,
            )
            .await?;

        let color = body.get("color").and_then(Value::as_str);
        Ok(json!({
            "job": args.job,
            "status": color.map(status_from_color),
            "buildable": body.get("buildable").cloned().unwrap_or(Value::Null),
            "in_queue": body.get("inQueue").cloned().unwrap_or(Value::Null),
            "last_build": body.get("lastBuild").cloned().unwrap_or(Value::Null),
        }))
    }

    #[instrument(skip(self))]
    async fn get_build_log(&self, args: BuildLogArgs) -> Result<Value, AdapterError> {
        let build = args
            .build
            .map(|n| n.to_string())
            .unwrap_or_else(|| "lastBuild".to_string());
        let tail_lines = args
            .tail_lines
            .map(|n| n.min(MAX_TAIL_LINES) as usize)
            .unwrap_or(DEFAULT_TAIL_LINES);

        let url = self.url(Some(&args.job), &[build.as_str(), "consoleText"])?;
        let mut response = self
            .send(self.client.get(url), &format!("{} #{build}", args.job))
            .await?;

        let mut tail = LogTail::new(tail_lines);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AdapterError::upstream(e.to_string()))?
        {
            tail.push(&chunk);
        }
        let (log, truncated) = tail.finish();

        Ok(json!({
            "job": args.job,
            "build": build,
            "truncated": truncated,
            "log": log,
        }))
    }

    #[instrument(skip(self, args), fields(job = %args.job))]
    async fn trigger_build(&self, args: TriggerBuildArgs) -> Result<Value, AdapterError> {
        let request = if args.parameters.is_empty() {
            self.client.post(self.url(Some(&args.job), &["build"])?)
        } else {
            let form: Vec<(String, String)> = args
                .parameters
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect();
            self.client
                .post(self.url(Some(&args.job), &["buildWithParameters"])?)
                .form(&form)
        };

        let response = self.send(request, &args.job).await?;
        let queue_url = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!(job = %args.job, "Queued Jenkins build");
        Ok(json!({
            "job": args.job,
            "queued": true,
            "queue_url": queue_url,
        }))
    }
}

#[async_trait]
impl ToolAdapter for JenkinsAdapter {
    fn tools(&self) -> Vec<Tool> {
        jenkins_tools()
    }

    async fn execute(&self, name: &str, arguments: Value) -> Result<Value, AdapterError> {
        match name {
            "list_jobs" => self.list_jobs(parse_args(arguments)?).await,
            "get_job_status" => self.get_job_status(parse_args(arguments)?).await,
            "get_build_log" => self.get_build_log(parse_args(arguments)?).await,
            "trigger_build" => self.trigger_build(parse_args(arguments)?).await,
            other => Err(AdapterError::UnknownTool(other.to_string())),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, AdapterError> {
    serde_json::from_value(arguments).map_err(|e| AdapterError::invalid_arguments(e.to_string()))
}

fn read_only() -> Option<ToolAnnotations> {
    Some(ToolAnnotations {
        read_only_hint: Some(true),
        idempotent_hint: Some(true),
        destructive_hint: Some(false),
    })
}

/// The static catalog served by `tools/list`
pub fn jenkins_tools() -> Vec<Tool> {
    let job = json!({
        "type": "string",
        "minLength": 1,
        "description": "Job name; use '/' to address jobs inside folders"
    });

    vec![
        Tool {
            name: "list_jobs".to_string(),
            description: "List jobs in the root folder or in a given folder".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "folder": {"type": "string", "minLength": 1}
                },
                "additionalProperties": false
            }),
            annotations: read_only(),
        },
        Tool {
            name: "get_job_status".to_string(),
            description: "Current status and last build of a job".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"job": job},
                "required": ["job"],
                "additionalProperties": false
            }),
            annotations: read_only(),
        },
        Tool {
            name: "get_build_log".to_string(),
            description: "Tail of a build's console log (defaults to the last build)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job": job,
                    "build": {"type": "integer", "minimum": 1},
                    "tail_lines": {"type": "integer", "minimum": 1, "maximum": MAX_TAIL_LINES}
                },
                "required": ["job"],
                "additionalProperties": false
            }),
            annotations: read_only(),
        },
        Tool {
            name: "trigger_build".to_string(),
            description: "Queue a new build, optionally with build parameters".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "job": job,
                    "parameters": {
                        "type": "object",
                        "additionalProperties": {"type": ["string", "number", "boolean"]}
                    }
                },
                "required": ["job"],
                "additionalProperties": false
            }),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(false),
                idempotent_hint: Some(false),
                destructive_hint: Some(false),
            }),
        },
    ]
}

/// Jenkins encodes job state in the ball colour
fn status_from_color(color: &str) -> &'static str {
    if color.ends_with("_anime") {
        return "building";
    }
    match color {
        "blue" => "success",
        "red" => "failure",
        "yellow" => "unstable",
        "aborted" => "aborted",
        "notbuilt" => "not_built",
        "disabled" => "disabled",
        _ => "unknown",
    }
}

/// Last `capacity` lines of a console log, fed chunk by chunk.
///
/// Memory stays bounded by `capacity * MAX_LINE_BYTES` however long the log
/// is; longer lines are cut.
struct LogTail {
    capacity: usize,
    lines: VecDeque<String>,
    partial: Vec<u8>,
    dropped: bool,
}

impl LogTail {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
            partial: Vec::new(),
            dropped: false,
        }
    }

    fn push(&mut self, mut chunk: &[u8]) {
        while let Some(pos) = chunk.iter().position(|b| *b == b'\n') {
            self.extend_partial(&chunk[..pos]);
            self.finish_line();
            chunk = &chunk[pos + 1..];
        }
        self.extend_partial(chunk);
    }

    fn extend_partial(&mut self, bytes: &[u8]) {
        let room = MAX_LINE_BYTES.saturating_sub(self.partial.len());
        self.partial
            .extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn finish_line(&mut self) {
        let mut line = String::from_utf8_lossy(&self.partial).into_owned();
        if line.ends_with('\r') {
            line.pop();
        }
        self.partial.clear();

        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped = true;
        }
        self.lines.push_back(line);
    }

    /// The retained lines joined with `\n`, and whether earlier lines were dropped
    fn finish(mut self) -> (String, bool) {
        if !self.partial.is_empty() {
            self.finish_line();
        }
        let lines: Vec<String> = self.lines.into_iter().collect();
        (lines.join("\n"), self.dropped)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
