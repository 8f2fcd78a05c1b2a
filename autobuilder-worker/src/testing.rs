//! Test doubles shared by the worker's unit tests

use anyhow::Result;
use async_trait::async_trait;
use autobuilder_core::domain::job::Job;
use autobuilder_core::domain::payload::Payload;
use autobuilder_core::domain::stage::{StageKind, StageResult};
use autobuilder_core::dto::queue::QueueMessage;
use autobuilder_core::dto::trace::TraceSegment;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::context::JobContext;
use crate::repository::{JobQueue, JobSink, JobStore, TaskProtection};
use crate::stages::Stage;
use crate::trace::TraceForwarder;

/// Command runner that records every call and answers from a table
///
/// Responses are looked up by `"<program> <first arg>"` first, then by
/// `"<program>"`; anything unmatched exits 0 with no output.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    inner: Arc<Mutex<RunnerState>>,
}

#[derive(Default)]
struct RunnerState {
    calls: Vec<CommandSpec>,
    responses: HashMap<String, CommandOutput>,
    unstartable: HashSet<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, key: &str, output: CommandOutput) {
        self.inner
            .lock()
            .unwrap()
            .responses
            .insert(key.to_string(), output);
    }

    pub fn respond_stdout(&self, key: &str, stdout: &str) {
        self.respond(
            key,
            CommandOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
    }

    pub fn exit_with(&self, key: &str, exit_code: i32) {
        self.respond(
            key,
            CommandOutput {
                exit_code,
                stdout: String::new(),
                stderr: format!("{} failed", key),
            },
        );
    }

    /// Makes `program` fail to start at all
    pub fn unstartable(&self, program: &str) {
        self.inner
            .lock()
            .unwrap()
            .unstartable
            .insert(program.to_string());
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(spec.clone());

        if state.unstartable.contains(&spec.program) {
            anyhow::bail!("No such file or directory: {}", spec.program);
        }

        let with_arg = spec
            .args
            .first()
            .map(|arg| format!("{} {}", spec.program, arg));
        let output = with_arg
            .and_then(|key| state.responses.get(&key).cloned())
            .or_else(|| state.responses.get(&spec.program).cloned())
            .unwrap_or_default();
        Ok(output)
    }
}

pub fn sample_payload() -> Payload {
    Payload {
        repo_name: "cloud-docs".to_string(),
        project: "cloud-docs".to_string(),
        directory: None,
        branch_name: "master".to_string(),
        is_fork: false,
        repo_owner: "10gen".to_string(),
        url: "https://github.com/10gen/cloud-docs".to_string(),
        mut_prefix: Some("docs-qa/atlas/build".to_string()),
        patch: None,
        new_head: None,
        job_type: "githubPush".to_string(),
        source: "github".to_string(),
        action: "push".to_string(),
        include_in_global_search: true,
    }
}

pub fn sample_job() -> Job {
    Job::new("job-1", sample_payload())
}

/// Ordered record of calls shared between mocks
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

enum Delivery {
    Message(QueueMessage),
    Error(String),
}

/// Scripted queue; returns nothing once the script runs out
#[derive(Clone)]
pub struct MockQueue {
    events: Events,
    script: Arc<Mutex<VecDeque<Delivery>>>,
    failing_deletes: Arc<Mutex<HashSet<String>>>,
    cancel_when_empty: Option<CancellationToken>,
}

impl MockQueue {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            script: Arc::new(Mutex::new(VecDeque::new())),
            failing_deletes: Arc::new(Mutex::new(HashSet::new())),
            cancel_when_empty: None,
        }
    }

    /// Cancels `token` the first time the script is exhausted
    pub fn cancel_when_empty(mut self, token: CancellationToken) -> Self {
        self.cancel_when_empty = Some(token);
        self
    }

    pub fn push_message(&self, id: &str, body: Option<&str>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Delivery::Message(QueueMessage {
                id: id.to_string(),
                receipt_handle: format!("handle-{}", id),
                body: body.map(str::to_string),
            }));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Delivery::Error(message.to_string()));
    }

    pub fn fail_delete(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl JobQueue for MockQueue {
    async fn receive(&self, _wait: Duration) -> Result<Option<QueueMessage>> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Delivery::Message(message)) => {
                self.events
                    .lock()
                    .unwrap()
                    .push(format!("receive {}", message.id));
                Ok(Some(message))
            }
            Some(Delivery::Error(message)) => anyhow::bail!("{}", message),
            None => {
                if let Some(token) = &self.cancel_when_empty {
                    token.cancel();
                }
                Ok(None)
            }
        }
    }

    async fn delete(&self, message: &QueueMessage) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("delete {}", message.id));
        if self.failing_deletes.lock().unwrap().contains(&message.id) {
            anyhow::bail!("receipt handle {} is invalid", message.receipt_handle);
        }
        Ok(())
    }
}

/// Protection that succeeds a fixed number of times, then fails
#[derive(Clone)]
pub struct MockProtection {
    events: Events,
    remaining: Arc<Mutex<Option<usize>>>,
}

impl MockProtection {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            remaining: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing(events: Events) -> Self {
        Self::failing_after(events, 0)
    }

    pub fn failing_after(events: Events, successes: usize) -> Self {
        Self {
            events,
            remaining: Arc::new(Mutex::new(Some(successes))),
        }
    }
}

#[async_trait]
impl TaskProtection for MockProtection {
    async fn protect(&self) -> Result<()> {
        self.events.lock().unwrap().push("protect".to_string());
        let mut remaining = self.remaining.lock().unwrap();
        match remaining.as_mut() {
            Some(0) => anyhow::bail!("agent unreachable"),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingTracer {
    segments: Arc<Mutex<Vec<TraceSegment>>>,
}

impl RecordingTracer {
    pub fn segments(&self) -> Vec<TraceSegment> {
        self.segments.lock().unwrap().clone()
    }
}

impl TraceForwarder for RecordingTracer {
    fn forward(&self, segment: TraceSegment) {
        self.segments.lock().unwrap().push(segment);
    }
}

/// In-memory job store and sink
#[derive(Clone, Default)]
pub struct MemoryJobs {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    reported: Arc<Mutex<Vec<Job>>>,
}

impl MemoryJobs {
    pub fn insert(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id.clone(), job);
    }

    pub fn reported(&self) -> Vec<Job> {
        self.reported.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobs {
    async fn fetch_job(&self, job_id: &str) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("job {} not found", job_id))
    }
}

#[async_trait]
impl JobSink for MemoryJobs {
    async fn report(&self, job: &Job) -> Result<()> {
        self.reported.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Stage that optionally sleeps, then returns a fixed result
pub struct FixedStage {
    pub kind: StageKind,
    pub result: StageResult,
    pub delay: Duration,
}

impl FixedStage {
    pub fn new(kind: StageKind, result: StageResult) -> Self {
        Self {
            kind,
            result,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Stage for FixedStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    async fn run(&self, _job: &Job, context: &JobContext) -> StageResult {
        context.log_info(format!("running {}", self.kind));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

pub fn queue_body(job_id: &str) -> String {
    format!(r#"{{"jobType": "githubPush", "jobId": "{}"}}"#, job_id)
}

/// Starts a server that accepts connections and never answers
///
/// Returns its base URL.
pub async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}
