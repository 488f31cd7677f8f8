//! Scriptable in-memory runtime client for tests

use super::{
    ClientError, ContainerInspection, ExitStatus, HostFilesystem, HostInfo, LogChunk, LogStream,
    PullProgress, RuntimeClient,
};
use crate::sandbox::spec::ContainerSpec;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const CONTAINER_ID: &str = "c0ffee";

/// A call the fake received
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Info,
    Pull(String),
    Create(ContainerSpec),
    Inspect(String),
    Start(String),
    Wait(String),
    Logs(String),
    Remove(String),
}

/// How `wait_container` resolves
#[derive(Debug, Clone)]
pub(crate) enum WaitBehavior {
    ExitAfter(Duration, i64),
    FailAfter(Duration, ClientError),
    Never,
}

#[derive(Debug)]
struct State {
    runtimes: Result<HashMap<String, String>, ClientError>,
    pull: Result<Vec<PullProgress>, ClientError>,
    create: Result<String, ClientError>,
    runtime: Option<String>,
    inspect_error: Option<ClientError>,
    start: Result<(), ClientError>,
    wait: WaitBehavior,
    logs: Vec<LogChunk>,
    log_delay: Option<Duration>,
    removed: HashSet<String>,
    calls: Vec<Call>,
}

/// Runtime client whose answers are set up by the test
#[derive(Debug)]
pub(crate) struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    /// A healthy engine with `runtime` registered at `path`
    pub(crate) fn new(runtime: &str, path: &str) -> Self {
        let mut runtimes = HashMap::new();
        runtimes.insert("runc".to_string(), "runc".to_string());
        runtimes.insert(runtime.to_string(), path.to_string());

        Self {
            state: Mutex::new(State {
                runtimes: Ok(runtimes),
                pull: Ok(vec![
                    PullProgress {
                        id: Some("latest".to_string()),
                        status: Some("Pulling from library/alpine".to_string()),
                        progress: None,
                    },
                    PullProgress {
                        id: None,
                        status: Some("Status: Image is up to date".to_string()),
                        progress: None,
                    },
                ]),
                create: Ok(CONTAINER_ID.to_string()),
                runtime: None,
                inspect_error: None,
                start: Ok(()),
                wait: WaitBehavior::ExitAfter(Duration::from_millis(500), 0),
                logs: Vec::new(),
                log_delay: None,
                removed: HashSet::new(),
                calls: Vec::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_runtimes(&self, runtimes: Result<HashMap<String, String>, ClientError>) {
        self.state().runtimes = runtimes;
    }

    pub(crate) fn set_pull(&self, pull: Result<Vec<PullProgress>, ClientError>) {
        self.state().pull = pull;
    }

    pub(crate) fn set_create(&self, create: Result<String, ClientError>) {
        self.state().create = create;
    }

    /// Runtime reported by inspection; `None` reports whatever the spec declared
    pub(crate) fn set_runtime(&self, runtime: Option<&str>) {
        self.state().runtime = runtime.map(str::to_string);
    }

    pub(crate) fn set_inspect_error(&self, error: Option<ClientError>) {
        self.state().inspect_error = error;
    }

    pub(crate) fn set_start(&self, start: Result<(), ClientError>) {
        self.state().start = start;
    }

    pub(crate) fn set_wait(&self, wait: WaitBehavior) {
        self.state().wait = wait;
    }

    pub(crate) fn set_logs(&self, stdout: &str, stderr: &str) {
        let mut logs = Vec::new();
        if !stdout.is_empty() {
            logs.push(LogChunk {
                stream: LogStream::Stdout,
                bytes: stdout.as_bytes().to_vec(),
            });
        }
        if !stderr.is_empty() {
            logs.push(LogChunk {
                stream: LogStream::Stderr,
                bytes: stderr.as_bytes().to_vec(),
            });
        }
        self.state().logs = logs;
    }

    pub(crate) fn set_log_chunks(&self, chunks: Vec<LogChunk>, delay: Option<Duration>) {
        let mut state = self.state();
        state.logs = chunks;
        state.log_delay = delay;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|call| matches(call)).count()
    }

    pub(crate) fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Create(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn is_removed(&self, id: &str) -> bool {
        self.state().removed.contains(id)
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }
}

#[async_trait]
impl RuntimeClient for FakeClient {
    async fn info(&self) -> Result<HostInfo, ClientError> {
        self.record(Call::Info);
        let runtimes = self.state().runtimes.clone()?;
        Ok(HostInfo { runtimes })
    }

    fn pull_image<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxStream<'a, Result<PullProgress, ClientError>> {
        self.record(Call::Pull(reference.to_string()));
        match self.state().pull.clone() {
            Ok(events) => stream::iter(events.into_iter().map(Ok)).boxed(),
            Err(e) => stream::iter(vec![Err(e)]).boxed(),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, ClientError> {
        self.record(Call::Create(spec.clone()));
        let mut state = self.state();
        if state.runtime.is_none() {
            state.runtime = spec.runtime().map(str::to_string);
        }
        state.create.clone()
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspection, ClientError> {
        self.record(Call::Inspect(id.to_string()));
        let state = self.state();
        if let Some(error) = state.inspect_error.clone() {
            return Err(error);
        }
        if state.removed.contains(id) {
            return Err(ClientError::NotFound(format!("No such container: {}", id)));
        }
        Ok(ContainerInspection {
            runtime: state.runtime.clone(),
            running: true,
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), ClientError> {
        self.record(Call::Start(id.to_string()));
        self.state().start.clone()
    }

    async fn wait_container(&self, id: &str) -> Result<ExitStatus, ClientError> {
        self.record(Call::Wait(id.to_string()));
        let behavior = self.state().wait.clone();
        match behavior {
            WaitBehavior::ExitAfter(delay, code) => {
                tokio::time::sleep(delay).await;
                Ok(ExitStatus {
                    code,
                    message: None,
                })
            }
            WaitBehavior::FailAfter(delay, error) => {
                tokio::time::sleep(delay).await;
                Err(error)
            }
            WaitBehavior::Never => futures::future::pending().await,
        }
    }

    fn container_logs<'a>(&'a self, id: &'a str) -> BoxStream<'a, Result<LogChunk, ClientError>> {
        self.record(Call::Logs(id.to_string()));
        let (chunks, delay) = {
            let state = self.state();
            (state.logs.clone(), state.log_delay)
        };

        stream::iter(chunks)
            .then(move |chunk| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, ClientError>(chunk)
            })
            .boxed()
    }

    async fn remove_container(&self, id: &str, _force: bool) -> Result<(), ClientError> {
        self.record(Call::Remove(id.to_string()));
        if self.state().removed.insert(id.to_string()) {
            Ok(())
        } else {
            Err(ClientError::NotFound(format!("No such container: {}", id)))
        }
    }
}

/// Filesystem holding a fixed set of paths
#[derive(Debug, Default)]
pub(crate) struct FakeFilesystem {
    paths: HashSet<PathBuf>,
}

impl FakeFilesystem {
    pub(crate) fn with(paths: &[&str]) -> Self {
        Self {
            paths: paths.iter().map(PathBuf::from).collect(),
        }
    }
}

#[async_trait]
impl HostFilesystem for FakeFilesystem {
    async fn exists(&self, path: &Path) -> std::io::Result<bool> {
        Ok(self.paths.contains(path))
    }
}
