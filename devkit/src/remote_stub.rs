/*!
Fake SSH executor and notifier

`FakeRemote` answers probes according to a per-host plan and commands from
a script; anything unscripted behaves like a missing binary (exit 127, no
output). `FakeNotifier` keeps every message it was asked to send.
*/

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use symbion_patch_agent::error::{NotifyError, RemoteError};
use symbion_patch_agent::{CommandOutput, Notifier, RemoteExecutor};

/// How a host answers SSH probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePlan {
    Immediate,
    /// Refuse the first N probes, accept afterwards
    AfterFailures(usize),
    Never,
    /// Accept the connection but never finish the handshake
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Probe(String),
    Run { host: String, command: String },
}

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    ChannelError,
}

#[derive(Default)]
struct State {
    probe_plans: HashMap<String, ProbePlan>,
    probe_attempts: HashMap<String, usize>,
    // host of None applies to every host
    script: HashMap<(Option<String>, String), Scripted>,
    calls: Vec<RemoteCall>,
}

#[derive(Clone, Default)]
pub struct FakeRemote {
    state: Arc<Mutex<State>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe_plan(self, host: &str, plan: ProbePlan) -> Self {
        self.state.lock().unwrap().probe_plans.insert(host.to_string(), plan);
        self
    }

    /// Answer `command` on every host
    pub fn respond(self, command: &str, exit_status: i32, stdout: &str) -> Self {
        self.script(None, command, Scripted::Output(output(exit_status, stdout, "")))
    }

    pub fn respond_on(self, host: &str, command: &str, exit_status: i32, stdout: &str) -> Self {
        self.script(Some(host), command, Scripted::Output(output(exit_status, stdout, "")))
    }

    pub fn respond_full(self, host: &str, command: &str, result: CommandOutput) -> Self {
        self.script(Some(host), command, Scripted::Output(result))
    }

    /// Make `command` fail at the transport level on `host`
    pub fn channel_error(self, host: &str, command: &str) -> Self {
        self.script(Some(host), command, Scripted::ChannelError)
    }

    /// Script a host as Red Hat family with a dnf transcript
    pub fn redhat_host(self, host: &str, transcript: &str) -> Self {
        self.respond_on(host, "which dnf", 0, "/usr/bin/dnf\n")
            .respond_on(host, "sudo /usr/bin/dnf update -y", 0, transcript)
    }

    /// Script a host as Debian family with an apt-get upgrade transcript
    pub fn debian_host(self, host: &str, transcript: &str) -> Self {
        self.respond_on(host, "which dnf", 1, "")
            .respond_on(host, "which apt-get", 0, "/usr/bin/apt-get\n")
            .respond_on(host, "sudo /usr/bin/apt-get update -y", 0, APT_REFRESH_OUTPUT)
            .respond_on(host, "sudo /usr/bin/apt-get upgrade -y", 0, transcript)
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn probe_count(&self, host: &str) -> usize {
        self.state.lock().unwrap().probe_attempts.get(host).copied().unwrap_or(0)
    }

    /// Commands run on `host`, in order
    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Run { host: h, command } if h == host => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn touched(&self, host: &str) -> bool {
        self.state.lock().unwrap().calls.iter().any(|call| match call {
            RemoteCall::Probe(h) => h == host,
            RemoteCall::Run { host: h, .. } => h == host,
        })
    }

    fn script(self, host: Option<&str>, command: &str, answer: Scripted) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .insert((host.map(str::to_string), command.to_string()), answer);
        self
    }
}

const APT_REFRESH_OUTPUT: &str = "Reading package lists... Done\n";

fn output(exit_status: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl RemoteExecutor for FakeRemote {
    async fn probe(&self, host: &str) -> Result<(), RemoteError> {
        let plan = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(RemoteCall::Probe(host.to_string()));
            let attempt = {
                let counter = state.probe_attempts.entry(host.to_string()).or_default();
                *counter += 1;
                *counter
            };
            match state.probe_plans.get(host).copied().unwrap_or(ProbePlan::Immediate) {
                ProbePlan::AfterFailures(n) if attempt > n => ProbePlan::Immediate,
                plan => plan,
            }
        };

        match plan {
            ProbePlan::Immediate => Ok(()),
            ProbePlan::Hang => std::future::pending().await,
            ProbePlan::AfterFailures(_) | ProbePlan::Never => Err(RemoteError::Connect {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }

    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RemoteCall::Run {
            host: host.to_string(),
            command: command.to_string(),
        });
        tracing::debug!("[FAKE] {} $ {}", host, command);

        let answer = state
            .script
            .get(&(Some(host.to_string()), command.to_string()))
            .or_else(|| state.script.get(&(None, command.to_string())))
            .cloned();
        match answer {
            Some(Scripted::Output(out)) => Ok(out),
            Some(Scripted::ChannelError) => Err(RemoteError::Channel {
                host: host.to_string(),
                reason: "channel closed".to_string(),
            }),
            None => Ok(output(127, "", &format!("{}: command not found", command))),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    reject: bool,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with an HTTP rejection
    pub fn rejecting() -> Self {
        Self {
            sent: Arc::default(),
            reject: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.to_string());
        if self.reject {
            return Err(NotifyError::Rejected {
                status: 400,
                body: "Bad Request: chat not found".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connects_after_scripted_failures() {
        let remote = FakeRemote::new().probe_plan("web01", ProbePlan::AfterFailures(2));
        assert!(remote.probe("web01").await.is_err());
        assert!(remote.probe("web01").await.is_err());
        assert!(remote.probe("web01").await.is_ok());
        assert_eq!(remote.probe_count("web01"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_host_never_resolves() {
        let remote = FakeRemote::new().probe_plan("web01", ProbePlan::Hang);
        let deadline = std::time::Duration::from_secs(3600);
        let result = tokio::time::timeout(deadline, remote.probe("web01")).await;
        assert!(result.is_err());
        assert_eq!(remote.probe_count("web01"), 1);
    }

    #[tokio::test]
    async fn test_host_script_overrides_global() {
        let remote = FakeRemote::new()
            .respond("uptime", 0, "global")
            .respond_on("web01", "uptime", 0, "web01");
        assert_eq!(remote.run("web01", "uptime").await.unwrap().stdout, "web01");
        assert_eq!(remote.run("db01", "uptime").await.unwrap().stdout, "global");
        assert_eq!(remote.run("db01", "which dnf").await.unwrap().exit_status, 127);
    }
}
