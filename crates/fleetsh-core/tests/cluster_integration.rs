use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fleetsh_core::*;
use fleetsh_exec::ExecError;
use fleetsh_parse::PsOptions;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fleetsh_core=debug")
        .with_test_writer()
        .try_init();
}

// Mock implementations

/// Answers each command from a script, after a fixed delay
struct ScriptedExecutor {
    delay: Duration,
    replies: HashMap<String, (String, i32)>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            replies: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn reply(mut self, raw: &str, output: &str, status: i32) -> Self {
        self.replies
            .insert(raw.to_string(), (output.to_string(), status));
        self
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn execute(&self, command: &mut Command) -> Result<(), ExecError> {
        self.seen.lock().unwrap().push(command.prepared_command());
        tokio::time::sleep(self.delay).await;

        match self.replies.get(command.raw_command()) {
            Some((output, status)) => {
                command.handle_data(output.clone());
                command.handle_status(*status);
            }
            None => {
                command.handle_stderr("command not found");
                command.handle_status(127);
            }
        }
        Ok(())
    }

    async fn execute_with_timeout(
        &self,
        command: &mut Command,
        _timeout: Duration,
    ) -> Result<(), ExecError> {
        self.execute(command).await
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}

struct UnreachableExecutor;

#[async_trait]
impl RemoteExecutor for UnreachableExecutor {
    async fn execute(&self, _command: &mut Command) -> Result<(), ExecError> {
        Err(ExecError::ConnectionFailed("no route to host".to_string()))
    }

    async fn execute_with_timeout(
        &self,
        command: &mut Command,
        _timeout: Duration,
    ) -> Result<(), ExecError> {
        self.execute(command).await
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn executor_type(&self) -> &'static str {
        "unreachable"
    }
}

struct TestFactory;

impl ExecutorFactory for TestFactory {
    fn create_executor(&self, host: &HostConfig) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        if host.addr.starts_with("down") {
            Ok(Arc::new(UnreachableExecutor))
        } else {
            Ok(Arc::new(
                ScriptedExecutor::new(0)
                    .reply("true", "", 0)
                    .reply("hostname", &format!("{}\n", host.name), 0),
            ))
        }
    }
}

#[tokio::test]
async fn test_success_and_failure_keep_host_order() {
    init_tracing();

    let ok = ScriptedExecutor::new(0).reply("echo hi", "hi\n", 0);
    let failing = ScriptedExecutor::new(0).reply("echo hi", "", 3);
    let cluster = Cluster::new(vec![
        Host::new("ok", Arc::new(ok)),
        Host::new("failing", Arc::new(failing)),
        Host::new("down", Arc::new(UnreachableExecutor)),
    ])
    .unwrap();

    let outcome = cluster.execute(&Command::new("echo hi")).await;
    let results: Vec<_> = outcome
        .iter()
        .map(|o| {
            let cmd = o.result.as_ref().unwrap();
            (o.host.as_str(), cmd.exit_status())
        })
        .collect();

    assert_eq!(
        results,
        vec![("ok", Some(0)), ("failing", Some(3)), ("down", None)]
    );
    assert_eq!(outcome.get("ok").unwrap().result.as_ref().unwrap().text(), "hi");
    assert!(!outcome.all_succeeded());
}

#[tokio::test]
async fn test_hostname_order_ignores_completion_order() {
    init_tracing();

    let hosts = (0..4u64)
        .map(|i| {
            let name = format!("node-{i}");
            let executor =
                ScriptedExecutor::new((4 - i) * 30).reply("hostname", &format!("{name}\n"), 0);
            Host::new(name, Arc::new(executor))
        })
        .collect();
    let cluster = Cluster::new(hosts).unwrap();

    let outcome = cluster.hostname().await;
    let names: Vec<String> = outcome
        .into_iter()
        .map(|o| o.result.unwrap().into_data().unwrap())
        .collect();

    assert_eq!(names, vec!["node-0", "node-1", "node-2", "node-3"]);
}

#[tokio::test]
async fn test_deadline_reports_slow_hosts_incomplete() {
    init_tracing();

    let cluster = Cluster::new(vec![
        Host::new("fast", Arc::new(ScriptedExecutor::new(0).reply("true", "", 0))),
        Host::new("slow", Arc::new(ScriptedExecutor::new(5_000).reply("true", "", 0))),
    ])
    .unwrap();

    let outcome = cluster
        .run_with_deadline(Some(Duration::from_millis(100)), |host| async move {
            Ok(host.ping().await)
        })
        .await;

    assert_eq!(outcome.get("fast").unwrap().result, Ok(true));
    assert_eq!(outcome.get("slow").unwrap().result, Err(HostError::Incomplete));
}

#[tokio::test]
async fn test_ps_user_filter_end_to_end() {
    init_tracing();

    let options = PsOptions::new().user("ubuntu");
    let raw = options.command().raw_command().to_string();
    let output = format!(
        "    0 root            0 root            1     0  0.0  0.3 Ss    19     4 TS   00:00:03 /sbin/init
 1000 ubuntu       1000 ubuntu       4242  4200  1.5  0.1 S+    19     0 TS   00:00:00 sleep 100
 1000 ubuntu       1000 ubuntu       4300  4200  0.0  0.0 R+    19     0 TS   00:00:00 {raw}
"
    );
    let executor = ScriptedExecutor::new(0).reply(&raw, &output, 0);
    let cluster = Cluster::new(vec![Host::new("web", Arc::new(executor))]).unwrap();

    let outcome = cluster.ps(&options).await;
    let result = outcome.get("web").unwrap().result.as_ref().unwrap();

    assert_eq!(result.command().raw_command(), raw);
    assert_eq!(result.items().len(), 2);
    assert!(result.iter().all(|p| p.user == "ubuntu"));
    assert_eq!(result.items()[0].pid, 4242);
    assert_eq!(result.items()[0].command, "sleep 100");

    let own = result
        .iter()
        .find(|p| p.command == result.command().raw_command())
        .unwrap();
    assert_eq!(own.pid, 4300);
}

#[tokio::test]
async fn test_elevation_reaches_executor() {
    init_tracing();

    let executor = Arc::new(ScriptedExecutor::new(0).reply("ls", "app\n", 0));
    let host = Host::new("web", Arc::clone(&executor) as Arc<dyn RemoteExecutor>)
        .su("deploy")
        .with_shell("/bin/bash")
        .chdir("/srv/app")
        .with_env("FOO=bar");
    let cluster = Cluster::new(vec![host]).unwrap();

    let outcome = cluster.execute_shell(&Command::new("ls")).await;

    assert!(outcome.all_succeeded());
    assert_eq!(
        *executor.seen.lock().unwrap(),
        vec!["FOO=bar sudo -u deploy /bin/bash -c -l \"cd /srv/app && ls\""]
    );
}

#[tokio::test]
async fn test_cluster_from_config() {
    init_tracing();

    let config = ClusterConfig::from_toml_str(
        r#"
deadline_secs = 5

[[host]]
name = "web-1"
addr = "10.0.0.1"

[[host]]
name = "web-2"
addr = "down.example"
"#,
    )
    .unwrap();

    let cluster = Cluster::from_config(&config, &TestFactory).unwrap();
    assert_eq!(cluster.len(), 2);

    let pings = cluster.ping().await;
    assert_eq!(pings.hosts(), vec!["web-1", "web-2"]);
    assert_eq!(pings.get("web-1").unwrap().result, Ok(true));
    assert_eq!(pings.get("web-2").unwrap().result, Ok(false));
    assert!(!pings.all_reachable());

    let names = cluster.hostname().await;
    let web1 = names.get("web-1").unwrap().result.as_ref().unwrap();
    assert_eq!(web1.data().map(String::as_str), Some("web-1"));
    assert!(names.get("web-2").unwrap().result.as_ref().unwrap().failure());
}

#[tokio::test]
async fn test_unbuildable_host_keeps_the_rest_running() {
    init_tracing();

    let config = ClusterConfig::from_toml_str(
        r#"
[[host]]
name = "local"
addr = "localhost"

[[host]]
name = "keyless"
addr = "10.0.0.2"
keys = ["/nonexistent/fleetsh/id_ed25519"]
"#,
    )
    .unwrap();

    let cluster = Cluster::from_config(&config, &DefaultExecutorFactory).unwrap();
    assert_eq!(cluster.len(), 2);
    assert!(!cluster.host("keyless").unwrap().is_connected());

    let outcome = cluster.execute(&Command::new("echo hi")).await;
    let local = outcome.get("local").unwrap().result.as_ref().unwrap();
    assert!(local.success());
    assert_eq!(local.text(), "hi");

    let keyless = outcome.get("keyless").unwrap().result.as_ref().unwrap();
    assert!(keyless.failure());
    assert_eq!(keyless.exit_status(), None);
    assert_eq!(outcome.unsuccessful_hosts(), vec!["keyless"]);

    let strict = cluster
        .run(|host| async move { host.try_execute(Command::new("true")).await })
        .await;
    assert!(strict.get("local").unwrap().is_ok());
    assert!(matches!(
        strict.get("keyless").unwrap().result,
        Err(HostError::Exec(ExecError::SshKeyError(_)))
    ));
    assert_eq!(strict.errored_hosts(), vec!["keyless"]);
}

#[tokio::test]
async fn test_local_ps_lists_own_process() {
    init_tracing();

    let config = ClusterConfig::from_toml_str("[[host]]\nname = \"local\"\naddr = \"localhost\"\n")
        .unwrap();
    let cluster = Cluster::from_config(&config, &DefaultExecutorFactory).unwrap();
    let host = cluster.host("local").unwrap();

    let whoami = host.execute(Command::new("id -un")).await;
    assert!(whoami.success());
    let user = whoami.text();

    let result = host.ps(&PsOptions::new().user(user.clone())).await;

    assert!(result.success());
    assert!(!result.items().is_empty());
    assert!(result.iter().all(|p| p.user == user));
    assert!(
        result
            .iter()
            .any(|p| p.command == result.command().raw_command())
    );
}
