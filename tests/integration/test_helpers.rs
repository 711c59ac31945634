//! Shared fakes for scenario tests.
//!
//! [`ScriptedExecutor`] answers single-shot commands from substring rules
//! and records every command it was asked to run; [`ScriptedConsole`]
//! replays console output in response to what is sent to it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use vpar_control::config::GlobalConfig;
use vpar_control::models::request::{FixedIp, ResourceRequest, SpawnRequest};
use vpar_control::remote::{BoxFuture, ConsoleChannel, RemoteCommand, RemoteExecutor};
use vpar_control::{AppError, Result};

/// Configuration with short timeouts and no power-off grace.
pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
db_path = "unused.db"

[remote]
ssh_timeout_seconds = 1
lanboot_timeout_seconds = 2

[npar]
power_off_grace_seconds = 0

[ignite]
address = "ignite"
root_password_hash = "hash"
"#,
    )
    .expect("valid test config")
}

/// How the executor responds to a matching command.
#[derive(Clone)]
pub enum Reply {
    /// Return this output.
    Output(String),
    /// Fail with `AppError::Connectivity`.
    Fail(String),
}

struct Rule {
    target: Option<String>,
    needle: String,
    replies: VecDeque<Reply>,
}

/// Console replies keyed on what was last sent.
pub struct ConsoleScript {
    /// Output emitted right after the channel opens.
    pub greeting: String,
    /// `(sent substring, output)` pairs tried in order.
    pub replies: Vec<(String, String)>,
}

#[derive(Default)]
struct ExecutorState {
    rules: Vec<Rule>,
    log: Vec<RemoteCommand>,
    console: Option<ConsoleScript>,
    console_log: Arc<Mutex<ConsoleLog>>,
}

/// Record of one console session.
#[derive(Debug, Default, Clone)]
pub struct ConsoleLog {
    /// Everything sent, one entry per send.
    pub sent: Vec<String>,
    /// Whether `close` was called.
    pub closed: bool,
    /// Consoles opened.
    pub opened: usize,
}

/// Substring-matched fake of the remote transport.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    state: Arc<Mutex<ExecutorState>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer any command containing `needle` with `output`, forever.
    pub fn on(&self, needle: &str, output: &str) -> &Self {
        self.push_rule(None, needle, vec![Reply::Output(output.to_owned())]);
        self
    }

    /// Answer commands to `target` containing `needle`.
    pub fn on_target(&self, target: &str, needle: &str, output: &str) -> &Self {
        self.push_rule(
            Some(target),
            needle,
            vec![Reply::Output(output.to_owned())],
        );
        self
    }

    /// Answer successive matching commands with `replies`; the last one
    /// repeats.
    pub fn on_sequence(&self, needle: &str, replies: Vec<Reply>) -> &Self {
        self.push_rule(None, needle, replies);
        self
    }

    /// Fail commands containing `needle`.
    pub fn fail_on(&self, needle: &str, message: &str) -> &Self {
        self.push_rule(None, needle, vec![Reply::Fail(message.to_owned())]);
        self
    }

    /// Script the next console session.
    pub fn console(&self, script: ConsoleScript) -> &Self {
        self.state.lock().unwrap().console = Some(script);
        self
    }

    fn push_rule(&self, target: Option<&str>, needle: &str, replies: Vec<Reply>) {
        self.state.lock().unwrap().rules.push(Rule {
            target: target.map(str::to_owned),
            needle: needle.to_owned(),
            replies: replies.into(),
        });
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<RemoteCommand> {
        self.state.lock().unwrap().log.clone()
    }

    /// Command lines run so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.commands().into_iter().map(|c| c.command).collect()
    }

    /// Number of commands containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    /// Console activity so far.
    pub fn console_log(&self) -> ConsoleLog {
        self.state.lock().unwrap().console_log.lock().unwrap().clone()
    }

    fn reply(&self, command: &RemoteCommand) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.log.push(command.clone());
        let rule = state.rules.iter_mut().find(|rule| {
            command.command.contains(&rule.needle)
                && rule.target.as_deref().is_none_or(|t| t == command.target)
        });
        let Some(rule) = rule else {
            return Err(AppError::Connectivity(format!(
                "unscripted command on {}: {}",
                command.target, command.command
            )));
        };
        let reply = if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        };
        match reply {
            Some(Reply::Output(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(AppError::Connectivity(message)),
            None => Ok(String::new()),
        }
    }
}

impl RemoteExecutor for ScriptedExecutor {
    fn exec<'a>(&'a self, command: &'a RemoteCommand) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move { self.reply(command) })
    }

    fn open_console<'a>(
        &'a self,
        _target: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn ConsoleChannel>>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            let script = state
                .console
                .take()
                .ok_or_else(|| AppError::Connectivity("no console scripted".into()))?;
            let log = Arc::clone(&state.console_log);
            log.lock().unwrap().opened += 1;
            Ok(Box::new(ScriptedConsole::new(script, log)) as Box<dyn ConsoleChannel>)
        })
    }
}

/// Console fake: each send queues the first matching reply.
pub struct ScriptedConsole {
    replies: Vec<(String, String)>,
    pending: VecDeque<Vec<u8>>,
    log: Arc<Mutex<ConsoleLog>>,
}

impl ScriptedConsole {
    fn new(script: ConsoleScript, log: Arc<Mutex<ConsoleLog>>) -> Self {
        let mut pending = VecDeque::new();
        if !script.greeting.is_empty() {
            pending.push_back(script.greeting.into_bytes());
        }
        Self {
            replies: script.replies,
            pending,
            log,
        }
    }
}

impl ConsoleChannel for ScriptedConsole {
    fn send<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let text = String::from_utf8_lossy(data).into_owned();
            self.log.lock().unwrap().sent.push(text.clone());
            if let Some((_, output)) = self
                .replies
                .iter()
                .find(|(needle, _)| text.contains(needle.as_str()))
            {
                self.pending.push_back(output.clone().into_bytes());
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            match self.pending.pop_front() {
                Some(chunk) => Ok(Some(chunk)),
                None => std::future::pending().await,
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.log.lock().unwrap().closed = true;
            Ok(())
        })
    }
}

/// Console script for a successful network boot.
pub fn happy_console(read_only: bool) -> ConsoleScript {
    let banner = if read_only {
        "[Read only - use ^Ecf for console write access.]\r\n\r\nShell> "
    } else {
        "\x1b[1mShell> \x1b[0m"
    };
    ConsoleScript {
        greeting: "Last login: today\r\n# ".into(),
        replies: vec![
            ("vparconsole".into(), "vPar console\r\n[vpar1] vMP> ".into()),
            ("CO\r".into(), banner.into()),
            ("\r".into(), "Shell> ".into()),
        ],
    }
}

/// Inventory listing the given nPars as `(name, address, cpus, memory_kb)`.
pub fn inventory_xml(nodes: &[(&str, &str, u32, u64)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<iux:clients>\n");
    for (name, address, cpus, memory_kb) in nodes {
        xml.push_str(&format!(
            "<iux:client name=\"{name}\">\n\
             <iux:attr name=\"model\">ia64 hp Integrity BL890c i4 nPar</iux:attr>\n\
             <iux:attr name=\"ipaddress\">{address}</iux:attr>\n\
             <iux:attr name=\"hostname\">{name}</iux:attr>\n\
             <iux:attr name=\"memory\">{memory_kb}</iux:attr>\n\
             <iux:attr name=\"cpus\">{cpus}</iux:attr>\n\
             </iux:client>\n"
        ));
    }
    xml.push_str(
        "<iux:client name=\"vpar-test\"><iux:attr name=\"model\">Virtual Partition</iux:attr></iux:client>\n",
    );
    xml.push_str("</iux:clients>\n");
    xml
}

/// `vparstatus -A` output.
pub fn available(cpus: u32, memory_mb: u64) -> String {
    format!("[Available CPUs]:  {cpus}\r\n[Available Memory]:  {memory_mb} Mbytes\r\n")
}

/// `vgdisplay` output.
pub fn vgdisplay(pe_size: u64, total_pe: u64, alloc_pe: u64) -> String {
    format!(
        "--- Volume groups ---\r\nVG Name /dev/vg00\r\nPE Size (Mbytes)  {pe_size}\r\n\
         Total PE  {total_pe}\r\nAlloc PE  {alloc_pe}\r\n"
    )
}

/// `lvcreate` output naming the raw device of workload `w1`.
pub const LVCREATE_OK: &str = "Logical volume \"/dev/vg00/lv-w1\" has been successfully created with \
     character device \"/dev/vg00/rlv-w1\".\r\nVolume Group configuration for /dev/vg00 has been saved\r\n";

/// Acknowledged `vparboot`.
pub const VPARBOOT_OK: &str = "vparboot: Successful start initiation of vPar or VM 'vpar1'\r\n";

/// `vparstatus -p vpar1 -v` with the given run state.
pub fn detail(run_state: &str) -> String {
    format!(
        "[Virtual Partition Details]\r\nNumber:       1\r\nName:         vpar1\r\n\
         RunState:     {run_state}\r\nState:        Active\r\n\r\n\
         [CPU Details]\r\nSystem assigned [Count]:  2\r\n\r\n\
         [Memory Details]\r\nTotal Memory(MB):  2048\r\n\r\n\
         [IO Details]\r\n\
         network:avio_lan:0,1,0x7e6b5a43e9e4:vswitch:sitelan:portid:3\r\n\
         network:avio_lan:0,2,0x56a1b2c3d4e5:vswitch:localnet:portid:4\r\n"
    )
}

/// Spawn of `vpar1` for workload `w1` on the `hpux` network.
pub fn spawn_request() -> SpawnRequest {
    SpawnRequest {
        name: "vpar1".into(),
        resources: ResourceRequest {
            workload_id: "w1".into(),
            memory_mb: 2048,
            cpus: 2,
            disk_gb: 20,
        },
        image: "HP-UX B.11.31.1403 Default".into(),
        fixed_ips: vec![FixedIp {
            label: "hpux".into(),
            address: "10.0.0.20".into(),
        }],
        gateway: "10.0.0.1".into(),
        netmask: "255.255.255.0".into(),
    }
}

/// Executor answering every command of a successful spawn.
pub fn spawn_script() -> ScriptedExecutor {
    let executor = ScriptedExecutor::new();
    executor.on("lvcreate", LVCREATE_OK);
    executor.on("vparcreate", "");
    executor.on("vparboot", VPARBOOT_OK);
    executor.on("vparstatus -p vpar1 -v", &detail("UP"));
    executor.on("mkdir", "");
    executor.on("echo", "");
    executor.console(happy_console(false));
    executor
}
