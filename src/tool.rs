pub mod converter;
pub mod downloader;

pub use converter::Converter;
pub use downloader::Downloader;

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// 外部工具的种类，决定错误归属的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Downloader,
    Converter,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Downloader => f.write_str("downloader"),
            Tool::Converter => f.write_str("converter"),
        }
    }
}

/// 子进程 stdout 的去向；stderr 总是被捕获
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdout {
    Inherit,
    Discard,
}

/// 一次外部命令调用的完整描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, String)>,
    pub stdout: Stdout,
}

impl Invocation {
    pub fn new(tool: Tool, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdout: Stdout::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdout(mut self, stdout: Stdout) -> Self {
        self.stdout = stdout;
        self
    }

    /// 用于日志的命令行
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 子进程结束后的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// 非零退出转换为 `Error::Subprocess`
    pub fn check(self, tool: Tool) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::Subprocess {
                tool,
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// 启动外部进程的接口，便于测试时替换
#[allow(async_fn_in_trait)]
pub trait ToolRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// 用 tokio 子进程执行命令，阻塞等待其退出
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        info!("运行: {}", invocation.command_line());

        let stdout = match invocation.stdout {
            Stdout::Inherit => Stdio::inherit(),
            Stdout::Discard => Stdio::null(),
        };
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::Spawn {
                tool: invocation.tool,
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(code = ?output.status.code(), "{} 已退出", invocation.tool);
        Ok(ToolOutput {
            code: output.status.code(),
            stderr,
        })
    }
}
