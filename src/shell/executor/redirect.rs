use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use log::{debug, trace};
use nix::unistd::{close, dup2, pipe};

use crate::shell::error::ShellError;
use crate::shell::parser::{Command, Pipeline, RedirectOp, Redirection};

/// 打开文件类重定向的目标；heredoc 不走这里
pub fn open_target(redirection: &Redirection) -> Result<File, ShellError> {
    let path = redirection.path()?;
    let result = match redirection.operator {
        RedirectOp::Input => File::open(path),
        RedirectOp::Output => OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(path),
        RedirectOp::Append => OpenOptions::new()
            .append(true)
            .create(true)
            .mode(0o644)
            .open(path),
        RedirectOp::Heredoc => {
            return Err(ShellError::Redirection {
                path: path.to_string(),
                reason: "here-document has no target file".to_string(),
            })
        }
    };
    result.map_err(|e| ShellError::redirection(path, &e))
}

fn is_last(last: Option<&Redirection>, redirection: &Redirection) -> bool {
    last.is_some_and(|last| std::ptr::eq(last, redirection))
}

/// 进程内执行内建命令时的重定向：依次打开，返回最后一个输出目标
///
/// 输入重定向只检查能否打开，内建命令不读标准输入。
pub fn prepare_in_process(command: &Command) -> Result<Option<File>, ShellError> {
    let last_output = command.output();
    let mut output = None;
    for redirection in &command.redirections {
        if redirection.operator == RedirectOp::Heredoc {
            continue;
        }
        let file = open_target(redirection)?;
        if is_last(last_output, redirection) {
            output = Some(file);
        }
    }
    Ok(output)
}

struct HeredocPipe {
    read: OwnedFd,
    write: OwnedFd,
    body: String,
}

/// 一条管道用到的全部描述符：阶段之间的管道，加上每个 heredoc 一根管道。
/// 全部在第一次 fork 之前创建。
pub struct Plumbing {
    pipes: Vec<(OwnedFd, OwnedFd)>,
    heredocs: Vec<Vec<HeredocPipe>>,
}

impl Plumbing {
    pub fn new(pipeline: &Pipeline, bodies: Vec<Vec<String>>) -> Result<Self, ShellError> {
        let stages = pipeline.len();
        let mut pipes = Vec::with_capacity(stages.saturating_sub(1));
        for _ in 1..stages {
            pipes.push(pipe().map_err(|e| ShellError::sys("pipe", e))?);
        }

        let mut heredocs = Vec::with_capacity(stages);
        for stage_bodies in bodies {
            let mut stage = Vec::with_capacity(stage_bodies.len());
            for body in stage_bodies {
                let (read, write) = pipe().map_err(|e| ShellError::sys("pipe", e))?;
                stage.push(HeredocPipe { read, write, body });
            }
            heredocs.push(stage);
        }
        trace!("创建了 {} 根管道", pipes.len());

        Ok(Self { pipes, heredocs })
    }

    fn raw_fds(&self) -> Vec<RawFd> {
        let mut fds = Vec::new();
        for (read, write) in &self.pipes {
            fds.push(read.as_raw_fd());
            fds.push(write.as_raw_fd());
        }
        for heredoc in self.heredocs.iter().flatten() {
            fds.push(heredoc.read.as_raw_fd());
            fds.push(heredoc.write.as_raw_fd());
        }
        fds
    }

    /// 子进程内：接管道、按顺序应用重定向，最后关掉所有继承来的管道描述符
    pub fn wire_child(&self, index: usize, command: &Command) -> Result<(), ShellError> {
        if index > 0 {
            let (read, _) = &self.pipes[index - 1];
            redirect_fd(read.as_raw_fd(), libc::STDIN_FILENO)?;
        }
        if index < self.pipes.len() {
            let (_, write) = &self.pipes[index];
            redirect_fd(write.as_raw_fd(), libc::STDOUT_FILENO)?;
        }

        // 文件重定向覆盖管道。每个目标都按顺序打开，只有最后一个生效
        let last_input = command.input();
        let last_output = command.output();
        let mut heredocs = self.heredocs.get(index).into_iter().flatten();
        for redirection in &command.redirections {
            match redirection.operator {
                RedirectOp::Heredoc => {
                    let heredoc = heredocs.next();
                    if let Some(heredoc) = heredoc.filter(|_| is_last(last_input, redirection)) {
                        redirect_fd(heredoc.read.as_raw_fd(), libc::STDIN_FILENO)?;
                    }
                }
                RedirectOp::Input => {
                    let file = open_target(redirection)?;
                    if is_last(last_input, redirection) {
                        redirect_fd(file.as_raw_fd(), libc::STDIN_FILENO)?;
                    }
                }
                RedirectOp::Output | RedirectOp::Append => {
                    let file = open_target(redirection)?;
                    if is_last(last_output, redirection) {
                        redirect_fd(file.as_raw_fd(), libc::STDOUT_FILENO)?;
                    }
                }
            }
        }

        for fd in self.raw_fds() {
            let _ = close(fd);
        }
        Ok(())
    }

    /// 父进程：fork 完所有阶段后关闭管道，再把 heredoc 正文写进去
    pub fn finish(self) {
        drop(self.pipes);
        for heredoc in self.heredocs.into_iter().flatten() {
            drop(heredoc.read);
            let mut writer = File::from(heredoc.write);
            if let Err(e) = writer.write_all(heredoc.body.as_bytes()) {
                // 读端提前退出时是 EPIPE，不算错误
                debug!("写入 heredoc 失败: {}", e);
            }
        }
    }
}

fn redirect_fd(from: RawFd, to: RawFd) -> Result<(), ShellError> {
    if from == to {
        return Ok(());
    }
    dup2(from, to)
        .map(|_| ())
        .map_err(|e| ShellError::sys("dup2", e))
}
