use std::convert::Infallible;
use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::process;

use log::{debug, error, warn};
use nix::errno::Errno;
use nix::unistd::{execve, fork, ForkResult, Pid};

use super::builtins::{is_builtin, run_builtin};
use super::redirect::{prepare_in_process, Plumbing};
use super::wait::wait_pipeline;
use crate::shell::error::{ShellError, EXIT_FAILURE, EXIT_INTERRUPTED};
use crate::shell::parser::expand::expand_text;
use crate::shell::parser::{Command, Pipeline};
use crate::shell::readline::{LineSource, ReadOutcome};
use crate::shell::session::Session;
use crate::shell::signals;
use crate::utils::path;

const HEREDOC_PROMPT: &str = "> ";

pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// 执行一条管道，返回最后一个阶段的退出码并写回会话
    pub fn execute(
        &mut self,
        pipeline: Pipeline,
        session: &mut Session,
        input: &mut dyn LineSource,
    ) -> i32 {
        if pipeline.is_empty() {
            return session.exit_status;
        }

        let bodies = match self.collect_heredocs(&pipeline, session, input) {
            Ok(Some(bodies)) => bodies,
            Ok(None) => {
                session.set_status(EXIT_INTERRUPTED);
                return session.exit_status;
            }
            Err(e) => {
                eprintln!("minish: {}", e);
                session.set_status(e.status());
                return session.exit_status;
            }
        };

        let status = match pipeline.commands.as_slice() {
            [command] if is_builtin(command.program()) => self.run_in_process(command, session),
            _ => self.run_forked(&pipeline, bodies, session),
        };
        session.set_status(status);
        session.exit_status
    }

    /// 执行前先把所有 heredoc 正文读进内存。被 Ctrl-C 打断时返回 None
    fn collect_heredocs(
        &self,
        pipeline: &Pipeline,
        session: &Session,
        input: &mut dyn LineSource,
    ) -> Result<Option<Vec<Vec<String>>>, ShellError> {
        let mut bodies = Vec::with_capacity(pipeline.len());
        for command in &pipeline.commands {
            let mut stage = Vec::new();
            for heredoc in command.heredocs() {
                let mut body = String::new();
                loop {
                    match input.read_line(HEREDOC_PROMPT)? {
                        ReadOutcome::Line(line) if line == heredoc.target => break,
                        ReadOutcome::Line(line) => {
                            if heredoc.expand_body {
                                body.push_str(&expand_text(&line, session));
                            } else {
                                body.push_str(&line);
                            }
                            body.push('\n');
                        }
                        ReadOutcome::Interrupted => return Ok(None),
                        ReadOutcome::Eof => {
                            warn!("heredoc 在文件结尾处结束，期望 {}", heredoc.target);
                            eprintln!(
                                "minish: warning: here-document delimited by end-of-file (wanted `{}')",
                                heredoc.target
                            );
                            break;
                        }
                    }
                }
                stage.push(body);
            }
            bodies.push(stage);
        }
        Ok(Some(bodies))
    }

    /// 单阶段内建命令：不 fork，直接在 Shell 进程里执行
    fn run_in_process(&mut self, command: &Command, session: &mut Session) -> i32 {
        let output = match prepare_in_process(command) {
            Ok(output) => output,
            Err(e) => {
                eprintln!("minish: {}", e);
                return e.status();
            }
        };

        let mut err = io::stderr();
        match output {
            Some(mut file) => run_builtin(&command.args, session, &mut file, &mut err),
            None => {
                let mut out = io::stdout().lock();
                run_builtin(&command.args, session, &mut out, &mut err)
            }
        }
    }

    fn run_forked(&mut self, pipeline: &Pipeline, bodies: Vec<Vec<String>>, session: &Session) -> i32 {
        // 避免缓冲区内容被子进程重复输出
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        let plumbing = match Plumbing::new(pipeline, bodies) {
            Ok(plumbing) => plumbing,
            Err(e) => {
                error!("创建管道失败: {}", e);
                eprintln!("minish: {}", e);
                return EXIT_FAILURE;
            }
        };

        let last_stage = pipeline.len() - 1;
        let mut children: Vec<(usize, Pid)> = Vec::with_capacity(pipeline.len());
        let mut fork_failed = false;

        for (index, command) in pipeline.commands.iter().enumerate() {
            // SAFETY: Shell 是单线程的，子进程只做 dup2/open/execve 或执行内建命令后退出
            match unsafe { fork() } {
                Ok(ForkResult::Child) => run_child(index, command, &plumbing, session),
                Ok(ForkResult::Parent { child }) => {
                    debug!("fork 阶段 {} -> pid {}: {}", index, child, shell_words::join(&command.args));
                    children.push((index, child));
                }
                Err(e) => {
                    error!("fork 失败: {}", e);
                    eprintln!("minish: fork: {}", e.desc());
                    fork_failed = true;
                    break;
                }
            }
        }

        plumbing.finish();
        let status = wait_pipeline(&children, last_stage);
        if fork_failed {
            EXIT_FAILURE
        } else {
            status
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// 子进程入口，永不返回
fn run_child(index: usize, command: &Command, plumbing: &Plumbing, session: &Session) -> ! {
    signals::restore_default_signals();

    let status = match plumbing.wire_child(index, command) {
        Err(e) => {
            eprintln!("minish: {}", e);
            e.status()
        }
        Ok(()) if is_builtin(command.program()) => {
            // 子进程里的修改对父进程不可见
            let mut snapshot = session.clone();
            let mut out = io::stdout().lock();
            run_builtin(&command.args, &mut snapshot, &mut out, &mut io::stderr())
        }
        Ok(()) => match exec_external(command, session) {
            Ok(never) => match never {},
            Err(e) => {
                eprintln!("minish: {}", e);
                e.status()
            }
        },
    };

    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    process::exit(status)
}

fn exec_external(command: &Command, session: &Session) -> Result<Infallible, ShellError> {
    let program = command.program();
    let dirs = path::search_dirs(session.var("PATH").unwrap_or_default());
    let resolved = path::resolve(program, &dirs)?;

    let c_path = CString::new(resolved.as_os_str().as_bytes()).map_err(io::Error::from)?;
    let argv = command
        .args
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io::Error::from)?;
    let envp = session.env.to_envp().map_err(io::Error::from)?;

    debug!("execve {}", resolved.display());
    match execve(&c_path, &argv, &envp) {
        Ok(never) => match never {},
        Err(Errno::ENOENT) => Err(ShellError::NoSuchFile(program.to_string())),
        Err(Errno::EACCES) => Err(ShellError::PermissionDenied(program.to_string())),
        Err(e) => Err(ShellError::CannotExecute {
            path: program.to_string(),
            reason: e.desc().to_string(),
        }),
    }
}
