use log::{debug, error, warn};
use std::io::{IsTerminal, Write};

use crate::shell::error::{ShellError, EXIT_FAILURE, EXIT_INTERRUPTED};
use crate::shell::executor::Executor;
use crate::shell::parser::parse_line;
use crate::shell::readline::{LineSource, PipedInput, ReadOutcome, ReadlineManager};
use crate::shell::session::Session;
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::{load_theme, Theme};

/// 连续这么多次读取失败后放弃输入
const MAX_READ_FAILURES: u32 = 3;

pub struct Shell<'a> {
    theme: Theme,
    input: Box<dyn LineSource + 'a>,
    executor: Executor,
    session: Session,
}

impl<'a> Shell<'a> {
    /// 标准输入是终端时用 rustyline，否则逐行读取
    pub fn new(config: &'a Config, session: Session) -> Result<Self, ShellError> {
        let input: Box<dyn LineSource + 'a> = if std::io::stdin().is_terminal() {
            let mut readline = ReadlineManager::new(config)?;
            readline.load_history();
            Box::new(readline)
        } else {
            Box::new(PipedInput::stdin())
        };
        Ok(Self::with_input(config, session, input))
    }

    pub fn with_input(config: &Config, session: Session, input: Box<dyn LineSource + 'a>) -> Self {
        Self {
            theme: load_theme(&config.theme),
            input,
            executor: Executor::new(),
            session,
        }
    }

    /// 运行到 `exit` 或输入结束，返回最终退出码
    pub fn run(&mut self) -> i32 {
        debug!("初始化 minish...");

        if let Err(e) = signals::setup_shell_signals() {
            warn!("安装信号处理失败: {}", e);
        }

        self.run_loop();
        self.input.save_history();

        debug!("退出 minish，状态码 {}", self.session.exit_status);
        self.session.exit_status
    }

    fn run_loop(&mut self) {
        let mut read_failures = 0;
        loop {
            let _ = std::io::stdout().flush();
            let prompt = if self.input.is_interactive() {
                self.theme.render_prompt(self.session.exit_status)
            } else {
                String::new()
            };

            match self.input.read_line(&prompt) {
                Ok(ReadOutcome::Line(line)) => {
                    read_failures = 0;
                    if signals::take_interrupt() {
                        self.session.set_status(EXIT_INTERRUPTED);
                    }
                    self.handle_input(&line);
                    if self.session.should_exit {
                        if self.input.is_interactive() {
                            eprintln!("exit");
                        }
                        break;
                    }
                }
                Ok(ReadOutcome::Interrupted) => {
                    warn!("接收到中断信号...");
                    signals::take_interrupt();
                    self.session.set_status(EXIT_INTERRUPTED);
                }
                Ok(ReadOutcome::Eof) => {
                    debug!("接收到 EOF，退出 minish...");
                    if self.input.is_interactive() {
                        eprintln!("exit");
                    }
                    break;
                }
                Err(err @ ShellError::Readline(_)) => {
                    error!("终端读取出错: {}", err);
                    eprintln!("minish: {}", err);
                    break;
                }
                // 只丢弃当前这一行；输入端持续出错时才退出
                Err(err) => {
                    error!("读取输入出错: {}", err);
                    eprintln!("minish: {}", err);
                    self.session.set_status(EXIT_FAILURE);
                    read_failures += 1;
                    if read_failures >= MAX_READ_FAILURES {
                        break;
                    }
                }
            }
        }
    }

    /// 处理一行输入：词法分析 → 解析 → 执行
    pub fn handle_input(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.input.add_history(line);

        let pipeline = match parse_line(line, &self.session) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                if e.is_syntax() {
                    debug!("语法错误: {:?}", e);
                } else {
                    warn!("解析失败: {:?}", e);
                }
                eprintln!("minish: {}", e);
                self.session.set_status(e.status());
                return;
            }
        };
        debug!("解析结果: {:?}", pipeline);

        let status = self
            .executor
            .execute(pipeline, &mut self.session, self.input.as_mut());
        // 执行期间收到的 Ctrl-C 已经作用到子进程上
        signals::take_interrupt();
        debug!("执行完毕，状态码 {}", status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::variables::Environment;
    use std::io::Cursor;

    fn shell(script: &'static str) -> Shell<'static> {
        let config = Config::new();
        let mut env = Environment::new();
        env.set("GREETING", "hi");
        Shell::with_input(
            &config,
            Session::new(env),
            Box::new(PipedInput::new(Cursor::new(script))),
        )
    }

    #[test]
    fn test_syntax_error_sets_status_two() {
        let mut sh = shell("");
        sh.handle_input("echo a |");
        assert_eq!(sh.session.exit_status, 2);
        sh.handle_input("echo a && echo b");
        assert_eq!(sh.session.exit_status, 2);
    }

    #[test]
    fn test_exit_builtin_stops_the_loop() {
        let mut sh = shell("export X=1\nexit 3\nexport Y=2\n");
        assert_eq!(sh.run(), 3);
        assert_eq!(sh.session.var("X"), Some("1"));
        assert_eq!(sh.session.var("Y"), None);
    }

    #[test]
    fn test_exit_abc_keeps_running() {
        let mut sh = shell("exit abc\nexport AFTER=$?\n");
        assert_eq!(sh.run(), 0);
        assert_eq!(sh.session.var("AFTER"), Some("2"));
        assert!(!sh.session.should_exit);
    }

    #[test]
    fn test_blank_line_keeps_status() {
        let mut sh = shell("");
        sh.handle_input("exit nope");
        sh.handle_input("   ");
        assert_eq!(sh.session.exit_status, 2);
    }

    struct FailingInput;

    impl LineSource for FailingInput {
        fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome, ShellError> {
            Err(std::io::Error::other("broken input").into())
        }
    }

    #[test]
    fn test_read_errors_skip_lines_then_stop() {
        let config = Config::new();
        let mut sh = Shell::with_input(
            &config,
            Session::new(Environment::new()),
            Box::new(FailingInput),
        );
        assert_eq!(sh.run(), 1);
    }

    #[test]
    fn test_invalid_utf8_line_does_not_end_session() {
        let config = Config::new();
        let mut sh = Shell::with_input(
            &config,
            Session::new(Environment::new()),
            Box::new(PipedInput::new(Cursor::new(
                &b"export A=caf\xe9\nexport B=after\n"[..],
            ))),
        );
        assert_eq!(sh.run(), 0);
        assert_eq!(sh.session.var("A"), Some("caf\u{fffd}"));
        assert_eq!(sh.session.var("B"), Some("after"));
    }

    #[test]
    fn test_eof_returns_last_status() {
        let mut sh = shell("export 1BAD\n");
        assert_eq!(sh.run(), 1);
    }
}
