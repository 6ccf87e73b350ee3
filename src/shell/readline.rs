use std::io::{self, BufRead};

use crate::shell::error::ShellError;
use crate::utils::config::Config;
use log::{debug, error, warn};
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use rustyline::{CompletionType, Config as RLConfig};

pub enum ReadOutcome {
    Line(String),
    Interrupted,
    Eof,
}

/// 每次提示符循环提供一行输入；heredoc 正文也从这里读
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError>;

    fn add_history(&mut self, _line: &str) {}

    fn save_history(&mut self) {}

    fn is_interactive(&self) -> bool {
        false
    }
}

pub struct ReadlineManager<'a> {
    config: &'a Config,
    editor: Editor<(), FileHistory>,
}

impl<'a> ReadlineManager<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .edit_mode(config.get_edit_mode())
            .build();

        let editor = Editor::with_config(rl_config).map_err(|err| {
            error!("无法初始化 readline: {}", err);
            err
        })?;
        Ok(Self { config, editor })
    }

    pub fn load_history(&mut self) {
        if let Err(err) = self.editor.load_history(&self.config.history_file) {
            warn!(
                "无法加载历史记录: {} {}",
                self.config.history_file.display(),
                err
            );
        } else {
            debug!("历史记录加载成功");
        }
    }
}

impl LineSource for ReadlineManager<'_> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err.into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            warn!("添加历史记录失败: {}", err);
        }
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.config.history_file.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                error!("无法创建历史记录目录: {}", err);
                return;
            }
        }
        if let Err(err) = self.editor.save_history(&self.config.history_file) {
            error!("保存历史记录失败: {}", err);
        } else {
            debug!("历史记录保存成功");
        }
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// 非终端输入（管道、文件）：逐行读取，不打印提示符
pub struct PipedInput<R: BufRead> {
    reader: R,
}

impl<R: BufRead> PipedInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl PipedInput<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> LineSource for PipedInput<R> {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome, ShellError> {
        let mut bytes = Vec::new();
        if self.reader.read_until(b'\n', &mut bytes)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if bytes.ends_with(b"\n") {
            bytes.pop();
            if bytes.ends_with(b"\r") {
                bytes.pop();
            }
        }
        // 非 UTF-8 字节替换成 U+FFFD，不中断后续输入
        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                warn!("输入行不是合法的 UTF-8");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(ReadOutcome::Line(line))
    }
}
