use std::env;

use log::debug;

use super::error::EXIT_SUCCESS;
use super::variables::Environment;

/// 一次 Shell 会话的全部可变状态
#[derive(Debug, Clone)]
pub struct Session {
    pub env: Environment,
    /// 最近一条管道的退出码，`$?` 与进程退出码都取自这里
    pub exit_status: i32,
    /// 由内建 `exit` 设置
    pub should_exit: bool,
}

impl Session {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            exit_status: EXIT_SUCCESS,
            should_exit: false,
        }
    }

    pub fn from_process() -> Self {
        let mut session = Self::new(Environment::from_process());
        if let Ok(cwd) = env::current_dir() {
            session.env.set("PWD", cwd.to_string_lossy());
        }
        debug!("导入 {} 个环境变量", session.env.len());
        session
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name)
    }

    pub fn set_status(&mut self, status: i32) {
        self.exit_status = status & 0xff;
    }
}
