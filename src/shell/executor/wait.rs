use std::fmt;

use log::{debug, error};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::waitpid;
use nix::sys::wait::WaitStatus as WS;
use nix::unistd::Pid;

use crate::shell::error::EXIT_FAILURE;

/// 子进程的最终状态
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum WaitStatus {
    Exited(i32),
    Signaled(Signal, bool),
    Error(Errno),
}

impl WaitStatus {
    pub fn get_status(&self) -> i32 {
        match self {
            WaitStatus::Exited(status) => *status,
            WaitStatus::Signaled(sig, _) => 128 + *sig as i32,
            WaitStatus::Error(_) => EXIT_FAILURE,
        }
    }

    pub fn get_name(&self) -> &'static str {
        match self {
            WaitStatus::Exited(_) => "Exited",
            WaitStatus::Signaled(..) => "Signaled",
            WaitStatus::Error(_) => "Error",
        }
    }

    /// 终端上要给用户看的提示，对应 bash 的行为
    pub fn report(&self) -> Option<String> {
        let WaitStatus::Signaled(sig, core_dumped) = self else {
            return None;
        };
        let message = match sig {
            Signal::SIGINT => return Some(String::new()),
            Signal::SIGPIPE => return None,
            Signal::SIGQUIT => "Quit",
            Signal::SIGKILL => "Killed",
            Signal::SIGTERM => "Terminated",
            Signal::SIGSEGV => "Segmentation fault",
            Signal::SIGABRT => "Aborted",
            other => other.as_str(),
        };
        if *core_dumped {
            Some(format!("{} (core dumped)", message))
        } else {
            Some(message.to_string())
        }
    }
}

impl fmt::Debug for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formatter = f.debug_struct("WaitStatus");
        formatter.field("name", &self.get_name());
        formatter.field("status", &self.get_status());
        formatter.finish()
    }
}

/// 阻塞等待单个子进程结束
pub fn wait_child(pid: Pid) -> WaitStatus {
    loop {
        match waitpid(pid, None) {
            Ok(WS::Exited(_, status)) => return WaitStatus::Exited(status),
            Ok(WS::Signaled(_, sig, core_dumped)) => return WaitStatus::Signaled(sig, core_dumped),
            // 未请求 WUNTRACED，其余状态不会出现，继续等
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => {
                error!("waitpid {} 出错: {}", pid, e);
                return WaitStatus::Error(e);
            }
        }
    }
}

/// 按 fork 顺序等待全部子进程，返回最后一个阶段的退出码
///
/// `children` 里是 (阶段序号, pid)。最后一个阶段没能 fork 出来时返回失败。
pub fn wait_pipeline(children: &[(usize, Pid)], last_stage: usize) -> i32 {
    let mut status = EXIT_FAILURE;
    for &(index, pid) in children {
        let ws = wait_child(pid);
        debug!("阶段 {} (pid {}) 结束: {:?}", index, pid, ws);
        if index == last_stage {
            status = ws.get_status();
            if let Some(message) = ws.report() {
                eprintln!("{}", message);
            }
        }
    }
    status
}
