use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_: libc::c_int) {
    // 信号处理函数里只写标志位
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn install(signal: Signal, handler: SigHandler, flags: SaFlags) -> nix::Result<()> {
    let action = SigAction::new(handler, flags, SigSet::empty());
    // SAFETY: 处理函数只访问原子变量，满足异步信号安全
    unsafe { sigaction(signal, &action) }.map(|_| ())
}

/// Shell 自身：SIGINT 只记标志，SIGQUIT 忽略
pub fn setup_shell_signals() -> nix::Result<()> {
    install(
        Signal::SIGINT,
        SigHandler::Handler(handle_sigint),
        SaFlags::SA_RESTART,
    )?;
    install(Signal::SIGQUIT, SigHandler::SigIgn, SaFlags::empty())
}

/// fork 出的子进程在执行命令前恢复默认行为
pub fn restore_default_signals() {
    for signal in [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE] {
        if let Err(e) = install(signal, SigHandler::SigDfl, SaFlags::empty()) {
            warn!("恢复信号 {} 失败: {}", signal, e);
        }
    }
}

/// 读取并清除中断标志
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_interrupt_clears_flag() {
        INTERRUPTED.store(true, Ordering::SeqCst);
        assert!(take_interrupt());
        assert!(!take_interrupt());
    }
}
