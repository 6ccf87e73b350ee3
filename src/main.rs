use log::debug;

use crate::shell::{Session, Shell};
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    if let Err(e) = init_logger(&config) {
        eprintln!("minish: warning: logging disabled: {}", e);
    }
    debug!("配置加载成功 {}", config.config_dir.display());

    let mut shell = Shell::new(&config, Session::from_process())?;
    let status = shell.run();
    std::process::exit(status & 0xff)
}
