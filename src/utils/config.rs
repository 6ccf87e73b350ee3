use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub config_dir: PathBuf,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    /// 日志同时输出到 stderr
    pub logger_echo: bool,
}

fn expand_path(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value).as_ref())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/minish")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("minish"),
            theme: String::from("default"),
            history_file: config_dir.join(".minish_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            logger_echo: false,
            config_dir,
        }
    }

    pub fn new() -> Self {
        // 优先加载 .env 文件
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();
        config.apply(|key| env::var(key).ok());
        config
    }

    /// 用环境变量覆盖默认值
    fn apply(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(theme) = lookup("MINISH_THEME") {
            self.theme = theme;
        }
        if let Some(editor) = lookup("MINISH_EDITOR") {
            self.editor_mode = editor;
        }
        if let Some(history) = lookup("MINISH_HISTORY") {
            self.history_file = expand_path(&history);
        }
        if let Some(level) = lookup("MINISH_LOG_LEVEL") {
            self.logger_level = level;
        }
        if let Some(dir) = lookup("MINISH_LOG_DIR") {
            self.logger_dir = expand_path(&dir);
        }
        if let Some(echo) = lookup("MINISH_LOG_ECHO") {
            self.logger_echo = is_truthy(&echo);
        }
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
