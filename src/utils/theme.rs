use colored::Colorize;

use crate::utils::path::{basename, current_dir};

pub struct Theme {
    pub prompt: String,
    pub success_symbol: String,
    pub error_symbol: String,
    pub dir_style: Box<dyn Fn(String) -> String>,
    pub prompt_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt: "minish$ ".to_string(),
            success_symbol: "♡".bright_magenta().to_string(),
            error_symbol: "✗".red().to_string(),
            dir_style: Box::new(|s| s.bright_blue().to_string()),
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
        }
    }
}

impl Theme {
    /// 提示符：上一条命令的状态符号 + 当前目录 + `minish$ `
    pub fn render_prompt(&self, last_status: i32) -> String {
        let symbol = if last_status == 0 {
            &self.success_symbol
        } else {
            &self.error_symbol
        };
        let cwd = current_dir();
        format!(
            "{} {} {}",
            symbol,
            (self.dir_style)(basename(&cwd).to_string()),
            (self.prompt_style)(self.prompt.clone())
        )
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "default" => Theme::default(),
        "dark" => Theme {
            prompt: "minish➤ ".to_string(),
            success_symbol: "♡".bright_magenta().to_string(),
            error_symbol: "✗".red().to_string(),
            dir_style: Box::new(|s| s.purple().to_string()),
            prompt_style: Box::new(|s| s.bright_purple().to_string()),
        },
        _ => Theme::default(),
    }
}
