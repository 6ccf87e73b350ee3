use super::lexer::RedirectOp;
use crate::shell::error::ShellError;

/// 按执行顺序排列的命令，下标即阶段序号
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// argv，`args[0]` 是命令名，解析器保证非空
    pub args: Vec<String>,
    /// 按出现顺序保存，执行时依次生效
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub operator: RedirectOp,
    /// 文件名；heredoc 时为结束符；展开结果有歧义时为原始单词
    pub target: String,
    /// 仅对 heredoc 有意义：结束符未加引号时正文要做变量展开
    pub expand_body: bool,
    /// 目标展开成了零个或多个字段，到执行该阶段时才报错
    pub ambiguous: bool,
}

impl Redirection {
    /// 要打开的文件路径
    pub fn path(&self) -> Result<&str, ShellError> {
        if self.ambiguous {
            return Err(ShellError::AmbiguousRedirect(self.target.clone()));
        }
        Ok(&self.target)
    }
}

impl Command {
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// 最后一个输入重定向（`<` 或 `<<`）
    pub fn input(&self) -> Option<&Redirection> {
        self.redirections
            .iter()
            .rev()
            .find(|r| matches!(r.operator, RedirectOp::Input | RedirectOp::Heredoc))
    }

    /// 最后一个输出重定向（`>` 或 `>>`）
    pub fn output(&self) -> Option<&Redirection> {
        self.redirections
            .iter()
            .rev()
            .find(|r| matches!(r.operator, RedirectOp::Output | RedirectOp::Append))
    }

    pub fn heredocs(&self) -> impl Iterator<Item = &Redirection> {
        self.redirections
            .iter()
            .filter(|r| r.operator == RedirectOp::Heredoc)
    }
}
