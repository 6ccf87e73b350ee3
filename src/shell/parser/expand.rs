//! 变量展开：`$NAME`、`${NAME}`、`$?`，以及未加引号结果的分词。
//!
//! 单引号片段原样保留；双引号片段展开变量但不分词；
//! 未加引号片段展开后按空白切分，字面文本本身不切分。

use super::lexer::{Quote, Word};
use crate::shell::session::Session;

const SHELL_NAME: &str = "minish";

enum Piece {
    Literal(String),
    Value(String),
}

/// 展开并分词。未加引号且展开为空的单词不产生任何字段
pub fn expand_fields(word: &Word, session: &Session) -> Vec<String> {
    let mut fields = Fields::default();
    for (index, part) in word.parts.iter().enumerate() {
        match part.quote {
            Quote::Single => fields.push_literal(&part.text),
            Quote::Double => fields.push_literal(&expand_text(&part.text, session)),
            Quote::Unquoted => {
                let text = expand_tilde(index, &part.text, session);
                for piece in scan(&text, session) {
                    match piece {
                        Piece::Literal(s) if !s.is_empty() => fields.push_literal(&s),
                        Piece::Literal(_) => {}
                        Piece::Value(v) => fields.push_split(&v),
                    }
                }
            }
        }
    }
    fields.finish()
}

/// 展开一段文本里的 `$` 引用，结果不分词。heredoc 正文也走这里
pub fn expand_text(text: &str, session: &Session) -> String {
    scan(text, session)
        .into_iter()
        .map(|piece| match piece {
            Piece::Literal(s) | Piece::Value(s) => s,
        })
        .collect()
}

fn expand_tilde(index: usize, text: &str, session: &Session) -> String {
    if index != 0 || !text.starts_with('~') {
        return text.to_string();
    }
    shellexpand::tilde_with_context(text, || session.var("HOME")).into_owned()
}

fn lookup(name: &str, session: &Session) -> String {
    session.var(name).unwrap_or_default().to_string()
}

fn scan(text: &str, session: &Session) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            literal.push(c);
            continue;
        }

        let value = match chars.peek().copied() {
            // `$?` 在展开的那一刻取值
            Some('?') => {
                chars.next();
                session.exit_status.to_string()
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                if d == '0' {
                    SHELL_NAME.to_string()
                } else {
                    String::new()
                }
            }
            Some(n) if n.is_ascii_alphabetic() || n == '_' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                lookup(&name, session)
            }
            Some('{') => {
                let rest: String = chars.clone().skip(1).collect();
                match rest.find('}') {
                    Some(end) if is_braced_name(&rest[..end]) => {
                        let name = &rest[..end];
                        for _ in 0..name.chars().count() + 2 {
                            chars.next();
                        }
                        if name == "?" {
                            session.exit_status.to_string()
                        } else {
                            lookup(name, session)
                        }
                    }
                    _ => {
                        literal.push('$');
                        continue;
                    }
                }
            }
            _ => {
                literal.push('$');
                continue;
            }
        };

        if !literal.is_empty() {
            pieces.push(Piece::Literal(std::mem::take(&mut literal)));
        }
        pieces.push(Piece::Value(value));
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

fn is_braced_name(name: &str) -> bool {
    name == "?" || crate::shell::variables::is_valid_name(name)
}

#[derive(Default)]
struct Fields {
    fields: Vec<String>,
    current: String,
    active: bool,
}

impl Fields {
    fn push_literal(&mut self, text: &str) {
        self.current.push_str(text);
        self.active = true;
    }

    fn push_split(&mut self, value: &str) {
        for c in value.chars() {
            if c.is_whitespace() {
                if self.active {
                    self.fields.push(std::mem::take(&mut self.current));
                    self.active = false;
                }
            } else {
                self.current.push(c);
                self.active = true;
            }
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.active {
            self.fields.push(self.current);
        }
        self.fields
    }
}
