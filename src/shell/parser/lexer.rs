use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::shell::error::ShellError;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Word(Word),
    Pipe,
    Redirect(RedirectOp),
    And,
    Or,
    End,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RedirectOp {
    Input,   // <
    Output,  // >
    Append,  // >>
    Heredoc, // <<
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Quote {
    Unquoted,
    Single,
    Double,
}

/// 一段引号类型一致的文本，引号本身已去掉
#[derive(Debug, PartialEq, Clone)]
pub struct WordPart {
    pub text: String,
    pub quote: Quote,
}

/// 一个 WORD 记号：原始文本加上按引号边界切好的片段
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Word {
    pub raw: String,
    pub parts: Vec<WordPart>,
}

impl Word {
    pub fn is_quoted(&self) -> bool {
        self.parts.iter().any(|part| part.quote != Quote::Unquoted)
    }

    /// 去掉引号后的字面值，不做任何展开
    pub fn literal(&self) -> String {
        self.parts.iter().map(|part| part.text.as_str()).collect()
    }

    fn push(&mut self, quote: Quote, c: char) {
        match self.parts.last_mut() {
            Some(part) if part.quote == quote => part.text.push(c),
            _ => self.parts.push(WordPart {
                text: c.to_string(),
                quote,
            }),
        }
    }

    /// 空引号 `''` 也要留下一个片段
    fn open(&mut self, quote: Quote) {
        self.parts.push(WordPart {
            text: String::new(),
            quote,
        });
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => write!(f, "{}", word.raw),
            Token::Pipe => write!(f, "|"),
            Token::Redirect(RedirectOp::Input) => write!(f, "<"),
            Token::Redirect(RedirectOp::Output) => write!(f, ">"),
            Token::Redirect(RedirectOp::Append) => write!(f, ">>"),
            Token::Redirect(RedirectOp::Heredoc) => write!(f, "<<"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::End => write!(f, "newline"),
        }
    }
}

const METACHARS: &str = "|&;()<>";

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            done: false,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ShellError> {
        self.skip_whitespace();

        match self.peek_char() {
            None => {
                self.done = true;
                Ok(Token::End)
            }
            Some(c) => match c {
                '|' => {
                    self.read_char();
                    if self.peek_char() == Some('|') {
                        self.read_char();
                        Ok(Token::Or)
                    } else {
                        Ok(Token::Pipe)
                    }
                }
                '&' => {
                    self.read_char();
                    if self.peek_char() == Some('&') {
                        self.read_char();
                        Ok(Token::And)
                    } else {
                        Err(ShellError::UnexpectedToken("&".to_string()))
                    }
                }
                '<' => {
                    self.read_char();
                    if self.peek_char() == Some('<') {
                        self.read_char();
                        Ok(Token::Redirect(RedirectOp::Heredoc))
                    } else {
                        Ok(Token::Redirect(RedirectOp::Input))
                    }
                }
                '>' => {
                    self.read_char();
                    if self.peek_char() == Some('>') {
                        self.read_char();
                        Ok(Token::Redirect(RedirectOp::Append))
                    } else {
                        Ok(Token::Redirect(RedirectOp::Output))
                    }
                }
                ';' | '(' | ')' => Err(ShellError::UnexpectedToken(c.to_string())),
                _ => self.read_word(),
            },
        }
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    fn read_word(&mut self) -> Result<Token, ShellError> {
        let mut word = Word::default();

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || METACHARS.contains(c) {
                break;
            }
            self.read_char();
            word.raw.push(c);
            match c {
                '\'' | '"' => self.read_quoted_string(&mut word, c)?,
                '\\' => match self.read_char() {
                    // 转义字符按单引号处理：保留字面值，不参与展开
                    Some(escaped) => {
                        word.raw.push(escaped);
                        word.push(Quote::Single, escaped);
                    }
                    None => word.push(Quote::Unquoted, '\\'),
                },
                _ => word.push(Quote::Unquoted, c),
            }
        }

        Ok(Token::Word(word))
    }

    fn read_quoted_string(&mut self, word: &mut Word, quote: char) -> Result<(), ShellError> {
        let kind = if quote == '\'' {
            Quote::Single
        } else {
            Quote::Double
        };
        word.open(kind);

        loop {
            let c = self
                .read_char()
                .ok_or(ShellError::UnmatchedQuote(quote))?;
            word.raw.push(c);
            match (kind, c) {
                (_, c) if c == quote => return Ok(()),
                (Quote::Double, '\\') => match self.peek_char() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => {
                        self.read_char();
                        word.raw.push(next);
                        word.push(Quote::Single, next);
                        word.open(Quote::Double);
                    }
                    _ => word.push(kind, '\\'),
                },
                (_, c) => word.push(kind, c),
            }
        }
    }
}

/// 把一整行切成记号序列，末尾总是 `Token::End`
pub fn tokenize(line: &str) -> Result<Vec<Token>, ShellError> {
    let mut lexer = Lexer::new(line);
    let mut tokens = Vec::new();
    while !lexer.done {
        tokens.push(lexer.next_token()?);
    }
    Ok(tokens)
}

#[cfg(test)]
impl Word {
    pub fn unquoted(text: &str) -> Self {
        Self {
            raw: text.to_string(),
            parts: vec![WordPart {
                text: text.to_string(),
                quote: Quote::Unquoted,
            }],
        }
    }
}
