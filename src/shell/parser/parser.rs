use log::debug;

use super::ast::{Command, Pipeline, Redirection};
use super::expand::expand_fields;
use super::lexer::{tokenize, RedirectOp, Token};
use crate::shell::error::ShellError;
use crate::shell::session::Session;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    session: &'a Session,
}

/// 单个阶段解析后的结果
struct Stage {
    command: Command,
    saw_word: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, session: &'a Session) -> Self {
        Parser {
            tokens,
            pos: 0,
            session,
        }
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::End)
    }

    fn next_token(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> ShellError {
        ShellError::UnexpectedToken(self.current_token().to_string())
    }

    pub fn parse_pipeline(&mut self) -> Result<Pipeline, ShellError> {
        let mut stages = Vec::new();

        if *self.current_token() == Token::End {
            return Ok(Pipeline::default());
        }

        loop {
            let stage = self.parse_simple_command()?;
            stages.push(stage);

            match self.current_token() {
                Token::Pipe => {
                    self.next_token();
                    continue;
                }
                Token::End => break,
                _ => return Err(self.unexpected()),
            }
        }

        // 单阶段且所有单词都展开为空：等同于空行
        if let [only] = stages.as_slice() {
            if only.saw_word && only.command.args.is_empty() && only.command.redirections.is_empty()
            {
                return Ok(Pipeline::default());
            }
        }

        let mut commands = Vec::with_capacity(stages.len());
        for stage in stages {
            if stage.command.args.is_empty() {
                return Err(ShellError::MissingCommand);
            }
            commands.push(stage.command);
        }
        Ok(Pipeline { commands })
    }

    fn parse_simple_command(&mut self) -> Result<Stage, ShellError> {
        let mut command = Command::default();
        let mut saw_word = false;

        loop {
            match self.current_token() {
                Token::End | Token::Pipe => break,
                Token::And | Token::Or => return Err(self.unexpected()),
                Token::Redirect(op) => {
                    let op = *op;
                    let redirection = self.parse_redirection(op)?;
                    command.redirections.push(redirection);
                }
                Token::Word(word) => {
                    let fields = expand_fields(word, self.session);
                    command.args.extend(fields);
                    saw_word = true;
                    self.next_token();
                }
            }
        }

        if !saw_word && command.redirections.is_empty() {
            return Err(self.unexpected());
        }

        Ok(Stage { command, saw_word })
    }

    fn parse_redirection(&mut self, operator: RedirectOp) -> Result<Redirection, ShellError> {
        self.next_token(); // 跳过重定向操作符

        let word = match self.current_token() {
            Token::Word(word) => word.clone(),
            _ => return Err(self.unexpected()),
        };
        self.next_token();

        if operator == RedirectOp::Heredoc {
            return Ok(Redirection {
                operator,
                target: word.literal(),
                expand_body: !word.is_quoted(),
                ambiguous: false,
            });
        }

        let mut fields = expand_fields(&word, self.session);
        let redirection = if fields.len() == 1 {
            Redirection {
                operator,
                target: fields.remove(0),
                expand_body: false,
                ambiguous: false,
            }
        } else {
            debug!("重定向目标 {} 展开为 {} 个字段", word.raw, fields.len());
            Redirection {
                operator,
                target: word.raw,
                expand_body: false,
                ambiguous: true,
            }
        };
        Ok(redirection)
    }
}

/// 记号序列 → 管道
pub fn parse(tokens: Vec<Token>, session: &Session) -> Result<Pipeline, ShellError> {
    Parser::new(tokens, session).parse_pipeline()
}

/// 词法分析加解析，一步到位
pub fn parse_line(line: &str, session: &Session) -> Result<Pipeline, ShellError> {
    parse(tokenize(line)?, session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::variables::Environment;

    fn session() -> Session {
        let mut env = Environment::new();
        env.set("FILE", "out.txt");
        env.set("TWO", "a b");
        Session::new(env)
    }

    #[allow(clippy::unwrap_used)]
    fn parse_ok(line: &str) -> Pipeline {
        parse_line(line, &session()).unwrap()
    }

    fn parse_err(line: &str) -> String {
        match parse_line(line, &session()) {
            Ok(p) => panic!("expected error for {:?}, got {:?}", line, p),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_simple_command() {
        let pipeline = parse_ok("ls -l");
        assert_eq!(pipeline.len(), 1);
        let cmd = &pipeline.commands[0];
        assert_eq!(cmd.program(), "ls");
        assert_eq!(cmd.args, vec!["ls", "-l"]);
        assert!(cmd.redirections.is_empty());
    }

    #[test]
    fn test_pipeline() {
        let pipeline = parse_ok("ls -l | grep foo | wc -l");
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.commands[0].args, vec!["ls", "-l"]);
        assert_eq!(pipeline.commands[1].args, vec!["grep", "foo"]);
        assert_eq!(pipeline.commands[2].args, vec!["wc", "-l"]);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_stage_count_matches_pipes() {
        for line in ["a", "a | b", "a|b|c|d", "a 'x|y' | b"] {
            let tokens = tokenize(line).unwrap();
            let pipes = tokens.iter().filter(|t| **t == Token::Pipe).count();
            assert_eq!(parse(tokens, &session()).unwrap().len(), pipes + 1);
        }
    }

    #[test]
    fn test_redirection() {
        let pipeline = parse_ok("echo hello > $FILE");
        let cmd = &pipeline.commands[0];
        assert_eq!(cmd.args, vec!["echo", "hello"]);
        assert_eq!(cmd.redirections.len(), 1);
        assert_eq!(cmd.redirections[0].target, "out.txt");
        assert!(matches!(cmd.redirections[0].operator, RedirectOp::Output));
    }

    #[test]
    fn test_last_redirection_wins() {
        let pipeline = parse_ok("< in1 cmd > a.txt arg >> b.txt < in2");
        let cmd = &pipeline.commands[0];
        assert_eq!(cmd.args, vec!["cmd", "arg"]);
        let output = cmd.output().map(|r| (r.target.as_str(), r.operator));
        assert_eq!(output, Some(("b.txt", RedirectOp::Append)));
        assert_eq!(cmd.input().map(|r| r.target.as_str()), Some("in2"));
        assert_eq!(cmd.redirections.len(), 4);
    }

    #[test]
    fn test_heredoc_delimiter_quoting() {
        let pipeline = parse_ok("cat << EOF | cat << 'E\"OF'");
        let first = &pipeline.commands[0].redirections[0];
        assert_eq!(first.target, "EOF");
        assert!(first.expand_body);
        let second = &pipeline.commands[1].redirections[0];
        assert_eq!(second.target, "E\"OF");
        assert!(!second.expand_body);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("$UNSET_VAR").is_empty());
    }

    #[test]
    fn test_unset_words_are_dropped() {
        let pipeline = parse_ok("echo $UNSET_VAR end");
        assert_eq!(pipeline.commands[0].args, vec!["echo", "end"]);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_err("| ls"), "syntax error near unexpected token `|'");
        assert_eq!(parse_err("ls |"), "syntax error near unexpected token `newline'");
        assert_eq!(parse_err("ls | | wc"), "syntax error near unexpected token `|'");
        assert_eq!(parse_err("ls >"), "syntax error near unexpected token `newline'");
        assert_eq!(parse_err("ls > | wc"), "syntax error near unexpected token `|'");
        assert_eq!(parse_err("ls && wc"), "syntax error near unexpected token `&&'");
        assert_eq!(parse_err("ls || wc"), "syntax error near unexpected token `||'");
        assert_eq!(parse_err("> out.txt"), "syntax error: missing command");
        assert_eq!(parse_err("echo 'oops"), "syntax error: unexpected end of file while looking for matching `''");
    }

    #[test]
    fn test_ambiguous_redirect_is_deferred() {
        let pipeline = parse_ok("cat < $NOPE | echo > $TWO");
        assert_eq!(pipeline.len(), 2);

        let input = &pipeline.commands[0].redirections[0];
        assert!(input.ambiguous);
        assert_eq!(
            input.path().map_err(|e| e.to_string()),
            Err("$NOPE: ambiguous redirect".to_string())
        );

        let output = &pipeline.commands[1].redirections[0];
        assert!(output.ambiguous);
        assert_eq!(output.target, "$TWO");

        let plain = parse_ok("echo > $FILE");
        assert_eq!(plain.commands[0].redirections[0].path().ok(), Some("out.txt"));
    }
}
