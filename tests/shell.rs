#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;

struct Output {
    status: i32,
    stdout: String,
    stderr: String,
}

/// 在临时目录里启动 minish，把脚本从 stdin 喂进去
fn run_in(dir: &Path, script: impl AsRef<[u8]>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_minish"))
        .current_dir(dir)
        .env("HOME", dir)
        .env("MINISH_LOG_DIR", dir.join("logs"))
        .env("MINISH_HISTORY", dir.join("history"))
        .env_remove("MINISH_LOG_ECHO")
        .env_remove("UNSET_VAR")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn minish");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_ref())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    Output {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}

fn run(script: &str) -> (TempDir, Output) {
    run_bytes(script.as_bytes())
}

fn run_bytes(script: &[u8]) -> (TempDir, Output) {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), script);
    (dir, output)
}

#[test]
fn test_simple_pipeline() {
    let (_dir, out) = run("echo hi | wc -c\n");
    assert_eq!(out.stdout.trim(), "3");
    assert_eq!(out.status, 0);
}

#[test]
fn test_three_stage_pipeline() {
    let (_dir, out) = run("printf 'b\\na\\nc\\n' | sort | head -n 2\n");
    assert_eq!(out.stdout, "a\nb\n");
}

#[test]
fn test_command_not_found() {
    let (_dir, out) = run("nosuchcmd123\necho $?\n");
    assert_eq!(out.stdout, "127\n");
    assert!(out.stderr.contains("minish: nosuchcmd123: command not found"));
    assert_eq!(out.status, 0);
}

#[test]
fn test_eof_returns_last_status() {
    let (_dir, out) = run("nosuchcmd123\n");
    assert_eq!(out.status, 127);
}

#[test]
fn test_failed_stage_does_not_stop_pipeline() {
    let (_dir, out) = run("nosuchcmd123 | echo after\necho $?\n");
    assert_eq!(out.stdout, "after\n0\n");
    assert!(out.stderr.contains("nosuchcmd123: command not found"));
}

#[test]
fn test_cd_failure_keeps_directory() {
    let (dir, out) = run("cd /nonexistent/minish\necho $?\npwd\n");
    let cwd = dir.path().canonicalize().unwrap();
    assert_eq!(out.stdout, format!("1\n{}\n", cwd.display()));
    assert!(out.stderr.contains("minish: cd: /nonexistent/minish: No such file or directory"));
}

#[test]
fn test_cd_changes_directory_for_later_commands() {
    let (dir, out) = run("mkdir sub\ncd sub\npwd\ncd ..\npwd\n");
    let cwd = dir.path().canonicalize().unwrap();
    assert_eq!(
        out.stdout,
        format!("{}\n{}\n", cwd.join("sub").display(), cwd.display())
    );
}

#[test]
fn test_cd_inside_pipeline_does_not_leak() {
    let (dir, out) = run("cd / | cat\npwd\n");
    let cwd = dir.path().canonicalize().unwrap();
    assert_eq!(out.stdout, format!("{}\n", cwd.display()));
}

#[test]
fn test_exit_with_bad_argument_continues() {
    let (_dir, out) = run("exit abc\necho $?\n");
    assert_eq!(out.stdout, "2\n");
    assert!(out.stderr.contains("minish: exit: abc: numeric argument required"));
}

#[test]
fn test_exit_code_wraps() {
    let (_dir, out) = run("exit 300\necho unreachable\n");
    assert_eq!(out.status, 44);
    assert_eq!(out.stdout, "");
}

#[test]
fn test_exit_in_pipeline_only_sets_status() {
    let (_dir, out) = run("echo x | exit 7\necho $?\n");
    assert_eq!(out.stdout, "7\n");
    assert_eq!(out.status, 0);
}

#[test]
fn test_exit_without_argument_uses_last_status() {
    let (_dir, out) = run("false\nexit\n");
    assert_eq!(out.status, 1);
}

#[test]
fn test_unset_variable_expands_to_nothing() {
    let (_dir, out) = run("echo $UNSET_VAR end\necho \"[$UNSET_VAR]\"\n");
    assert_eq!(out.stdout, "end\n[]\n");
}

#[test]
fn test_quoting_rules() {
    let script = concat!(
        "export GREETING='hello   world'\n",
        "echo '$GREETING'\n",
        "echo \"$GREETING\"\n",
        "echo $GREETING\n",
        "echo a\\ b \"c|d\" 'e > f'\n",
        "echo \"\" x\n",
    );
    let (_dir, out) = run(script);
    assert_eq!(
        out.stdout,
        "$GREETING\nhello   world\nhello world\na b c|d e > f\n x\n"
    );
}

#[test]
fn test_status_variable_and_braces() {
    let (dir, out) = run("false\necho $? ${HOME}x $0 [$1]\n");
    assert_eq!(out.stdout, format!("1 {}x minish []\n", dir.path().display()));
}

#[test]
fn test_output_redirections() {
    let (dir, out) = run("echo one > a.txt > b.txt\necho two >> b.txt\necho three > c.txt\necho four > c.txt\n");
    assert_eq!(out.status, 0);
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "");
    assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "one\ntwo\n");
    assert_eq!(fs::read_to_string(dir.path().join("c.txt")).unwrap(), "four\n");
}

#[test]
fn test_input_redirection() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.txt"), "z\ny\n").unwrap();
    let out = run_in(dir.path(), "sort < in.txt\n< in.txt wc -l\n");
    assert_eq!(out.stdout.lines().take(2).collect::<Vec<_>>(), vec!["y", "z"]);
    assert_eq!(out.stdout.lines().nth(2).map(str::trim), Some("2"));
}

#[test]
fn test_missing_input_file() {
    let (_dir, out) = run("cat < missing.txt\necho $?\n");
    assert_eq!(out.stdout, "1\n");
    assert!(out.stderr.contains("minish: missing.txt: No such file or directory"));
}

#[test]
fn test_builtin_redirection_in_process() {
    let (dir, out) = run("export X=1\nenv > env.txt\npwd > pwd.txt\n");
    assert_eq!(out.stdout, "");
    let listing = fs::read_to_string(dir.path().join("env.txt")).unwrap();
    assert!(listing.lines().any(|line| line == "X=1"));
    assert!(fs::read_to_string(dir.path().join("pwd.txt")).unwrap().ends_with('\n'));
}

#[test]
fn test_heredoc_expands_body() {
    let script = "export NAME=world\ncat << EOF\nhello $NAME\n'$NAME'\nEOF\necho done\n";
    let (_dir, out) = run(script);
    assert_eq!(out.stdout, "hello world\n'world'\ndone\n");
}

#[test]
fn test_heredoc_quoted_delimiter_is_literal() {
    let script = "export NAME=world\ncat << 'EOF'\nhello $NAME\nEOF\n";
    let (_dir, out) = run(script);
    assert_eq!(out.stdout, "hello $NAME\n");
}

#[test]
fn test_heredoc_feeds_pipeline_stage() {
    let script = "cat << END | wc -l\na\nb\nc\nEND\n";
    let (_dir, out) = run(script);
    assert_eq!(out.stdout.trim(), "3");
}

#[test]
fn test_heredoc_at_end_of_input() {
    let (_dir, out) = run("cat << EOF\nline\n");
    assert_eq!(out.stdout, "line\n");
    assert!(out.stderr.contains("here-document delimited by end-of-file"));
}

#[test]
fn test_syntax_errors() {
    let (_dir, out) = run("echo a |\necho $?\necho a && echo b\necho $?\n| ls\necho 'open\n");
    assert_eq!(out.stdout, "2\n2\n");
    assert!(out.stderr.contains("syntax error near unexpected token `newline'"));
    assert!(out.stderr.contains("syntax error near unexpected token `&&'"));
    assert!(out.stderr.contains("syntax error near unexpected token `|'"));
    assert_eq!(out.status, 2);
}

#[test]
fn test_export_reaches_children() {
    let (_dir, out) = run("export MINISH_TEST_VAR=42\nenv | grep MINISH_TEST_VAR\nunset MINISH_TEST_VAR\nenv | grep -c MINISH_TEST_VAR\n");
    assert_eq!(out.stdout, "MINISH_TEST_VAR=42\n0\n");
}

#[test]
fn test_invalid_export_identifier() {
    let (_dir, out) = run("export 1BAD=x\necho $?\n");
    assert_eq!(out.stdout, "1\n");
    assert!(out.stderr.contains("`1BAD=x': not a valid identifier"));
}

#[test]
fn test_builtin_inside_pipeline() {
    let (_dir, out) = run("echo -n abc | wc -c\n");
    assert_eq!(out.stdout.trim(), "3");
}

#[test]
fn test_last_stage_status_wins() {
    let (_dir, out) = run("false | true\necho $?\ntrue | false\necho $?\n");
    assert_eq!(out.stdout, "0\n1\n");
}

#[test]
fn test_non_executable_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.sh");
    fs::write(&script, "#!/bin/sh\necho nope\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();

    let out = run_in(dir.path(), "./script.sh\necho $?\n");
    assert_eq!(out.stdout, "126\n");
    assert!(out.stderr.contains("./script.sh: Permission denied"));
}

#[test]
fn test_executable_script_by_path() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.sh");
    fs::write(&script, "#!/bin/sh\necho \"ran $1\"\nexit 5\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let out = run_in(dir.path(), "./script.sh arg\necho $?\n");
    assert_eq!(out.stdout, "ran arg\n5\n");
}

#[test]
fn test_directory_as_command() {
    let (_dir, out) = run("mkdir d\n./d\necho $?\n");
    assert_eq!(out.stdout, "126\n");
    assert!(out.stderr.contains("./d: Is a directory"));
}

#[test]
fn test_empty_path_finds_nothing() {
    let (_dir, out) = run("export PATH=\nls\necho $?\n");
    assert_eq!(out.stdout, "127\n");
}

#[test]
fn test_blank_and_empty_lines_keep_status() {
    let (_dir, out) = run("false\n$UNSET_VAR\n\n   \necho $?\n");
    assert_eq!(out.stdout, "1\n");
}

#[test]
fn test_no_prompt_when_not_a_terminal() {
    let (_dir, out) = run("echo only\n");
    assert_eq!(out.stdout, "only\n");
    assert!(!out.stderr.contains("minish$"));
}

#[test]
fn test_invalid_utf8_line_does_not_end_session() {
    let (_dir, out) = run_bytes(b"echo before\necho caf\xe9\necho after\n");
    assert_eq!(out.stdout, "before\ncaf\u{fffd}\nafter\n");
    assert_eq!(out.status, 0);
}

#[test]
fn test_ambiguous_redirect_only_fails_its_stage() {
    let (_dir, out) = run("cat < $NOPE | echo sibling\necho status=$?\necho hi > $NOPE\necho status=$?\n");
    assert_eq!(out.stdout, "sibling\nstatus=0\nstatus=1\n");
    assert!(out.stderr.contains("minish: $NOPE: ambiguous redirect"));
}

#[test]
fn test_ambiguous_redirect_as_last_stage() {
    let (_dir, out) = run("export TWO='a b'\necho x | cat > $TWO\necho status=$?\n");
    assert_eq!(out.stdout, "status=1\n");
    assert!(out.stderr.contains("$TWO: ambiguous redirect"));
}
