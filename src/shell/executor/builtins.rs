use std::env;
use std::io::Write;
use std::path::PathBuf;

use log::debug;

use crate::shell::error::{describe_io_error, EXIT_FAILURE, EXIT_MISUSE, EXIT_SUCCESS};
use crate::shell::session::Session;
use crate::shell::variables::is_valid_name;

const BUILTINS: [&str; 7] = ["echo", "cd", "pwd", "export", "unset", "env", "exit"];

/// 只按 argv[0] 精确匹配，区分大小写
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// 在当前进程内执行内建命令，返回退出码
pub fn run_builtin(
    args: &[String],
    session: &mut Session,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> i32 {
    let Some(name) = args.first() else {
        return EXIT_SUCCESS;
    };
    let rest = &args[1..];
    debug!("执行内建命令: {}", shell_words::join(args));

    let status = match name.as_str() {
        "echo" => builtin_echo(rest, out),
        "cd" => builtin_cd(rest, session, out, err),
        "pwd" => builtin_pwd(out, err),
        "export" => builtin_export(rest, session, out, err),
        "unset" => builtin_unset(rest, session, err),
        "env" => builtin_env(rest, session, out, err),
        "exit" => builtin_exit(rest, session, err),
        _ => {
            report(err, name, "not a shell builtin");
            EXIT_FAILURE
        }
    };

    if let Err(e) = out.flush() {
        report(err, name, &format!("write error: {}", describe_io_error(&e)));
        return EXIT_FAILURE;
    }
    status
}

fn report(err: &mut dyn Write, context: &str, message: &str) {
    let _ = writeln!(err, "minish: {}: {}", context, message);
}

fn write_status(result: std::io::Result<()>, err: &mut dyn Write, context: &str) -> i32 {
    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            report(err, context, &format!("write error: {}", describe_io_error(&e)));
            EXIT_FAILURE
        }
    }
}

fn builtin_echo(args: &[String], out: &mut dyn Write) -> i32 {
    let (newline, words) = match args.first() {
        Some(flag) if flag == "-n" => (false, &args[1..]),
        _ => (true, args),
    };
    let mut line = words.join(" ");
    if newline {
        line.push('\n');
    }
    match out.write_all(line.as_bytes()) {
        Ok(()) => EXIT_SUCCESS,
        // 管道另一端已关闭时 echo 静默失败
        Err(_) => EXIT_FAILURE,
    }
}

fn builtin_cd(
    args: &[String],
    session: &mut Session,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> i32 {
    if args.len() > 1 {
        report(err, "cd", "too many arguments");
        return EXIT_FAILURE;
    }

    let (target, print_target) = match args.first().map(String::as_str) {
        None => match session.var("HOME") {
            Some(home) => (home.to_string(), false),
            None => {
                report(err, "cd", "HOME not set");
                return EXIT_FAILURE;
            }
        },
        Some("-") => match session.var("OLDPWD") {
            Some(old) => (old.to_string(), true),
            None => {
                report(err, "cd", "OLDPWD not set");
                return EXIT_FAILURE;
            }
        },
        Some(path) => (path.to_string(), false),
    };

    let previous = env::current_dir()
        .map(|dir| dir.to_string_lossy().to_string())
        .ok()
        .or_else(|| session.var("PWD").map(str::to_string));

    if let Err(e) = env::set_current_dir(PathBuf::from(&target)) {
        report(err, &format!("cd: {}", target), &describe_io_error(&e));
        return EXIT_FAILURE;
    }

    let current = env::current_dir()
        .map(|dir| dir.to_string_lossy().to_string())
        .unwrap_or(target);
    if let Some(previous) = previous {
        session.env.set("OLDPWD", previous);
    }
    session.env.set("PWD", current.clone());
    debug!("切换目录到 {}", current);

    if print_target {
        return write_status(writeln!(out, "{}", current), err, "cd");
    }
    EXIT_SUCCESS
}

fn builtin_pwd(out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    match env::current_dir() {
        Ok(dir) => write_status(writeln!(out, "{}", dir.display()), err, "pwd"),
        Err(e) => {
            report(err, "pwd", &describe_io_error(&e));
            EXIT_FAILURE
        }
    }
}

fn builtin_export(
    args: &[String],
    session: &mut Session,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> i32 {
    if args.is_empty() {
        return list_environment(session, out, err, "export");
    }

    let mut status = EXIT_SUCCESS;
    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg.as_str(), None),
        };
        if !is_valid_name(name) {
            report(err, "export", &format!("`{}': not a valid identifier", arg));
            status = EXIT_FAILURE;
            continue;
        }
        // 不带值的 `export NAME` 不新建条目
        if let Some(value) = value {
            session.env.set(name, value);
        }
    }
    status
}

fn builtin_unset(args: &[String], session: &mut Session, err: &mut dyn Write) -> i32 {
    let mut status = EXIT_SUCCESS;
    for name in args {
        if !is_valid_name(name) {
            report(err, "unset", &format!("`{}': not a valid identifier", name));
            status = EXIT_FAILURE;
            continue;
        }
        session.env.remove(name);
    }
    status
}

fn builtin_env(
    args: &[String],
    session: &Session,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> i32 {
    if !args.is_empty() {
        report(err, "env", "too many arguments");
        return EXIT_FAILURE;
    }
    list_environment(session, out, err, "env")
}

fn list_environment(
    session: &Session,
    out: &mut dyn Write,
    err: &mut dyn Write,
    context: &str,
) -> i32 {
    let mut listing = String::new();
    for (name, value) in session.env.iter() {
        listing.push_str(name);
        listing.push('=');
        listing.push_str(value);
        listing.push('\n');
    }
    write_status(out.write_all(listing.as_bytes()), err, context)
}

fn parse_exit_code(arg: &str) -> Option<i32> {
    let value: i64 = arg.trim().parse().ok()?;
    Some(value.rem_euclid(256) as i32)
}

fn builtin_exit(args: &[String], session: &mut Session, err: &mut dyn Write) -> i32 {
    let status = match args {
        [] => session.exit_status,
        [arg] => match parse_exit_code(arg) {
            Some(code) => code,
            None => {
                report(err, "exit", &format!("{}: numeric argument required", arg));
                return EXIT_MISUSE;
            }
        },
        [first, ..] => {
            if parse_exit_code(first).is_none() {
                report(err, "exit", &format!("{}: numeric argument required", first));
                return EXIT_MISUSE;
            }
            report(err, "exit", "too many arguments");
            return EXIT_FAILURE;
        }
    };
    session.should_exit = true;
    status
}
