use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "clear" => Some(Command::Clear),
        "usage" => Some(Command::Usage),
        "exit" => Some(Command::Exit),
        "ls" => Some(Command::Ls(args.first().unwrap_or(&"/").to_string())),
        "mkdir" => args.first().map(|&path| Command::Mkdir(path.to_string())),
        "rmdir" => args.first().map(|&path| Command::Rmdir(path.to_string())),
        "rm" => args.first().map(|&path| Command::Rm(path.to_string())),
        "link" => {
            if args.len() >= 2 {
                Some(Command::Link(args[0].to_string(), args[1].to_string()))
            } else {
                None
            }
        }
        "copyto" => {
            if args.len() >= 2 {
                Some(Command::CopyTo(args[0].to_string(), args[1].to_string()))
            } else {
                None
            }
        }
        "copyfrom" => {
            if args.len() >= 2 {
                Some(Command::CopyFrom(args[0].to_string(), args[1].to_string()))
            } else {
                None
            }
        }
        "append" => {
            if args.len() >= 2 {
                let bytes = args[1].parse().ok()?;
                Some(Command::Append(args[0].to_string(), bytes))
            } else {
                None
            }
        }
        "truncate" => {
            if args.len() >= 2 {
                let bytes = args[1].parse().ok()?;
                Some(Command::Truncate(args[0].to_string(), bytes))
            } else {
                None
            }
        }
        _ => None,
    }
}
