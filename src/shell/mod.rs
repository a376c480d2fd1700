pub mod command;
pub mod parse;

use std::io::{self, Write};

use crate::fs::FileSystem;
use crate::shell::{command::execute_command, parse::parse_command};

pub fn start_shell(fs: &mut FileSystem) {
    println!("Type 'help' for command list.\n");

    loop {
        print!("msfs> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Error: failed to read input");
            continue;
        }
        if input.is_empty() {
            // EOF，按 exit 处理
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        match parse_command(input) {
            Some(cmd) => {
                execute_command(&cmd, fs);
                if matches!(cmd, command::Command::Exit) {
                    break;
                }
            }
            None => println!("Invalid command. Type 'help' for command list."),
        }
    }

    println!("Unmounting disk, bye!");
}
