use std::path::Path;

use colored::Colorize;

use crate::disk::BLOCK_SIZE;
use crate::fs::FileSystem;

#[derive(Debug)]
pub enum Command {
    Help,
    Clear,
    Usage,
    Ls(String),
    Mkdir(String),
    Rmdir(String),
    Rm(String),
    Link(String, String),
    CopyTo(String, String),
    CopyFrom(String, String),
    Append(String, usize),
    Truncate(String, usize),
    Exit,
}

pub fn execute_command(cmd: &Command, fs: &mut FileSystem) {
    match cmd {
        Command::Help => print_help(),
        Command::Clear => print!("\x1b[2J\x1b[1;1H"),
        Command::Usage => print_usage(fs),
        Command::Ls(path) => match fs.list_directory(path) {
            Ok(entries) if entries.is_empty() => println!("Directory is empty"),
            Ok(entries) => print_listing(path, &entries),
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        Command::Mkdir(path) => match fs.create_directory(path) {
            Ok(()) => println!("{} {}", "✅ Created directory:".green(), path),
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        Command::Rmdir(path) => match fs.remove_directory(path) {
            Ok(()) => println!("{} {}", "🗑️ Removed directory:".yellow(), path),
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        Command::Rm(path) => match fs.remove_file(path) {
            Ok(()) => println!("{} {}", "❌ Removed:".yellow(), path),
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        Command::Link(target, link_path) => match fs.create_link(target, link_path) {
            Ok(()) => println!("{} {} -> {}", "🔗 Link created:".green(), link_path, target),
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        Command::CopyTo(virt, sys) => match fs.copy_to_system(virt, Path::new(sys)) {
            Ok(()) => println!("{} {} -> {}", "📤 Copied:".green(), virt, sys),
            Err(e) => println!("{} {}", "Error:".red(), e),
        },
        Command::CopyFrom(sys, virt) => {
            // 与核心无关的宿主侧检查提前做，给出更直白的提示
            if !Path::new(sys).exists() {
                println!("{} System file does not exist: {}", "Error:".red(), sys);
                return;
            }
            match fs.copy_from_system(Path::new(sys), virt) {
                Ok(()) => println!("{} {} -> {}", "📥 Copied:".green(), sys, virt),
                Err(e) => println!("{} {}", "Error:".red(), e),
            }
        }
        Command::Append(path, bytes) => {
            if *bytes == 0 {
                println!("{} byte count must be positive", "Error:".red());
                return;
            }
            match fs.append_to_file(path, *bytes) {
                Ok(()) => println!("{} {} bytes appended to {}", "✏️".green(), bytes, path),
                Err(e) => println!("{} {}", "Error:".red(), e),
            }
        }
        Command::Truncate(path, bytes) => {
            if *bytes == 0 {
                println!("{} byte count must be positive", "Error:".red());
                return;
            }
            match fs.truncate_file(path, *bytes) {
                Ok(()) => println!("{} {} truncated by {} bytes", "✂️".green(), path, bytes),
                Err(e) => println!("{} {}", "Error:".red(), e),
            }
        }
        Command::Exit => println!("{}", "👋 Exiting msfs shell...".yellow().bold()),
    }
}

fn print_listing(path: &str, entries: &[(String, u32)]) {
    println!("Contents of {}:", path.cyan());
    println!("{:<30}{:>10}", "Name".blue(), "Size (B)".blue());
    println!("{}", "-".repeat(40).bright_black());

    let mut total: u64 = 0;
    for (name, size) in entries {
        println!("{:<30}{:>10}", name, size);
        total += *size as u64;
    }

    println!("{}", "-".repeat(40).bright_black());
    println!("Total size: {} bytes", total);
}

fn print_usage(fs: &FileSystem) {
    let (used, total) = fs.disk_usage();
    let free = total - used;

    println!("{}", "💾 Disk usage".bright_yellow().bold());
    println!("Used:  {} blocks ({} bytes)", used, used as u64 * BLOCK_SIZE as u64);
    println!("Total: {} blocks ({} bytes)", total, total as u64 * BLOCK_SIZE as u64);
    println!("Free:  {} blocks ({} bytes)", free, free as u64 * BLOCK_SIZE as u64);
    println!("Usage: {:.2}%", used as f64 / total as f64 * 100.0);
}

fn print_help() {
    println!("{}", "📘 msfs commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls [path]                      List directory contents
  mkdir <path>                   Create a directory
  rmdir <path>                   Remove an empty directory
  rm <path>                      Remove a file or link
  link <target> <link_path>      Create a hard link
  copyfrom <sys_path> <virt>     Copy a file from the host into the image
  copyto <virt> <sys_path>       Copy a file from the image to the host
  append <path> <bytes>          Append bytes to a file
  truncate <path> <bytes>        Truncate a file by bytes
  usage                          Show disk usage
  clear                          Clear the screen
  help                           Show this help
  exit                           Exit the program
"
        .bright_black()
    );
}
