use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use msfs::fs::FileSystem;
use msfs::shell::start_shell;

#[derive(Parser)]
#[command(name = "msfs", about = "Single-image block file system shell")]
struct Cli {
    /// Backing image path
    image: PathBuf,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.image.exists() {
        if !confirm_create() {
            println!("Exiting...");
            return;
        }
        let size = match prompt_size() {
            Some(size) => size,
            None => {
                eprintln!("Invalid disk size");
                process::exit(1);
            }
        };
        format_image(&cli.image, size);
    }

    let mut fs = match FileSystem::mount(&cli.image) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("Failed to mount virtual disk: {}", e);
            process::exit(1);
        }
    };

    println!("{}", "Virtual disk mounted successfully".green());
    start_shell(&mut fs);
}

fn confirm_create() -> bool {
    print!("Virtual disk file does not exist. Create a new one? (y/n): ");
    io::stdout().flush().unwrap();

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y")
}

fn prompt_size() -> Option<u64> {
    print!("Enter disk size in bytes: ");
    io::stdout().flush().unwrap();

    let mut input = String::new();
    io::stdin().read_line(&mut input).ok()?;
    input.trim().parse().ok()
}

fn format_image(path: &Path, size: u64) {
    println!("💾 Formatting virtual disk...");
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("[{bar:40.green/black}] {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    pb.set_position(10);
    match FileSystem::format(path, size) {
        Ok(fs) => {
            // format 返回的实例随 drop 关闭，随后统一走 mount
            drop(fs);
            pb.set_position(100);
            pb.finish_with_message("✅ Disk formatted successfully!");
        }
        Err(e) => {
            pb.abandon();
            eprintln!("Failed to create virtual disk: {}", e);
            process::exit(1);
        }
    }
}
