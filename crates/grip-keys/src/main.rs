use std::env;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// One-shot digest generator: takes the password as the first argument or
/// prompts for it, prints the digest and a ready-to-paste config line.
fn main() -> Result<()> {
    let password = match env::args().nth(1) {
        Some(arg) => arg,
        None => prompt()?,
    };
    let digest = grip_keys::hash_password(&password)?;
    println!("{digest}");
    println!();
    println!("Add this to your grip config:");
    println!("access_hash = \"{digest}\"");
    Ok(())
}

fn prompt() -> Result<String> {
    print!("Password: ");
    io::stdout().flush().context("flushing prompt")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
