//! Hash-password command implementation.

use std::io::BufRead;
use varsclip_core::validation::validate_password;
use varsclip_core::PasswordHasher;

/// Prints the stored form of a password.
///
/// Reads one line from stdin when no password is given.
pub fn run(password: Option<String>, iterations: u32) -> Result<(), Box<dyn std::error::Error>> {
    let password = match password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };
    println!("{}", hash(&password, iterations)?);
    Ok(())
}

fn hash(password: &str, iterations: u32) -> Result<String, Box<dyn std::error::Error>> {
    validate_password(password)?;
    Ok(PasswordHasher::new(iterations).hash(password))
}
