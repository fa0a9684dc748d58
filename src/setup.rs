//! Interactive first-run setup: choose a model tier and download it.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::info;

use crate::error::ModelError;
use crate::model::catalog::{self, TierInfo};
use crate::model::ModelManager;

/// Run the interactive setup flow.
///
/// Returns `Ok(true)` when a tier ends up selected, `Ok(false)` when the
/// user cancels. Download and disk-space failures return an error; the
/// persisted configuration is left untouched in every failure path.
///
/// # Errors
/// Returns error on download failure, insufficient disk space, or stdin
/// read failure.
pub fn run(manager: &ModelManager) -> Result<bool> {
    println!("\n=== ScribeKey Setup ===");
    println!("This setup will help you choose and download a transcription model.");

    print_model_table();

    let stdin = io::stdin();
    let Some(tier) = prompt_for_tier(&mut stdin.lock())? else {
        info!("setup cancelled by user");
        return Ok(false);
    };

    if manager.locate_model(tier.name).is_some() {
        println!("\nModel {} is already downloaded.", tier.name);
        manager.select_tier(tier.name)?;
        println!("Setup completed successfully!");
        return Ok(true);
    }

    let (has_space, message) = manager.check_disk_space(tier.name)?;
    if !has_space {
        return Err(ModelError::InsufficientDiskSpace(message).into());
    }

    println!("\nDownloading {} model...", tier.name);
    println!("This may take a while depending on your internet connection.");
    print!("Progress: ");
    io::stdout().flush().ok();

    let mut last_decile = 0u32;
    manager.download_tier(tier.name, |progress| {
        let decile = (progress * 10.0) as u32;
        if decile > last_decile {
            last_decile = decile;
            print!(".");
            io::stdout().flush().ok();
        }
    })?;
    println!();

    manager.select_tier(tier.name)?;
    println!("\nSetup completed successfully!");
    Ok(true)
}

fn print_model_table() {
    println!("\nAvailable models:");
    println!("{}", "-".repeat(60));
    println!("{:<3} {:<8} {:<8} {:<12} {:<10}", "#", "Model", "Size", "Speed", "Accuracy");
    println!("{}", "-".repeat(60));

    for (idx, tier) in catalog::TIERS.iter().enumerate() {
        println!(
            "{:<3} {:<8} {:<8} {:<12} {:<10}",
            idx + 1,
            tier.name,
            format_size(tier.size_mb),
            tier.speed,
            tier.accuracy
        );
    }

    println!("{}", "-".repeat(60));
    println!("Note: larger models provide better accuracy but need more processing power.");
}

fn format_size(size_mb: u64) -> String {
    if size_mb < 1000 {
        format!("{size_mb}MB")
    } else {
        format!("{:.1}GB", size_mb as f64 / 1000.0)
    }
}

/// Prompt until a valid numeric choice or `q` arrives. `None` = cancelled.
fn prompt_for_tier(input: &mut impl BufRead) -> Result<Option<&'static TierInfo>> {
    loop {
        print!("\nPlease select a model (1-{}), or 'q' to quit: ", catalog::TIERS.len());
        io::stdout().flush().ok();

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            // EOF behaves like quitting
            return Ok(None);
        }
        let choice = line.trim();

        if choice.eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        match choice.parse::<usize>() {
            Ok(n) if (1..=catalog::TIERS.len()).contains(&n) => {
                return Ok(Some(&catalog::TIERS[n - 1]));
            }
            Ok(_) => println!("Please enter a number between 1 and {}", catalog::TIERS.len()),
            Err(_) => println!("Please enter a valid number"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_accepts_valid_choice() {
        let mut input = "3\n".as_bytes();
        let tier = prompt_for_tier(&mut input).unwrap();
        assert_eq!(tier.unwrap().name, "small");
    }

    #[test]
    fn test_prompt_quit() {
        let mut input = "q\n".as_bytes();
        assert!(prompt_for_tier(&mut input).unwrap().is_none());

        let mut input = "Q\n".as_bytes();
        assert!(prompt_for_tier(&mut input).unwrap().is_none());
    }

    #[test]
    fn test_prompt_retries_until_valid() {
        let mut input = "0\nseven\n99\n5\n".as_bytes();
        let tier = prompt_for_tier(&mut input).unwrap();
        assert_eq!(tier.unwrap().name, "large");
    }

    #[test]
    fn test_prompt_eof_cancels() {
        let mut input = "".as_bytes();
        assert!(prompt_for_tier(&mut input).unwrap().is_none());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(150), "150MB");
        assert_eq!(format_size(3000), "3.0GB");
        assert_eq!(format_size(6000), "6.0GB");
    }
}
