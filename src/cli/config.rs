use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = writable_config_path();
    write_config(&config_path, &config_content)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// Prefer ~/.config/logship/config.yml, falling back to /etc/logship when the
/// user directory cannot be created.
fn writable_config_path() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logship/config.yml");
        match user_config.parent().map(fs::create_dir_all) {
            Some(Ok(())) => return user_config,
            _ => {
                eprintln!("Warning: could not create {}", home_dir.join(".config/logship").display());
                eprintln!("Falling back to /etc/logship/config.yml");
            }
        }
    }
    PathBuf::from("/etc/logship/config.yml")
}

fn write_config(path: &Path, content: &str) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    let config = crate::config::load_config(&path)?;
    println!("✓ Config is valid");
    println!("  region:  {}", config.region);
    println!("  group:   {}", config.group_name);
    println!(
        "  input:   {}/*.{}",
        config.input_path.display(),
        config.file_extension
    );
    Ok(())
}
