use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Prefer ~/.config/logtap/config.yml, fall back to /etc/logtap/config.yml
    let user_config = dirs::home_dir().and_then(|home_dir| {
        let user_config = home_dir.join(".config/logtap/config.yml");
        let parent = user_config.parent()?;
        match fs::create_dir_all(parent) {
            Ok(()) => Some(user_config),
            Err(_) => {
                eprintln!("Warning: Could not create directory {}", parent.display());
                eprintln!("Falling back to /etc/logtap/config.yml");
                None
            }
        }
    });

    let config_path = user_config.unwrap_or_else(|| PathBuf::from("/etc/logtap/config.yml"));

    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout to print the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}
