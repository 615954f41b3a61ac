//! `talkback onboard`: first-time setup.

use std::path::Path;

use talkback_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("💬 Talkback: First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config_path = config_dir.join("config.toml");
    if write_default_config(&config_path)? {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Export GROQ_API_KEY, or set api_key in {}", config_path.display());
        println!("   2. Optional: install tesseract and ffprobe for image and video attachments");
        println!("   3. Run: talkback chat\n");
    } else {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    println!("🎉 Setup complete! Run `talkback doctor` to check everything.\n");

    Ok(())
}

/// Write the default config unless a file is already there.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_once_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.default_model, AppConfig::default().default_model);
    }
}
