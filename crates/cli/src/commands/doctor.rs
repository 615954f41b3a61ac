//! `talkback doctor`: diagnose config, credentials and extraction tools.

use std::process::Stdio;

use talkback_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Talkback Doctor: System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `talkback onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid (model: {})", config.default_model);
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  {} issue(s) found. See above for details.", issues + 1);
            return Ok(());
        }
    };

    let key_present = match config.require_api_key() {
        Ok(_) => {
            println!("  ✅ API key configured");
            true
        }
        Err(e) => {
            println!("  ❌ {e}: set GROQ_API_KEY or api_key in config.toml");
            issues += 1;
            false
        }
    };

    if key_present {
        let router = talkback_providers::router::build_from_config(&config);
        if let Some(provider) = router.default() {
            match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
                Ok(false) => {
                    println!("  ⚠️  Provider '{}' answered but is unhealthy", provider.name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                    issues += 1;
                }
            }
        }
    }

    let extraction = &config.extraction;
    if !extraction.enabled {
        println!("  ⚠️  Attachment extraction disabled in config");
    } else {
        for (bin, flag, purpose) in [
            (&extraction.tesseract_bin, "--version", "image OCR"),
            (&extraction.ffprobe_bin, "-version", "video metadata"),
        ] {
            if tool_available(bin, flag).await {
                println!("  ✅ {bin} found ({purpose})");
            } else {
                println!("  ⚠️  {bin} not found: {purpose} attachments will fail");
                issues += 1;
            }
        }
        println!("  ✅ PDF extraction built in");
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Whether `bin flag` runs and exits successfully.
async fn tool_available(bin: &str, flag: &str) -> bool {
    tokio::process::Command::new(bin)
        .arg(flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        assert!(!tool_available("talkback-no-such-tool", "--version").await);
    }
}
