//! `talkback models`: list the models this install may use.

use talkback_config::AppConfig;

pub async fn run(remote: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Allowed models (provider: {})", config.default_provider);
    println!("==================================");
    for line in allow_list_lines(&config) {
        println!("{line}");
    }

    if remote {
        config.require_api_key()?;
        let router = talkback_providers::router::build_from_config(&config);
        let provider = router.default().ok_or("No default provider configured")?;
        let served = provider.list_models().await?;

        println!();
        println!("Served by {} ({} models)", provider.name(), served.len());
        for model in &served {
            let note = if config.is_model_allowed(model) { "  (allowed)" } else { "" };
            println!("    {model}{note}");
        }
    }

    Ok(())
}

/// One line per allowed model, the default marked with `*`.
fn allow_list_lines(config: &AppConfig) -> Vec<String> {
    config
        .models
        .iter()
        .map(|model| {
            let marker = if *model == config.default_model { '*' } else { ' ' };
            format!("  {marker} {model}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_marked() {
        let lines = allow_list_lines(&AppConfig::default());
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "  * llama3-8b-8192");
        assert_eq!(lines[2], "    mixtral-8x7b-32768");
    }
}
