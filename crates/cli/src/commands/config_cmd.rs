//! `conductor config`: configuration management commands.

use conductor_config::EngineConfig;

/// Non-fatal problems worth pointing out.
fn warnings(config: &EngineConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set CONDUCTOR_API_KEY or OPENAI_API_KEY)".to_string());
    }
    if config.model.fallback.is_empty() || config.model.fallback == config.model.primary {
        warnings.push("No distinct fallback model; first-call failures degrade immediately".into());
    }
    if config.pipeline.max_response_chars < config.sanitizer.min_length {
        warnings.push("pipeline.max_response_chars is below sanitizer.min_length".into());
    }
    if config.auto_trigger.enabled
        && !config.auto_trigger.weather
        && !config.auto_trigger.search
    {
        warnings.push("auto_trigger is enabled but both weather and search are off".into());
    }
    warnings
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match EngineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Provider:        {}", config.model.provider);
    println!("   Base URL:        {}", config.model.base_url);
    println!("   Model:           {}", config.model.primary);
    println!("   Fallback:        {}", config.model.fallback);
    println!("   Max iterations:  {}", config.agent.max_iterations);
    println!("   Deadline:        {}s", config.pipeline.request_timeout_secs);
    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let mut value = toml::Value::try_from(&config)?;
    if let Some(table) = value.as_table_mut()
        && table.contains_key("api_key")
    {
        table.insert("api_key".into(), toml::Value::String("[REDACTED]".into()));
    }
    println!("{}", toml::to_string_pretty(&value)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", EngineConfig::config_dir().join("config.toml").display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = EngineConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        println!("  Config already exists: {}", config_path.display());
        return Ok(());
    }
    std::fs::create_dir_all(&config_dir)?;
    std::fs::write(&config_path, EngineConfig::default_toml())?;
    println!("✅ Created {}", config_path.display());
    println!("   Set CONDUCTOR_API_KEY, or add api_key to the file.");
    Ok(())
}
