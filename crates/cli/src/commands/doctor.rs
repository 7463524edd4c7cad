//! `conductor doctor`: diagnose setup problems.

use conductor_config::EngineConfig;
use conductor_core::provider::Provider;
use conductor_providers::OpenAiCompatProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Conductor Doctor: System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let config_path = EngineConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file, using defaults (run `conductor config init`)");
    }

    let config = match EngineConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  1 issue found. Fix the configuration and run again.");
            return Ok(());
        }
    };

    let tools = conductor_tools::default_registry();
    println!("  ✅ {} tools registered: {}", tools.len(), tools.names().join(", "));

    if !config.has_api_key() {
        println!("  ⚠️  No API key configured (set CONDUCTOR_API_KEY)");
        issues += 1;
    } else {
        match OpenAiCompatProvider::from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Model service reachable at {}", config.model.base_url),
                Ok(false) => {
                    println!("  ⚠️  Model service at {} answered unhealthy", config.model.base_url);
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Model service check failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Could not build model client: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }
    Ok(())
}
