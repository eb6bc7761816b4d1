use clap::Parser;
use fit_check::config::env_file;
use fit_check::utils::error::ErrorSeverity;
use fit_check::utils::{logger, validation::Validate};
use fit_check::ServeArgs;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // env 檔案需在解析參數前套用，讓 `env = ...` 的參數讀得到
    let env_path = ServeArgs::parse().env_file;
    let env_result = if Path::new(&env_path).is_file() {
        Some(env_file::apply_env_file(&env_path))
    } else {
        None
    };
    let args = ServeArgs::parse();

    logger::init_from_env(args.verbose);
    tracing::info!("Starting fit-check");

    match env_result {
        Some(Ok(applied)) => tracing::info!("Loaded {} variables from {}", applied, env_path),
        Some(Err(e)) => tracing::warn!("Could not read env file {}: {}", env_path, e),
        None => tracing::debug!("No env file at {}", env_path),
    }

    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    if let Err(e) = settings.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = fit_check::serve(settings).await {
        tracing::error!(
            "fit-check failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}
