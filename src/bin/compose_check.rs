use clap::Parser;
use fit_check::config::compose::ComposeFile;
use fit_check::utils::logger;
use std::path::Path;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "compose-check")]
#[command(about = "Check a compose deployment descriptor before handing it to the orchestrator")]
struct Args {
    /// Path to the deployment descriptor
    #[arg(short, long, default_value = "docker-compose.yml")]
    file: String,

    /// Do not require referenced env files to exist
    #[arg(long)]
    skip_env_files: bool,

    /// Print the service startup order
    #[arg(long)]
    order: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

const EXIT_STRUCTURE: u8 = 1;
const EXIT_ENV_FILES: u8 = 2;
const EXIT_UNREADABLE: u8 = 3;

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let compose = match ComposeFile::from_file(&args.file) {
        Ok(compose) => compose,
        Err(e) => {
            eprintln!("❌ Cannot read {}: {}", args.file, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            return ExitCode::from(EXIT_UNREADABLE);
        }
    };
    tracing::debug!("Parsed {} services from {}", compose.services.len(), args.file);

    let mut issues = compose.check();
    if !args.skip_env_files {
        let base_dir = Path::new(&args.file)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        issues.extend(compose.check_env_files(base_dir));
    }
    for issue in &issues {
        let label = if issue.is_env_file() { "warning" } else { "error" };
        println!("{}: {}", label, issue);
    }

    if args.order {
        match compose.startup_order() {
            Ok(order) => {
                for (position, service) in order.iter().enumerate() {
                    println!("{}. {}", position + 1, service);
                }
            }
            Err(e) => tracing::debug!("No startup order: {}", e),
        }
    }

    if issues.iter().any(|issue| !issue.is_env_file()) {
        return ExitCode::from(EXIT_STRUCTURE);
    }
    if !issues.is_empty() {
        return ExitCode::from(EXIT_ENV_FILES);
    }

    println!(
        "✅ {} is valid ({} services, {} volumes)",
        args.file,
        compose.services.len(),
        compose.volumes.len()
    );
    ExitCode::SUCCESS
}
