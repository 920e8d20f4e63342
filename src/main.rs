use clap::Parser;
use ext_webservices::utils::{logger, validation::Validate};
use ext_webservices::{builtin_registry, AppServer, CliConfig, ServerConfig};

/// Exit code when the configuration cannot be loaded or is invalid.
const EXIT_CONFIG: i32 = 1;
/// Exit code when the server could not be started.
const EXIT_START: i32 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // the file may turn debug mode on, so it is read before logging starts
    let loaded = ServerConfig::load_or_default(&cli.config).map(|mut config| {
        cli.apply_overrides(&mut config);
        config
    });
    let level = match &loaded {
        Ok(config) => cli.effective_log_level(config),
        Err(_) => cli.effective_log_level(&ServerConfig::default()),
    };
    if cli.json_logs {
        logger::init_json_logger(level);
    } else {
        logger::init_with_level(level);
    }

    tracing::info!("Starting CSTBox web services");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(EXIT_CONFIG);
    }
    tracing::debug!("server config: {:?}", config.server);

    let mut server = AppServer::new(&config.server.url_base, config.server.port, config.server.debug)
        .with_registry(builtin_registry());

    let outcome = match &config.server.services_home {
        Some(home) => server.set_services_home(home),
        None => Ok(()),
    };
    let outcome = match outcome {
        Ok(()) => server.start(config.custom_settings()).await,
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        tracing::error!("aborting server start");
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(EXIT_START);
    }

    Ok(())
}
