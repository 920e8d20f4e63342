use clap::Parser;
use ext_webservices::utils::logger;
use ext_webservices::{
    build_dist_engine, DistEngine, DistTemplate, ExecutionMode, PackageManifest, WsError,
    COPY_FILES_TARGET,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cstbox-dist")]
#[command(about = "Stages the ext-webservices files for Debian packaging")]
struct Args {
    /// Target to run
    #[arg(default_value = COPY_FILES_TARGET)]
    target: String,

    /// Module source directory
    #[arg(short, long, default_value = ".")]
    module_dir: PathBuf,

    /// Directory holding dist-template.toml
    #[arg(long, env = "CSTBOX_DEVEL_HOME")]
    devel_home: Option<PathBuf>,

    /// Run the copy targets concurrently
    #[arg(long)]
    parallel: bool,

    /// List the module targets and exit
    #[arg(long)]
    list: bool,

    /// Enable verbose output, including the execution summary
    #[arg(short, long)]
    verbose: bool,
}

async fn run(args: &Args, manifest: PackageManifest) -> Result<(), WsError> {
    let home = DistTemplate::resolve_devel_home(args.devel_home.as_deref())?;
    tracing::info!("📁 Using build template from {}", home.display());
    let template = DistTemplate::load(&home)?;

    let mode = if args.parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };
    let mut engine = build_dist_engine(manifest, &template, &home, &args.module_dir)?.with_mode(mode);

    let reports = if args.target == COPY_FILES_TARGET {
        let aggregate = engine.copy_files().await?;
        if args.verbose {
            let summary = DistEngine::get_execution_summary(&aggregate);
            println!("📊 Execution summary:");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        aggregate.reports
    } else {
        engine.run_target(&args.target).await?
    };

    for report in &reports {
        println!(
            "✅ {}: {} copied, {} up to date -> {}",
            report.target,
            report.copied,
            report.skipped,
            report.destination.display()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let manifest = PackageManifest::declared();

    if args.list {
        for line in manifest.listing() {
            println!("{}", line);
        }
        return Ok(());
    }

    if let Err(e) = run(&args, manifest).await {
        tracing::error!(
            "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
            args.target,
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        std::process::exit(e.severity().exit_code());
    }

    Ok(())
}
