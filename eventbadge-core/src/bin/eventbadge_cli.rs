//! Event Badge CLI
//!
//! Commands: templates, validate, compose, share, register, pending
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure, 1 on other failures

use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use eventbadge_core::{
    ArtifactExporter, BadgeError, Compositor, Config, Connectivity, DirectorySaver, HttpStore,
    IngestError, NoShareFacility, OfflineQueue, PhotoUpload, Poster, RecordPatch, RegistrationPipeline,
    RegistrationRecord, Session, SubmissionPipeline, TemplateRegistry, DEFAULT_TEMPLATE_ID,
    MAX_CANVAS_SIDE,
};

#[derive(Parser)]
#[command(name = "eventbadge-cli")]
#[command(about = "Event Badge CLI - compose badges and submit registrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to templates directory
    #[arg(short, long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Submission endpoint (overrides EVENTBADGE_ENDPOINT_URL)
    #[arg(long)]
    endpoint: Option<String>,

    /// Offline queue directory (overrides EVENTBADGE_QUEUE_DIR)
    #[arg(long)]
    queue_dir: Option<PathBuf>,

    /// Treat the network as unavailable
    #[arg(long)]
    offline: bool,
}

#[derive(Args)]
struct BadgeArgs {
    /// Template ID
    #[arg(short, long, default_value = DEFAULT_TEMPLATE_ID)]
    template: String,

    /// Photo to place on the badge; the placeholder is used when omitted
    #[arg(long)]
    photo: Option<PathBuf>,

    /// Poster image (overrides the template's poster artwork)
    #[arg(long)]
    poster: Option<PathBuf>,

    /// Output width in pixels (defaults to the template's canonical width)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_CANVAS_SIDE)))]
    width: Option<u32>,

    /// Directory the badge file is saved into
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    Templates,

    /// Validate a registration record
    Validate {
        /// JSON payload (RegistrationRecord)
        #[arg(short, long)]
        payload: String,
    },

    /// Compose a badge and save it
    Compose {
        #[command(flatten)]
        badge: BadgeArgs,

        /// Registrant name used in the file name
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// Compose a badge and share it, saving it when sharing is unavailable
    Share {
        #[command(flatten)]
        badge: BadgeArgs,

        /// Registrant name used in the file name
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// Validate, compose, save and submit a registration
    Register {
        #[command(flatten)]
        badge: BadgeArgs,

        /// JSON payload (RegistrationRecord)
        #[arg(short, long)]
        payload: String,
    },

    /// List registrations waiting in the offline queue
    Pending,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => return failure(&e.to_string()),
    };
    if cli.endpoint.is_some() {
        config.endpoint_url = cli.endpoint.clone();
    }
    if let Some(dir) = &cli.queue_dir {
        config.queue_dir = dir.clone();
    }
    if cli.offline {
        config.start_offline = true;
    }

    // Load templates
    let registry = match TemplateRegistry::load_from_dir(&cli.templates_dir) {
        Ok(r) => r,
        Err(e) => return failure(&format!("Failed to load templates: {}", e)),
    };

    let width = match &cli.command {
        Commands::Compose { badge, .. } | Commands::Share { badge, .. } | Commands::Register { badge, .. } => {
            badge.width
        }
        _ => None,
    };
    let pipeline = match build_pipeline(registry, &config, width) {
        Ok(p) => p,
        Err(e) => return failure(&e),
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = pipeline
                .list_templates()
                .iter()
                .map(|t| json!({
                    "id": t.id,
                    "name": t.name,
                    "version": t.template_version,
                    "aspect_ratio": t.aspect_ratio,
                    "format": t.export.format,
                    "deprecated": t.deprecated,
                }))
                .collect();
            println!("{:#}", json!(templates));
            ExitCode::SUCCESS
        }

        Commands::Validate { payload } => {
            let record: RegistrationRecord = match serde_json::from_str(&payload) {
                Ok(r) => r,
                Err(e) => return failure(&format!("Invalid payload: {}", e)),
            };
            let result = pipeline.validate_record(&record);
            println!("{:#}", json!(result));
            if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2) // Validation failure
            }
        }

        Commands::Compose { badge, name } => {
            let mut session = Session::new(Connectivity::new(!config.start_offline));
            session.update_record(RecordPatch { name: Some(name), ..Default::default() });
            if let Err(e) = compose(&pipeline, &mut session, &badge).await {
                return badge_failure(&e);
            }
            let exporter = build_exporter(&badge.out_dir);
            let Some(artifact) = session.badge() else {
                return failure("No badge produced");
            };
            match exporter.download(artifact, &session.record().name) {
                Ok(path) => {
                    println!("{:#}", json!({ "success": true, "badge": artifact, "path": path }));
                    ExitCode::SUCCESS
                }
                Err(e) => badge_failure(&e.into()),
            }
        }

        Commands::Share { badge, name } => {
            let mut session = Session::new(Connectivity::new(!config.start_offline));
            session.update_record(RecordPatch { name: Some(name), ..Default::default() });
            if let Err(e) = compose(&pipeline, &mut session, &badge).await {
                return badge_failure(&e);
            }
            let exporter = build_exporter(&badge.out_dir);
            let Some(artifact) = session.badge() else {
                return failure("No badge produced");
            };
            match exporter.share(artifact, &session.record().name) {
                Ok(outcome) => {
                    println!("{:#}", json!({ "success": true, "share": outcome }));
                    ExitCode::SUCCESS
                }
                Err(e) => badge_failure(&e.into()),
            }
        }

        Commands::Register { badge, payload } => {
            let record: RegistrationRecord = match serde_json::from_str(&payload) {
                Ok(r) => r,
                Err(e) => return failure(&format!("Invalid payload: {}", e)),
            };
            let mut session = Session::new(Connectivity::new(!config.start_offline));
            session.update_record(record.into());
            if let Err(e) = load_photo(&mut session, badge.photo.as_deref()).await {
                return badge_failure(&e);
            }
            let poster = match badge.poster.as_deref().map(Poster::from_path).transpose() {
                Ok(p) => p,
                Err(e) => return badge_failure(&e.into()),
            };

            let completion = match pipeline
                .complete_registration(&mut session, &badge.template, poster.as_ref())
                .await
            {
                Ok(c) => c,
                Err(e) => return badge_failure(&e),
            };

            let exporter = build_exporter(&badge.out_dir);
            let path = match exporter.download(&completion.badge, &session.record().name) {
                Ok(p) => p,
                Err(e) => return badge_failure(&e.into()),
            };
            println!(
                "{:#}",
                json!({
                    "success": true,
                    "badge": completion.badge,
                    "path": path,
                    "submission": completion.submission,
                    "notice": completion.submission.user_notice(),
                })
            );
            ExitCode::SUCCESS
        }

        Commands::Pending => match pipeline.submission().queue().entries() {
            Ok(entries) => {
                println!("{:#}", json!(entries));
                ExitCode::SUCCESS
            }
            Err(e) => failure(&e.to_string()),
        },
    }
}

fn build_pipeline(
    registry: TemplateRegistry,
    config: &Config,
    width: Option<u32>,
) -> Result<RegistrationPipeline, String> {
    let store = HttpStore::from_config(config).map_err(|e| e.to_string())?;
    let submission = SubmissionPipeline::new(Box::new(store), OfflineQueue::new(&config.queue_dir));
    let compositor = width.map_or_else(Compositor::new, Compositor::with_width);
    Ok(RegistrationPipeline::new(registry, compositor, submission))
}

fn build_exporter(out_dir: &Path) -> ArtifactExporter {
    ArtifactExporter::new(Box::new(DirectorySaver::new(out_dir)), Box::new(NoShareFacility))
}

async fn load_photo(session: &mut Session, path: Option<&Path>) -> Result<(), BadgeError> {
    match path {
        Some(path) => {
            let upload = PhotoUpload::from_path(path).map_err(IngestError::Read)?;
            session.ingest_photo_async(upload).await?;
        }
        None => session.skip_photo(),
    }
    Ok(())
}

async fn compose(
    pipeline: &RegistrationPipeline,
    session: &mut Session,
    badge: &BadgeArgs,
) -> Result<(), BadgeError> {
    load_photo(session, badge.photo.as_deref()).await?;
    let poster = badge.poster.as_deref().map(Poster::from_path).transpose()?;
    pipeline.generate_badge(session, &badge.template, poster.as_ref())?;
    Ok(())
}

fn failure(message: &str) -> ExitCode {
    println!("{}", json!({ "success": false, "error": message }));
    ExitCode::FAILURE
}

fn badge_failure(e: &BadgeError) -> ExitCode {
    println!(
        "{}",
        json!({ "success": false, "error": e.to_string(), "message": e.user_message() })
    );
    match e {
        BadgeError::Validation(_) | BadgeError::Ingest(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
