use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scriptor::anthropic::AnthropicClient;
use scriptor::batch::load_jobs;
use scriptor::cli::{Cli, Command};
use scriptor::config::ScriptorConfig;
use scriptor::error::ScriptorError;
use scriptor::orchestrator::{Collaborators, ContentOrchestrator, CreateContentRequest};
use scriptor::persist::{Notifier, WebhookNotifier};
use scriptor::ui::{self, ConsoleNotifier};
use scriptor::validation::{Detector, HttpDetector};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = ScriptorConfig::load_from(&cli.config)?;
    if let Some(model) = cli.model {
        config.model = model.api_id().to_string();
    }
    if let Some(retries) = cli.max_retries {
        config.retry.max_attempts = retries.saturating_add(1);
    }

    match cli.command {
        Command::Config => {
            let rendered = toml::to_string_pretty(&config).context("failed to render config")?;
            println!("{rendered}");
        }
        Command::Create {
            topic,
            platform,
            context,
            style,
            thinking,
            publish_date,
            json,
        } => {
            let console = Arc::new(ConsoleNotifier::start(&format!("Writing about: {topic}")));
            let orchestrator = build(config, console.clone())?;

            let mut request = CreateContentRequest::new(platform.into(), topic);
            request.context = context;
            request.style = style;
            request.thinking = thinking;
            request.publish_date = publish_date;

            let response = orchestrator.create_content(request).await;
            console.finish();
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                ui::print_response(&response);
            }
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Command::Batch { file, json } => {
            let jobs = load_jobs(&file)?;
            if jobs.is_empty() {
                return Err(ScriptorError::NoJobs(file.display().to_string()).into());
            }
            let console = Arc::new(ConsoleNotifier::start(&format!(
                "Running {} job(s) from {}",
                jobs.len(),
                file.display()
            )));
            let orchestrator = build(config, console.clone())?;

            let report = orchestrator.run_batch(jobs).await;
            console.finish();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ui::print_report(&report);
            }
        }
    }

    Ok(())
}

fn build(
    config: ScriptorConfig,
    console: Arc<ConsoleNotifier>,
) -> Result<ContentOrchestrator<AnthropicClient>> {
    if config.api_key.is_empty() {
        bail!("ANTHROPIC_API_KEY is not set (environment or api_key in the config file)");
    }
    let client = AnthropicClient::new(config.api_key.clone())?;

    let mut collaborators = Collaborators::offline();
    collaborators.detector = HttpDetector::from_config(&config.detector)?
        .map(|d| Arc::new(d) as Arc<dyn Detector>);
    collaborators.notifier = match config.notify.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            Arc::new(WebhookNotifier::new(url)?) as Arc<dyn Notifier>
        }
        _ => console as Arc<dyn Notifier>,
    };

    Ok(ContentOrchestrator::new(
        Arc::new(client),
        Arc::new(config),
        collaborators,
    )?)
}
