use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    clap::ValueEnum,
    scrapbook_channels::{JsonFileSource, MessageSource},
    scrapbook_common::RawMessage,
    scrapbook_config::ScrapbookConfig,
    scrapbook_media::{HostTable, Pipeline, classify},
    tracing::debug,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Markdown,
}

/// Resolve a message from a JSON export and print its manifest.
pub async fn handle_extract(
    config: &ScrapbookConfig,
    input: &Path,
    id: Option<&str>,
    format: Format,
) -> Result<()> {
    let source = Arc::new(JsonFileSource::new(input));
    let message_id = match id {
        Some(id) => id.to_string(),
        None => first_message(&source).await?.id,
    };
    debug!(%message_id, input = %input.display(), "extracting");

    let pipeline = Pipeline::from_config(config, source)?;
    let manifest = pipeline
        .extract(&message_id)
        .await
        .with_context(|| format!("extracting message {message_id}"))?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&manifest.to_json())?),
        Format::Markdown => print!("{}", manifest.render_markdown()),
    }
    Ok(())
}

/// Print the references found in a message without resolving them.
pub async fn handle_classify(
    config: &ScrapbookConfig,
    input: &Path,
    id: Option<&str>,
) -> Result<()> {
    let source = JsonFileSource::new(input);
    let message = match id {
        Some(id) => source
            .fetch_message(id)
            .await?
            .with_context(|| format!("message {id} not found in {}", input.display()))?,
        None => first_message(&source).await?,
    };

    let references = classify(&message, &HostTable::new(&config.platforms.hosts));
    println!("{}", serde_json::to_string_pretty(&references)?);
    Ok(())
}

async fn first_message(source: &JsonFileSource) -> Result<RawMessage> {
    source
        .load_all()
        .await?
        .into_iter()
        .next()
        .with_context(|| format!("{} holds no messages", source.path().display()))
}
