use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use cellchat::composer::MentionComposer;
use cellchat::controllers::{ChatController, ChatEvent};
use cellchat::models::ActiveDatasets;
use cellchat::repositories::{ConversationJsonStore, ConversationStore};
use cellchat::services::{DatasetCatalog, HttpChatBackend, InMemoryDatasetCatalog};

/// Terminal front-end for the chat core. Lines starting with `/` are
/// commands; anything else is composed (with `@file` mention handling) and
/// sent to the backend.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let base_url = std::env::var("CELLCHAT_BACKEND_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    info!(backend = %base_url, "Starting cellchat");

    let backend = Arc::new(HttpChatBackend::new(base_url));
    let store = Arc::new(ConversationJsonStore::new()?);
    let active = ActiveDatasets::new();
    let catalog: Arc<dyn DatasetCatalog> = Arc::new(InMemoryDatasetCatalog::new());

    let controller = ChatController::new(store.clone(), backend, active.clone());
    controller.set_on_event(|event| {
        if let ChatEvent::TitleChanged { title, .. } = event {
            info!(title = %title, "Conversation titled");
        }
    });
    let mut composer = MentionComposer::new(active.clone(), catalog.clone());

    println!("cellchat - /upload <path>, /new, /list, /load <id>, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(path) = line.strip_prefix("/upload ") {
            match std::fs::read(path) {
                Ok(bytes) => {
                    let name = std::path::Path::new(path)
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(path)
                        .to_string();
                    let content_type = if name.ends_with(".json") {
                        "application/json"
                    } else {
                        "application/octet-stream"
                    };
                    match catalog.upload(&name, content_type, &bytes) {
                        Ok(dataset) => {
                            active.add(dataset.clone());
                            composer.sync_external_datasets();
                            println!("attached {}", dataset.name);
                        }
                        Err(e) => error!(error = %e, "Upload rejected"),
                    }
                }
                Err(e) => error!(error = %e, path = %path, "Could not read file"),
            }
            continue;
        }

        match line.as_str() {
            "/quit" => break,
            "/new" => {
                controller.start_new_chat();
                continue;
            }
            "/list" => {
                match store.list().await {
                    Ok(records) => {
                        for record in records {
                            println!("{}  {}", record.id, record.title);
                        }
                    }
                    Err(e) => error!(error = %e, "List failed"),
                }
                continue;
            }
            _ => {}
        }
        if let Some(id) = line.strip_prefix("/load ") {
            if let Err(e) = controller.load_conversation(id.trim()).await {
                error!(error = %e, "Load failed");
            }
            continue;
        }

        composer.paste(&line);
        if !composer.can_send(controller.is_new_chat()) {
            warn!("Attach one .h5ad and one .json dataset before the first message");
            continue;
        }
        if let Some(submission) = composer.submit() {
            controller
                .send_message(submission.text, submission.images)
                .await;
            if let Some(reply) = controller.messages().last() {
                println!("{}", reply.content);
            }
        }
    }

    Ok(())
}
