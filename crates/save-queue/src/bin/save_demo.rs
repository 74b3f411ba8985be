use std::sync::Arc;

use inkwell_core::{Character, Document, Project, Settings};
use inkwell_save_queue::{InMemoryPersistence, SaveQueue, SaveQueueConfig, Shared};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    inkwell_observability::init();

    let config = SaveQueueConfig::from_env()?;
    let persistence = Arc::new(InMemoryPersistence::new());
    let queue = SaveQueue::start(config, persistence.clone())?;

    queue.subscribe(|records| {
        tracing::debug!(operations = records.len(), "queue changed");
        Ok(())
    });

    let project = Project::new("The Long Winter")?.with_genre("fantasy");
    let chapter = Shared::new(Document::new(project.id, "Chapter 1")?);
    let hero = Character::new(project.id, "Mara")?.with_role("protagonist");
    let settings = Settings::new()
        .with("autosave", json!(true))?
        .with("theme", json!("sepia"))?;

    queue.enqueue(project);
    queue.enqueue(chapter.clone());
    queue.enqueue(hero);
    queue.enqueue(settings);

    // Edits made before the worker picks the operation up are saved too.
    chapter.update(|doc| {
        doc.set_content(json!({ "type": "text", "text": "It began with snow." }))
    });

    queue.wait_idle().await?;
    println!("{}", serde_json::to_string_pretty(&queue.statistics())?);
    tracing::info!(writes = persistence.writes(), "demo finished");

    queue.shutdown().await;
    Ok(())
}
