use anyhow::{Context, Result};

use affinity::config::Config;
use affinity::model::{ItemId, NewItem};
use affinity::server::ItemView;

pub fn add(config: &Config, id: ItemId, author: String, text: String) -> Result<()> {
    let service = super::open_service(config)?;
    let item = service
        .create_item(NewItem {
            id,
            author_id: author,
            text,
            created_at: None,
            approve_count: 0,
            reject_count: 0,
            comment_count: 0,
        })
        .with_context(|| format!("Failed to add item {}", id))?;

    println!("Added item {} ({} dimensions)", item.id, item.embedding.len());
    Ok(())
}

pub fn show(config: &Config, id: ItemId) -> Result<()> {
    let service = super::open_service(config)?;
    let item = service.get_item(id)?;
    println!("{}", serde_json::to_string_pretty(&ItemView::from(item.as_ref()))?);
    Ok(())
}
