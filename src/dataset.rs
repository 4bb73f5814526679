//! `oaih dataset <name>`: show one catalog dataset.

use anyhow::{bail, Result};

use oai_harvest_core::catalog::Catalog;

use crate::config::Config;
use crate::db;
use crate::sqlite_catalog::SqliteCatalog;

pub async fn run_dataset(config: &Config, name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let catalog = SqliteCatalog::new(pool.clone());
    let dataset = catalog.get_dataset(name).await;
    pool.close().await;

    let dataset = match dataset? {
        Some(d) => d,
        None => bail!("dataset not found: {}", name),
    };

    println!("--- Dataset ---");
    println!("name:         {}", dataset.name);
    println!("id:           {}", dataset.id);
    println!("title:        {}", dataset.fields.title);
    if !dataset.fields.author.is_empty() {
        println!("author:       {}", dataset.fields.author);
    }
    if !dataset.fields.author_email.is_empty() {
        println!("author_email: {}", dataset.fields.author_email);
    }
    if !dataset.fields.url.is_empty() {
        println!("url:          {}", dataset.fields.url);
    }
    println!("tags:         {}", dataset.tags.join(", "));
    println!("collections:  {}", dataset.collections.join(", "));
    println!();

    if !dataset.fields.notes.is_empty() {
        println!("--- Notes ---");
        println!("{}", dataset.fields.notes);
        println!();
    }

    println!("--- Resources ({}) ---", dataset.resources.len());
    for resource in &dataset.resources {
        println!("{}  {}", resource.url, resource.name);
    }
    println!();

    println!("--- Extras ({}) ---", dataset.fields.extras.len());
    for (key, value) in &dataset.fields.extras {
        println!("{}: {}", key, value);
    }

    Ok(())
}
