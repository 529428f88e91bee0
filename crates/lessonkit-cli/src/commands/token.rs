//! The `lessonkit token` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use lessonkit_client::config::load_config_from;
use lessonkit_client::token::{mask_token, FileTokenStore, TokenStore};

fn file_store(config_path: Option<PathBuf>) -> Result<FileTokenStore> {
    let config = load_config_from(config_path.as_deref())?;
    let path = config
        .token_file()
        .context("cannot locate a token file: HOME is not set")?;
    Ok(FileTokenStore::new(path))
}

pub async fn set(token: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let token = match token {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read token from stdin")?;
            buf
        }
    };

    let store = file_store(config_path)?;
    store.save(&token).await?;
    println!("Token saved to {}", store.path().display());
    Ok(())
}

pub async fn clear(config_path: Option<PathBuf>) -> Result<()> {
    let store = file_store(config_path)?;
    if store.clear().await? {
        println!("Token removed from {}", store.path().display());
    } else {
        println!("No token stored.");
    }
    Ok(())
}

pub async fn show(config_path: Option<PathBuf>) -> Result<()> {
    let store = file_store(config_path)?;
    match store.token().await? {
        Some(token) => println!("{} ({})", mask_token(&token), store.path().display()),
        None => println!("No token stored."),
    }
    Ok(())
}
