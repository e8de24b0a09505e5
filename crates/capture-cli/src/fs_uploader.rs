//! A minimal stand-in for the blob store collaborator (`spec.md` §1 keeps
//! it explicitly out of scope). Downloads the Telegram file and writes it
//! under a content-addressed path on local disk, the way `mqk-audit`
//! content-addresses audit events with `sha2` rather than trusting a
//! caller-supplied name.

use std::path::PathBuf;

use capture_ingress::bot::ObjectUploader;
use sha2::{Digest, Sha256};
use teloxide::net::Download;
use teloxide::prelude::*;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub struct FilesystemUploader {
    root: PathBuf,
}

impl FilesystemUploader {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ObjectUploader for FilesystemUploader {
    async fn upload(&self, bot: &Bot, file_id: &str) -> anyhow::Result<String> {
        let file = bot.get_file(file_id).await?;

        let mut bytes: Vec<u8> = Vec::new();
        bot.download_file(&file.path, &mut bytes).await?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let key = hex::encode(hasher.finalize());

        let dest = self.root.join(&key);
        if !fs::try_exists(&dest).await.unwrap_or(false) {
            fs::create_dir_all(&self.root).await?;
            let mut f = fs::File::create(&dest).await?;
            f.write_all(&bytes).await?;
        }

        Ok(key)
    }
}
