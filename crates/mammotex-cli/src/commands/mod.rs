pub mod aggregate;
pub mod evaluate;
pub mod split;
pub mod tensors;

use std::path::Path;

use anyhow::{Context, Result};

pub(crate) fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))
}
