//! `recall init-config` and `recall show-config`.

use anyhow::{Context, Result, bail};
use recall_config::AppConfig;
use std::path::Path;

pub fn init(path: &Path, force: bool) -> Result<()> {
    write_default(path, force)?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}

pub fn show(path: &Path) -> Result<()> {
    let config = AppConfig::load_with_env(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    println!("# {}", path.display());
    println!("{}", render_redacted(&config)?);
    Ok(())
}

pub(crate) fn write_default(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub(crate) fn render_redacted(config: &AppConfig) -> Result<String> {
    let mut config = config.clone();
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("[REDACTED]".into());
    }
    Ok(toml::to_string_pretty(&config)?)
}
