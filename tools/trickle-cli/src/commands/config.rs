//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, is_json, CliConfig};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { path, force } => {
            init_config(path.as_deref().unwrap_or("trickle.toml"), force, ctx)
        }
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("source", &path.display().to_string()),
        None => ctx.output.kv("source", "defaults"),
    }

    let render = &ctx.config.render;
    ctx.output.info("[render]");
    ctx.output.kv("mode", &format!("{:?}", render.mode).to_lowercase());
    ctx.output.kv("flush", &format!("{:?}", render.flush));
    ctx.output.kv("markup.attribute", &render.markup.attribute);
    ctx.output.kv("markup.container_tag", &render.markup.container_tag);
    ctx.output.kv("markup.swap_function", &render.markup.swap_function);

    ctx.output.info("[logging]");
    ctx.output.kv("level", &ctx.config.logging.level.to_string());
    ctx.output
        .kv("format", &format!("{:?}", ctx.config.logging.format).to_lowercase());

    ctx.output.info("[demo]");
    ctx.output.kv("delay_ms", &ctx.config.demo.delay_ms.to_string());
    ctx.output
        .kv("fail_reviews", &ctx.config.demo.fail_reviews.to_string());

    Ok(())
}

fn init_config(path: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.resolve_path(path);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if is_json(&config_path) {
        CliConfig::default().save(&config_path)?;
    } else {
        fs::write(&config_path, generate_default_config())?;
    }

    ctx.output
        .success(&format!("Created: {}", config_path.display()));

    Ok(())
}
