//! `pathsync config show`: print the resolved session settings.

use anyhow::{Context, Result};
use clap::Subcommand;

use pathsync_core::config as core_config;

use super::ConnectionArgs;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show settings after applying flags, cluster profile and defaults.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Print the config file location.
    Path,
}

pub fn run(cmd: ConfigCommand, connection: &ConnectionArgs) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => show(connection, json),
        ConfigCommand::Path => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            println!("{}", core_config::config_path_at(&home).display());
            Ok(())
        }
    }
}

fn show(connection: &ConnectionArgs, json: bool) -> Result<()> {
    let config = connection.resolve()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("failed to serialize config")?
        );
        return Ok(());
    }

    let cluster = config
        .cluster
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let keepalive = config
        .keepalive
        .map(|d| format!("{}s", d.as_secs()))
        .unwrap_or_else(|| "off".to_string());
    println!("cluster:        {cluster}");
    println!("host:           {}@{}", config.username, config.hostname);
    println!("local root:     {}", config.local_root.display());
    println!("remote root:    {}", config.remote_root.display());
    println!("keepalive:      {keepalive}");
    println!("agent auth:     {}", if config.try_agent { "yes" } else { "no" });
    println!("job cache TTL:  {}s", config.job_cache_refresh.as_secs());
    println!("lookback:       {} days", config.lookback_days);
    println!("submit:         {}", config.submit_template);
    println!("script:         {}", config.script_name);
    println!("excludes:       {}", config.exclude_names.join(" "));
    Ok(())
}
