//! THZ heat pump command-line client

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use common::hex::format_hex_pretty;
use thzsrv::bootstrap::{self, Args, Command};
use thzsrv::config::AppConfig;
use thzsrv::register_map::{block_address, RegisterMapManager, WriteRegisterMapManager};
use thzsrv::runtime::start_poller;
use thzsrv::ThzDevice;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_catalog(reads: &RegisterMapManager, writes: &WriteRegisterMapManager) -> anyhow::Result<()> {
    print_json(&json!({
        "firmware": reads.get_firmware_version(),
        "blocks": reads.get_all_registers(),
        "settings": writes.get_all_registers(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    bootstrap::initialize_logging(&args, &config.logging)?;
    debug!("Configuration: {:?}", config);

    // Catalog for an explicit firmware needs no device
    if let Command::Registers {
        firmware: Some(firmware),
    } = &args.command
    {
        let dir = config.device.register_map_dir.as_deref();
        let reads = RegisterMapManager::load(firmware, dir)?;
        let writes = WriteRegisterMapManager::load(firmware, dir)?;
        return print_catalog(&reads, &writes);
    }

    let device = Arc::new(
        ThzDevice::connect(&config)
            .await
            .context("Failed to connect to the heat pump")?,
    );

    match args.command {
        Command::Firmware => {
            println!("{}", device.firmware_version());
        },
        Command::Block { id, fresh } => {
            let address = block_address(&id)?;
            let block = if fresh {
                device.read_block(&address).await?
            } else {
                device.read_block_cached(&address).await?
            };
            println!("{}", format_hex_pretty(&block));
        },
        Command::Read { block, field } => match field {
            Some(field) => {
                let value = device.read_field(&block, &field).await?;
                print_json(&json!({ field: value }))?;
            },
            None => {
                let readings = device.read_fields(&block).await?;
                print_json(&readings)?;
            },
        },
        Command::Get { setting } => {
            let value = device.read_setting(&setting).await?;
            print_json(&json!({ setting: value }))?;
        },
        Command::Set { setting, value } => {
            let written = device.write_setting(&setting, &value).await?;
            print_json(&json!({ setting: written }))?;
        },
        Command::Registers { firmware: _ } => {
            print_catalog(&device.register_map(), &device.write_register_map())?;
        },
        Command::Poll => {
            let interval = config.device.poll_interval();
            info!("Polling every {:?}, Ctrl-C to stop", interval);
            let (task, token) = start_poller(Arc::clone(&device), interval);
            tokio::signal::ctrl_c().await?;
            token.cancel();
            task.await?;
        },
    }

    device.close().await?;
    Ok(())
}
