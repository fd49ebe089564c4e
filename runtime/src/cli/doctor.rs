//! Environment readiness check.

use crate::config::ServiceConfig;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;

/// Check Chromium availability, the engine source and the listen address.
pub async fn run(config: &ServiceConfig) -> Result<()> {
    println!("litterbox doctor");
    println!("================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium = find_chromium(config.chromium_path.as_deref());
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Set LITTERBOX_CHROMIUM_PATH or install Chrome."),
    }

    let engine_ok = match std::fs::metadata(&config.axe_path) {
        Ok(meta) if meta.len() > 0 => {
            println!(
                "[OK] axe-core source: {} ({} bytes)",
                config.axe_path.display(),
                meta.len()
            );
            true
        }
        Ok(_) => {
            println!("[!!] axe-core source is empty: {}", config.axe_path.display());
            false
        }
        Err(_) => {
            println!(
                "[!!] axe-core source NOT found at {}. Set AXE_CORE_PATH.",
                config.axe_path.display()
            );
            false
        }
    };

    match std::net::TcpListener::bind(config.socket_addr()) {
        Ok(_) => println!("[OK] {} is free", config.socket_addr()),
        Err(e) => println!("[!!] cannot bind {}: {e}", config.socket_addr()),
    }

    println!();
    if chromium.is_some() && engine_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
