//! Check external tool availability.

use podreel_common::config::{config_file_path, AppConfig};
use podreel_render_engine::ffmpeg::{command_exists, lavfi_available};

pub fn run() -> anyhow::Result<()> {
    println!("Podreel System Check");
    println!("{}", "=".repeat(50));

    let config = AppConfig::load();
    println!("Config file: {}", config_file_path().display());

    let mut ok = true;
    for (name, path) in [("ffmpeg", &config.tools.ffmpeg), ("ffprobe", &config.tools.ffprobe)] {
        if command_exists(path) {
            println!("[OK] {name}: {}", path.display());
        } else {
            println!("[MISSING] {name}: {} (set the path in the config file or environment)", path.display());
            ok = false;
        }
    }

    if command_exists(&config.tools.ffmpeg) {
        if lavfi_available(&config.tools.ffmpeg) {
            println!("[OK] lavfi input device");
        } else {
            println!("[MISSING] lavfi input device (needed for gap fillers and silence)");
            ok = false;
        }
    }

    match std::fs::create_dir_all(&config.work_dir) {
        Ok(()) => println!("[OK] Work dir: {}", config.work_dir.display()),
        Err(e) => {
            println!("[FAIL] Work dir {}: {e}", config.work_dir.display());
            ok = false;
        }
    }

    println!();
    if ok {
        println!("All required tools are available. Podreel is ready.");
    } else {
        println!("Some required tools are missing. See above for fixes.");
    }
    Ok(())
}
