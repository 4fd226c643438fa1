//! voicebridge entrypoint: supervises the recorder worker and bridges it to
//! the UI collaborator over JSON-lines IPC on stdio.

use anyhow::Result;
use voicebridge::config::AppConfig;
use voicebridge::ipc::run_ipc_mode;
use voicebridge::{init_logging, init_tracing, log_debug, log_file_path};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);

    if config.doctor {
        print_doctor_report(&config);
        return Ok(());
    }

    log_debug(&format!("voicebridge v{} starting", env!("CARGO_PKG_VERSION")));
    run_ipc_mode(config)
}

fn print_doctor_report(config: &AppConfig) {
    let worker = config.worker_config();
    println!("voicebridge v{}", env!("CARGO_PKG_VERSION"));
    println!("worker_cmd        {}", worker.command);
    println!("worker_script     {}", config.worker_script.display());
    println!("working_dir       {}", worker.working_dir.display());
    println!("max_restarts      {}", worker.max_restarts);
    println!("base_delay_ms     {}", worker.base_delay_ms);
    println!("log_file          {}", log_file_path().display());
}
