use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use panel_device_engine::common::logger::init_logger;
use panel_device_engine::common::setting::Settings;
use panel_device_engine::panel::panel_device::Panel;
use panel_device_engine::{info, debug};

const LOG_TAG: &str = "main";
const REPORT_INTERVAL_MS: u64 = 1000;

fn main() -> Result<(), Box<dyn Error>> {
    // .env file is optional
    dotenv().ok();

    let settings = Settings::get();

    init_logger()?;
    info!(LOG_TAG, "settings loaded, env: {}", settings.env.env);
    debug!(LOG_TAG, "settings: {:?}", settings);

    let mut panel = Panel::from_settings(settings);
    // a port that cannot be opened ends the program here
    panel.setup()?;
    panel.run()?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || running_handler.store(false, Ordering::SeqCst))?;

    while running.load(Ordering::SeqCst) {
        println!("{}", serde_json::to_string(&panel.get_values())?);
        debug!(LOG_TAG, "status: {}", serde_json::to_string(&panel.get_status())?);
        thread::sleep(Duration::from_millis(REPORT_INTERVAL_MS));
    }

    info!(LOG_TAG, "stop signal received, releasing relays");
    panel.exit(0)?;
    Ok(())
}
