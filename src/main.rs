use anyhow::Result;
use benqctl::{
    config::AppConfig,
    defaults::bootstrap_defaults,
    init_debug_log_file, log_debug, log_file_path, presets,
    storage::FileStore,
    ui, App,
};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;

    if config.list_presets {
        print!("{}", presets::render_preset_list());
        return Ok(());
    }

    init_debug_log_file();
    log_debug("=== benqctl started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let defaults = bootstrap_defaults(config.startup_defaults_json().as_deref());
    let store_dir = match &config.config_dir {
        Some(dir) => dir.clone(),
        None => FileStore::default_dir()?,
    };
    let store = FileStore::open(store_dir)?;

    let mut app = App::new(config, defaults, Box::new(store));
    app.load_stored_config();
    let result = ui::run_app(&mut app);

    log_debug("=== benqctl exiting ===");
    if let Err(ref e) = result {
        log_debug(&format!("Exit with error: {e:#}"));
    }

    result
}
