use anyhow::{Context, Result};
use refine_core::settings::SettingsService;
use refine_infrastructure::{FileSettingsService, RefinePaths};

pub async fn show() -> Result<()> {
    let paths = RefinePaths::default();
    let service =
        FileSettingsService::from_default_location().context("Failed to locate settings")?;
    let settings = service.load().await.context("Failed to load settings")?;

    if let Ok(dir) = paths.config_dir() {
        println!("Config dir:    {}", dir.display());
    }
    println!("API key:       {}", settings.masked_api_key());
    println!("Model:         {}", settings.model);
    println!("Typing speed:  {}ms/char", settings.typing_speed_ms);
    println!("System prompt:");
    for line in settings.system_prompt.lines() {
        println!("  {line}");
    }
    Ok(())
}
