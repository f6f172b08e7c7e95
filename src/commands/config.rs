use anyhow::Result;
use owo_colors::OwoColorize;

use crate::App;

pub fn run(app: &App) -> Result<()> {
    let version = app.store.current_version()?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", app.config_path.display());
    println!("  Database:   {}", app.config.database_path().display());
    println!("  Exports:    {}", app.config.cache_path().display());
    println!();
    println!("{}", "Settings".bold());
    println!("  Timezone:   {}", app.config.timezone);
    println!("  Product id: {}", app.config.product_id);
    println!("  Bind:       {}", app.config.bind);
    println!("  Origins:    {}", app.config.allowed_origins.join(", "));
    println!();
    println!("{}", "Store".bold());
    println!("  Version:    {}", version);

    Ok(())
}
