use canvas_thumbnails::{
    load_settings, save_settings, scan_canvases, Args, FsVault, JsonFileStore, SettingsPanel,
    Vault,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let store = JsonFileStore::new(args.settings_path());
    let mut settings = load_settings(&store);

    if let Some(enabled) = args.real_time_update {
        settings.enable_real_time_update = enabled;
        save_settings(&store, &settings)?;
        tracing::info!(enabled, path = %store.path().display(), "real-time update setting saved");
    }

    if args.show_settings {
        for row in SettingsPanel::rows(&settings) {
            println!("{:<18} {:<18} {}", row.name, row.value, row.description);
        }
        return Ok(());
    }

    if !args.directory.is_dir() {
        anyhow::bail!("Vault directory does not exist: {}", args.directory.display());
    }

    let vault = FsVault::new(&args.directory);
    let thumbnails = scan_canvases(&vault).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&thumbnails)?);
        return Ok(());
    }

    for (canvas, image) in thumbnails.iter() {
        match vault.resource_url(image) {
            Ok(url) => println!("{} -> {} ({})", canvas, image, url),
            Err(e) => {
                tracing::warn!(image, error = %e, "cannot resolve thumbnail");
                println!("{} -> {}", canvas, image);
            }
        }
    }

    Ok(())
}
