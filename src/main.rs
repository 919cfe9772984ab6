//! Point d'entrée de BundleView.
//!
//! Usage :
//!   bundleview [--write-config]
//!
//! Exemples :
//!   cargo run --features shell                       → mode détecté (dev sous target/)
//!   BUNDLEVIEW_MODE=packaged cargo run --features shell
//!   RUST_LOG=bundleview=debug cargo run --features shell
//!   bundleview --write-config                        → écrit la config par défaut et quitte

use std::env;
use std::error::Error;
use std::sync::Arc;

use tracing::info;
use winit::event_loop::EventLoop;

use bundleview::config::Config;
use bundleview::{BundleProtocol, BundleResolver, RuntimeMode};

fn main() -> Result<(), Box<dyn Error>> {
    // ── 1. Logging / Tracing ───────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ── 2. Provider crypto TLS ─────────────────────────────────────────
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| "rustls crypto provider already installed")?;

    // ── 3. Configuration ───────────────────────────────────────────────
    let config = Config::load();
    if env::args().skip(1).any(|arg| arg == "--write-config") {
        config.save()?;
        return Ok(());
    }

    // ── 4. Mode d'exécution et racine du bundle ────────────────────────
    let mode = RuntimeMode::detect(config.bundle.mode);
    let resolver = BundleResolver::for_mode(
        mode,
        &config.bundle.site_dir,
        &config.bundle.index_document,
    )?;
    info!(?mode, base = %resolver.base().display(), "Bundle located");

    let protocol = Arc::new(BundleProtocol::new(
        &config.bundle.scheme,
        &config.bundle.host,
        resolver,
    ));

    // ── 5. Lecteur de ressources Servo ─────────────────────────────────
    bundleview::resources::init()?;

    // ── 6. Boucle d'événements Winit ───────────────────────────────────
    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = bundleview::shell::App::new(&event_loop, config, protocol);

    Ok(event_loop.run_app(&mut app)?)
}
