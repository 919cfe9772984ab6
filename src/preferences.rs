//! Servo engine preferences for an offline bundle viewer.
//!
//! Builds a [`servo::Preferences`] struct:
//! - Thread pools sized to available CPU cores (clamped)
//! - No HTTP cache: the bundle is read from disk on every load
//! - MIME sniffing disabled, the bundle protocol declares content types
//! - Device APIs a static site has no use for are disabled

use tracing::info;

use crate::config::ServoConfig;

/// Builds Servo `Preferences` from the `[servo]` config section.
#[allow(clippy::field_reassign_with_default)]
pub fn build_servo_preferences(config: &ServoConfig) -> servo::Preferences {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(4);

    let mut prefs = servo::Preferences::default();

    // ── Threads ───────────────────────────────────────────────────────────
    prefs.layout_threads = if config.layout_threads > 0 {
        config.layout_threads
    } else {
        cpus.min(4)
    };
    prefs.threadpools_async_runtime_workers_max = cpus.clamp(2, 8);
    prefs.threadpools_image_cache_workers_max = cpus.min(4);
    prefs.threadpools_webrender_workers_max = (cpus / 2).clamp(2, 8);
    prefs.threadpools_resource_workers_max = cpus.min(4);
    prefs.gfx_precache_shaders = config.precache_shaders;

    // ── Network ──────────────────────────────────────────────────────────
    // Pas de cache : le bundle est local, la lecture disque suffit.
    prefs.network_http_cache_size = 0;
    prefs.network_mime_sniff = false;
    prefs.network_enforce_tls_enabled = true;

    if !config.user_agent.is_empty() {
        prefs.user_agent = config.user_agent.clone();
    }

    // ── APIs inutiles pour un site statique ──────────────────────────────
    prefs.dom_geolocation_enabled = false;
    prefs.dom_bluetooth_enabled = false;
    prefs.dom_notification_enabled = false;
    prefs.dom_webrtc_enabled = false;

    info!(
        cpus,
        layout_threads = prefs.layout_threads,
        network_workers = prefs.threadpools_async_runtime_workers_max,
        precache_shaders = prefs.gfx_precache_shaders,
        "Servo preferences configured (offline bundle)"
    );

    prefs
}
