//! Couche d'intégration entre Servo et le shell BundleView.
//!
//! Ce module contient quatre éléments :
//!
//! 1. **[`Waker`] / [`WakerEvent`]** : le pont `Send + Sync` entre les threads
//!    internes de Servo et le thread principal Winit.
//!
//! 2. **`WebViewDelegate` pour [`ShellWindow`]** : callbacks d'une fenêtre
//!    gérée (frame prête, titre, navigation dans la fenêtre, demande de popup).
//!
//! 3. **[`PopupSentinel`]** : delegate d'une WebView auxiliaire jamais affichée.
//!    Sa première navigation porte l'URL demandée par `window.open` ou
//!    `target="_blank"` ; elle est confiée à l'intercepteur puis refusée.
//!
//! 4. **[`BundleProtocolHandler`]** : le schéma `app://` enregistré dans le
//!    registre de protocoles de Servo, devant [`BundleProtocol`].

use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use servo::protocol_handler::{
    DoneChannel, FetchContext, ProtocolHandler, ProtocolRegistry, Request, ResourceFetchTiming,
    Response, ResponseBody,
};
use servo::{NavigationRequest as ServoNavigationRequest, WebView, WebViewDelegate};
use tracing::{debug, info, warn};
use winit::event_loop::{EventLoop, EventLoopProxy};

use crate::navigation::{Disposition, NavigationRequest};
use crate::protocol::{BundleProtocol, ProtocolResponse};
use crate::shell::{Shell, ShellWindow};

// ─────────────────────────────────────────────────────────────────────────────
// Waker : pont Servo → Winit
// ─────────────────────────────────────────────────────────────────────────────

/// Événement marqueur envoyé à travers le `EventLoopProxy` de Winit.
///
/// La boucle Winit le reçoit dans `user_event()` et appelle
/// `servo.spin_event_loop()` en réponse.
#[derive(Debug)]
pub struct WakerEvent;

/// Pont thread-safe entre les threads internes de Servo et la boucle
/// d'événements Winit. `Clone + Send + Sync` car `EventLoopProxy` l'est.
#[derive(Clone)]
pub struct Waker(EventLoopProxy<WakerEvent>);

impl Waker {
    pub fn new(event_loop: &EventLoop<WakerEvent>) -> Self {
        Self(event_loop.create_proxy())
    }
}

impl embedder_traits::EventLoopWaker for Waker {
    fn clone_box(&self) -> Box<dyn embedder_traits::EventLoopWaker> {
        Box::new(Self(self.0.clone()))
    }

    fn wake(&self) {
        if let Err(error) = self.0.send_event(WakerEvent) {
            warn!(?error, "Échec du réveil de la boucle d'événements Winit");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WebViewDelegate : fenêtre gérée
// ─────────────────────────────────────────────────────────────────────────────

impl WebViewDelegate for ShellWindow {
    fn notify_new_frame_ready(&self, _webview: WebView) {
        self.window.request_redraw();
    }

    fn notify_page_title_changed(&self, _webview: WebView, title: Option<String>) {
        self.set_page_title(title.as_deref());
    }

    /// Navigation de premier niveau dans une fenêtre existante : même
    /// contexte, l'intercepteur n'a rien à décider. Seule exception, un
    /// répertoire du bundle sans `/` final est rechargé avec le `/`, sinon
    /// les URL relatives de son document pointeraient sur le parent.
    fn request_navigation(&self, webview: WebView, request: ServoNavigationRequest) {
        let slashed = self
            .shell
            .upgrade()
            .and_then(|shell| shell.protocol.directory_location(&request.url));
        match slashed {
            Some(location) => {
                debug!(from = %request.url, to = %location, "Directory URL completed");
                request.deny();
                webview.load(location);
            }
            None => request.allow(),
        }
    }

    /// `window.open()` ou lien `target="_blank"`.
    ///
    /// Servo attend une WebView pour le nouveau contexte avant de connaître
    /// l'URL. On lui donne une sentinelle invisible : la décision est prise à
    /// sa première navigation, voir [`PopupSentinel`].
    fn request_open_auxiliary_webview(&self, parent: WebView) -> Option<WebView> {
        let shell = self.shell.upgrade()?;
        let sentinel = shell.spawn_sentinel(self);
        debug!(parent = ?parent.id(), popup = ?sentinel.id(), "Auxiliary webview requested");
        Some(sentinel)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PopupSentinel : décision sur les nouveaux contextes de navigation
// ─────────────────────────────────────────────────────────────────────────────

/// Delegate d'une WebView auxiliaire qui ne sera jamais affichée.
///
/// La première navigation vers une vraie URL est passée à l'intercepteur
/// avec `Disposition::NewWindow` : une URL du bundle part dans la file des
/// fenêtres à créer, une URL externe part vers le navigateur de l'OS. Dans
/// les deux cas la sentinelle refuse la navigation et se retire.
///
/// `about:blank` n'est pas une décision : `window.open()` sans argument
/// suivi de `popup.location = ...` passe d'abord par là. Une popup qui ne
/// navigue jamais n'est pas affichée ; elle est retirée quand la page la
/// ferme ou quand sa fenêtre d'origine se ferme.
pub struct PopupSentinel {
    pub(crate) shell: Weak<Shell>,
}

impl WebViewDelegate for PopupSentinel {
    fn request_navigation(&self, webview: WebView, request: ServoNavigationRequest) {
        let Some(shell) = self.shell.upgrade() else {
            request.deny();
            return;
        };
        if request.url.scheme() == "about" {
            request.allow();
            return;
        }

        let outcome = shell.interceptor.handle(
            &NavigationRequest::new(request.url.as_str(), Disposition::NewWindow),
            shell.as_ref(),
            &shell.opener,
        );
        info!(url = %request.url, ?outcome, "New browsing context resolved");

        request.deny();
        shell.retire_sentinel(&webview);
    }

    fn notify_closed(&self, webview: WebView) {
        if let Some(shell) = self.shell.upgrade() {
            debug!(popup = ?webview.id(), "Popup closed before navigating");
            shell.retire_sentinel(&webview);
        }
    }

    fn request_open_auxiliary_webview(&self, _parent: WebView) -> Option<WebView> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protocole app:// dans le registre de Servo
// ─────────────────────────────────────────────────────────────────────────────

/// Adaptateur [`BundleProtocol`] → `ProtocolHandler` de Servo.
///
/// La lecture disque est asynchrone (tokio `fs`) et tourne sur le runtime
/// réseau de Servo, jamais sur le thread de la boucle d'événements.
pub struct BundleProtocolHandler(Arc<BundleProtocol>);

impl BundleProtocolHandler {
    pub fn new(protocol: Arc<BundleProtocol>) -> Self {
        Self(protocol)
    }
}

impl ProtocolHandler for BundleProtocolHandler {
    fn load(
        &self,
        request: &mut Request,
        _done_chan: &mut DoneChannel,
        _context: &FetchContext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let servo_url = request.current_url();
        let url = servo_url.as_url().clone();
        let timing = ResourceFetchTiming::new(request.timing_type());
        let protocol = Arc::clone(&self.0);

        Box::pin(async move {
            let reply = protocol.respond(&url).await;
            // Les 301 de répertoire n'arrivent ici que pour des sous-ressources :
            // les navigations sont complétées en amont par `request_navigation`.
            let mut response = if reply.is_success() {
                Response::new(servo_url, timing)
            } else {
                return Response::network_internal_error(error_message(&reply));
            };
            fill_response(&mut response, reply);
            response
        })
    }

    fn is_fetchable(&self) -> bool {
        self.0.privileges().supports_fetch_api
    }

    fn is_secure(&self) -> bool {
        self.0.privileges().secure
    }
}

fn error_message(reply: &ProtocolResponse) -> String {
    format!("{} {}", reply.status, String::from_utf8_lossy(&reply.body))
}

fn fill_response(response: &mut Response, reply: ProtocolResponse) {
    for (name, value) in &reply.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers.insert(name, value);
            }
            _ => warn!(header = name, value, "Invalid response header dropped"),
        }
    }
    if let Ok(mut body) = response.body.lock() {
        *body = ResponseBody::Done(reply.body);
    }
}

/// Construit le registre de protocoles passé à `ServoBuilder`.
///
/// Doit être appelé avant `ServoBuilder::build()` : un schéma enregistré
/// après le démarrage du moteur n'a pas ses privilèges.
pub fn protocol_registry(protocol: Arc<BundleProtocol>) -> ProtocolRegistry {
    let mut registry = ProtocolRegistry::default();
    let scheme = protocol.scheme().to_owned();
    let privileges = protocol.privileges();

    match registry.register(&scheme, BundleProtocolHandler::new(protocol)) {
        Ok(()) => info!(
            scheme,
            secure = privileges.secure,
            fetch_api = privileges.supports_fetch_api,
            cors = privileges.cors_enabled,
            "Bundle scheme registered"
        ),
        Err(error) => warn!(scheme, ?error, "Cannot register bundle scheme"),
    }
    registry
}
