//! Boucle d'événements Winit et gestion des fenêtres du shell.
//!
//! ## Pattern "Two-Phase App"
//!
//! Winit 0.30 impose que les fenêtres soient créées dans `resumed()`. Servo
//! est donc construit là, avec la première fenêtre :
//!
//! ```text
//! App::Initial { .. }  →  [resumed() appelé]  →  App::Running(Rc<Shell>)
//! ```
//!
//! ## Fenêtres multiples
//!
//! ```text
//! page: window.open("app://bundle/docs/")
//!   └─ ShellWindow::request_open_auxiliary_webview → PopupSentinel
//!        └─ 1re navigation → NavigationInterceptor (NewWindow)
//!             └─ Shell::create_window → file `pending`
//!                  └─ user_event / window_event : drain_pending() → open_window()
//! ```
//!
//! Les fenêtres ne peuvent être créées qu'avec un `ActiveEventLoop` en main,
//! d'où la file : le collaborateur `WindowManager` ne fait qu'empiler.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::error::Error;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use euclid::Scale;
use servo::{InputEvent, WheelDelta, WheelEvent, WheelMode};
use servo::{MouseButton as ServoMouseButton, MouseButtonAction, MouseButtonEvent};
use servo::{MouseLeftViewportEvent, MouseMoveEvent};
use servo::{
    RenderingContext, Servo, ServoBuilder, WebView, WebViewBuilder, WebViewId,
    WindowRenderingContext,
};
use tracing::{debug, error, info, warn};
use webrender_api::units::DevicePoint;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::{Window, WindowId};

use crate::config::Config;
use crate::external::OsOpener;
use crate::navigation::{NavigationInterceptor, WindowManager};
use crate::popups::PendingPopups;
use crate::preferences::build_servo_preferences;
use crate::protocol::BundleProtocol;
use crate::rendering;
use crate::resolver::VirtualPath;
use crate::servo_glue::{self, PopupSentinel, Waker, WakerEvent};

/// Pixels par ligne pour `MouseScrollDelta::LineDelta`.
const LINE_HEIGHT: f64 = 76.0;

// ─────────────────────────────────────────────────────────────────────────────
// Shell : état partagé par toutes les fenêtres
// ─────────────────────────────────────────────────────────────────────────────

/// État global du shell, créé lors de `resumed()`.
///
/// Tout vit sur le thread principal : `Rc` + `RefCell`, pas d'`Arc` sauf
/// pour le protocole, partagé avec le runtime réseau de Servo.
pub struct Shell {
    pub servo: Servo,
    pub config: Config,
    pub interceptor: NavigationInterceptor,
    pub protocol: Arc<BundleProtocol>,
    pub opener: OsOpener,
    windows: RefCell<HashMap<WindowId, Rc<ShellWindow>>>,
    /// Documents en attente d'une fenêtre.
    pending: RefCell<Vec<VirtualPath>>,
    /// WebViews auxiliaires en attente de leur première navigation, avec la
    /// fenêtre qui les a ouvertes.
    sentinels: RefCell<PendingPopups<WebViewId, WindowId, WebView>>,
    /// Sentinelles retirées, libérées au prochain passage de la boucle.
    retired: RefCell<Vec<WebView>>,
}

impl Shell {
    /// Ouvre une fenêtre native qui charge `path` via le protocole du bundle.
    fn open_window(
        self: &Rc<Self>,
        event_loop: &ActiveEventLoop,
        path: &VirtualPath,
    ) -> Result<(), Box<dyn Error>> {
        let url = self
            .protocol
            .url_for(path)
            .ok_or_else(|| format!("no bundle URL for '{path}'"))?;

        let attributes = Window::default_attributes()
            .with_title(&self.config.general.window_title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window.width as f64,
                self.config.window.height as f64,
            ));
        let window = event_loop.create_window(attributes)?;

        let rendering_context = rendering::create_rendering_context(
            event_loop.display_handle()?,
            window.window_handle()?,
            window.inner_size(),
        )?;

        let scale_factor = window.scale_factor() as f32;
        let window_id = window.id();
        let managed = Rc::new(ShellWindow {
            window,
            rendering_context: rendering_context.clone(),
            webview: RefCell::new(None),
            shell: Rc::downgrade(self),
            cursor_position: Cell::new(DevicePoint::zero()),
            modifiers: Cell::new(ModifiersState::default()),
        });

        let webview = WebViewBuilder::new(&self.servo, rendering_context as Rc<dyn RenderingContext>)
            .url(url.clone())
            .hidpi_scale_factor(Scale::new(scale_factor))
            .delegate(managed.clone())
            .build();
        *managed.webview.borrow_mut() = Some(webview);

        self.windows.borrow_mut().insert(window_id, managed);
        info!(url = %url, windows = self.window_count(), "Managed window opened");
        Ok(())
    }

    /// Crée une fenêtre par document en attente.
    fn drain_pending(self: &Rc<Self>, event_loop: &ActiveEventLoop) {
        self.retired.borrow_mut().clear();

        let pending: Vec<VirtualPath> = self.pending.borrow_mut().drain(..).collect();
        for path in pending {
            if let Err(e) = self.open_window(event_loop, &path) {
                error!(path = %path, error = %e, "Cannot open managed window");
            }
        }
    }

    /// Crée la WebView auxiliaire que Servo attend pour un nouveau contexte.
    pub(crate) fn spawn_sentinel(self: &Rc<Self>, opener: &ShellWindow) -> WebView {
        let sentinel = WebViewBuilder::new_auxiliary(
            &self.servo,
            opener.rendering_context.clone() as Rc<dyn RenderingContext>,
        )
        .hidpi_scale_factor(Scale::new(opener.window.scale_factor() as f32))
        .delegate(Rc::new(PopupSentinel {
            shell: Rc::downgrade(self),
        }))
        .build();
        self.sentinels
            .borrow_mut()
            .insert(sentinel.id(), opener.window.id(), sentinel.clone());
        sentinel
    }

    /// La sentinelle a rendu sa décision, ou la page l'a fermée.
    pub(crate) fn retire_sentinel(&self, sentinel: &WebView) {
        let removed = self.sentinels.borrow_mut().remove(&sentinel.id());
        if let Some(sentinel) = removed {
            self.retired.borrow_mut().push(sentinel);
        }
    }

    fn window(&self, id: WindowId) -> Option<Rc<ShellWindow>> {
        self.windows.borrow().get(&id).cloned()
    }

    fn close_window(&self, id: WindowId) {
        let removed = self.windows.borrow_mut().remove(&id);
        if let Some(window) = removed {
            // La WebView tient la fenêtre comme delegate : casser le cycle.
            window.webview.borrow_mut().take();
            debug!(?id, remaining = self.window_count(), "Managed window closed");
        }

        // Popups jamais naviguées : elles partent avec leur fenêtre d'origine.
        let orphans = self.sentinels.borrow_mut().evict_opener(&id);
        if !orphans.is_empty() {
            debug!(?id, count = orphans.len(), "Undecided popups released");
            self.retired.borrow_mut().extend(orphans);
        }
    }

    pub fn window_count(&self) -> usize {
        self.windows.borrow().len()
    }
}

impl WindowManager for Shell {
    fn create_window(&self, path: &VirtualPath) {
        self.pending.borrow_mut().push(path.clone());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ShellWindow : une fenêtre gérée
// ─────────────────────────────────────────────────────────────────────────────

/// Une fenêtre native et sa WebView unique.
pub struct ShellWindow {
    pub window: Window,
    pub rendering_context: Rc<WindowRenderingContext>,
    pub webview: RefCell<Option<WebView>>,
    pub(crate) shell: Weak<Shell>,
    cursor_position: Cell<DevicePoint>,
    modifiers: Cell<ModifiersState>,
}

impl ShellWindow {
    fn webview(&self) -> Option<WebView> {
        self.webview.borrow().clone()
    }

    fn forward(&self, event: InputEvent) {
        if let Some(webview) = self.webview() {
            webview.notify_input_event(event);
        }
    }

    /// Titre de la fenêtre : titre de la page, sinon celui de la config.
    pub(crate) fn set_page_title(&self, title: Option<&str>) {
        let fallback = self
            .shell
            .upgrade()
            .map(|shell| shell.config.general.window_title.clone())
            .unwrap_or_default();
        match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => self.window.set_title(&format!("{title} — {fallback}")),
            None => self.window.set_title(&fallback),
        }
    }

    fn redraw(&self) {
        if let Err(e) = self.rendering_context.make_current() {
            warn!(error = ?e, "Cannot make rendering context current");
            return;
        }
        if let Some(webview) = self.webview() {
            webview.paint();
        }
        self.rendering_context.present();
    }

    /// Raccourcis du shell. `true` si la touche a été consommée.
    fn handle_shortcut(&self, key: &Key) -> bool {
        let mods = self.modifiers.get();
        let Some(webview) = self.webview() else {
            return false;
        };
        match key {
            Key::Named(NamedKey::F5) => {
                webview.reload();
            }
            Key::Character(c) if mods.control_key() && c.eq_ignore_ascii_case("r") => {
                webview.reload();
            }
            Key::Named(NamedKey::ArrowLeft) if mods.alt_key() => {
                webview.go_back(1);
            }
            Key::Named(NamedKey::ArrowRight) if mods.alt_key() => {
                webview.go_forward(1);
            }
            _ => return false,
        }
        true
    }

    fn handle_event(&self, event: WindowEvent) {
        match event {
            WindowEvent::RedrawRequested => self.redraw(),

            WindowEvent::Resized(new_size) => {
                self.rendering_context.resize(new_size);
                self.window.request_redraw();
            }

            WindowEvent::ModifiersChanged(new_modifiers) => {
                self.modifiers.set(new_modifiers.state());
            }

            WindowEvent::CursorMoved { position, .. } => {
                let point = DevicePoint::new(position.x as f32, position.y as f32);
                self.cursor_position.set(point);
                self.forward(InputEvent::MouseMove(MouseMoveEvent::new(point.into())));
            }

            WindowEvent::CursorLeft { .. } => {
                self.forward(InputEvent::MouseLeftViewport(
                    MouseLeftViewportEvent::default(),
                ));
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let (x, y, mode) = match delta {
                    MouseScrollDelta::LineDelta(dx, dy) => (
                        dx as f64 * LINE_HEIGHT,
                        dy as f64 * LINE_HEIGHT,
                        WheelMode::DeltaLine,
                    ),
                    MouseScrollDelta::PixelDelta(delta) => (delta.x, delta.y, WheelMode::DeltaPixel),
                };
                self.forward(InputEvent::Wheel(WheelEvent::new(
                    WheelDelta { x, y, z: 0.0, mode },
                    self.cursor_position.get().into(),
                )));
            }

            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    WinitMouseButton::Left => ServoMouseButton::Left,
                    WinitMouseButton::Right => ServoMouseButton::Right,
                    WinitMouseButton::Middle => ServoMouseButton::Middle,
                    WinitMouseButton::Back => ServoMouseButton::Back,
                    WinitMouseButton::Forward => ServoMouseButton::Forward,
                    WinitMouseButton::Other(id) => ServoMouseButton::Other(id),
                };
                let action = match state {
                    ElementState::Pressed => MouseButtonAction::Down,
                    ElementState::Released => MouseButtonAction::Up,
                };
                self.forward(InputEvent::MouseButton(MouseButtonEvent::new(
                    action,
                    button,
                    self.cursor_position.get().into(),
                )));
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && self.handle_shortcut(&event.logical_key)
                {
                    return;
                }
                let keyboard_event =
                    crate::keyutils::keyboard_event_from_winit(&event, self.modifiers.get());
                self.forward(InputEvent::Keyboard(keyboard_event));
            }

            _ => (),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// App : enum deux phases
// ─────────────────────────────────────────────────────────────────────────────

/// Application à deux phases de vie.
pub enum App {
    /// Phase pré-initialisation : on attend que Winit appelle `resumed()`.
    Initial {
        waker: Waker,
        config: Config,
        protocol: Arc<BundleProtocol>,
    },
    /// Phase opérationnelle : au moins une fenêtre est ouverte.
    Running(Rc<Shell>),
}

impl App {
    pub fn new(
        event_loop: &EventLoop<WakerEvent>,
        config: Config,
        protocol: Arc<BundleProtocol>,
    ) -> Self {
        Self::Initial {
            waker: Waker::new(event_loop),
            config,
            protocol,
        }
    }

    fn start(
        waker: Waker,
        config: Config,
        protocol: Arc<BundleProtocol>,
        event_loop: &ActiveEventLoop,
    ) -> Result<Rc<Shell>, Box<dyn Error>> {
        // Le schéma doit être enregistré avant la construction de Servo.
        let registry = servo_glue::protocol_registry(protocol.clone());
        let servo = ServoBuilder::default()
            .preferences(build_servo_preferences(&config.servo))
            .protocol_registry(registry)
            .event_loop_waker(Box::new(waker))
            .build();

        let interceptor =
            NavigationInterceptor::new(protocol.scheme(), protocol.resolver().index_document());
        let shell = Rc::new(Shell {
            servo,
            config,
            interceptor,
            protocol,
            opener: OsOpener::default(),
            windows: RefCell::new(HashMap::new()),
            pending: RefCell::new(Vec::new()),
            sentinels: RefCell::new(PendingPopups::default()),
            retired: RefCell::new(Vec::new()),
        });

        let home = shell.protocol.resolver().ensure_document(&VirtualPath::root());
        shell.open_window(event_loop, &home)?;
        Ok(shell)
    }
}

impl ApplicationHandler<WakerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Self::Initial {
            waker,
            config,
            protocol,
        } = self
        else {
            return;
        };

        match Self::start(waker.clone(), config.clone(), protocol.clone(), event_loop) {
            Ok(shell) => *self = Self::Running(shell),
            Err(e) => {
                error!(error = %e, "Shell startup failed");
                event_loop.exit();
            }
        }
    }

    /// Un `WakerEvent` arrive depuis les threads Servo.
    fn user_event(&mut self, event_loop: &ActiveEventLoop, _event: WakerEvent) {
        if let Self::Running(shell) = self {
            shell.servo.spin_event_loop();
            shell.drain_pending(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Self::Running(shell) = self else {
            return;
        };
        shell.servo.spin_event_loop();

        if let WindowEvent::CloseRequested = event {
            shell.close_window(window_id);
            if shell.window_count() == 0 {
                info!("Last window closed, exiting");
                event_loop.exit();
            }
            return;
        }

        if let Some(window) = shell.window(window_id) {
            window.handle_event(event);
        }
        shell.drain_pending(event_loop);
    }
}
