//! Factory pour le contexte de rendu GPU.
//!
//! Chaque fenêtre gérée possède son propre `WindowRenderingContext`
//! (surfman/OpenGL) dans lequel sa WebView peint directement.

use std::rc::Rc;

use servo::{RenderingContext, WindowRenderingContext};
use winit::dpi::PhysicalSize;
use winit::raw_window_handle::{DisplayHandle, WindowHandle};

/// Crée un contexte de rendu lié à une fenêtre Winit et le rend courant.
///
/// Le contexte doit être courant avant d'être passé à `WebViewBuilder`.
/// Une erreur ici signifie pas de driver compatible ou des handles invalides :
/// la fenêtre ne peut pas être affichée.
pub fn create_rendering_context(
    display_handle: DisplayHandle<'_>,
    window_handle: WindowHandle<'_>,
    size: PhysicalSize<u32>,
) -> Result<Rc<WindowRenderingContext>, String> {
    let rendering_context = WindowRenderingContext::new(display_handle, window_handle, size)
        .map_err(|e| format!("WindowRenderingContext: {e:?}"))?;

    rendering_context
        .make_current()
        .map_err(|e| format!("make_current: {e:?}"))?;

    Ok(Rc::new(rendering_context))
}
