//! # BundleView : shell de bureau pour un site statique
//!
//! Affiche un bundle de site pré-construit (`dist/`) dans des fenêtres
//! natives, et décide pour chaque navigation si la cible appartient au
//! bundle (nouvelle fenêtre gérée) ou au web (navigateur par défaut de l'OS).
//!
//! ## Architecture des modules
//!
//! Cœur, indépendant du moteur (toujours compilé) :
//!
//! - [`resolver`] : chemin virtuel → fichier du bundle → octets. Gère le
//!   document par défaut des répertoires et la divergence packagé / dev.
//!   Garde-fou `PathEscape` contre la traversée de répertoires.
//!
//! - [`navigation`] : intercepteur des demandes de nouveau contexte de
//!   navigation. Classe l'URL (interne / externe) et délègue aux
//!   collaborateurs [`navigation::WindowManager`] et
//!   [`navigation::ExternalOpener`].
//!
//! - [`popups`] : popups en attente de leur première navigation, retirées
//!   à la décision, à leur fermeture ou à celle de leur fenêtre d'origine.
//!
//! - [`protocol`] : le schéma virtuel privilégié (`app://bundle/`) devant le
//!   résolveur.
//!
//! - [`mode`], [`config`], [`content_type`], [`external`], [`error`] :
//!   mode d'exécution, configuration TOML, types MIME, ouverture externe,
//!   erreurs.
//!
//! Shell graphique (feature `shell`, Servo + Winit) :
//!
//! - `shell` : boucle d'événements Winit, fenêtres multiples, file des
//!   fenêtres à créer.
//! - `servo_glue` : `Waker`, delegates Servo branchés sur l'intercepteur,
//!   handler du protocole pour le registre de Servo.
//! - `preferences`, `rendering`, `resources`, `keyutils` : préférences Servo,
//!   contexte GL, lecteur de ressources, conversion clavier.

pub mod config;
pub mod content_type;
pub mod error;
pub mod external;
pub mod mode;
pub mod navigation;
pub mod popups;
pub mod protocol;
pub mod resolver;

#[cfg(feature = "shell")]
pub mod keyutils;
#[cfg(feature = "shell")]
pub mod preferences;
#[cfg(feature = "shell")]
pub mod rendering;
#[cfg(feature = "shell")]
pub mod resources;
#[cfg(feature = "shell")]
pub mod servo_glue;
#[cfg(feature = "shell")]
pub mod shell;

pub use error::ResourceError;
pub use mode::RuntimeMode;
pub use navigation::{Disposition, NavigationInterceptor, NavigationRequest, Outcome};
pub use protocol::BundleProtocol;
pub use resolver::{BundleResolver, VirtualPath};
