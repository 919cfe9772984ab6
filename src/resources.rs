//! Lecteur de ressources Servo.
//!
//! Servo a besoin de ses propres fichiers de ressources (préférences,
//! certificats, domaines publics, etc.). L'embedder fournit une
//! implémentation de `ResourceReaderMethods` enregistrée via
//! `servo::resources::set()`.
//!
//! À ne pas confondre avec le bundle du site : ce dossier appartient au
//! moteur. Recherche du dossier `resources/` :
//! 1. Variable d'environnement `SERVO_RESOURCES_PATH`
//! 2. À côté de l'exécutable (`<exe_dir>/resources/`)
//! 3. À la racine du projet cargo si l'exécutable est sous `target/`
//! 4. Dans le répertoire courant (`./resources/`)

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

use servo::resources::{self, Resource};
use tracing::{error, info};

use crate::mode::cargo_project_root;

/// Variable d'environnement pointant vers le dossier de ressources Servo.
pub const RESOURCES_ENV: &str = "SERVO_RESOURCES_PATH";

/// Dossier résolu par [`init`], canonique.
static RESOURCES_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Localise le dossier de ressources et installe le lecteur.
///
/// **Doit être appelé avant `ServoBuilder::build()`**. Échoue si aucun
/// dossier `resources/` n'est trouvé : Servo ne peut pas démarrer sans.
pub fn init() -> io::Result<()> {
    let exe = env::current_exe().ok().and_then(|p| p.canonicalize().ok());
    let cwd = env::current_dir().ok();
    let dir = locate_resources_dir(
        env::var_os(RESOURCES_ENV).map(PathBuf::from),
        exe.as_deref(),
        cwd.as_deref(),
    )
    .ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Servo 'resources/' directory not found; set {RESOURCES_ENV}"),
        )
    })?
    .canonicalize()?;

    info!(path = %dir.display(), "Servo resources located");
    let dir = RESOURCES_DIR.get_or_init(|| dir).clone();
    resources::set(Box::new(ResourceReader { dir }));
    Ok(())
}

/// Premier candidat existant dans l'ordre de recherche.
fn locate_resources_dir(
    env_override: Option<PathBuf>,
    exe: Option<&Path>,
    cwd: Option<&Path>,
) -> Option<PathBuf> {
    let exe_dir = exe.and_then(Path::parent);
    let candidates = [
        env_override,
        exe_dir.map(|dir| dir.join("resources")),
        exe_dir
            .and_then(cargo_project_root)
            .map(|root| root.join("resources")),
        cwd.map(|dir| dir.join("resources")),
    ];
    candidates.into_iter().flatten().find(|p| p.is_dir())
}

struct ResourceReader {
    dir: PathBuf,
}

impl ResourceReader {
    fn path_for(&self, filename: &str) -> io::Result<PathBuf> {
        let canonical = self.dir.join(filename).canonicalize()?;
        if !canonical.starts_with(&self.dir) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("resource '{filename}' resolves outside {}", self.dir.display()),
            ));
        }
        Ok(canonical)
    }
}

impl resources::ResourceReaderMethods for ResourceReader {
    fn read(&self, file: Resource) -> Vec<u8> {
        let filename = file.filename();
        match self.path_for(filename).and_then(fs::read) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(resource = filename, error = %e, "Cannot read Servo resource");
                Vec::new()
            }
        }
    }

    fn sandbox_access_files_dirs(&self) -> Vec<PathBuf> {
        vec![self.dir.clone()]
    }

    fn sandbox_access_files(&self) -> Vec<PathBuf> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_env_override_wins() {
        let explicit = tempdir().unwrap();
        let cwd = tempdir().unwrap();
        fs::create_dir(cwd.path().join("resources")).unwrap();

        let found = locate_resources_dir(
            Some(explicit.path().to_path_buf()),
            None,
            Some(cwd.path()),
        );
        assert_eq!(found.as_deref(), Some(explicit.path()));
    }

    #[test]
    fn test_next_to_executable() {
        let install = tempdir().unwrap();
        fs::create_dir(install.path().join("resources")).unwrap();
        let exe = install.path().join("bundleview");

        let found = locate_resources_dir(None, Some(&exe), None);
        assert_eq!(found, Some(install.path().join("resources")));
    }

    #[test]
    fn test_cargo_project_root_during_development() {
        let project = tempdir().unwrap();
        fs::create_dir(project.path().join("resources")).unwrap();
        fs::create_dir_all(project.path().join("target/debug")).unwrap();
        let exe = project.path().join("target/debug/bundleview");

        let found = locate_resources_dir(None, Some(&exe), None);
        assert_eq!(found, Some(project.path().join("resources")));
    }

    #[test]
    fn test_missing_everywhere() {
        let empty = tempdir().unwrap();
        let exe = empty.path().join("bundleview");
        assert!(locate_resources_dir(None, Some(&exe), Some(empty.path())).is_none());
    }

    #[test]
    fn test_reader_refuses_escape() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("resources")).unwrap();
        fs::write(root.path().join("secret.txt"), "x").unwrap();
        let reader = ResourceReader {
            dir: root.path().join("resources").canonicalize().unwrap(),
        };

        let err = reader.path_for("../secret.txt").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_reader_reads_inside() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("prefs.json"), "{}").unwrap();
        let reader = ResourceReader {
            dir: root.path().canonicalize().unwrap(),
        };
        assert!(reader.path_for("prefs.json").is_ok());
    }
}
