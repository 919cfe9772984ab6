//! Content-type inference for bundle files.

use std::path::Path;

use mime_guess::MimeGuess;

/// Infers the MIME type of a file from its extension. Textual types are
/// served as UTF-8, the encoding bundlers emit.
pub fn content_type_for(path: &Path) -> String {
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    let textual = mime.type_() == mime_guess::mime::TEXT
        || matches!(mime.subtype().as_str(), "javascript" | "ecmascript");

    if textual && mime.get_param(mime_guess::mime::CHARSET).is_none() {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_and_styles_are_utf8() {
        assert_eq!(
            content_type_for(Path::new("docs/index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            content_type_for(Path::new("assets/site.css")),
            "text/css; charset=utf-8"
        );
    }

    #[test]
    fn test_binary_assets() {
        assert_eq!(content_type_for(Path::new("assets/app.wasm")), "application/wasm");
        assert_eq!(content_type_for(Path::new("img/logo.png")), "image/png");
        assert_eq!(content_type_for(Path::new("fonts/a.woff2")), "font/woff2");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(content_type_for(Path::new("LOGO.PNG")), "image/png");
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(
            content_type_for(Path::new("data.zzunknown")),
            "application/octet-stream"
        );
        assert_eq!(content_type_for(Path::new("LICENSE")), "application/octet-stream");
    }
}
