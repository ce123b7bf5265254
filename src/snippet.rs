//! Injected content per analytics provider.
//!
//! The snippet goes right after the opening `<head>` tag, so the rewrite
//! pattern is the marker itself and the replacement is the marker plus the
//! snippet; the tag survives in the output.

/// Byte pattern the body rewrite searches for.
pub const HEAD_MARKER: &[u8] = b"<head>";

/// The provider-specific tag to inject.
///
/// `host` is the domain the client requested (the site being tracked);
/// `server` is where the provider's script is served from. An unknown
/// provider yields an empty snippet.
pub fn snippet_for(provider: &str, host: &str, server: &str) -> String {
    match provider {
        "plausible" => format!(
            r#"<script defer data-domain="{host}" src="https://{server}/js/script.js"></script>"#
        ),
        _ => String::new(),
    }
}

/// Replacement bytes for the body rewrite: marker followed by snippet.
pub fn head_replacement(provider: &str, host: &str, server: &str) -> Vec<u8> {
    let mut replacement = HEAD_MARKER.to_vec();
    replacement.extend_from_slice(snippet_for(provider, host, server).as_bytes());
    replacement
}
