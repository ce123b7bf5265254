//! Analytics Injection Wasm Filter for Envoy Proxy
//!
//! This filter rewrites HTML response bodies as they stream through the
//! proxy, injecting the configured analytics provider's script tag right
//! after the opening `<head>` tag. Only the first occurrence is touched,
//! bodies are processed chunk by chunk without buffering, and the
//! `content-length` header is dropped because the rewrite changes the
//! body length.
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

use log::{debug, info, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType, LogLevel};
use std::cell::RefCell;

mod config;
mod injector;
mod snippet;
mod streaming;
mod telemetry;

use config::FilterConfig;
use injector::StreamingBodyInjector;

// Thread-local storage for filter configuration
thread_local! {
    static CONFIG: RefCell<FilterConfig> = RefCell::new(FilterConfig::default());
}

/// Root context for filter lifecycle management
struct AnalyticsRootContext {
    config: FilterConfig,
}

impl AnalyticsRootContext {
    fn new() -> Self {
        Self {
            config: FilterConfig::default(),
        }
    }
}

impl Context for AnalyticsRootContext {}

impl RootContext for AnalyticsRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        if let Some(config_bytes) = self.get_plugin_configuration() {
            match FilterConfig::from_bytes(&config_bytes) {
                Ok(config) => self.config = config,
                Err(e) => {
                    warn!("Rejecting filter configuration: {}", e);
                    return false;
                }
            }
        }

        // Store config in thread-local for HTTP contexts to access
        CONFIG.with(|c| {
            *c.borrow_mut() = self.config.clone();
        });

        info!(
            "Analytics injection filter initialized: provider={} server={}",
            self.config.provider,
            self.config.resolved_server()
        );

        true
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        Some(Box::new(AnalyticsHttpContext::new(context_id)))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// HTTP context for per-request processing
struct AnalyticsHttpContext {
    context_id: u32,
    /// Configuration snapshot for this request
    config: FilterConfig,
    /// Host the client asked for; referenced by the injected snippet
    host: String,
    /// Present while an HTML response body is being rewritten
    injector: Option<StreamingBodyInjector>,
    /// Why the response was left alone, when it was
    skip_reason: Option<&'static str>,
}

impl AnalyticsHttpContext {
    fn new(context_id: u32) -> Self {
        let config = CONFIG.with(|c| c.borrow().clone());

        Self {
            context_id,
            config,
            host: String::new(),
            injector: None,
            skip_reason: None,
        }
    }
}

impl Context for AnalyticsHttpContext {}

impl HttpContext for AnalyticsHttpContext {
    fn on_http_request_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        // The snippet tags page views with the domain the client visited.
        if let Some(authority) = self.get_http_request_header(":authority") {
            self.host = authority;
        }

        Action::Continue
    }

    fn on_http_response_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        let content_type = self
            .get_http_response_header("content-type")
            .unwrap_or_default();

        if !is_html(&content_type) {
            debug!(
                "[context_id={}] Skipping non-HTML content-type: {}",
                self.context_id, content_type
            );
            self.skip_reason = Some("non-html content-type");
            return Action::Continue;
        }

        // Injection grows the body by the snippet length; a stale
        // content-length would truncate the response at the client.
        self.set_http_response_header("content-length", None);

        let replacement = snippet::head_replacement(
            &self.config.provider,
            &self.host,
            self.config.resolved_server(),
        );
        self.injector = Some(StreamingBodyInjector::new(
            snippet::HEAD_MARKER,
            &replacement,
            self.config.scratch_size,
        ));

        Action::Continue
    }

    fn on_http_response_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        if self.injector.is_none() {
            return Action::Continue;
        }

        let chunk = self
            .get_http_response_body(0, body_size)
            .unwrap_or_default();

        debug!(
            "[context_id={}] Rewriting body chunk: {} bytes, end_of_stream: {}",
            self.context_id,
            chunk.len(),
            end_of_stream
        );

        let rewritten = match self.injector.as_mut() {
            Some(injector) => injector.write_chunk(&chunk, end_of_stream),
            None => return Action::Continue,
        };

        self.set_http_response_body(0, body_size, &rewritten);

        Action::Continue
    }

    fn on_log(&mut self) {
        if !self.config.log_events {
            return;
        }

        let event = match &self.injector {
            Some(injector) if injector.injected() => {
                telemetry::audit_injected().with_bytes(injector.bytes_in(), injector.bytes_out())
            }
            Some(injector) => {
                telemetry::audit_untouched().with_bytes(injector.bytes_in(), injector.bytes_out())
            }
            None => telemetry::audit_skipped(self.skip_reason.unwrap_or("response not rewritten")),
        };

        event
            .with_context_id(self.context_id)
            .with_host(&self.host)
            .with_provider(&self.config.provider)
            .emit();
    }
}

/// Whether a content-type header names a document worth injecting into.
fn is_html(content_type: &str) -> bool {
    let ct_lower = content_type.to_ascii_lowercase();
    ct_lower.contains("text/html") || ct_lower.contains("application/xhtml")
}

// Register the filter with proxy-wasm runtime
proxy_wasm::main! {{
    proxy_wasm::set_log_level(LogLevel::Info);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(AnalyticsRootContext::new())
    });
}}
