//! Server-rendered document that hosts one post's visualization.
//!
//! The stored HTML is mounted through `innerHTML`, the stored CSS goes in a
//! `<style>` element and the stored script is wrapped in a function that
//! receives a `viz` handle once every library has fired its load event:
//!
//! - `viz.mount` the element holding the stored HTML
//! - `viz.config` the post's config JSON, or `null`
//! - `viz.signal` an `AbortSignal` aborted on teardown
//! - `viz.register(fn)` adds a disposer run on `pagehide`
//! - `viz.ready()` / `viz.fail(message)` report the outcome
//!
//! Scripts that never call `viz.ready()` are treated as running once they
//! return without throwing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use vizfeed_types::models::Post;

use super::library::LibraryManifest;
use crate::html::escape;

/// Registry session the document reports its lifecycle to.
#[derive(Debug, Clone)]
pub struct EmbedSession {
    pub session_id: Uuid,
    /// `DELETE` target used on teardown.
    pub session_url: String,
    pub events_url: String,
}

#[derive(Debug, Clone)]
pub struct EmbedDocument {
    pub html: String,
    /// Value for the `Content-Security-Policy` header.
    pub csp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Bootstrap<'a> {
    scripts: &'a [String],
    globals: &'a [&'static str],
    base_url: Option<&'a str>,
    html: &'a str,
    config: Option<&'a serde_json::Value>,
    session_id: Option<Uuid>,
    session: Option<&'a str>,
    events: Option<&'a str>,
}

const BASE_CSS: &str = "html,body{margin:0;padding:0;width:100%;height:100%;overflow:hidden;background:#000;}\
#viz-root{position:relative;width:100%;height:100%;}\
#viz-status{position:absolute;inset:auto 16px 16px 16px;padding:12px 16px;border-radius:8px;\
background:rgba(127,29,29,.9);color:#fff;font:14px/1.4 system-ui,sans-serif;z-index:10;}";

const BOOTSTRAP_JS: &str = r#"(function () {
  "use strict";
  var boot = JSON.parse(document.getElementById("viz-boot").textContent);
  var root = document.getElementById("viz-root");
  var status = document.getElementById("viz-status");
  var controller = new AbortController();
  var disposers = [];
  var queue = Promise.resolve();
  var running = false;
  var failed = false;

  function report(type, data) {
    if (!boot.events || controller.signal.aborted) return;
    var body = data === undefined ? { type: type } : { type: type, data: data };
    queue = queue.then(function () {
      return fetch(boot.events, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body),
        keepalive: true
      });
    }).catch(function () {});
  }

  function loadScript(src) {
    return new Promise(function (resolve, reject) {
      var el = document.createElement("script");
      el.src = src;
      el.async = false;
      el.onload = function () { resolve(); };
      el.onerror = function () { reject(new Error("Failed to load " + src)); };
      document.head.appendChild(el);
    });
  }

  var viz = {
    mount: root,
    config: boot.config,
    signal: controller.signal,
    register: function (dispose) {
      if (typeof dispose === "function") disposers.push(dispose);
    },
    ready: function () {
      if (running || failed) return;
      running = true;
      report("Running");
    },
    fail: function (message) {
      if (failed) return;
      failed = true;
      message = String(message);
      status.textContent = message;
      status.hidden = false;
      report("Failed", { message: message });
    }
  };

  // Unmounts the session in one request, outside the report queue.
  function teardown() {
    if (controller.signal.aborted) return;
    controller.abort();
    if (boot.session) {
      fetch(boot.session, { method: "DELETE", keepalive: true }).catch(function () {});
    }
    while (disposers.length) {
      try { disposers.pop()(); } catch (e) { console.error(e); }
    }
    root.innerHTML = "";
  }

  window.addEventListener("pagehide", teardown);
  window.addEventListener("error", function (e) { viz.fail(e.message || "Script error"); });
  window.addEventListener("unhandledrejection", function (e) {
    viz.fail(e.reason && e.reason.message ? e.reason.message : String(e.reason));
  });

  if (boot.baseUrl) window.CESIUM_BASE_URL = boot.baseUrl;
  root.innerHTML = boot.html;

  boot.scripts.reduce(function (chain, src) {
    return chain.then(function () { return loadScript(src); });
  }, Promise.resolve())
    .then(function () {
      var missing = boot.globals.filter(function (name) { return !(name in window); });
      if (missing.length) throw new Error("Library did not define " + missing.join(", "));
      if (controller.signal.aborted) return;
      report("LibrariesLoaded");
      report("Execute");
      var main = window.__vizfeedMain;
      if (typeof main !== "function") throw new Error("Visualization script failed to parse");
      return main(viz);
    })
    .then(function () { if (!controller.signal.aborted) viz.ready(); })
    .catch(function (err) {
      console.error(err);
      viz.fail(err && err.message ? err.message : String(err));
    });
})();"#;

/// Breaks every case-insensitive `</tag` so stored text cannot close the
/// element hosting it.
fn neutralise(text: &str, tag: &str) -> String {
    let needle = format!("</{tag}");
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices(&needle) {
        out.push_str(&text[last..idx]);
        out.push_str("<\\/");
        last = idx + 2;
    }
    out.push_str(&text[last..]);
    out.replace("<!--", "<\\!--")
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    B64.encode(bytes)
}

pub fn content_security_policy(manifest: &LibraryManifest, nonce: &str) -> String {
    let origins = manifest.origins().join(" ");
    format!(
        "default-src 'none'; \
         script-src 'nonce-{nonce}' {origins}; \
         style-src 'unsafe-inline' {origins}; \
         img-src * data: blob:; \
         font-src * data:; \
         connect-src *; \
         worker-src blob: {origins}; \
         base-uri 'none'; \
         form-action 'none'"
    )
}

/// Assembles the embed document for `post`. `session` is omitted when the
/// document should not report to the registry.
pub fn render_embed_document(
    post: &Post,
    manifest: &LibraryManifest,
    session: Option<&EmbedSession>,
) -> EmbedDocument {
    let nonce = generate_nonce();

    let boot = Bootstrap {
        scripts: &manifest.scripts,
        globals: &manifest.globals,
        base_url: manifest.base_url.as_deref(),
        html: &post.custom_html,
        config: post.config.as_ref(),
        session_id: session.map(|s| s.session_id),
        session: session.map(|s| s.session_url.as_str()),
        events: session.map(|s| s.events_url.as_str()),
    };
    // '<' only occurs inside JSON strings, where \u003c decodes to the same text.
    let boot_json = serde_json::to_string(&boot)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c");

    let stylesheets: String = manifest
        .stylesheets
        .iter()
        .map(|href| format!("\n    <link rel=\"stylesheet\" href=\"{}\">", escape(href)))
        .collect();

    let description = post.description.as_deref().unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <meta name="description" content="{description}">{stylesheets}
    <style>{BASE_CSS}</style>
    <style>{css}</style>
  </head>
  <body>
    <div id="viz-root" data-post="{slug}" data-type="{kind}"></div>
    <div id="viz-status" role="alert" hidden></div>
    <script id="viz-boot" type="application/json">{boot_json}</script>
    <script nonce="{nonce}">
window.__vizfeedMain = async function (viz) {{
{script}
}};
    </script>
    <script nonce="{nonce}">{BOOTSTRAP_JS}</script>
  </body>
</html>
"#,
        title = escape(&post.title),
        description = escape(description),
        css = neutralise(&post.custom_css, "style"),
        slug = escape(&post.slug),
        kind = post.kind,
        script = neutralise(&post.custom_script, "script"),
    );

    EmbedDocument {
        html,
        csp: content_security_policy(manifest, &nonce),
    }
}

/// Page served when no post matches the requested slug and type.
pub fn render_not_found(slug: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Visualization Not Found</title>
    <style>body{{margin:0;min-height:100vh;display:flex;align-items:center;justify-content:center;background:#000;color:#fff;font-family:system-ui,sans-serif;text-align:center;}}p{{color:#9ca3af;}}</style>
  </head>
  <body>
    <div>
      <h1>Visualization Not Found</h1>
      <p>No visualization is published under “{}”.</p>
    </div>
  </body>
</html>
"#,
        escape(slug)
    )
}
