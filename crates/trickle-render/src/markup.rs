//! Placeholder and patch markup for out-of-order streaming.

use trickle_core::{CorrelationId, MarkupConfig};

/// Builds the three pieces of the patch protocol.
///
/// 1. An activation script, sent once, defining the swap function.
/// 2. A placeholder container written at the slot's position.
/// 3. A resolved patch appended to the tail of the stream: a `<template>`
///    holding the content and a script calling the swap function.
#[derive(Debug, Clone, Default)]
pub struct Markup {
    config: MarkupConfig,
}

impl Markup {
    /// Create markup from configured names.
    pub fn new(config: MarkupConfig) -> Self {
        Self { config }
    }

    /// Generate the script that applies patches in the browser.
    ///
    /// The swap function replaces the placeholder with the template content,
    /// then removes the template and the script that called it.
    pub fn activation_script(&self) -> String {
        let attr = &self.config.attribute;
        format!(
            r#"<script>
function {func}(cid) {{
  const target = document.querySelector(`[{attr}="${{cid}}"]`);
  const template = document.querySelector(`template[{attr}="${{cid}}"]`);
  target.replaceWith(template.content.cloneNode(true));
  template.remove();
  document.currentScript.remove();
}}
</script>"#,
            func = self.config.swap_function,
            attr = attr,
        )
    }

    /// Wrap pending content in a placeholder tagged with the correlation ID.
    pub fn placeholder(&self, cid: CorrelationId, contents: &str) -> String {
        format!(
            r#"<{tag} {attr}="{cid}">{contents}</{tag}>"#,
            tag = self.config.container_tag,
            attr = self.config.attribute,
        )
    }

    /// Wrap resolved content in a patch for the correlation ID.
    pub fn resolved_patch(&self, cid: CorrelationId, contents: &str) -> String {
        format!(
            r#"<template {attr}="{cid}">{contents}</template><script>{func}({cid})</script>"#,
            attr = self.config.attribute,
            func = self.config.swap_function,
        )
    }
}

/// Escape text for HTML element and attribute content.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
