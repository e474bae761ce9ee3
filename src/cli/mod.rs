//! CLI command definitions and terminal rendering helpers.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use colored::Colorize;

use revdiff::providers::ProviderDescriptor;
use revdiff::providers::registry;

/// Render the provider availability table.
pub fn render_providers(descriptors: &[ProviderDescriptor]) -> String {
    let mut out = String::new();
    for d in descriptors {
        let (icon, status) = if d.is_available {
            ("✔".green().bold().to_string(), "available".green().to_string())
        } else {
            (
                "✖".red().to_string(),
                format!("set {}", registry::credentials(d.id).join(", ")).dimmed().to_string(),
            )
        };
        out.push_str(&format!(
            "  {icon} {:<11} {:<28} {status}\n",
            d.id.as_str().bold(),
            d.default_model
        ));
    }
    out
}
