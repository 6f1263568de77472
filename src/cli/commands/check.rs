//! Configuration commands.

use std::path::Path;

use crate::config::{self, Config};

/// Validate a config file and print what the runtime will see.
pub fn cmd_check(path: &Path) -> anyhow::Result<()> {
    let config = config::from_path(path)?;
    print!("{}", summarize(&config));
    Ok(())
}

/// Print the default configuration.
pub fn cmd_default_config() -> anyhow::Result<()> {
    print!("{}", config::to_toml(&Config::default())?);
    Ok(())
}

fn summarize(config: &Config) -> String {
    let mut out = String::new();
    out.push_str("Site Configuration\n");
    out.push_str("==================\n");
    out.push_str(&format!("Sections:  {}\n", config.site.sections.join(", ")));
    out.push_str(&format!("Home:      {}\n", config.site.home));
    out.push_str(&format!(
        "Languages: {} (default {})\n",
        config.site.languages.join(", "),
        config.site.default_language
    ));
    out.push_str(&format!("Tab groups: {}\n", config.tabs.len()));
    for group in &config.tabs {
        let tabs: Vec<&str> = group.tabs.iter().map(|t| t.id.as_str()).collect();
        out.push_str(&format!(
            "  {} [{}]: {}\n",
            group.id,
            group.section.as_deref().unwrap_or("-"),
            tabs.join(", ")
        ));
    }
    out.push_str(&format!(
        "Landing autoplay: {} (section {})\n",
        if config.media.landing_autoplay { "on" } else { "off" },
        config.landing_section()
    ));
    out.push_str(&format!(
        "Lazy loading: {} margin {}px\n",
        if config.lazy.click_to_load { "click-to-load," } else { "proximity," },
        config.lazy.root_margin_px
    ));
    out
}
