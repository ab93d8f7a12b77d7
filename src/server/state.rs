//! Shared application state for the mock service.

use minijinja::Environment;
use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::flake::DelayInjector;
use crate::jsonl::JsonlWriter;
use crate::settings::Settings;

/// A catalog entry served by the mock API.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
}

/// State shared by all request handlers.
///
/// The delay injector and the request-log writer are the only shared
/// mutable resources; each serializes its own access internally.
pub struct AppState {
    pub injector: DelayInjector,
    pub request_log: JsonlWriter,
    pub items: Vec<Item>,
    pub ui_overlay_ms: u64,
    templates: Environment<'static>,
}

impl AppState {
    pub fn new(settings: &Settings, artifacts_dir: &Path) -> Result<Self> {
        let injector = DelayInjector::new(settings.delay_config())?;
        let request_log = JsonlWriter::new(artifacts_dir.join(&settings.log_filename));

        let mut templates = Environment::new();
        templates.add_template("index.html", include_str!("templates/index.html"))?;
        templates.add_template("detail.html", include_str!("templates/detail.html"))?;

        let items = (1..=5)
            .map(|i| Item {
                id: i,
                name: format!("Item {i}"),
            })
            .collect();

        Ok(Self {
            injector,
            request_log,
            items,
            ui_overlay_ms: settings.ui_overlay_ms,
            templates,
        })
    }

    pub fn find_item(&self, id: u64) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Renders a page template and injects the overlay-duration constant
    /// into its head.
    pub fn render_page(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let html = self.templates.get_template(name)?.render(ctx)?;
        Ok(html.replace(
            "</head>",
            &format!(
                "<script>window.__OVERLAY_MS__ = {};</script></head>",
                self.ui_overlay_ms
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let settings = Settings {
            ui_overlay_ms: 300,
            ..Settings::default()
        };
        AppState::new(&settings, Path::new("artifacts")).unwrap()
    }

    #[test]
    fn seeds_five_items() {
        let state = state();
        assert_eq!(state.items.len(), 5);
        assert_eq!(state.find_item(3).unwrap().name, "Item 3");
        assert!(state.find_item(99).is_none());
    }

    #[test]
    fn pages_carry_the_overlay_constant() {
        let state = state();
        let html = state
            .render_page("index.html", minijinja::context! {})
            .unwrap();
        assert!(html.contains("window.__OVERLAY_MS__ = 300;"));
        assert!(html.contains("id=\"list\""));

        let html = state
            .render_page("detail.html", minijinja::context! { item_id => 2 })
            .unwrap();
        assert!(html.contains("window.__OVERLAY_MS__ = 300;"));
        assert!(html.contains("id=\"approve\""));
        assert!(html.contains("id=\"status\""));
    }
}
