use pane_keys::{PaneKind, ViewId};
use serde::{Deserialize, Serialize};

/// Configuration for a [`HierarchicalStore`](crate::HierarchicalStore).
///
/// Every field has a default, so a partial TOML file only needs to name what
/// it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// The canvas shown first; seeded into the view id registry.
    pub root_view: ViewId,
    /// Background applied to newly created views.
    pub default_background: String,
    /// Size given to newly created panes.
    pub pane_size: PaneSize,
    /// Icon given to newly created panes, per kind.
    pub icons: DefaultIcons,
    /// Links written into the `gifs` pool by `init`.
    pub seed_gifs: Vec<SeedLink>,
    /// Links written into the `backgrounds` pool by `init`.
    pub seed_backgrounds: Vec<SeedLink>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_view: ViewId::ROOT,
            default_background: String::new(),
            pane_size: PaneSize::default(),
            icons: DefaultIcons::default(),
            seed_gifs: Vec::new(),
            seed_backgrounds: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Default icon for a newly created pane of `kind`.
    pub fn icon_for(&self, kind: PaneKind) -> &str {
        match kind {
            PaneKind::Station => &self.icons.station,
            PaneKind::Item => &self.icons.item,
            PaneKind::Dummy => &self.icons.dummy,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSize {
    pub width: f64,
    pub height: f64,
}

impl Default for PaneSize {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultIcons {
    pub station: String,
    pub item: String,
    pub dummy: String,
}

impl Default for DefaultIcons {
    fn default() -> Self {
        Self {
            station: "icons/station.png".into(),
            item: "icons/folder.png".into(),
            dummy: "icons/blank.png".into(),
        }
    }
}

/// A link written into a shared pool on first run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeedLink {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

impl SeedLink {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}
