use vizfeed_types::models::VizKind;

const THREE_JS: &str = "https://unpkg.com/three@0.160.0/build/three.min.js";
const GLOBE_GL: &str = "https://unpkg.com/globe.gl@2.30.0/dist/globe.gl.min.js";
const CESIUM_BASE: &str = "https://cesium.com/downloads/cesiumjs/releases/1.114/Build/Cesium";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";

/// The external scripts and stylesheets a post kind needs, in load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryManifest {
    pub scripts: Vec<String>,
    pub stylesheets: Vec<String>,
    /// Globals that must exist once every script has loaded.
    pub globals: Vec<&'static str>,
    /// Asset root some libraries read from `window` before loading.
    pub base_url: Option<String>,
}

impl LibraryManifest {
    pub fn for_kind(kind: VizKind) -> Self {
        match kind {
            VizKind::Custom | VizKind::Globe => Self {
                scripts: vec![THREE_JS.to_string(), GLOBE_GL.to_string()],
                stylesheets: Vec::new(),
                globals: vec!["THREE", "Globe"],
                base_url: None,
            },
            VizKind::Cesium => Self {
                scripts: vec![format!("{CESIUM_BASE}/Cesium.js")],
                stylesheets: vec![format!("{CESIUM_BASE}/Widgets/widgets.css")],
                globals: vec!["Cesium"],
                base_url: Some(CESIUM_BASE.to_string()),
            },
            VizKind::Leaflet => Self {
                scripts: vec![LEAFLET_JS.to_string()],
                stylesheets: vec![LEAFLET_CSS.to_string()],
                globals: vec!["L"],
                base_url: None,
            },
        }
    }

    /// Distinct `scheme://host` origins of every asset, for the CSP.
    pub fn origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = Vec::new();
        for url in self.scripts.iter().chain(&self.stylesheets) {
            if let Some(origin) = origin_of(url) {
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
        }
        origins
    }
}

fn origin_of(url: &str) -> Option<String> {
    let (scheme, rest) = url.split_once("://")?;
    let host = rest.split('/').next()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{scheme}://{host}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_loads_three_before_globe() {
        let manifest = LibraryManifest::for_kind(VizKind::Custom);
        assert_eq!(manifest.scripts.len(), 2);
        assert!(manifest.scripts[0].contains("three@0.160.0"));
        assert!(manifest.scripts[1].contains("globe.gl@2.30.0"));
        assert_eq!(manifest.globals, vec!["THREE", "Globe"]);
    }

    #[test]
    fn leaflet_and_cesium_expose_their_globals() {
        assert_eq!(LibraryManifest::for_kind(VizKind::Leaflet).globals, vec!["L"]);
        let cesium = LibraryManifest::for_kind(VizKind::Cesium);
        assert_eq!(cesium.globals, vec!["Cesium"]);
        assert!(cesium.base_url.is_some());
    }

    #[test]
    fn origins_are_deduplicated() {
        assert_eq!(
            LibraryManifest::for_kind(VizKind::Leaflet).origins(),
            vec!["https://unpkg.com".to_string()]
        );
    }
}
