//! Compiles `manifests/*.app.toml` into a JSON catalog embedded in the crate.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const MANIFEST_SCHEMA_VERSION: u32 = 1;

fn yes() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct DefaultSize {
    width: i32,
    height: i32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    schema_version: u32,
    app_id: String,
    display_name: String,
    component: String,
    icon_id: String,
    multiwindow: bool,
    reusable: bool,
    large_start: bool,
    resizable: bool,
    #[serde(default = "yes")]
    maximizable: bool,
    show_on_desktop: bool,
    handles_mimetypes: Vec<String>,
    window_defaults: DefaultSize,
}

fn read_manifest(path: &Path) -> Result<Manifest, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("read: {err}"))?;
    let manifest: Manifest = toml::from_str(&raw).map_err(|err| format!("parse: {err}"))?;
    if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
        return Err(format!(
            "schema_version {} is not {MANIFEST_SCHEMA_VERSION}",
            manifest.schema_version
        ));
    }
    if manifest.app_id.trim().is_empty() || manifest.component.trim().is_empty() {
        return Err("app_id and component must be non-empty".to_string());
    }
    let size = &manifest.window_defaults;
    if size.width <= 0 || size.height <= 0 {
        return Err(format!("default size {}x{} is not positive", size.width, size.height));
    }
    Ok(manifest)
}

fn main() {
    let root = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let dir = root.join("manifests");
    println!("cargo:rerun-if-changed={}", dir.display());

    let listing =
        fs::read_dir(&dir).unwrap_or_else(|err| panic!("cannot list {}: {err}", dir.display()));
    let mut catalog = BTreeMap::new();
    for path in listing.filter_map(|entry| entry.ok().map(|entry| entry.path())) {
        let is_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".app.toml"));
        if !is_manifest {
            continue;
        }
        println!("cargo:rerun-if-changed={}", path.display());
        let manifest =
            read_manifest(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()));
        if let Some(previous) = catalog.insert(manifest.app_id.clone(), manifest) {
            panic!("{}: app_id `{}` declared twice", path.display(), previous.app_id);
        }
    }

    // BTreeMap order keeps the catalog sorted by app_id.
    let apps: Vec<&Manifest> = catalog.values().collect();
    let json = serde_json::to_string_pretty(&apps).expect("encode catalog");
    let source = format!("/// App catalog compiled from `manifests/`.\npub const APP_MANIFEST_CATALOG_JSON: &str = r##\"{json}\"##;\n");

    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR")).join("app_catalog_generated.rs");
    fs::write(&out, source).unwrap_or_else(|err| panic!("cannot write {}: {err}", out.display()));
}
