//! Maps filesystem items and app identifiers to launch actions.
//!
//! Resolution is pure: it reads the filesystem and the registry and decides which app opens a
//! target, with which launch params and window title. Multi-instance policy is applied later by
//! the runtime services.

use platform_host::{FileSystemItem, ItemId, MimeType, VirtualFileSystem};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::apps::{AppDescriptor, AppRegistry};

/// Maximum number of shortcut hops followed before resolution gives up.
pub const MAX_SHORTCUT_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// What the user asked to open.
pub enum LaunchTarget {
    /// A filesystem item (file double-click, desktop icon).
    Item(ItemId),
    /// An app by registry id or display name (dock, search).
    App(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Which app to open, with which props and title.
pub struct LaunchAction {
    /// Registry id of the target app.
    pub app_id: String,
    pub launch_params: Value,
    pub title: String,
    /// Identity of the opened content; `None` for plain app launches.
    pub content_key: Option<String>,
}

/// Resolves `target` to a launch action, or `None` when nothing can open it.
pub fn resolve_launch(
    target: &LaunchTarget,
    fs: &VirtualFileSystem,
    registry: &AppRegistry,
) -> Option<LaunchAction> {
    match target {
        LaunchTarget::App(key) => registry.find_by_id_or_name(key).map(app_launch),
        LaunchTarget::Item(id) => resolve_item(fs.item(id)?, fs, registry, 0),
    }
}

fn app_launch(app: &AppDescriptor) -> LaunchAction {
    LaunchAction {
        app_id: app.app_id.clone(),
        launch_params: json!({}),
        title: app.display_name.clone(),
        content_key: None,
    }
}

fn resolve_item(
    item: &FileSystemItem,
    fs: &VirtualFileSystem,
    registry: &AppRegistry,
    depth: usize,
) -> Option<LaunchAction> {
    match &item.mimetype {
        MimeType::Folder => {
            let explorer = registry.handler_for(&MimeType::Folder)?;
            Some(LaunchAction {
                app_id: explorer.app_id.clone(),
                launch_params: json!({
                    "folder_id": item.id,
                    "path": fs.breadcrumb(&item.id),
                }),
                title: item.name.clone(),
                content_key: Some(item.id.to_string()),
            })
        }
        MimeType::Shortcut => {
            if depth >= MAX_SHORTCUT_DEPTH {
                return None;
            }
            let link = item.link.as_deref()?.trim();
            if let Some(target) = fs.item(&ItemId::from(link)) {
                return resolve_item(target, fs, registry, depth + 1);
            }
            if looks_like_url(link) {
                return url_launch(registry, &item.name, link, &item.id);
            }
            registry.find_by_id_or_name(link).map(app_launch)
        }
        MimeType::AppLink => {
            let key = item.link.as_deref().unwrap_or(&item.name);
            registry.find_by_id_or_name(key).map(app_launch)
        }
        MimeType::Url => {
            let url = item
                .link
                .as_deref()
                .or(item.content.as_deref())
                .map(str::trim)
                .filter(|url| !url.is_empty())?;
            url_launch(registry, &item.name, url, &item.id)
        }
        mimetype => {
            let handler = registry.handler_for(mimetype)?;
            Some(LaunchAction {
                app_id: handler.app_id.clone(),
                launch_params: json!({
                    "item_id": item.id,
                    "title": item.name,
                    "mimetype": mimetype,
                    "content": item.content,
                }),
                title: item.name.clone(),
                content_key: Some(item.id.to_string()),
            })
        }
    }
}

fn url_launch(
    registry: &AppRegistry,
    title: &str,
    url: &str,
    item_id: &ItemId,
) -> Option<LaunchAction> {
    let browser = registry.handler_for(&MimeType::Url)?;
    Some(LaunchAction {
        app_id: browser.app_id.clone(),
        launch_params: json!({ "url": url }),
        title: title.to_string(),
        content_key: Some(item_id.to_string()),
    })
}

fn looks_like_url(link: &str) -> bool {
    link.starts_with("http://") || link.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use platform_host::NewItem;
    use pretty_assertions::assert_eq;

    use super::*;

    fn fixture() -> (VirtualFileSystem, platform_host::WellKnownFolders) {
        let fs = VirtualFileSystem::with_user("ada", "Ada");
        let folders = fs.well_known("ada").expect("seeded");
        (fs, folders)
    }

    #[test]
    fn folders_open_in_explorer_with_breadcrumb_path() {
        let (mut fs, folders) = fixture();
        let notes = fs.create_folder("Notes", &folders.desktop).expect("folder");
        let registry = AppRegistry::builtin();

        let action =
            resolve_launch(&LaunchTarget::Item(notes.clone()), &fs, &registry).expect("launch");
        assert_eq!(action.app_id, "explorer");
        assert_eq!(action.title, "Notes");
        assert_eq!(action.content_key, Some(notes.to_string()));
        assert_eq!(action.launch_params["path"], json!(["ada", "Desktop", "Notes"]));
    }

    #[test]
    fn typed_files_open_in_their_registered_handler() {
        let (mut fs, folders) = fixture();
        let todo = fs
            .create_file("todo.txt", &folders.documents, Some("buy milk".to_string()))
            .expect("file");
        let readme = fs
            .create_file("readme.md", &folders.documents, Some("# hi".to_string()))
            .expect("file");
        let registry = AppRegistry::builtin();

        let action = resolve_launch(&LaunchTarget::Item(todo), &fs, &registry).expect("launch");
        assert_eq!(action.app_id, "notepad");
        assert_eq!(action.launch_params["content"], json!("buy milk"));
        assert_eq!(action.launch_params["mimetype"], json!("text/plain"));

        let action = resolve_launch(&LaunchTarget::Item(readme), &fs, &registry).expect("launch");
        assert_eq!(action.app_id, "markdown");
    }

    #[test]
    fn shortcuts_follow_links_up_to_the_depth_limit() {
        let (mut fs, folders) = fixture();
        let registry = AppRegistry::builtin();
        let target = fs
            .create_file("photo.png", &folders.documents, None)
            .expect("file");

        let mut link = target.clone();
        for hop in 0..MAX_SHORTCUT_DEPTH {
            link = fs
                .create_shortcut(&format!("hop {hop}"), &folders.desktop, &link)
                .expect("shortcut");
        }
        let action =
            resolve_launch(&LaunchTarget::Item(link.clone()), &fs, &registry).expect("5 hops");
        assert_eq!(action.app_id, "photos");
        assert_eq!(action.content_key, Some(target.to_string()));

        let too_deep = fs
            .create_shortcut("hop 5", &folders.desktop, &link)
            .expect("shortcut");
        assert_eq!(
            resolve_launch(&LaunchTarget::Item(too_deep), &fs, &registry),
            None
        );
    }

    #[test]
    fn shortcut_cycles_terminate() {
        let (mut fs, folders) = fixture();
        let registry = AppRegistry::builtin();
        let a = fs
            .create_shortcut("a", &folders.desktop, &ItemId::from("placeholder"))
            .expect("a");
        let b = fs.create_shortcut("b", &folders.desktop, &a).expect("b");

        let mut snapshot = fs.snapshot();
        for item in snapshot.items.iter_mut().filter(|item| item.id == a) {
            item.link = Some(b.to_string());
        }
        fs.restore_snapshot(snapshot);

        assert_eq!(resolve_launch(&LaunchTarget::Item(a), &fs, &registry), None);
    }

    #[test]
    fn app_links_and_urls_resolve() {
        let (mut fs, folders) = fixture();
        let registry = AppRegistry::builtin();
        let calc = fs
            .create_item(
                &folders.desktop,
                NewItem {
                    name: "Calc".to_string(),
                    mimetype: MimeType::AppLink,
                    content: None,
                    link: Some("Calculator".to_string()),
                },
            )
            .expect("app link");
        let site = fs
            .create_item(
                &folders.desktop,
                NewItem {
                    name: "Homepage".to_string(),
                    mimetype: MimeType::Url,
                    content: None,
                    link: Some("https://example.com".to_string()),
                },
            )
            .expect("url");

        let action = resolve_launch(&LaunchTarget::Item(calc), &fs, &registry).expect("calc");
        assert_eq!(action.app_id, "calculator");
        assert_eq!(action.content_key, None);

        let action = resolve_launch(&LaunchTarget::Item(site), &fs, &registry).expect("url");
        assert_eq!(action.app_id, "browser");
        assert_eq!(action.launch_params, json!({ "url": "https://example.com" }));
    }

    #[test]
    fn unknown_targets_resolve_to_none() {
        let (mut fs, folders) = fixture();
        let registry = AppRegistry::builtin();
        let song = fs
            .create_item(
                &folders.desktop,
                NewItem {
                    name: "song.ogg".to_string(),
                    mimetype: MimeType::Other("audio/ogg".to_string()),
                    content: None,
                    link: None,
                },
            )
            .expect("file");

        assert_eq!(resolve_launch(&LaunchTarget::Item(song), &fs, &registry), None);
        assert_eq!(
            resolve_launch(&LaunchTarget::Item(ItemId::from("gone")), &fs, &registry),
            None
        );
        assert_eq!(
            resolve_launch(&LaunchTarget::App("solitaire".to_string()), &fs, &registry),
            None
        );
    }
}
