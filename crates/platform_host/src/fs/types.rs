//! Virtual filesystem data types shared across host contracts and the desktop runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel parent id for top-level items.
pub const ROOT_ITEM_ID: &str = "root";
/// Schema version for [`FsSnapshot`] payloads.
pub const FS_SNAPSHOT_SCHEMA_VERSION: u32 = 1;
/// Upper bound on parent-chain walks; longer chains are treated as corrupt.
pub const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Stable identifier for a filesystem item.
pub struct ItemId(pub String);

impl ItemId {
    /// Creates an id from any string-like value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the sentinel root id.
    pub fn root() -> Self {
        Self(ROOT_ITEM_ID.to_string())
    }

    /// Returns `true` for the sentinel root id.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ITEM_ID
    }

    /// Returns the string form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric suffix of generated `item-<n>` ids.
    pub fn generated_index(&self) -> Option<u64> {
        self.0.strip_prefix("item-")?.parse().ok()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
/// Mimetype discriminating folders, files and special link kinds.
pub enum MimeType {
    /// Folder container.
    Folder,
    /// Link to another item (`link` holds the target item id or path).
    Shortcut,
    /// Executable link to a registered application (`link` holds the app id).
    AppLink,
    /// Plain UTF-8 text.
    PlainText,
    /// Markdown document.
    Markdown,
    /// Raster or vector image; holds the subtype (`png`, `svg+xml`, ...).
    Image(String),
    /// PDF document.
    Pdf,
    /// External URL (`link` holds the address).
    Url,
    /// Any other mimetype, preserved verbatim.
    Other(String),
}

impl MimeType {
    /// Returns the canonical string form used in snapshots.
    pub fn as_string(&self) -> String {
        match self {
            Self::Folder => "folder".to_string(),
            Self::Shortcut => "shortcut".to_string(),
            Self::AppLink => "app-link".to_string(),
            Self::PlainText => "text/plain".to_string(),
            Self::Markdown => "text/markdown".to_string(),
            Self::Image(subtype) => format!("image/{subtype}"),
            Self::Pdf => "application/pdf".to_string(),
            Self::Url => "text/uri-list".to_string(),
            Self::Other(raw) => raw.clone(),
        }
    }

    /// Returns `true` for folder items.
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }

    /// Returns `true` for payloads stored as UTF-8 text rather than data URLs.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::PlainText | Self::Markdown | Self::Url)
            || matches!(self, Self::Image(subtype) if subtype == "svg+xml")
            || matches!(self, Self::Other(raw) if raw.starts_with("text/") || raw == "application/json")
    }

    /// Short label used when sorting by type.
    pub fn type_label(&self) -> String {
        match self {
            Self::Image(_) => "image".to_string(),
            other => other.as_string(),
        }
    }
}

impl From<String> for MimeType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "folder" | "directory" | "inode/directory" => Self::Folder,
            "shortcut" | "alias" => Self::Shortcut,
            "app-link" | "application/x-app" => Self::AppLink,
            "text/plain" => Self::PlainText,
            "text/markdown" => Self::Markdown,
            "application/pdf" => Self::Pdf,
            "text/uri-list" | "url" => Self::Url,
            _ => match raw.strip_prefix("image/") {
                Some(subtype) if !subtype.is_empty() => Self::Image(subtype.to_string()),
                _ => Self::Other(raw),
            },
        }
    }
}

impl From<MimeType> for String {
    fn from(value: MimeType) -> Self {
        value.as_string()
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A single file or folder record in the virtual filesystem.
pub struct FileSystemItem {
    /// Stable id assigned at creation.
    pub id: ItemId,
    /// Display name, unique among siblings.
    pub name: String,
    /// Containing folder id or [`ROOT_ITEM_ID`].
    pub parent: ItemId,
    /// Kind discriminator.
    pub mimetype: MimeType,
    /// Text or data-URL payload for files.
    #[serde(default)]
    pub content: Option<String>,
    /// URL, shortcut target, or app id depending on `mimetype`.
    #[serde(default)]
    pub link: Option<String>,
    /// Not user-deletable or renameable without an override.
    #[serde(default)]
    pub is_system: bool,
    /// Blocks writes, renames and trashing for the item and its descendants.
    #[serde(default)]
    pub is_read_only: bool,
    /// This item is a trash container.
    #[serde(default)]
    pub is_trash: bool,
    /// Parent captured when the item was moved to the trash.
    #[serde(default)]
    pub original_parent: Option<ItemId>,
    /// Owning username.
    #[serde(default)]
    pub owner: Option<String>,
    /// Creation time in unix milliseconds.
    #[serde(default)]
    pub created_at_unix_ms: u64,
    /// Last modification time in unix milliseconds.
    #[serde(default)]
    pub modified_at_unix_ms: u64,
}

impl FileSystemItem {
    /// Returns `true` for folder-like items (folders and trash containers).
    pub fn is_folder(&self) -> bool {
        self.mimetype.is_folder() || self.is_trash
    }

    /// Payload size used for size ordering.
    pub fn size(&self) -> usize {
        self.content.as_deref().map(str::len).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Minimal user record carried in filesystem snapshots.
pub struct UserRecord {
    /// Login name used for ownership scoping.
    pub username: String,
    /// Human-readable name.
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Well-known folder ids seeded for each user.
pub struct WellKnownFolders {
    /// The user's home folder (path resolution starts here).
    pub home: ItemId,
    /// Desktop folder.
    pub desktop: ItemId,
    /// Documents folder.
    pub documents: ItemId,
    /// Downloads folder.
    pub downloads: ItemId,
    /// Trash container.
    pub trash: ItemId,
}

impl WellKnownFolders {
    /// Returns the deterministic well-known ids for `username`.
    pub fn for_user(username: &str) -> Self {
        Self {
            home: ItemId(format!("home:{username}")),
            desktop: ItemId(format!("desktop:{username}")),
            documents: ItemId(format!("documents:{username}")),
            downloads: ItemId(format!("downloads:{username}")),
            trash: ItemId(format!("trash:{username}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Clipboard operation mode.
pub enum ClipboardMode {
    /// Paste duplicates the sources and keeps the clipboard.
    Copy,
    /// Paste moves the sources and clears the clipboard.
    Cut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Filesystem clipboard contents.
pub struct ClipboardState {
    /// Copy or cut.
    pub mode: ClipboardMode,
    /// Source ids in selection order without duplicates.
    pub item_ids: Vec<ItemId>,
}

impl ClipboardState {
    /// Builds a clipboard, dropping repeated ids while keeping first-seen order.
    pub fn new(mode: ClipboardMode, ids: impl IntoIterator<Item = ItemId>) -> Self {
        let mut item_ids: Vec<ItemId> = Vec::new();
        for id in ids {
            if !item_ids.contains(&id) {
                item_ids.push(id);
            }
        }
        Self { mode, item_ids }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
/// Child listing sort key.
pub enum SortKey {
    /// Case-insensitive name.
    #[default]
    Name,
    /// Modification time.
    Date,
    /// Payload size.
    Size,
    /// Mimetype label.
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
/// Child listing sort direction.
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
/// Caller-specified ordering and filtering for [`crate::VirtualFileSystem::resolve_children`].
pub struct ChildQuery {
    /// Sort key.
    pub sort_key: SortKey,
    /// Sort direction.
    pub order: SortOrder,
    /// Hide trash containers from the listing.
    pub hide_trash: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Uploaded payload handed to [`crate::VirtualFileSystem::upload_file`].
pub struct UploadedFile {
    /// Original filename, used for mimetype inference.
    pub name: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Wholesale export of the filesystem for import/restore.
pub struct FsSnapshot {
    /// Payload schema version.
    pub schema_version: u32,
    /// Flat item list.
    pub items: Vec<FileSystemItem>,
    /// Known users.
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Policy refusals and stale references reported by filesystem mutators.
pub enum FsRefusal {
    /// The referenced item no longer exists.
    #[error("item `{0}` not found")]
    NotFound(ItemId),
    /// The item or an ancestor is read-only.
    #[error("item `{0}` is locked")]
    Locked(ItemId),
    /// The item is a protected system item.
    #[error("item `{0}` is a system item")]
    SystemItem(ItemId),
    /// The target is not a folder.
    #[error("item `{0}` is not a folder")]
    NotAFolder(ItemId),
    /// The operation needs a file but the target is a folder.
    #[error("item `{0}` is a folder")]
    IsAFolder(ItemId),
    /// A sibling already uses the name.
    #[error("an item named `{0}` already exists here")]
    DuplicateName(String),
    /// The name is empty or contains a path separator.
    #[error("invalid item name `{0}`")]
    InvalidName(String),
    /// Moving a folder into itself or one of its descendants.
    #[error("cannot move `{0}` into itself or a descendant")]
    IntoDescendant(ItemId),
    /// Copying the item would nest the tree deeper than [`MAX_TREE_DEPTH`].
    #[error("copying `{0}` would nest too deep")]
    TooDeep(ItemId),
    /// The current user does not own the item.
    #[error("item `{0}` belongs to another user")]
    NotOwner(ItemId),
    /// The item is not in a trash container.
    #[error("item `{0}` is not in the trash")]
    NotInTrash(ItemId),
    /// The trashed item's original folder is gone.
    #[error("original folder of `{0}` no longer exists")]
    OriginalParentMissing(ItemId),
    /// Paste with an empty clipboard.
    #[error("clipboard is empty")]
    ClipboardEmpty,
    /// No trash container exists for the user.
    #[error("no trash container for `{0}`")]
    NoTrash(String),
    /// The permission gate denied the operation.
    #[error("permission denied for `{0}`")]
    PermissionDenied(String),
}
