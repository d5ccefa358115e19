//! In-memory virtual filesystem engine: tree mutation, trash, clipboard, locking and path
//! resolution.
//!
//! The engine owns a flat item list that is the single source of truth; every derived view
//! (children, breadcrumbs, lock state) is recomputed from it on each call. Mutators never panic
//! for policy violations or stale ids. They return [`FsRefusal`] so callers can surface a notice
//! and otherwise treat the call as a no-op.

use std::collections::{HashSet, VecDeque};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::path::{is_valid_item_name, mimetype_for_filename, numbered_name, path_segments};
use super::types::{
    ChildQuery, ClipboardMode, ClipboardState, FileSystemItem, FsRefusal, FsSnapshot, ItemId,
    MimeType, SortKey, SortOrder, UploadedFile, UserRecord, WellKnownFolders,
    FS_SNAPSHOT_SCHEMA_VERSION, MAX_TREE_DEPTH,
};
use crate::time::unix_time_ms_now;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Description of a new item for [`VirtualFileSystem::create_item`].
pub struct NewItem {
    /// Requested name.
    pub name: String,
    /// Kind of item.
    pub mimetype: MimeType,
    /// Optional text payload.
    pub content: Option<String>,
    /// Optional link payload.
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Mutable virtual filesystem tree plus clipboard state.
pub struct VirtualFileSystem {
    items: Vec<FileSystemItem>,
    users: Vec<UserRecord>,
    clipboard: Option<ClipboardState>,
    current_user: String,
    next_item_index: u64,
}

impl VirtualFileSystem {
    /// Creates an empty filesystem acting on behalf of `current_user`.
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            users: Vec::new(),
            clipboard: None,
            current_user: current_user.into(),
            next_item_index: 1,
        }
    }

    /// Creates a filesystem with the current user's well-known folders seeded.
    pub fn with_user(username: &str, display_name: &str) -> Self {
        let mut fs = Self::new(username);
        fs.seed_user(UserRecord {
            username: username.to_string(),
            display_name: display_name.to_string(),
        });
        fs
    }

    /// Username used for ownership checks.
    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    /// Switches the acting user.
    pub fn set_current_user(&mut self, username: impl Into<String>) {
        self.current_user = username.into();
    }

    /// Flat item list.
    pub fn items(&self) -> &[FileSystemItem] {
        &self.items
    }

    /// Known users.
    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    /// Current clipboard contents.
    pub fn clipboard(&self) -> Option<&ClipboardState> {
        self.clipboard.as_ref()
    }

    /// Looks up an item by id.
    pub fn item(&self, id: &ItemId) -> Option<&FileSystemItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn item_mut(&mut self, id: &ItemId) -> Option<&mut FileSystemItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    fn require(&self, id: &ItemId) -> Result<&FileSystemItem, FsRefusal> {
        self.item(id).ok_or_else(|| FsRefusal::NotFound(id.clone()))
    }

    /// Creates the home, desktop, documents, downloads and trash folders for `user`.
    ///
    /// Seeding an already-known user returns the existing ids without changes.
    pub fn seed_user(&mut self, user: UserRecord) -> WellKnownFolders {
        let ids = WellKnownFolders::for_user(&user.username);
        if self.item(&ids.home).is_some() {
            return ids;
        }

        let now = unix_time_ms_now();
        let owner = Some(user.username.clone());
        let folder = |id: &ItemId, name: &str, parent: &ItemId| FileSystemItem {
            id: id.clone(),
            name: name.to_string(),
            parent: parent.clone(),
            mimetype: MimeType::Folder,
            content: None,
            link: None,
            is_system: true,
            is_read_only: false,
            is_trash: false,
            original_parent: None,
            owner: owner.clone(),
            created_at_unix_ms: now,
            modified_at_unix_ms: now,
        };

        let root = ItemId::root();
        self.items.push(folder(&ids.home, &user.username, &root));
        self.items.push(folder(&ids.desktop, "Desktop", &ids.home));
        self.items.push(folder(&ids.documents, "Documents", &ids.home));
        self.items.push(folder(&ids.downloads, "Downloads", &ids.home));
        let mut trash = folder(&ids.trash, "Trash", &ids.home);
        trash.is_trash = true;
        self.items.push(trash);

        if !self.users.iter().any(|u| u.username == user.username) {
            self.users.push(user);
        }
        ids
    }

    /// Returns the well-known folder ids for `username` when that user has been seeded.
    pub fn well_known(&self, username: &str) -> Option<WellKnownFolders> {
        let ids = WellKnownFolders::for_user(username);
        self.item(&ids.home).map(|_| ids)
    }

    /// Direct children of `parent` in storage order.
    pub fn children<'a>(&'a self, parent: &ItemId) -> impl Iterator<Item = &'a FileSystemItem> + 'a {
        let parent = parent.clone();
        self.items.iter().filter(move |item| item.parent == parent)
    }

    /// Children of `parent` ordered by `query`, folders grouped before files.
    pub fn resolve_children(&self, parent: &ItemId, query: ChildQuery) -> Vec<&FileSystemItem> {
        let mut children: Vec<&FileSystemItem> = self
            .children(parent)
            .filter(|item| !(query.hide_trash && item.is_trash))
            .collect();

        children.sort_by(|a, b| {
            let group = b.is_folder().cmp(&a.is_folder());
            let key = match query.sort_key {
                SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortKey::Date => a.modified_at_unix_ms.cmp(&b.modified_at_unix_ms),
                SortKey::Size => a.size().cmp(&b.size()),
                SortKey::Type => a.mimetype.type_label().cmp(&b.mimetype.type_label()),
            };
            let key = match query.order {
                SortOrder::Ascending => key,
                SortOrder::Descending => key.reverse(),
            };
            group
                .then(key)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        children
    }

    fn find_child_by_name(&self, parent: &ItemId, name: &str) -> Option<&FileSystemItem> {
        let wanted = name.trim();
        self.children(parent).find(|item| item.name.trim() == wanted)
    }

    /// Walks from `start` matching each trimmed segment against child names.
    ///
    /// Resolution stops silently at the first unmatched segment and returns the deepest folder
    /// reached, so stale paths degrade to a listing instead of an error.
    pub fn resolve_path_to_id<S: AsRef<str>>(&self, start: &ItemId, segments: &[S]) -> ItemId {
        let mut current = start.clone();
        for segment in segments {
            let segment = segment.as_ref().trim();
            if segment.is_empty() {
                continue;
            }
            match self.find_child_by_name(&current, segment) {
                Some(child) => current = child.id.clone(),
                None => break,
            }
        }
        current
    }

    /// Resolves every segment exactly, returning `None` when any segment is missing.
    pub fn resolve_path<S: AsRef<str>>(
        &self,
        start: &ItemId,
        segments: &[S],
    ) -> Option<&FileSystemItem> {
        let mut current = self.item(start)?;
        for segment in segments {
            let segment = segment.as_ref().trim();
            if segment.is_empty() {
                continue;
            }
            current = self.find_child_by_name(&current.id, segment)?;
        }
        Some(current)
    }

    /// Resolves a typed address leniently, like [`VirtualFileSystem::resolve_path_to_id`].
    ///
    /// A leading `/` starts from the current user's home folder; anything else is relative to
    /// `start`.
    pub fn resolve_address(&self, start: &ItemId, address: &str) -> ItemId {
        let from = match self.well_known(&self.current_user) {
            Some(folders) if address.trim_start().starts_with('/') => folders.home,
            _ => start.clone(),
        };
        self.resolve_path_to_id(&from, &path_segments(address))
    }

    /// Ids from the top-level ancestor down to the parent of `id`.
    ///
    /// The walk is bounded by [`MAX_TREE_DEPTH`] and stops at missing parents, so corrupt
    /// snapshots cannot loop.
    pub fn ancestors(&self, id: &ItemId) -> Vec<ItemId> {
        let mut chain = Vec::new();
        let Some(mut current) = self.item(id) else {
            return chain;
        };
        while !current.parent.is_root() && chain.len() < MAX_TREE_DEPTH {
            let Some(parent) = self.item(&current.parent) else {
                break;
            };
            if parent.id == *id || chain.contains(&parent.id) {
                break;
            }
            chain.push(parent.id.clone());
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Names from the top-level ancestor down to `id` inclusive.
    pub fn breadcrumb(&self, id: &ItemId) -> Vec<String> {
        let mut names: Vec<String> = self
            .ancestors(id)
            .iter()
            .filter_map(|ancestor| self.item(ancestor))
            .map(|item| item.name.clone())
            .collect();
        if let Some(item) = self.item(id) {
            names.push(item.name.clone());
        }
        names
    }

    /// Slash-separated path of `id`, for display and launch props.
    pub fn path_of(&self, id: &ItemId) -> String {
        format!("/{}", self.breadcrumb(id).join("/"))
    }

    fn is_same_or_descendant(&self, candidate: &ItemId, ancestor: &ItemId) -> bool {
        candidate == ancestor || self.ancestors(candidate).contains(ancestor)
    }

    /// Returns `true` when `id` or any ancestor is read-only.
    ///
    /// Every mutator consults this before writing.
    pub fn is_locked(&self, id: &ItemId) -> bool {
        let Some(item) = self.item(id) else {
            return false;
        };
        item.is_read_only
            || self
                .ancestors(id)
                .iter()
                .filter_map(|ancestor| self.item(ancestor))
                .any(|ancestor| ancestor.is_read_only)
    }

    /// Returns `true` when the item's parent is a trash container.
    pub fn is_in_trash(&self, id: &ItemId) -> bool {
        self.item(id)
            .and_then(|item| self.item(&item.parent))
            .map(|parent| parent.is_trash)
            .unwrap_or(false)
    }

    fn trash_for(&self, owner: &str) -> Option<ItemId> {
        self.items
            .iter()
            .find(|item| item.is_trash && item.owner.as_deref() == Some(owner))
            .map(|item| item.id.clone())
    }

    fn ensure_owner(&self, item: &FileSystemItem) -> Result<(), FsRefusal> {
        match item.owner.as_deref() {
            Some(owner) if owner != self.current_user => Err(FsRefusal::NotOwner(item.id.clone())),
            _ => Ok(()),
        }
    }

    fn ensure_writable_folder(&self, id: &ItemId) -> Result<(), FsRefusal> {
        if id.is_root() {
            return Ok(());
        }
        let folder = self.require(id)?;
        if !folder.is_folder() {
            return Err(FsRefusal::NotAFolder(id.clone()));
        }
        if self.is_locked(id) {
            return Err(FsRefusal::Locked(id.clone()));
        }
        Ok(())
    }

    fn ensure_mutable(&self, item: &FileSystemItem) -> Result<(), FsRefusal> {
        if item.is_system || item.is_trash {
            return Err(FsRefusal::SystemItem(item.id.clone()));
        }
        if self.is_locked(&item.id) {
            return Err(FsRefusal::Locked(item.id.clone()));
        }
        self.ensure_owner(item)
    }

    fn name_taken(&self, parent: &ItemId, name: &str, exclude: Option<&ItemId>) -> bool {
        self.children(parent)
            .any(|item| item.name.trim() == name.trim() && Some(&item.id) != exclude)
    }

    fn unique_child_name(&self, parent: &ItemId, name: &str, exclude: Option<&ItemId>) -> String {
        if !self.name_taken(parent, name, exclude) {
            return name.to_string();
        }
        (2..)
            .map(|n| numbered_name(name, n))
            .find(|candidate| !self.name_taken(parent, candidate, exclude))
            .unwrap_or_else(|| name.to_string())
    }

    fn allocate_id(&mut self) -> ItemId {
        loop {
            let id = ItemId(format!("item-{}", self.next_item_index));
            self.next_item_index = self.next_item_index.saturating_add(1);
            if self.item(&id).is_none() {
                return id;
            }
        }
    }

    /// Creates an item under `parent`.
    ///
    /// # Errors
    ///
    /// Refuses invalid or duplicate names and missing, non-folder or locked parents.
    pub fn create_item(&mut self, parent: &ItemId, new_item: NewItem) -> Result<ItemId, FsRefusal> {
        let name = new_item.name.trim().to_string();
        if !is_valid_item_name(&name) {
            return Err(FsRefusal::InvalidName(new_item.name));
        }
        self.ensure_writable_folder(parent)?;
        if self.name_taken(parent, &name, None) {
            return Err(FsRefusal::DuplicateName(name));
        }

        let id = self.allocate_id();
        let now = unix_time_ms_now();
        self.items.push(FileSystemItem {
            id: id.clone(),
            name,
            parent: parent.clone(),
            mimetype: new_item.mimetype,
            content: new_item.content,
            link: new_item.link,
            is_system: false,
            is_read_only: false,
            is_trash: false,
            original_parent: None,
            owner: Some(self.current_user.clone()),
            created_at_unix_ms: now,
            modified_at_unix_ms: now,
        });
        self.touch(parent);
        Ok(id)
    }

    /// Creates a folder under `parent`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_item`].
    pub fn create_folder(&mut self, name: &str, parent: &ItemId) -> Result<ItemId, FsRefusal> {
        self.create_item(
            parent,
            NewItem {
                name: name.to_string(),
                mimetype: MimeType::Folder,
                content: None,
                link: None,
            },
        )
    }

    /// Creates a file under `parent` with a mimetype inferred from its extension.
    ///
    /// # Errors
    ///
    /// See [`Self::create_item`].
    pub fn create_file(
        &mut self,
        name: &str,
        parent: &ItemId,
        content: Option<String>,
    ) -> Result<ItemId, FsRefusal> {
        self.create_item(
            parent,
            NewItem {
                name: name.to_string(),
                mimetype: mimetype_for_filename(name),
                content: Some(content.unwrap_or_default()),
                link: None,
            },
        )
    }

    /// Creates a shortcut pointing at `target`.
    ///
    /// # Errors
    ///
    /// See [`Self::create_item`].
    pub fn create_shortcut(
        &mut self,
        name: &str,
        parent: &ItemId,
        target: &ItemId,
    ) -> Result<ItemId, FsRefusal> {
        self.create_item(
            parent,
            NewItem {
                name: name.to_string(),
                mimetype: MimeType::Shortcut,
                content: None,
                link: Some(target.0.clone()),
            },
        )
    }

    fn touch(&mut self, id: &ItemId) {
        let now = unix_time_ms_now();
        if let Some(item) = self.item_mut(id) {
            item.modified_at_unix_ms = now;
        }
    }

    /// Renames an item.
    ///
    /// Renaming to the current name is a successful no-op.
    ///
    /// # Errors
    ///
    /// Refuses system, locked, foreign-owned items and duplicate or invalid names.
    pub fn rename_item(&mut self, id: &ItemId, new_name: &str) -> Result<(), FsRefusal> {
        let name = new_name.trim().to_string();
        if !is_valid_item_name(&name) {
            return Err(FsRefusal::InvalidName(new_name.to_string()));
        }
        let item = self.require(id)?;
        self.ensure_mutable(item)?;
        if item.name == name {
            return Ok(());
        }
        let parent = item.parent.clone();
        if self.name_taken(&parent, &name, Some(id)) {
            return Err(FsRefusal::DuplicateName(name));
        }

        let now = unix_time_ms_now();
        if let Some(item) = self.item_mut(id) {
            item.name = name;
            item.modified_at_unix_ms = now;
        }
        Ok(())
    }

    /// Replaces the payload of a file.
    ///
    /// # Errors
    ///
    /// Refuses folders, locked items and foreign-owned items.
    pub fn update_content(&mut self, id: &ItemId, content: String) -> Result<(), FsRefusal> {
        let item = self.require(id)?;
        if item.is_folder() {
            return Err(FsRefusal::IsAFolder(id.clone()));
        }
        if self.is_locked(id) {
            return Err(FsRefusal::Locked(id.clone()));
        }
        self.ensure_owner(item)?;

        let now = unix_time_ms_now();
        if let Some(item) = self.item_mut(id) {
            item.content = Some(content);
            item.modified_at_unix_ms = now;
        }
        Ok(())
    }

    /// Moves an item into its owner's trash container, remembering the original parent.
    ///
    /// Trashing an item that is already in the trash is a successful no-op.
    ///
    /// # Errors
    ///
    /// Refuses system, read-only or locked items, foreign-owned items, and users without a
    /// trash container.
    pub fn move_to_trash(&mut self, id: &ItemId) -> Result<(), FsRefusal> {
        if self.is_in_trash(id) {
            return Ok(());
        }
        let item = self.require(id)?;
        self.ensure_mutable(item)?;
        let owner = item
            .owner
            .clone()
            .unwrap_or_else(|| self.current_user.clone());
        let trash = self.trash_for(&owner).ok_or(FsRefusal::NoTrash(owner))?;

        let now = unix_time_ms_now();
        if let Some(item) = self.item_mut(id) {
            item.original_parent = Some(std::mem::replace(&mut item.parent, trash));
            item.modified_at_unix_ms = now;
        }
        Ok(())
    }

    /// Moves a trashed item back to its original parent.
    ///
    /// A name clash at the destination is resolved with a numbered suffix.
    ///
    /// # Errors
    ///
    /// Refuses items outside the trash and items whose original parent no longer exists; such
    /// items stay in the trash.
    pub fn restore_from_trash(&mut self, id: &ItemId) -> Result<(), FsRefusal> {
        if !self.is_in_trash(id) {
            return Err(FsRefusal::NotInTrash(id.clone()));
        }
        let item = self.require(id)?;
        let Some(original) = item.original_parent.clone() else {
            return Err(FsRefusal::OriginalParentMissing(id.clone()));
        };
        if !original.is_root()
            && (self.item(&original).is_none() || self.is_in_trash(&original))
        {
            return Err(FsRefusal::OriginalParentMissing(id.clone()));
        }

        let name = self.unique_child_name(&original, &item.name, Some(id));
        let now = unix_time_ms_now();
        if let Some(item) = self.item_mut(id) {
            item.parent = original;
            item.original_parent = None;
            item.name = name;
            item.modified_at_unix_ms = now;
        }
        Ok(())
    }

    /// Permanently removes every item in `owner`'s trash container.
    ///
    /// Returns the removed ids, descendants included.
    ///
    /// # Errors
    ///
    /// Refuses when `owner` has no trash container of their own.
    pub fn empty_trash(&mut self, owner: &str) -> Result<Vec<ItemId>, FsRefusal> {
        let trash = self
            .trash_for(owner)
            .ok_or_else(|| FsRefusal::NoTrash(owner.to_string()))?;
        let trashed: Vec<ItemId> = self.children(&trash).map(|item| item.id.clone()).collect();
        let mut removed = Vec::new();
        for id in trashed {
            removed.extend(self.remove_subtree(&id));
        }
        Ok(removed)
    }

    /// Permanently removes an item and, for folders, all descendants.
    ///
    /// # Errors
    ///
    /// Refuses system, locked and foreign-owned items.
    pub fn delete_item(&mut self, id: &ItemId) -> Result<Vec<ItemId>, FsRefusal> {
        let item = self.require(id)?;
        self.ensure_mutable(item)?;
        Ok(self.remove_subtree(id))
    }

    /// Permanently removes an item regardless of system/read-only flags.
    ///
    /// # Errors
    ///
    /// Only a missing id is refused.
    pub fn force_delete_item(&mut self, id: &ItemId) -> Result<Vec<ItemId>, FsRefusal> {
        self.require(id)?;
        Ok(self.remove_subtree(id))
    }

    /// Ids of every descendant of `id` (breadth first, cycle-safe).
    pub fn descendants(&self, id: &ItemId) -> Vec<ItemId> {
        let mut seen: HashSet<ItemId> = HashSet::from([id.clone()]);
        let mut queue: VecDeque<ItemId> = VecDeque::from([id.clone()]);
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for child in self.children(&current) {
                if seen.insert(child.id.clone()) {
                    out.push(child.id.clone());
                    queue.push_back(child.id.clone());
                }
            }
        }
        out
    }

    fn remove_subtree(&mut self, id: &ItemId) -> Vec<ItemId> {
        let mut doomed = vec![id.clone()];
        doomed.extend(self.descendants(id));
        let doomed_set: HashSet<&ItemId> = doomed.iter().collect();
        self.items.retain(|item| !doomed_set.contains(&item.id));
        self.prune_clipboard();
        doomed
    }

    fn prune_clipboard(&mut self) {
        let Some(mut clipboard) = self.clipboard.take() else {
            return;
        };
        clipboard
            .item_ids
            .retain(|id| self.items.iter().any(|item| &item.id == id));
        if !clipboard.item_ids.is_empty() {
            self.clipboard = Some(clipboard);
        }
    }

    fn check_move(&self, source: &ItemId, dest: &ItemId) -> Result<bool, FsRefusal> {
        let item = self.require(source)?;
        self.ensure_writable_folder(dest)?;
        if self.is_same_or_descendant(dest, source) {
            return Err(FsRefusal::IntoDescendant(source.clone()));
        }
        self.ensure_mutable(item)?;
        if &item.parent == dest {
            return Ok(false);
        }
        if self.name_taken(dest, &item.name, Some(source)) {
            return Err(FsRefusal::DuplicateName(item.name.clone()));
        }
        Ok(true)
    }

    fn reparent(&mut self, source: &ItemId, dest: &ItemId) {
        let dest_is_trash = self.item(dest).map(|item| item.is_trash).unwrap_or(false);
        let now = unix_time_ms_now();
        if let Some(item) = self.item_mut(source) {
            let previous = std::mem::replace(&mut item.parent, dest.clone());
            item.original_parent = if dest_is_trash { Some(previous) } else { None };
            item.modified_at_unix_ms = now;
        }
    }

    /// Moves `source` under `dest`.
    ///
    /// Moving an item into its current parent is a successful no-op.
    ///
    /// # Errors
    ///
    /// Refuses moves into the item itself or a descendant, into locked or non-folder
    /// destinations, moves of protected items, and name clashes.
    pub fn move_item(&mut self, source: &ItemId, dest: &ItemId) -> Result<(), FsRefusal> {
        if self.check_move(source, dest)? {
            self.reparent(source, dest);
        }
        Ok(())
    }

    fn set_clipboard(&mut self, mode: ClipboardMode, ids: &[ItemId]) -> Result<(), FsRefusal> {
        let existing: Vec<ItemId> = ids
            .iter()
            .filter(|id| self.item(id).is_some())
            .cloned()
            .collect();
        if existing.is_empty() {
            return Err(match ids.first() {
                Some(id) => FsRefusal::NotFound(id.clone()),
                None => FsRefusal::ClipboardEmpty,
            });
        }
        self.clipboard = Some(ClipboardState::new(mode, existing));
        Ok(())
    }

    /// Places `ids` on the clipboard for copying.
    ///
    /// # Errors
    ///
    /// Refuses when none of the ids exist.
    pub fn copy_items(&mut self, ids: &[ItemId]) -> Result<(), FsRefusal> {
        self.set_clipboard(ClipboardMode::Copy, ids)
    }

    /// Places `ids` on the clipboard for moving.
    ///
    /// # Errors
    ///
    /// Refuses when none of the ids exist.
    pub fn cut_items(&mut self, ids: &[ItemId]) -> Result<(), FsRefusal> {
        self.set_clipboard(ClipboardMode::Cut, ids)
    }

    /// Clears the clipboard.
    pub fn clear_clipboard(&mut self) {
        self.clipboard = None;
    }

    /// Pastes the clipboard into `target`.
    ///
    /// Copy duplicates each source (folders deeply) and keeps the clipboard; cut moves each
    /// source and clears it. Returns the new (copy) or moved (cut) ids. All sources are
    /// validated before anything is mutated.
    ///
    /// # Errors
    ///
    /// Refuses an empty clipboard, invalid targets, folders pasted into themselves or a
    /// descendant, and for cut the same refusals as [`Self::move_item`].
    pub fn paste_items(&mut self, target: &ItemId) -> Result<Vec<ItemId>, FsRefusal> {
        let Some(clipboard) = self.clipboard.clone() else {
            return Err(FsRefusal::ClipboardEmpty);
        };
        let sources: Vec<ItemId> = clipboard
            .item_ids
            .iter()
            .filter(|id| self.item(id).is_some())
            .cloned()
            .collect();
        if sources.is_empty() {
            self.clipboard = None;
            return Err(FsRefusal::ClipboardEmpty);
        }

        self.ensure_writable_folder(target)?;
        if let Some(source) = sources
            .iter()
            .find(|source| self.is_same_or_descendant(target, source))
        {
            return Err(FsRefusal::IntoDescendant(source.clone()));
        }

        match clipboard.mode {
            ClipboardMode::Copy => {
                let depth = self.ancestors(target).len() + 1;
                if let Some(source) = sources
                    .iter()
                    .find(|source| self.nests_too_deep(source, depth))
                {
                    return Err(FsRefusal::TooDeep(source.clone()));
                }
                let mut pasted = Vec::with_capacity(sources.len());
                for source in &sources {
                    pasted.push(self.deep_copy(source, target)?);
                }
                Ok(pasted)
            }
            ClipboardMode::Cut => {
                let mut movable = Vec::new();
                let mut incoming_names: Vec<String> = Vec::new();
                for source in &sources {
                    if self.check_move(source, target)? {
                        let name = self.require(source)?.name.trim().to_string();
                        if incoming_names.contains(&name) {
                            return Err(FsRefusal::DuplicateName(name));
                        }
                        incoming_names.push(name);
                        movable.push(source.clone());
                    }
                }
                if movable.is_empty() {
                    return Ok(Vec::new());
                }
                for source in &movable {
                    self.reparent(source, target);
                }
                self.clipboard = None;
                Ok(movable)
            }
        }
    }

    /// Whether `id`'s subtree, placed `depth` levels below the root, would exceed the ancestor
    /// bound.
    fn nests_too_deep(&self, id: &ItemId, depth: usize) -> bool {
        depth > MAX_TREE_DEPTH
            || self
                .children(id)
                .any(|child| self.nests_too_deep(&child.id, depth + 1))
    }

    /// Copies `source` and its subtree under `target`. Callers check depth first.
    fn deep_copy(&mut self, source: &ItemId, target: &ItemId) -> Result<ItemId, FsRefusal> {
        let original = self.require(source)?.clone();
        let children: Vec<ItemId> = self.children(source).map(|item| item.id.clone()).collect();

        let id = self.allocate_id();
        let now = unix_time_ms_now();
        let name = self.unique_child_name(target, &original.name, None);
        self.items.push(FileSystemItem {
            id: id.clone(),
            name,
            parent: target.clone(),
            is_system: false,
            is_read_only: false,
            is_trash: false,
            original_parent: None,
            owner: Some(self.current_user.clone()),
            created_at_unix_ms: now,
            modified_at_unix_ms: now,
            ..original
        });

        for child in children {
            self.deep_copy(&child, &id)?;
        }
        Ok(id)
    }

    /// Stores an uploaded file under `parent`.
    ///
    /// Text payloads are stored as UTF-8 text, everything else as a base64 `data:` URL. A
    /// clashing name gets a numbered suffix.
    ///
    /// # Errors
    ///
    /// Refuses invalid names and missing, non-folder or locked parents.
    pub fn upload_file(
        &mut self,
        upload: UploadedFile,
        parent: &ItemId,
    ) -> Result<ItemId, FsRefusal> {
        let requested = upload.name.trim();
        if !is_valid_item_name(requested) {
            return Err(FsRefusal::InvalidName(upload.name));
        }
        self.ensure_writable_folder(parent)?;

        let mimetype = mimetype_for_filename(requested);
        let content = if mimetype.is_textual() {
            String::from_utf8_lossy(&upload.bytes).into_owned()
        } else {
            format!("data:{mimetype};base64,{}", STANDARD.encode(&upload.bytes))
        };
        let name = self.unique_child_name(parent, requested, None);
        self.create_item(
            parent,
            NewItem {
                name,
                mimetype,
                content: Some(content),
                link: None,
            },
        )
    }

    /// Exports the full item list and user records.
    pub fn snapshot(&self) -> FsSnapshot {
        FsSnapshot {
            schema_version: FS_SNAPSHOT_SCHEMA_VERSION,
            items: self.items.clone(),
            users: self.users.clone(),
        }
    }

    /// Replaces the item list wholesale with `snapshot`.
    ///
    /// Id allocation resumes above the highest generated id and the clipboard is pruned of ids
    /// that no longer exist.
    pub fn restore_snapshot(&mut self, snapshot: FsSnapshot) {
        self.items = snapshot.items;
        self.users = snapshot.users;
        self.next_item_index = self
            .items
            .iter()
            .filter_map(|item| item.id.generated_index())
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        self.prune_clipboard();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fs() -> (VirtualFileSystem, WellKnownFolders) {
        let fs = VirtualFileSystem::with_user("ada", "Ada");
        let ids = fs.well_known("ada").expect("seeded");
        (fs, ids)
    }

    fn parent_of(fs: &VirtualFileSystem, id: &ItemId) -> ItemId {
        fs.item(id).expect("item").parent.clone()
    }

    #[test]
    fn seeding_creates_well_known_folders_once() {
        let (mut fs, ids) = fs();
        let before = fs.items().len();
        let again = fs.seed_user(UserRecord {
            username: "ada".to_string(),
            display_name: "Ada".to_string(),
        });
        assert_eq!(again, ids);
        assert_eq!(fs.items().len(), before);
        assert!(fs.item(&ids.trash).expect("trash").is_trash);
        assert_eq!(fs.breadcrumb(&ids.desktop), vec!["ada", "Desktop"]);
    }

    #[test]
    fn create_and_resolve_path_by_name() {
        let (mut fs, ids) = fs();
        let notes = fs.create_folder("Notes", &ids.desktop).expect("folder");
        let todo = fs
            .create_file("todo.txt", &notes, Some("buy milk".to_string()))
            .expect("file");

        let found = fs
            .resolve_path(&ids.home, &["Desktop", " Notes ", "todo.txt"])
            .expect("resolved");
        assert_eq!(found.id, todo);
        assert_eq!(found.content.as_deref(), Some("buy milk"));
        assert_eq!(found.mimetype, MimeType::PlainText);
    }

    #[test]
    fn path_resolution_stops_at_first_unmatched_segment() {
        let (mut fs, ids) = fs();
        let notes = fs.create_folder("Notes", &ids.desktop).expect("folder");
        let resolved = fs.resolve_path_to_id(&ids.home, &["Desktop", "Notes", "gone", "x"]);
        assert_eq!(resolved, notes);
        assert!(fs.resolve_path(&ids.home, &["Desktop", "gone"]).is_none());
    }

    #[test]
    fn typed_addresses_resolve_relative_or_from_home() {
        let (mut fs, ids) = fs();
        let notes = fs.create_folder("Notes", &ids.desktop).expect("folder");
        let todo = fs.create_file("todo.txt", &notes, None).expect("file");

        assert_eq!(fs.resolve_address(&ids.documents, "/Desktop/Notes/todo.txt"), todo);
        assert_eq!(fs.resolve_address(&ids.desktop, "Notes\\.\\todo.txt"), todo);
        assert_eq!(
            fs.resolve_address(&ids.desktop, "Notes/../Notes//todo.txt"),
            todo
        );
        assert_eq!(fs.resolve_address(&ids.desktop, "Notes/missing/x"), notes);
        assert_eq!(fs.resolve_address(&ids.desktop, ""), ids.desktop);
    }

    #[test]
    fn duplicate_and_invalid_names_are_refused() {
        let (mut fs, ids) = fs();
        fs.create_folder("Notes", &ids.desktop).expect("folder");
        assert_eq!(
            fs.create_folder(" Notes ", &ids.desktop),
            Err(FsRefusal::DuplicateName("Notes".to_string()))
        );
        assert_eq!(
            fs.create_file("a/b.txt", &ids.desktop, None),
            Err(FsRefusal::InvalidName("a/b.txt".to_string()))
        );
    }

    #[test]
    fn read_only_folders_lock_their_descendants() {
        let (mut fs, ids) = fs();
        let projects = fs.create_folder("Projects", &ids.documents).expect("folder");
        let inner = fs.create_folder("Inner", &projects).expect("folder");
        let file = fs.create_file("a.md", &inner, None).expect("file");
        fs.item_mut(&projects).expect("projects").is_read_only = true;

        assert!(fs.is_locked(&file));
        assert_eq!(
            fs.create_file("b.md", &inner, None),
            Err(FsRefusal::Locked(inner.clone()))
        );
        assert_eq!(
            fs.rename_item(&file, "c.md"),
            Err(FsRefusal::Locked(file.clone()))
        );
        assert_eq!(fs.move_to_trash(&file), Err(FsRefusal::Locked(file.clone())));
        assert_eq!(
            fs.update_content(&file, "x".to_string()),
            Err(FsRefusal::Locked(file.clone()))
        );
    }

    #[test]
    fn system_items_cannot_be_renamed_or_trashed() {
        let (mut fs, ids) = fs();
        assert_eq!(
            fs.rename_item(&ids.desktop, "Bureau"),
            Err(FsRefusal::SystemItem(ids.desktop.clone()))
        );
        assert_eq!(
            fs.move_to_trash(&ids.documents),
            Err(FsRefusal::SystemItem(ids.documents.clone()))
        );
        assert!(fs.force_delete_item(&ids.downloads).is_ok());
        assert!(fs.item(&ids.downloads).is_none());
    }

    #[test]
    fn rename_requires_ownership() {
        let (mut fs, ids) = fs();
        let file = fs.create_file("a.txt", &ids.desktop, None).expect("file");
        fs.set_current_user("mallory");
        assert_eq!(
            fs.rename_item(&file, "b.txt"),
            Err(FsRefusal::NotOwner(file.clone()))
        );
        fs.set_current_user("ada");
        fs.rename_item(&file, "b.txt").expect("rename");
        assert_eq!(fs.item(&file).expect("file").name, "b.txt");
    }

    #[test]
    fn trash_round_trip_restores_original_parent() {
        let (mut fs, ids) = fs();
        let notes = fs.create_folder("Notes", &ids.desktop).expect("folder");
        let file = fs.create_file("a.txt", &notes, None).expect("file");

        fs.move_to_trash(&file).expect("trash");
        assert_eq!(parent_of(&fs, &file), ids.trash);
        assert_eq!(fs.item(&file).expect("file").original_parent, Some(notes.clone()));
        assert!(fs.is_in_trash(&file));

        fs.restore_from_trash(&file).expect("restore");
        assert_eq!(parent_of(&fs, &file), notes);
        assert_eq!(fs.item(&file).expect("file").original_parent, None);
        assert!(!fs.is_in_trash(&file));
    }

    #[test]
    fn restore_fails_when_original_parent_is_gone() {
        let (mut fs, ids) = fs();
        let notes = fs.create_folder("Notes", &ids.desktop).expect("folder");
        let file = fs.create_file("a.txt", &notes, None).expect("file");
        fs.move_to_trash(&file).expect("trash");
        fs.delete_item(&notes).expect("delete folder");

        assert_eq!(
            fs.restore_from_trash(&file),
            Err(FsRefusal::OriginalParentMissing(file.clone()))
        );
        assert_eq!(parent_of(&fs, &file), ids.trash);
    }

    #[test]
    fn restore_renames_on_clash() {
        let (mut fs, ids) = fs();
        let file = fs.create_file("a.txt", &ids.desktop, None).expect("file");
        fs.move_to_trash(&file).expect("trash");
        fs.create_file("a.txt", &ids.desktop, None).expect("replacement");
        fs.restore_from_trash(&file).expect("restore");
        assert_eq!(fs.item(&file).expect("file").name, "a (2).txt");
    }

    #[test]
    fn empty_trash_removes_trashed_subtrees() {
        let (mut fs, ids) = fs();
        let notes = fs.create_folder("Notes", &ids.desktop).expect("folder");
        let inner = fs.create_file("a.txt", &notes, None).expect("file");
        let loose = fs.create_file("b.txt", &ids.desktop, None).expect("file");
        fs.move_to_trash(&notes).expect("trash");
        fs.move_to_trash(&loose).expect("trash");

        let removed = fs.empty_trash("ada").expect("empty");
        assert_eq!(removed.len(), 3);
        for id in [&notes, &inner, &loose] {
            assert!(fs.item(id).is_none());
        }
        assert!(fs.item(&ids.trash).is_some());
    }

    #[test]
    fn trash_is_scoped_to_its_owner() {
        let (mut fs, ids) = fs();
        let diary = fs.create_file("diary.txt", &ids.documents, None).expect("file");
        fs.move_to_trash(&diary).expect("trash");

        assert_eq!(
            fs.empty_trash("bob"),
            Err(FsRefusal::NoTrash("bob".to_string()))
        );
        assert_eq!(parent_of(&fs, &diary), ids.trash);

        let bob = fs.seed_user(UserRecord {
            username: "bob".to_string(),
            display_name: "Bob".to_string(),
        });
        assert_ne!(bob.trash, ids.trash);
        assert_eq!(fs.empty_trash("bob"), Ok(Vec::new()));
        assert_eq!(parent_of(&fs, &diary), ids.trash);

        assert_eq!(fs.empty_trash("ada"), Ok(vec![diary.clone()]));
        assert!(fs.item(&diary).is_none());
    }

    #[test]
    fn delete_item_removes_descendants() {
        let (mut fs, ids) = fs();
        let a = fs.create_folder("A", &ids.documents).expect("a");
        let b = fs.create_folder("B", &a).expect("b");
        let c = fs.create_file("c.txt", &b, None).expect("c");
        let removed = fs.delete_item(&a).expect("delete");
        assert_eq!(removed, vec![a.clone(), b.clone(), c.clone()]);
        assert!(fs.item(&c).is_none());
        assert_eq!(fs.delete_item(&a), Err(FsRefusal::NotFound(a)));
    }

    #[test]
    fn move_into_descendant_is_refused_and_tree_unchanged() {
        let (mut fs, ids) = fs();
        let a = fs.create_folder("A", &ids.documents).expect("a");
        let b = fs.create_folder("B", &a).expect("b");
        let before = fs.items().to_vec();

        assert_eq!(fs.move_item(&a, &b), Err(FsRefusal::IntoDescendant(a.clone())));
        assert_eq!(fs.move_item(&a, &a), Err(FsRefusal::IntoDescendant(a.clone())));
        assert_eq!(fs.items(), before.as_slice());

        fs.move_item(&b, &ids.desktop).expect("move out");
        assert_eq!(parent_of(&fs, &b), ids.desktop);
    }

    #[test]
    fn move_refuses_name_clash() {
        let (mut fs, ids) = fs();
        let a = fs.create_file("a.txt", &ids.documents, None).expect("a");
        fs.create_file("a.txt", &ids.desktop, None).expect("clash");
        assert_eq!(
            fs.move_item(&a, &ids.desktop),
            Err(FsRefusal::DuplicateName("a.txt".to_string()))
        );
    }

    #[test]
    fn copy_paste_duplicates_item_and_keeps_clipboard() {
        let (mut fs, ids) = fs();
        let file = fs
            .create_file("todo.txt", &ids.documents, Some("buy milk".to_string()))
            .expect("file");
        fs.copy_items(&[file.clone()]).expect("copy");

        let pasted = fs.paste_items(&ids.desktop).expect("paste");
        assert_eq!(pasted.len(), 1);
        let copy = fs.item(&pasted[0]).expect("copy");
        let original = fs.item(&file).expect("original");
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.name, original.name);
        assert_eq!(copy.content, original.content);
        assert_eq!(copy.mimetype, original.mimetype);
        assert_eq!(copy.parent, ids.desktop);
        assert_eq!(original.parent, ids.documents);
        assert!(fs.clipboard().is_some());
    }

    #[test]
    fn copy_paste_into_same_folder_suffixes_name() {
        let (mut fs, ids) = fs();
        let file = fs.create_file("todo.txt", &ids.documents, None).expect("file");
        fs.copy_items(&[file]).expect("copy");
        let pasted = fs.paste_items(&ids.documents).expect("paste");
        assert_eq!(fs.item(&pasted[0]).expect("copy").name, "todo (2).txt");
    }

    #[test]
    fn copy_paste_duplicates_folder_subtree() {
        let (mut fs, ids) = fs();
        let a = fs.create_folder("A", &ids.documents).expect("a");
        let b = fs.create_folder("B", &a).expect("b");
        fs.create_file("c.txt", &b, Some("c".to_string())).expect("c");

        fs.copy_items(&[a.clone()]).expect("copy");
        let pasted = fs.paste_items(&ids.desktop).expect("paste");
        let copied_root = &pasted[0];
        let copied = fs
            .resolve_path(copied_root, &["B", "c.txt"])
            .expect("deep copy");
        assert_eq!(copied.content.as_deref(), Some("c"));
        assert_eq!(fs.descendants(copied_root).len(), 2);
        assert_eq!(fs.descendants(&a).len(), 2);
    }

    #[test]
    fn copies_that_would_nest_too_deep_are_refused_whole() {
        let (mut fs, ids) = fs();
        let chain = |fs: &mut VirtualFileSystem, parent: &ItemId, prefix: &str, len: usize| {
            let first = fs
                .create_folder(&format!("{prefix}0"), parent)
                .expect("folder");
            let mut levels = vec![first];
            for level in 1..len {
                let next = fs
                    .create_folder(&format!("{prefix}{level}"), &levels[level - 1])
                    .expect("folder");
                levels.push(next);
            }
            levels
        };
        let tall = chain(&mut fs, &ids.desktop, "a", 40);
        let deep = chain(&mut fs, &ids.documents, "b", 30);

        fs.copy_items(&[tall[0].clone()]).expect("copy");
        let before = fs.items().len();
        assert_eq!(
            fs.paste_items(&deep[29]),
            Err(FsRefusal::TooDeep(tall[0].clone()))
        );
        assert_eq!(fs.items().len(), before);

        let pasted = fs.paste_items(&ids.documents).expect("shallow paste");
        assert_eq!(fs.descendants(&pasted[0]).len(), 39);
    }

    #[test]
    fn paste_folder_into_itself_is_refused() {
        let (mut fs, ids) = fs();
        let a = fs.create_folder("A", &ids.documents).expect("a");
        let b = fs.create_folder("B", &a).expect("b");
        fs.copy_items(&[a.clone()]).expect("copy");
        let before = fs.items().len();
        assert_eq!(fs.paste_items(&b), Err(FsRefusal::IntoDescendant(a.clone())));
        assert_eq!(fs.paste_items(&a), Err(FsRefusal::IntoDescendant(a)));
        assert_eq!(fs.items().len(), before);
    }

    #[test]
    fn cut_paste_moves_and_clears_clipboard() {
        let (mut fs, ids) = fs();
        let file = fs.create_file("a.txt", &ids.documents, None).expect("file");
        fs.cut_items(&[file.clone(), file.clone()]).expect("cut");
        assert_eq!(fs.clipboard().expect("clipboard").item_ids.len(), 1);

        let moved = fs.paste_items(&ids.desktop).expect("paste");
        assert_eq!(moved, vec![file.clone()]);
        assert_eq!(parent_of(&fs, &file), ids.desktop);
        assert!(fs.clipboard().is_none());
    }

    #[test]
    fn cut_paste_into_source_parent_is_noop() {
        let (mut fs, ids) = fs();
        let file = fs.create_file("a.txt", &ids.documents, None).expect("file");
        fs.cut_items(&[file.clone()]).expect("cut");
        let before = fs.items().to_vec();

        assert_eq!(fs.paste_items(&ids.documents), Ok(Vec::new()));
        assert_eq!(fs.items(), before.as_slice());
        assert!(fs.clipboard().is_some());
    }

    #[test]
    fn paste_with_empty_clipboard_is_refused() {
        let (mut fs, ids) = fs();
        assert_eq!(fs.paste_items(&ids.desktop), Err(FsRefusal::ClipboardEmpty));
    }

    #[test]
    fn upload_infers_mimetype_and_encodes_binary() {
        let (mut fs, ids) = fs();
        let text = fs
            .upload_file(
                UploadedFile {
                    name: "readme.md".to_string(),
                    bytes: b"# hi".to_vec(),
                },
                &ids.downloads,
            )
            .expect("upload text");
        let image = fs
            .upload_file(
                UploadedFile {
                    name: "pixel.png".to_string(),
                    bytes: vec![1, 2, 3],
                },
                &ids.downloads,
            )
            .expect("upload image");
        let again = fs
            .upload_file(
                UploadedFile {
                    name: "readme.md".to_string(),
                    bytes: Vec::new(),
                },
                &ids.downloads,
            )
            .expect("upload clash");

        assert_eq!(fs.item(&text).expect("text").content.as_deref(), Some("# hi"));
        assert_eq!(fs.item(&text).expect("text").mimetype, MimeType::Markdown);
        assert_eq!(
            fs.item(&image).expect("image").content.as_deref(),
            Some("data:image/png;base64,AQID")
        );
        assert_eq!(fs.item(&again).expect("again").name, "readme (2).md");
    }

    #[test]
    fn children_sort_folders_first_for_every_order() {
        let (mut fs, ids) = fs();
        fs.create_file("b.txt", &ids.documents, Some("12345".to_string()))
            .expect("b");
        fs.create_file("a.txt", &ids.documents, Some("1".to_string()))
            .expect("a");
        fs.create_folder("Zeta", &ids.documents).expect("zeta");

        let names = |query: ChildQuery| -> Vec<String> {
            fs.resolve_children(&ids.documents, query)
                .into_iter()
                .map(|item| item.name.clone())
                .collect()
        };

        assert_eq!(names(ChildQuery::default()), vec!["Zeta", "a.txt", "b.txt"]);
        assert_eq!(
            names(ChildQuery {
                sort_key: SortKey::Size,
                order: SortOrder::Descending,
                hide_trash: false,
            }),
            vec!["Zeta", "b.txt", "a.txt"]
        );
    }

    #[test]
    fn home_listing_can_hide_trash_container() {
        let (fs, ids) = fs();
        let listing = fs.resolve_children(
            &ids.home,
            ChildQuery {
                hide_trash: true,
                ..ChildQuery::default()
            },
        );
        assert_eq!(listing.len(), 3);
        assert!(listing.iter().all(|item| !item.is_trash));
    }

    #[test]
    fn snapshot_restore_rebuilds_a_working_tree() {
        let (mut fs, ids) = fs();
        let a = fs.create_file("a.txt", &ids.desktop, None).expect("a");
        let snapshot = fs.snapshot();

        let mut restored = VirtualFileSystem::new("ada");
        restored.restore_snapshot(snapshot);
        assert_eq!(restored.items(), fs.items());
        let b = restored.create_file("b.txt", &ids.desktop, None).expect("b");
        assert_ne!(a, b);
        assert!(b.generated_index() > a.generated_index());
    }

    #[test]
    fn ancestors_walk_is_bounded_for_corrupt_cycles() {
        let mut fs = VirtualFileSystem::new("ada");
        let looped = |id: &str, parent: &str| FileSystemItem {
            id: ItemId::from(id),
            name: id.to_string(),
            parent: ItemId::from(parent),
            mimetype: MimeType::Folder,
            content: None,
            link: None,
            is_system: false,
            is_read_only: false,
            is_trash: false,
            original_parent: None,
            owner: None,
            created_at_unix_ms: 0,
            modified_at_unix_ms: 0,
        };
        fs.restore_snapshot(FsSnapshot {
            schema_version: FS_SNAPSHOT_SCHEMA_VERSION,
            items: vec![looped("x", "y"), looped("y", "x")],
            users: Vec::new(),
        });
        assert_eq!(fs.ancestors(&ItemId::from("x")), vec![ItemId::from("y")]);
        assert!(!fs.is_locked(&ItemId::from("x")));
    }

    #[test]
    fn deleting_a_clipboard_source_prunes_the_clipboard() {
        let (mut fs, ids) = fs();
        let a = fs.create_file("a.txt", &ids.desktop, None).expect("a");
        fs.copy_items(&[a.clone()]).expect("copy");
        fs.delete_item(&a).expect("delete");
        assert!(fs.clipboard().is_none());
    }
}
