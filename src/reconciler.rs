use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use crate::dom::{NodeId, UiTree};
use crate::scanner::CanvasThumbnailMap;
use crate::settings::ThumbnailSettings;
use crate::vault::Vault;
use crate::CANVAS_EXTENSION;

pub const CARDS_CONTAINER_CLASS: &str = "bases-cards-container";
pub const CARD_CLASS: &str = "bases-cards-item";
pub const CARD_FILE_NAME_CLASS: &str = "bases-cards-file-name";
pub const CARD_COVER_CLASS: &str = "bases-cards-cover";

/// Canvas path that decorated the cover. Its presence means "leave alone".
pub const THUMBNAIL_MARKER_ATTR: &str = "data-canvas-thumbnail";
pub const THUMBNAIL_IMAGE_ATTR: &str = "data-canvas-thumbnail-image";
/// JSON object of the host's own values for the styles decoration overwrites.
pub const PREVIOUS_STYLE_ATTR: &str = "data-canvas-thumbnail-previous-style";

const DECORATION_STYLES: &[&str] = &[
    "background-image",
    "background-size",
    "background-position",
    "background-repeat",
    "width",
    "height",
    "border-radius",
    "margin",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardOutcome {
    Decorated(NodeId),
    NoCard,
    NoCover,
    AlreadyDecorated,
    Unresolved,
}

/// File name a card is expected to display for `canvas_path`: the last path
/// segment without the canvas suffix.
pub fn comparison_key(canvas_path: &str) -> &str {
    let name = canvas_path.rsplit('/').next().unwrap_or(canvas_path);
    name.strip_suffix(CANVAS_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(name)
}

pub fn cards_container(tree: &UiTree) -> Option<NodeId> {
    tree.find_first(tree.root(), CARDS_CONTAINER_CLASS)
}

fn card_file_name(tree: &UiTree, card: NodeId) -> Option<String> {
    tree.find_first(card, CARD_FILE_NAME_CLASS)
        .map(|el| tree.text_content(el).trim().to_owned())
}

/// First card in document order whose file name equals or contains `key`.
pub fn find_card(tree: &UiTree, container: NodeId, key: &str) -> Option<NodeId> {
    if key.is_empty() {
        return None;
    }
    tree.find_all(container, CARD_CLASS).into_iter().find(|&card| {
        card_file_name(tree, card)
            .map(|name| name == key || name.contains(key))
            .unwrap_or(false)
    })
}

/// Decorate the card matching `canvas_path` inside `container`, unless it is
/// missing, has no cover, or is already decorated.
pub fn decorate_card<V: Vault + ?Sized>(
    tree: &mut UiTree,
    container: NodeId,
    canvas_path: &str,
    image_path: &str,
    vault: &V,
    settings: &ThumbnailSettings,
) -> CardOutcome {
    let key = comparison_key(canvas_path);
    let Some(card) = find_card(tree, container, key) else {
        debug!(canvas = canvas_path, key, "no card for canvas");
        return CardOutcome::NoCard;
    };

    let Some(cover) = tree.find_first(card, CARD_COVER_CLASS) else {
        debug!(canvas = canvas_path, "card has no cover element");
        return CardOutcome::NoCover;
    };

    if let Some(owner) = tree.attribute(cover, THUMBNAIL_MARKER_ATTR) {
        if owner != canvas_path {
            debug!(canvas = canvas_path, owner, "cover decorated by another canvas path");
        }
        return CardOutcome::AlreadyDecorated;
    }

    let url = match vault.resource_url(image_path) {
        Ok(url) => url,
        Err(e) => {
            error!(canvas = canvas_path, image = image_path, error = %e, "cannot resolve thumbnail");
            return CardOutcome::Unresolved;
        }
    };

    apply_thumbnail(tree, cover, &url, canvas_path, image_path, settings);
    CardOutcome::Decorated(cover)
}

fn apply_thumbnail(
    tree: &mut UiTree,
    cover: NodeId,
    url: &str,
    canvas_path: &str,
    image_path: &str,
    settings: &ThumbnailSettings,
) {
    remember_host_styles(tree, cover);

    let background = format!("url(\"{}\")", url.replace('"', "%22"));
    tree.set_style(cover, "background-image", &background);
    tree.set_style(cover, "background-size", "contain");
    tree.set_style(cover, "background-position", "center");
    tree.set_style(cover, "background-repeat", "no-repeat");

    let size = format!("{}px", settings.size);
    tree.set_style(cover, "width", &size);
    tree.set_style(cover, "height", &size);
    tree.set_style(cover, "border-radius", &format!("{}px", settings.border_radius));
    tree.set_style(cover, "margin", &settings.extra_margin.to_css());

    tree.set_attribute(cover, THUMBNAIL_MARKER_ATTR, canvas_path);
    tree.set_attribute(cover, THUMBNAIL_IMAGE_ATTR, image_path);
}

fn remember_host_styles(tree: &mut UiTree, cover: NodeId) {
    let previous: BTreeMap<&str, &str> = DECORATION_STYLES
        .iter()
        .filter_map(|&property| tree.style(cover, property).map(|value| (property, value)))
        .collect();
    if previous.is_empty() {
        return;
    }
    match serde_json::to_string(&previous) {
        Ok(json) => tree.set_attribute(cover, PREVIOUS_STYLE_ATTR, &json),
        Err(e) => warn!(error = %e, "could not remember cover styles"),
    }
}

fn restore_host_styles(tree: &mut UiTree, node: NodeId) {
    let Some(json) = tree.remove_attribute(node, PREVIOUS_STYLE_ATTR) else {
        return;
    };
    match serde_json::from_str::<BTreeMap<String, String>>(&json) {
        Ok(previous) => {
            for (property, value) in previous {
                tree.set_style(node, &property, &value);
            }
        }
        Err(e) => warn!(error = %e, "could not restore cover styles"),
    }
}

/// Decorate every card the map points at. Returns how many covers were newly
/// decorated; a missing cards container makes this a no-op.
pub fn reconcile<V: Vault + ?Sized>(
    map: &CanvasThumbnailMap,
    tree: &mut UiTree,
    vault: &V,
    settings: &ThumbnailSettings,
) -> usize {
    let Some(container) = cards_container(tree) else {
        debug!("cards container not present");
        return 0;
    };

    let mut updated = 0;
    for (canvas_path, image_path) in map.iter() {
        if let CardOutcome::Decorated(_) =
            decorate_card(tree, container, canvas_path, image_path, vault, settings)
        {
            updated += 1;
        }
    }

    info!(updated, entries = map.len(), "card thumbnails reconciled");
    updated
}

/// Strip the decoration from one element. Safe on undecorated elements;
/// returns whether anything was removed.
pub fn clear_thumbnail(tree: &mut UiTree, node: NodeId) -> bool {
    if tree.remove_attribute(node, THUMBNAIL_MARKER_ATTR).is_none() {
        return false;
    }
    tree.remove_attribute(node, THUMBNAIL_IMAGE_ATTR);
    for property in DECORATION_STYLES {
        tree.remove_style(node, property);
    }
    restore_host_styles(tree, node);
    true
}

pub fn clear_thumbnails(tree: &mut UiTree) -> usize {
    let decorated = tree.find_all_with_attribute(tree.root(), THUMBNAIL_MARKER_ATTR);
    let cleared = decorated
        .into_iter()
        .filter(|&node| clear_thumbnail(tree, node))
        .count();
    if cleared > 0 {
        info!(cleared, "card thumbnails cleared");
    }
    cleared
}
