//! Shared window-manager transition helpers used by the desktop reducer.
//!
//! Helpers return `false` when the referenced window does not exist; the reducer turns that into
//! [`crate::reducer::ReducerError::WindowNotFound`].

use crate::model::{
    DesktopState, OpenWindowRequest, PointerPosition, ResizeEdge, ViewportInfo, WindowId,
    WindowManagerConfig, WindowRect, WindowSize,
};

/// Number of cascade positions before placement wraps back to the first slot.
const CASCADE_SLOTS: i32 = 8;

/// Activates `window_id`, un-minimizing it (and re-maximizing it when it was minimized while
/// maximized). Stack order is not changed.
pub fn focus_window_internal(state: &mut DesktopState, window_id: WindowId) -> bool {
    if state.window(window_id).is_none() {
        return false;
    }

    for window in &mut state.windows {
        window.is_focused = false;
    }
    let desktop = state.config.desktop_rect(state.viewport);
    if let Some(window) = state.windows.iter_mut().find(|w| w.id == window_id) {
        window.is_focused = true;
        if window.minimized {
            window.minimized = false;
            if window.restore_maximized {
                window.restore_maximized = false;
                window.restore_rect = Some(window.rect);
                window.rect = desktop;
                window.maximized = true;
            }
        }
    }
    normalize_window_stack(state);
    true
}

/// Recomputes z-indexes and enforces the focus invariants.
///
/// The active window sits at `config.active_z_index`; every other window uses its list position
/// plus one. Minimized windows are never active and activity is never promoted to another
/// window.
pub fn normalize_window_stack(state: &mut DesktopState) {
    let active_z = state.config.active_z_index;
    let mut has_focused = false;
    for (idx, window) in state.windows.iter_mut().enumerate() {
        if window.minimized {
            window.is_focused = false;
        }
        if window.is_focused {
            if has_focused {
                window.is_focused = false;
            } else {
                has_focused = true;
            }
        }
        window.z_index = if window.is_focused {
            active_z
        } else {
            (idx + 1) as u32
        };
    }
}

/// Minimizes a window and clears its activity. A maximized window is un-maximized first and
/// remembers to re-maximize when it comes back.
pub fn minimize_window_internal(state: &mut DesktopState, window_id: WindowId) -> bool {
    let Some(window) = state.windows.iter_mut().find(|w| w.id == window_id) else {
        return false;
    };
    if window.minimized {
        return true;
    }
    if window.maximized {
        if let Some(restore_rect) = window.restore_rect {
            window.rect = restore_rect;
        }
        window.maximized = false;
        window.restore_maximized = true;
    }
    window.minimized = true;
    window.is_focused = false;
    normalize_window_stack(state);
    true
}

/// Maximizes a window into the desktop area, overwriting the single restore slot.
pub fn maximize_window_internal(state: &mut DesktopState, window_id: WindowId) -> bool {
    let desktop = state.config.desktop_rect(state.viewport);
    let Some(window) = state.windows.iter_mut().find(|w| w.id == window_id) else {
        return false;
    };
    if !window.maximized {
        window.restore_rect = Some(window.rect);
    }
    window.rect = desktop;
    window.maximized = true;
    window.restore_maximized = false;
    focus_window_internal(state, window_id)
}

/// Puts a maximized window back at its restore rect.
pub fn unmaximize_window_internal(state: &mut DesktopState, window_id: WindowId) -> bool {
    let Some(window) = state.windows.iter_mut().find(|w| w.id == window_id) else {
        return false;
    };
    if window.maximized {
        if let Some(restore_rect) = window.restore_rect {
            window.rect = restore_rect;
        }
        window.maximized = false;
    }
    true
}

/// Re-fits maximized windows after the viewport changed.
pub fn fit_maximized_windows(state: &mut DesktopState) {
    let desktop = state.config.desktop_rect(state.viewport);
    for window in state.windows.iter_mut().filter(|w| w.maximized) {
        window.rect = desktop;
    }
}

/// Initial geometry for a new window.
///
/// Priority: explicit rect, mobile full-screen, large start, then the default size cascaded from
/// the top-left of the desktop area.
pub fn initial_window_rect(
    config: &WindowManagerConfig,
    viewport: ViewportInfo,
    request: &OpenWindowRequest,
    window_id: WindowId,
) -> WindowRect {
    if let Some(rect) = request.rect {
        return rect.clamped_min(config.min_width, config.min_height);
    }
    if config.is_mobile(viewport) {
        return config.mobile_rect(viewport);
    }

    let desktop = config.desktop_rect(viewport);
    if request.large_start {
        let w = (f64::from(desktop.w) * config.large_start_ratio).round() as i32;
        let h = (f64::from(desktop.h) * config.large_start_ratio).round() as i32;
        return desktop
            .centered(w, h)
            .clamped_min(config.min_width, config.min_height);
    }

    let WindowSize { w, h } = request.default_size.unwrap_or(config.default_window);
    let slot = ((window_id.0.saturating_sub(1)) % CASCADE_SLOTS as u64) as i32;
    let offset = slot * config.cascade_step;
    WindowRect {
        x: desktop.x + config.cascade_step * 2 + offset,
        y: desktop.y + config.cascade_step + offset,
        w,
        h,
    }
    .clamped_min(config.min_width, config.min_height)
}

/// Applies resize deltas for a given edge/corner drag.
pub fn resize_rect(start: WindowRect, edge: ResizeEdge, dx: i32, dy: i32) -> WindowRect {
    match edge {
        ResizeEdge::East => WindowRect {
            w: start.w + dx,
            ..start
        },
        ResizeEdge::West => WindowRect {
            x: start.x + dx,
            w: start.w - dx,
            ..start
        },
        ResizeEdge::South => WindowRect {
            h: start.h + dy,
            ..start
        },
        ResizeEdge::North => WindowRect {
            y: start.y + dy,
            h: start.h - dy,
            ..start
        },
        ResizeEdge::NorthEast => WindowRect {
            y: start.y + dy,
            h: start.h - dy,
            w: start.w + dx,
            ..start
        },
        ResizeEdge::NorthWest => WindowRect {
            x: start.x + dx,
            y: start.y + dy,
            w: start.w - dx,
            h: start.h - dy,
        },
        ResizeEdge::SouthEast => WindowRect {
            w: start.w + dx,
            h: start.h + dy,
            ..start
        },
        ResizeEdge::SouthWest => WindowRect {
            x: start.x + dx,
            w: start.w - dx,
            h: start.h + dy,
            ..start
        },
    }
}

/// Applies the minimum size to a resized rect, keeping the edge opposite the dragged one fixed.
pub fn anchored_min(
    start: WindowRect,
    edge: ResizeEdge,
    rect: WindowRect,
    min_w: i32,
    min_h: i32,
) -> WindowRect {
    let mut out = rect;
    if out.w < min_w {
        out.w = min_w;
        if edge.moves_left_edge() {
            out.x = start.x + start.w - min_w;
        }
    }
    if out.h < min_h {
        out.h = min_h;
        if edge.moves_top_edge() {
            out.y = start.y + start.h - min_h;
        }
    }
    out
}

/// Keeps at least half of a dragged window on screen and its top edge below the viewport top.
pub fn clamp_drag_rect(rect: WindowRect, viewport: ViewportInfo) -> WindowRect {
    let min_x = -rect.w / 2;
    let max_x = (viewport.width - rect.w / 2).max(min_x);
    let max_y = (viewport.height - rect.h / 2).max(0);
    WindowRect {
        x: rect.x.clamp(min_x, max_x),
        y: rect.y.clamp(0, max_y),
        ..rect
    }
}

/// Geometry of a window torn off a maximized layout: the restored size re-centred horizontally
/// under the pointer, keeping the original grab offset inside the title bar.
pub fn tear_off_rect(
    restored: WindowSize,
    pointer: PointerPosition,
    grab_offset_y: i32,
    titlebar_hit_height: i32,
) -> WindowRect {
    let grab = grab_offset_y.clamp(0, titlebar_hit_height);
    WindowRect {
        x: pointer.x - restored.w / 2,
        y: pointer.y - grab,
        w: restored.w,
        h: restored.h,
    }
}

/// Maximizes a dropped window whose top edge ended above the menu bar.
///
/// The restore snapshot is taken with its top edge pushed down to the menu bar so restoring does
/// not put the title bar under it. Returns `true` when the window was maximized.
pub fn maximize_if_dropped_on_menu_bar(state: &mut DesktopState, window_id: WindowId) -> bool {
    let menu_bar = state.config.menu_bar_height;
    let desktop = state.config.desktop_rect(state.viewport);
    let Some(window) = state.windows.iter_mut().find(|w| w.id == window_id) else {
        return false;
    };
    if window.maximized || window.minimized || !window.flags.maximizable {
        return false;
    }
    if window.rect.y >= menu_bar {
        return false;
    }

    window.restore_rect = Some(WindowRect {
        y: window.rect.y.max(menu_bar),
        ..window.rect
    });
    window.rect = desktop;
    window.maximized = true;
    true
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::AppId;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> WindowRect {
        WindowRect { x, y, w, h }
    }

    #[test]
    fn west_resize_below_minimum_keeps_right_edge_anchored() {
        let start = rect(100, 100, 400, 300);
        let raw = resize_rect(start, ResizeEdge::West, 250, 0);
        let resized = anchored_min(start, ResizeEdge::West, raw, 300, 100);
        assert_eq!(resized, rect(200, 100, 300, 300));
        assert_eq!(resized.x + resized.w, start.x + start.w);
    }

    #[test]
    fn north_east_resize_below_minimum_keeps_bottom_edge_anchored() {
        let start = rect(0, 200, 400, 300);
        let raw = resize_rect(start, ResizeEdge::NorthEast, 50, 280);
        let resized = anchored_min(start, ResizeEdge::NorthEast, raw, 300, 100);
        assert_eq!(resized, rect(0, 400, 450, 100));
    }

    #[test]
    fn drag_clamp_keeps_half_the_window_visible() {
        let viewport = ViewportInfo {
            width: 1000,
            height: 800,
        };
        assert_eq!(
            clamp_drag_rect(rect(-900, -50, 400, 300), viewport),
            rect(-200, 0, 400, 300)
        );
        assert_eq!(
            clamp_drag_rect(rect(950, 780, 400, 300), viewport),
            rect(800, 650, 400, 300)
        );
    }

    #[test]
    fn cascade_placement_wraps_after_eight_windows() {
        let config = WindowManagerConfig::default();
        let viewport = ViewportInfo::default();
        let request = OpenWindowRequest::new(AppId::Terminal);

        let first = initial_window_rect(&config, viewport, &request, WindowId(1));
        let second = initial_window_rect(&config, viewport, &request, WindowId(2));
        let ninth = initial_window_rect(&config, viewport, &request, WindowId(9));

        assert_eq!(first, rect(48, 52, 640, 440));
        assert_eq!(second, first.offset(24, 24));
        assert_eq!(ninth, first);
    }

    #[test]
    fn large_start_windows_are_centered_in_the_desktop_area() {
        let config = WindowManagerConfig::default();
        let viewport = ViewportInfo {
            width: 1000,
            height: 828,
        };
        let mut request = OpenWindowRequest::new(AppId::PdfViewer);
        request.large_start = true;

        let placed = initial_window_rect(&config, viewport, &request, WindowId(1));
        assert_eq!(placed, rect(75, 88, 850, 680));
    }

    #[test]
    fn tear_off_centres_restored_size_under_pointer() {
        let torn = tear_off_rect(
            WindowSize { w: 600, h: 400 },
            PointerPosition { x: 700, y: 60 },
            20,
            50,
        );
        assert_eq!(torn, rect(400, 40, 600, 400));
    }
}
