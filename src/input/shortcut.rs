use crate::interaction::{PanDirection, ToolMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutKey {
    Character(char),
    Enter,
    Escape,
    Delete,
    Backspace,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortcutModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl ShortcutModifiers {
    pub const fn new(ctrl: bool, shift: bool) -> Self {
        Self { ctrl, shift }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputContext {
    pub text_editing: bool,
    pub crop_active: bool,
    pub brush_active: bool,
}

impl InputContext {
    pub const fn for_mode(mode: ToolMode) -> Self {
        Self {
            text_editing: matches!(mode, ToolMode::TextEditing),
            crop_active: matches!(mode, ToolMode::Crop),
            brush_active: matches!(mode, ToolMode::Brush),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    Undo,
    Redo,
    DeleteLayer,
    Pan(PanDirection),
    ResetView,
    ZoomIn,
    ZoomOut,
    CropApply,
    CropCancel,
    BrushCommit,
    ExitTool,
    EnterBrush,
    EnterCrop,
}

fn resolve_text_shortcut(key: ShortcutKey) -> Option<ShortcutAction> {
    match key {
        ShortcutKey::Escape => Some(ShortcutAction::ExitTool),
        _ => None,
    }
}

fn resolve_crop_shortcut(key: ShortcutKey) -> Option<ShortcutAction> {
    match key {
        ShortcutKey::Enter => Some(ShortcutAction::CropApply),
        ShortcutKey::Escape => Some(ShortcutAction::CropCancel),
        _ => None,
    }
}

fn resolve_brush_shortcut(key: ShortcutKey, modifiers: ShortcutModifiers) -> Option<ShortcutAction> {
    match (key, modifiers.ctrl) {
        (ShortcutKey::Enter, false) => Some(ShortcutAction::BrushCommit),
        (ShortcutKey::Escape, false) => Some(ShortcutAction::ExitTool),
        _ => resolve_editor_shortcut(key, modifiers),
    }
}

fn resolve_view_shortcut(key: ShortcutKey) -> Option<ShortcutAction> {
    match key {
        ShortcutKey::ArrowLeft => Some(ShortcutAction::Pan(PanDirection::Left)),
        ShortcutKey::ArrowRight => Some(ShortcutAction::Pan(PanDirection::Right)),
        ShortcutKey::ArrowUp => Some(ShortcutAction::Pan(PanDirection::Up)),
        ShortcutKey::ArrowDown => Some(ShortcutAction::Pan(PanDirection::Down)),
        ShortcutKey::Escape | ShortcutKey::Character('0') => Some(ShortcutAction::ResetView),
        ShortcutKey::Character('+' | '=') => Some(ShortcutAction::ZoomIn),
        ShortcutKey::Character('-') => Some(ShortcutAction::ZoomOut),
        _ => None,
    }
}

fn resolve_editor_shortcut(key: ShortcutKey, modifiers: ShortcutModifiers) -> Option<ShortcutAction> {
    match (key, modifiers.ctrl, modifiers.shift) {
        (ShortcutKey::Character('z'), true, false) => Some(ShortcutAction::Undo),
        (ShortcutKey::Character('z'), true, true) | (ShortcutKey::Character('y'), true, _) => {
            Some(ShortcutAction::Redo)
        }
        (ShortcutKey::Delete | ShortcutKey::Backspace, false, false) => {
            Some(ShortcutAction::DeleteLayer)
        }
        (ShortcutKey::Character('b'), false, false) => Some(ShortcutAction::EnterBrush),
        (ShortcutKey::Character('c'), false, false) => Some(ShortcutAction::EnterCrop),
        (_, false, _) => resolve_view_shortcut(key),
        _ => None,
    }
}

/// Resolves a key press, letting the active tool claim keys before the editor does.
pub fn resolve_shortcut(
    key: ShortcutKey,
    modifiers: ShortcutModifiers,
    context: InputContext,
) -> Option<ShortcutAction> {
    if context.text_editing {
        return resolve_text_shortcut(key);
    }

    if context.crop_active {
        return resolve_crop_shortcut(key);
    }

    if context.brush_active {
        return resolve_brush_shortcut(key, modifiers);
    }

    resolve_editor_shortcut(key, modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> InputContext {
        InputContext::default()
    }

    #[test]
    fn text_editing_swallows_editor_shortcuts() {
        let context = InputContext::for_mode(ToolMode::TextEditing);
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('z'),
                ShortcutModifiers::new(true, false),
                context
            ),
            None
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Delete, ShortcutModifiers::default(), context),
            None
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Escape, ShortcutModifiers::default(), context),
            Some(ShortcutAction::ExitTool)
        );
    }

    #[test]
    fn crop_claims_enter_and_escape() {
        let context = InputContext::for_mode(ToolMode::Crop);
        assert_eq!(
            resolve_shortcut(ShortcutKey::Enter, ShortcutModifiers::default(), context),
            Some(ShortcutAction::CropApply)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Escape, ShortcutModifiers::default(), context),
            Some(ShortcutAction::CropCancel)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::ArrowLeft, ShortcutModifiers::default(), context),
            None
        );
    }

    #[test]
    fn brush_commits_on_enter_and_keeps_undo() {
        let context = InputContext::for_mode(ToolMode::Brush);
        assert_eq!(
            resolve_shortcut(ShortcutKey::Enter, ShortcutModifiers::default(), context),
            Some(ShortcutAction::BrushCommit)
        );
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('z'),
                ShortcutModifiers::new(true, false),
                context
            ),
            Some(ShortcutAction::Undo)
        );
    }

    #[test]
    fn editor_maps_history_and_delete() {
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('z'),
                ShortcutModifiers::new(true, false),
                editor()
            ),
            Some(ShortcutAction::Undo)
        );
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('z'),
                ShortcutModifiers::new(true, true),
                editor()
            ),
            Some(ShortcutAction::Redo)
        );
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('y'),
                ShortcutModifiers::new(true, false),
                editor()
            ),
            Some(ShortcutAction::Redo)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Backspace, ShortcutModifiers::default(), editor()),
            Some(ShortcutAction::DeleteLayer)
        );
    }

    #[test]
    fn editor_maps_view_keys() {
        let none = ShortcutModifiers::default();
        assert_eq!(
            resolve_shortcut(ShortcutKey::ArrowUp, none, editor()),
            Some(ShortcutAction::Pan(PanDirection::Up))
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Escape, none, editor()),
            Some(ShortcutAction::ResetView)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('0'), none, editor()),
            Some(ShortcutAction::ResetView)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('+'), ShortcutModifiers::new(false, true), editor()),
            Some(ShortcutAction::ZoomIn)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('-'), none, editor()),
            Some(ShortcutAction::ZoomOut)
        );
        assert_eq!(
            resolve_shortcut(ShortcutKey::Character('0'), ShortcutModifiers::new(true, false), editor()),
            None
        );
    }
}
