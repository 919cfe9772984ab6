//! Conversion des événements clavier Winit vers les types Servo.
//!
//! Une page de bundle n'a besoin que de la saisie de texte, de la navigation
//! au clavier et des raccourcis d'édition. Les touches absentes des tables
//! ci-dessous sont transmises comme `Unidentified`.

use servo::{Code, Key, KeyState, KeyboardEvent, Location, Modifiers, NamedKey};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{
    Key as WinitKey, KeyCode, KeyLocation as WinitKeyLocation, ModifiersState,
    NamedKey as WinitNamedKey, PhysicalKey,
};

/// Table `NamedKey` Winit → Servo pour les variantes au nom identique.
macro_rules! same_named {
    ($key:expr; $($name:ident),+ $(,)?) => {
        match $key {
            $(WinitNamedKey::$name => NamedKey::$name,)+
            _ => NamedKey::Unidentified,
        }
    };
}

/// Table `KeyCode` Winit → `Code` Servo pour les variantes au nom identique.
macro_rules! same_code {
    ($code:expr; $($extra:pat => $mapped:expr,)* ; $($name:ident),+ $(,)?) => {
        match $code {
            $($extra => $mapped,)*
            $(KeyCode::$name => Code::$name,)+
            _ => Code::Unidentified,
        }
    };
}

/// Convertit un `KeyEvent` Winit + état des modificateurs en `KeyboardEvent` Servo.
pub fn keyboard_event_from_winit(key_event: &KeyEvent, mods: ModifiersState) -> KeyboardEvent {
    KeyboardEvent::new_without_event(
        key_state_from_winit(key_event.state),
        key_from_winit(&key_event.logical_key),
        code_from_winit(&key_event.physical_key),
        location_from_winit(key_event.location),
        modifiers_from_winit(mods),
        key_event.repeat,
        false,
    )
}

fn key_state_from_winit(state: ElementState) -> KeyState {
    match state {
        ElementState::Pressed => KeyState::Down,
        ElementState::Released => KeyState::Up,
    }
}

fn key_from_winit(logical_key: &WinitKey) -> Key {
    match logical_key {
        WinitKey::Character(s) => Key::Character(s.to_string()),
        WinitKey::Named(named) => Key::Named(named_from_winit(*named)),
        WinitKey::Unidentified(_) | WinitKey::Dead(_) => Key::Named(NamedKey::Unidentified),
    }
}

fn named_from_winit(named: WinitNamedKey) -> NamedKey {
    same_named!(named;
        Alt, AltGraph, CapsLock, Control, Fn, NumLock, ScrollLock, Shift, Meta, Super,
        Enter, Tab, Backspace, Delete, Insert, Escape, Clear,
        ArrowDown, ArrowLeft, ArrowRight, ArrowUp, End, Home, PageDown, PageUp,
        Copy, Cut, Paste, Undo, Redo, Find, ContextMenu, Help,
        BrowserBack, BrowserForward, BrowserRefresh, BrowserHome, BrowserStop,
        F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    )
}

fn code_from_winit(physical_key: &PhysicalKey) -> Code {
    let PhysicalKey::Code(code) = physical_key else {
        return Code::Unidentified;
    };
    same_code!(*code;
        KeyCode::SuperLeft => Code::MetaLeft,
        KeyCode::SuperRight => Code::MetaRight,
        ;
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM,
        KeyN, KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
        Digit0, Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9,
        Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8,
        Numpad9, NumpadAdd, NumpadSubtract, NumpadMultiply, NumpadDivide, NumpadDecimal,
        NumpadEnter,
        Backquote, Backslash, BracketLeft, BracketRight, Comma, Equal, Minus, Period,
        Quote, Semicolon, Slash, IntlBackslash,
        AltLeft, AltRight, ControlLeft, ControlRight, ShiftLeft, ShiftRight, CapsLock,
        Backspace, Enter, Escape, Space, Tab, Delete, Insert, Home, End, PageUp, PageDown,
        ArrowDown, ArrowLeft, ArrowRight, ArrowUp, ContextMenu, NumLock,
        F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    )
}

fn location_from_winit(location: WinitKeyLocation) -> Location {
    match location {
        WinitKeyLocation::Left => Location::Left,
        WinitKeyLocation::Numpad => Location::Numpad,
        WinitKeyLocation::Right => Location::Right,
        WinitKeyLocation::Standard => Location::Standard,
    }
}

fn modifiers_from_winit(mods: ModifiersState) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::CONTROL, mods.control_key());
    modifiers.set(Modifiers::SHIFT, mods.shift_key());
    modifiers.set(Modifiers::ALT, mods.alt_key());
    modifiers.set(Modifiers::META, mods.super_key());
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state() {
        assert_eq!(key_state_from_winit(ElementState::Pressed), KeyState::Down);
        assert_eq!(key_state_from_winit(ElementState::Released), KeyState::Up);
    }

    #[test]
    fn test_character_keys_pass_through() {
        let key = key_from_winit(&WinitKey::Character("é".into()));
        assert_eq!(key, Key::Character("é".to_string()));
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(
            key_from_winit(&WinitKey::Named(WinitNamedKey::Enter)),
            Key::Named(NamedKey::Enter)
        );
        assert_eq!(
            key_from_winit(&WinitKey::Named(WinitNamedKey::ArrowLeft)),
            Key::Named(NamedKey::ArrowLeft)
        );
        assert_eq!(
            key_from_winit(&WinitKey::Named(WinitNamedKey::F5)),
            Key::Named(NamedKey::F5)
        );
    }

    #[test]
    fn test_unmapped_named_key_is_unidentified() {
        assert_eq!(
            key_from_winit(&WinitKey::Named(WinitNamedKey::TV)),
            Key::Named(NamedKey::Unidentified)
        );
    }

    #[test]
    fn test_physical_codes() {
        assert_eq!(code_from_winit(&PhysicalKey::Code(KeyCode::KeyA)), Code::KeyA);
        assert_eq!(code_from_winit(&PhysicalKey::Code(KeyCode::Space)), Code::Space);
        assert_eq!(
            code_from_winit(&PhysicalKey::Code(KeyCode::SuperLeft)),
            Code::MetaLeft
        );
    }

    #[test]
    fn test_modifiers() {
        let mods = modifiers_from_winit(ModifiersState::CONTROL | ModifiersState::SHIFT);
        assert!(mods.contains(Modifiers::CONTROL));
        assert!(mods.contains(Modifiers::SHIFT));
        assert!(!mods.contains(Modifiers::ALT));
        assert!(!mods.contains(Modifiers::META));
    }

    #[test]
    fn test_location() {
        assert_eq!(location_from_winit(WinitKeyLocation::Numpad), Location::Numpad);
        assert_eq!(location_from_winit(WinitKeyLocation::Standard), Location::Standard);
    }
}
