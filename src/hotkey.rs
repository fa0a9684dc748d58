use anyhow::{anyhow, Context, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager,
};
use tracing::info;

/// Default chord: Cmd+Shift+9
pub const DEFAULT_MODIFIERS: &[&str] = &["Command", "Shift"];
pub const DEFAULT_KEY: &str = "9";

/// Registers the global toggle chord and derives an edge-triggered toggle
/// signal from its key-down events.
pub struct HotkeyToggle {
    manager: GlobalHotKeyManager,
    hotkey: HotKey,
}

impl HotkeyToggle {
    /// Register the chord with the OS.
    ///
    /// # Errors
    /// Returns error for unknown modifier/key names or if registration
    /// fails (e.g. the chord is taken).
    pub fn register(modifiers: &[&str], key: &str) -> Result<Self> {
        let manager = GlobalHotKeyManager::new().context("failed to create hotkey manager")?;

        let hotkey = HotKey::new(Some(parse_modifiers(modifiers)?), parse_key(key)?);
        manager
            .register(hotkey)
            .context("failed to register hotkey")?;

        info!("registered hotkey: {modifiers:?} + {key}");
        Ok(Self { manager, hotkey })
    }

    /// True when `event` is this chord's key-down edge. Key-up events and
    /// other hotkeys are ignored.
    #[must_use]
    pub fn is_toggle(&self, event: &GlobalHotKeyEvent) -> bool {
        event.id == self.hotkey.id()
            && matches!(event.state, global_hotkey::HotKeyState::Pressed)
    }
}

impl Drop for HotkeyToggle {
    fn drop(&mut self) {
        if let Err(e) = self.manager.unregister(self.hotkey) {
            tracing::error!("failed to unregister hotkey: {e}");
        }
    }
}

fn parse_modifiers(modifiers: &[&str]) -> Result<Modifiers> {
    let mut result = Modifiers::empty();
    for modifier in modifiers {
        match *modifier {
            "Control" | "Ctrl" => result |= Modifiers::CONTROL,
            "Option" | "Alt" => result |= Modifiers::ALT,
            "Command" | "Super" => result |= Modifiers::SUPER,
            "Shift" => result |= Modifiers::SHIFT,
            other => return Err(anyhow!("unknown modifier: {other}")),
        }
    }
    Ok(result)
}

fn parse_key(key: &str) -> Result<Code> {
    match key {
        "0" => Ok(Code::Digit0),
        "1" => Ok(Code::Digit1),
        "2" => Ok(Code::Digit2),
        "3" => Ok(Code::Digit3),
        "4" => Ok(Code::Digit4),
        "5" => Ok(Code::Digit5),
        "6" => Ok(Code::Digit6),
        "7" => Ok(Code::Digit7),
        "8" => Ok(Code::Digit8),
        "9" => Ok(Code::Digit9),
        "A" => Ok(Code::KeyA),
        "B" => Ok(Code::KeyB),
        "C" => Ok(Code::KeyC),
        "D" => Ok(Code::KeyD),
        "E" => Ok(Code::KeyE),
        "F" => Ok(Code::KeyF),
        "G" => Ok(Code::KeyG),
        "H" => Ok(Code::KeyH),
        "I" => Ok(Code::KeyI),
        "J" => Ok(Code::KeyJ),
        "K" => Ok(Code::KeyK),
        "L" => Ok(Code::KeyL),
        "M" => Ok(Code::KeyM),
        "N" => Ok(Code::KeyN),
        "O" => Ok(Code::KeyO),
        "P" => Ok(Code::KeyP),
        "Q" => Ok(Code::KeyQ),
        "R" => Ok(Code::KeyR),
        "S" => Ok(Code::KeyS),
        "T" => Ok(Code::KeyT),
        "U" => Ok(Code::KeyU),
        "V" => Ok(Code::KeyV),
        "W" => Ok(Code::KeyW),
        "X" => Ok(Code::KeyX),
        "Y" => Ok(Code::KeyY),
        "Z" => Ok(Code::KeyZ),
        other => Err(anyhow!("unsupported key: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modifiers() {
        let mods = parse_modifiers(&["Command", "Shift"]).unwrap();
        assert!(mods.contains(Modifiers::SUPER));
        assert!(mods.contains(Modifiers::SHIFT));
    }

    #[test]
    fn test_parse_unknown_modifier() {
        assert!(parse_modifiers(&["Hyper"]).is_err());
    }

    #[test]
    fn test_parse_digit_and_letter_keys() {
        assert!(matches!(parse_key("9"), Ok(Code::Digit9)));
        assert!(matches!(parse_key("Z"), Ok(Code::KeyZ)));
    }

    #[test]
    fn test_parse_unsupported_key() {
        assert!(parse_key("F13").is_err());
    }

    #[test]
    #[ignore = "requires a session able to register global hotkeys"]
    fn test_register_default_chord() {
        let toggle = HotkeyToggle::register(DEFAULT_MODIFIERS, DEFAULT_KEY);
        assert!(toggle.is_ok());
    }
}
