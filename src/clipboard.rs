use tracing::{info, warn};

/// Destination for finished transcripts.
///
/// Delivery is fire-and-forget: implementations log failures instead of
/// propagating them, since a clipboard error should never disturb the
/// recording state machine.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str);
}

/// System clipboard via arboard
pub struct SystemClipboard {
    clipboard: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    #[must_use]
    pub fn new() -> Self {
        let clipboard = match arboard::Clipboard::new() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("clipboard unavailable: {e}");
                None
            }
        };
        Self { clipboard }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) {
        let Some(clipboard) = &mut self.clipboard else {
            warn!("clipboard not initialized, transcript dropped");
            return;
        };
        match clipboard.set_text(text) {
            Ok(()) => info!(chars = text.chars().count(), "transcript copied to clipboard"),
            Err(e) => warn!("failed to set clipboard text: {e}"),
        }
    }
}
