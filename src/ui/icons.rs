//! Status markers for terminal output.

use console::Emoji;

pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN] ");
