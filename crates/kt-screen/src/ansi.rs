//! Séquences ANSI émises par le lecteur. Rien d'autre ne sort vers le
//! terminal.

use kt_core::cell::Rgb;

/// Reset SGR complet.
pub const RESET: &str = "\x1b[0m";

/// Effacement de l'écran.
pub const CLEAR_SCREEN: &str = "\x1b[2J";

/// Masquer le curseur matériel.
pub const CURSOR_HIDE: &str = "\x1b[?25l";

/// Réafficher le curseur matériel.
pub const CURSOR_SHOW: &str = "\x1b[?25h";

/// Couleur de texte par défaut.
pub const FG_RESET: &str = "\x1b[39m";

/// Couleur de fond par défaut.
pub const BG_RESET: &str = "\x1b[49m";

/// Gras on/off.
pub const BOLD_ON: &str = "\x1b[1m";
pub const BOLD_OFF: &str = "\x1b[22m";

/// Italique on/off.
pub const ITALIC_ON: &str = "\x1b[3m";
pub const ITALIC_OFF: &str = "\x1b[23m";

/// Souligné on/off.
pub const UNDERLINE_ON: &str = "\x1b[4m";
pub const UNDERLINE_OFF: &str = "\x1b[24m";

/// Barré on/off.
pub const STRIKE_ON: &str = "\x1b[9m";
pub const STRIKE_OFF: &str = "\x1b[29m";

/// Position du curseur, 1-based.
#[must_use]
pub fn cursor_to(row: usize, col: usize) -> String {
    format!("\x1b[{row};{col}H")
}

/// Couleur de texte truecolor.
#[must_use]
pub fn fg(color: Rgb) -> String {
    format!("\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
}

/// Couleur de fond truecolor.
#[must_use]
pub fn bg(color: Rgb) -> String {
    format!("\x1b[48;2;{};{};{}m", color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_well_formed() {
        assert_eq!(cursor_to(1, 1), "\x1b[1;1H");
        assert_eq!(fg(Rgb { r: 255, g: 0, b: 0 }), "\x1b[38;2;255;0;0m");
        assert_eq!(bg(Rgb { r: 0, g: 0, b: 0 }), "\x1b[48;2;0;0;0m");
    }
}
