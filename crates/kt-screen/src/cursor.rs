use std::sync::Arc;

use kt_core::cell::{Rgb, Rgba, TextStyle};

use crate::screen::VirtualScreen;

/// Tête d'écriture stylée liée à un écran.
///
/// Seul chemin de code autorisé à faire avancer une position
/// automatiquement : toutes les commandes de rendu passent par un
/// curseur, aucune ne touche les cellules directement (hormis
/// l'effacement d'écran, qui va à l'écran).
///
/// La position peut sortir des bornes — chaque écriture re-vérifie.
pub struct VirtualCursor {
    screen: Arc<VirtualScreen>,
    row: i32,
    col: i32,
    style: TextStyle,
    is_main: bool,
    can_override: bool,
}

impl VirtualCursor {
    /// Curseur en (0,0), style par défaut.
    #[must_use]
    pub fn new(screen: Arc<VirtualScreen>, is_main: bool, can_override: bool) -> Self {
        Self {
            screen,
            row: 0,
            col: 0,
            style: TextStyle::default(),
            is_main,
            can_override,
        }
    }

    /// Imprime un texte code point par code point. Un saut de ligne
    /// appelle [`Self::new_line`] ; tout le reste part à l'écran avec
    /// le style et les droits du curseur, et la colonne avance de la
    /// largeur retournée.
    pub fn print_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.new_line();
                continue;
            }
            let advance = self.screen.write(
                self.row,
                self.col,
                ch,
                &self.style,
                self.is_main,
                self.can_override,
            );
            self.col += advance as i32;
        }
    }

    /// Ligne suivante, colonne zéro. Bloqué sur la dernière ligne :
    /// pas de scrolling.
    pub fn new_line(&mut self) {
        let last_row = self.screen.height() as i32 - 1;
        self.row = (self.row + 1).min(last_row);
        self.col = 0;
    }

    /// Position absolue 0-based, sans bornage.
    pub fn move_to(&mut self, row: i32, col: i32) {
        self.row = row;
        self.col = col;
    }

    /// Déplacement relatif, sans bornage.
    pub fn move_relative(&mut self, d_row: i32, d_col: i32) {
        self.row += d_row;
        self.col += d_col;
    }

    /// Couleur de texte.
    pub fn set_color(&mut self, color: Rgb) {
        self.style.fg = Some(color);
    }

    /// Retour à la couleur de texte par défaut.
    pub fn clear_color(&mut self) {
        self.style.fg = None;
    }

    /// Couleur de fond.
    pub fn set_background(&mut self, color: Rgba) {
        self.style.bg = Some(color);
    }

    /// Retour au fond par défaut.
    pub fn clear_background(&mut self) {
        self.style.bg = None;
    }

    /// Les quatre drapeaux de style, d'un bloc.
    pub fn set_style(&mut self, bold: bool, italic: bool, underline: bool, strikethrough: bool) {
        self.style.bold = bold;
        self.style.italic = italic;
        self.style.underline = underline;
        self.style.strikethrough = strikethrough;
    }

    /// Efface les quatre drapeaux, garde les couleurs.
    pub fn clear_style(&mut self) {
        self.set_style(false, false, false, false);
    }

    /// Efface drapeaux et couleurs.
    pub fn reset_style(&mut self) {
        self.style = TextStyle::default();
    }

    /// Clone pour une branche : position et style copiés, nouveaux
    /// droits d'écriture.
    #[must_use]
    pub fn clone_for(&self, is_main: bool, can_override: bool) -> Self {
        Self {
            screen: Arc::clone(&self.screen),
            row: self.row,
            col: self.col,
            style: self.style,
            is_main,
            can_override,
        }
    }

    /// Écran sous-jacent.
    #[must_use]
    pub fn screen(&self) -> &Arc<VirtualScreen> {
        &self.screen
    }

    /// Ligne courante (peut être hors bornes).
    #[must_use]
    pub fn row(&self) -> i32 {
        self.row
    }

    /// Colonne courante (peut être hors bornes).
    #[must_use]
    pub fn col(&self) -> i32 {
        self.col
    }
}
