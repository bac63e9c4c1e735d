use std::sync::{Mutex, PoisonError};

use kt_core::cell::{Cell, Rgba, TextStyle};
use kt_core::error::CoreError;
use kt_core::width::cell_width;

use crate::ansi;

/// Écran virtuel double-buffer.
///
/// `front` reçoit les écritures du script ; `shadow` est le dernier
/// état émis vers le terminal. Les deux grilles vivent derrière un
/// même mutex : les écritures de curseurs concurrents se sérialisent,
/// et le diff lit un état cohérent.
///
/// # Example
/// ```
/// use kt_screen::VirtualScreen;
/// use kt_core::cell::TextStyle;
/// let screen = VirtualScreen::new(80, 24).unwrap();
/// let advance = screen.write(0, 0, 'a', &TextStyle::default(), true, true);
/// assert_eq!(advance, 1);
/// ```
pub struct VirtualScreen {
    width: usize,
    height: usize,
    inner: Mutex<Grids>,
}

struct Grids {
    front: Vec<Cell>,
    shadow: Vec<Cell>,
}

impl Grids {
    #[inline]
    fn idx(&self, row: usize, col: usize, width: usize) -> usize {
        debug_assert!(col < width);
        row * width + col
    }

    /// Répare les paires tête/placeholder pendantes autour d'une
    /// écriture imminente en `(row, col)` de largeur `w`.
    fn repair(&mut self, row: usize, col: usize, w: usize, width: usize) {
        if self.front[self.idx(row, col, width)].is_wide_placeholder && col > 0 {
            let head = self.idx(row, col - 1, width);
            self.front[head] = Cell::blank();
        }
        if self.front[self.idx(row, col, width)].is_wide_head && col + 1 < width {
            let ph = self.idx(row, col + 1, width);
            self.front[ph] = Cell::blank();
        }
        if w == 2 && col + 2 < width && self.front[self.idx(row, col + 1, width)].is_wide_head {
            let ph = self.idx(row, col + 2, width);
            self.front[ph] = Cell::blank();
        }
    }
}

impl VirtualScreen {
    /// Crée un écran aux dimensions données, les deux grilles vides.
    ///
    /// # Errors
    /// Dimensions nulles.
    pub fn new(width: usize, height: usize) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            inner: Mutex::new(Grids {
                front: vec![Cell::blank(); width * height],
                shadow: vec![Cell::blank(); width * height],
            }),
        })
    }

    /// Largeur en colonnes.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Hauteur en lignes.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Écrit un caractère et retourne l'avance en colonnes.
    ///
    /// - 0 : écriture refusée (hors bornes, largeur nulle, ou le
    ///   caractère large déborde du bord droit) ;
    /// - 1 ou 2 : colonnes consommées.
    ///
    /// Un refus de verrou (cellule `locked_by_main` visée par un
    /// écrivain non principal sans droit d'override) retourne quand
    /// même l'avance : la branche marche au même pas que le curseur
    /// principal qu'elle suit.
    pub fn write(
        &self,
        row: i32,
        col: i32,
        ch: char,
        style: &TextStyle,
        is_main: bool,
        can_override: bool,
    ) -> usize {
        let w = cell_width(ch);
        if w == 0 || row < 0 || col < 0 {
            return 0;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col + w > self.width {
            return 0;
        }

        let mut grids = self.lock();

        if !is_main && !can_override {
            let i = grids.idx(row, col, self.width);
            let mut locked = grids.front[i].locked_by_main;
            if w == 2 {
                let i2 = grids.idx(row, col + 1, self.width);
                locked |= grids.front[i2].locked_by_main;
            }
            if locked {
                return w;
            }
        }

        grids.repair(row, col, w, self.width);

        let head = grids.idx(row, col, self.width);
        grids.front[head] = Cell {
            ch,
            fg: style.fg,
            bg: style.bg,
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
            strikethrough: style.strikethrough,
            is_wide_head: w == 2,
            is_wide_placeholder: false,
            locked_by_main: is_main,
        };
        if w == 2 {
            let ph = grids.idx(row, col + 1, self.width);
            grids.front[ph] = Cell {
                ch: ' ',
                fg: style.fg,
                bg: style.bg,
                bold: style.bold,
                italic: style.italic,
                underline: style.underline,
                strikethrough: style.strikethrough,
                is_wide_head: false,
                is_wide_placeholder: true,
                locked_by_main: is_main,
            };
        }
        w
    }

    /// Remet toutes les cellules de `front` à vide. Le shadow n'est
    /// pas touché : le prochain diff transporte l'effacement.
    pub fn clear_screen(&self) {
        let mut grids = self.lock();
        for cell in &mut grids.front {
            *cell = Cell::blank();
        }
    }

    /// Diff ANSI minimal entre `front` et `shadow`, puis copie
    /// cellule à cellule de `front` vers `shadow`.
    ///
    /// Parcours row-major ; les cellules visuellement identiques sont
    /// sautées. Le curseur terminal et l'état SGR sont suivis pour
    /// n'émettre que les transitions nécessaires. Les placeholders
    /// n'émettent rien : la tête large a déjà avancé de deux
    /// colonnes. Se termine toujours par un reset SGR, donc un second
    /// appel immédiat retourne exactement `ESC[0m`.
    pub fn generate_diff_and_swap(&self) -> String {
        let mut grids = self.lock();
        let mut out = String::new();
        let mut cursor: Option<(usize, usize)> = None;
        let mut pen = TextStyle::default();

        for row in 0..self.height {
            for col in 0..self.width {
                let i = row * self.width + col;
                let front = grids.front[i];
                if front.visual_eq(&grids.shadow[i]) {
                    continue;
                }
                grids.shadow[i] = front;
                if front.is_wide_placeholder {
                    continue;
                }
                if cursor != Some((row, col)) {
                    out.push_str(&ansi::cursor_to(row + 1, col + 1));
                }
                emit_pen_transitions(&mut out, &mut pen, &front);
                out.push(front.ch);
                let advance = if front.is_wide_head { 2 } else { 1 };
                cursor = Some((row, col + advance));
            }
        }

        out.push_str(ansi::RESET);
        out
    }

    /// Copie de la cellule `(row, col)` de `front`, pour inspection.
    #[must_use]
    pub fn cell_at(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= self.height || col >= self.width {
            return None;
        }
        let grids = self.lock();
        Some(grids.front[row * self.width + col])
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Grids> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Émet les transitions SGR entre l'état courant de l'émetteur et la
/// cellule à afficher, et met l'état à jour.
fn emit_pen_transitions(out: &mut String, pen: &mut TextStyle, cell: &Cell) {
    if pen.fg != cell.fg {
        match cell.fg {
            Some(rgb) => out.push_str(&ansi::fg(rgb)),
            None => out.push_str(ansi::FG_RESET),
        }
        pen.fg = cell.fg;
    }
    // l'alpha ne change pas les octets émis
    if pen.bg.map(Rgba::rgb) != cell.bg.map(Rgba::rgb) {
        match cell.bg {
            Some(rgba) => out.push_str(&ansi::bg(rgba.rgb())),
            None => out.push_str(ansi::BG_RESET),
        }
    }
    pen.bg = cell.bg;
    if pen.bold != cell.bold {
        out.push_str(if cell.bold { ansi::BOLD_ON } else { ansi::BOLD_OFF });
        pen.bold = cell.bold;
    }
    if pen.italic != cell.italic {
        out.push_str(if cell.italic { ansi::ITALIC_ON } else { ansi::ITALIC_OFF });
        pen.italic = cell.italic;
    }
    if pen.underline != cell.underline {
        out.push_str(if cell.underline {
            ansi::UNDERLINE_ON
        } else {
            ansi::UNDERLINE_OFF
        });
        pen.underline = cell.underline;
    }
    if pen.strikethrough != cell.strikethrough {
        out.push_str(if cell.strikethrough {
            ansi::STRIKE_ON
        } else {
            ansi::STRIKE_OFF
        });
        pen.strikethrough = cell.strikethrough;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kt_core::cell::Rgb;

    fn style() -> TextStyle {
        TextStyle::default()
    }

    fn red() -> TextStyle {
        TextStyle {
            fg: Some(Rgb { r: 255, g: 0, b: 0 }),
            ..TextStyle::default()
        }
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(VirtualScreen::new(0, 24).is_err());
        assert!(VirtualScreen::new(80, 0).is_err());
    }

    #[test]
    fn write_bounds_checks() {
        let s = VirtualScreen::new(10, 4).unwrap();
        assert_eq!(s.write(-1, 0, 'a', &style(), true, true), 0);
        assert_eq!(s.write(0, -1, 'a', &style(), true, true), 0);
        assert_eq!(s.write(4, 0, 'a', &style(), true, true), 0);
        assert_eq!(s.write(0, 10, 'a', &style(), true, true), 0);
        // caractère large qui déborde du bord droit
        assert_eq!(s.write(0, 9, '一', &style(), true, true), 0);
        // largeur nulle
        assert_eq!(s.write(0, 0, '\u{0301}', &style(), true, true), 0);
        assert_eq!(s.write(0, 0, '\0', &style(), true, true), 0);
    }

    #[test]
    fn wide_write_creates_head_and_placeholder() {
        let s = VirtualScreen::new(10, 4).unwrap();
        assert_eq!(s.write(0, 0, '一', &red(), true, true), 2);
        let head = s.cell_at(0, 0).unwrap();
        let ph = s.cell_at(0, 1).unwrap();
        assert!(head.is_wide_head && !head.is_wide_placeholder);
        assert!(ph.is_wide_placeholder && !ph.is_wide_head);
        assert_eq!(head.ch, '一');
        assert_eq!(ph.ch, ' ');
        assert_eq!(ph.fg, head.fg);
    }

    #[test]
    fn overwriting_placeholder_repairs_head() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 0, '一', &style(), true, true);
        assert_eq!(s.write(0, 1, 'x', &style(), true, true), 1);
        let head = s.cell_at(0, 0).unwrap();
        assert_eq!(head.ch, ' ');
        assert!(!head.is_wide_head);
        assert!(!head.locked_by_main);
        assert_eq!(s.cell_at(0, 1).unwrap().ch, 'x');
    }

    #[test]
    fn overwriting_head_repairs_placeholder() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 0, '一', &style(), true, true);
        assert_eq!(s.write(0, 0, 'x', &style(), true, true), 1);
        let ph = s.cell_at(0, 1).unwrap();
        assert_eq!(ph.ch, ' ');
        assert!(!ph.is_wide_placeholder);
    }

    #[test]
    fn wide_over_next_head_repairs_far_placeholder() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 2, '二', &style(), true, true); // tête en 2, placeholder en 3
        s.write(0, 1, '一', &style(), true, true); // recouvre 1..3
        let far = s.cell_at(0, 3).unwrap();
        assert_eq!(far.ch, ' ');
        assert!(!far.is_wide_placeholder);
        assert!(s.cell_at(0, 1).unwrap().is_wide_head);
        assert!(s.cell_at(0, 2).unwrap().is_wide_placeholder);
    }

    #[test]
    fn pairing_repair_across_overlapping_writes() {
        let s = VirtualScreen::new(12, 3).unwrap();
        let seq = [
            (0, 0, '一'),
            (0, 1, 'a'),
            (0, 1, '二'),
            (0, 0, '三'),
            (1, 10, '四'),
            (1, 11, 'z'),
            (2, 3, 'q'),
            (2, 2, '五'),
        ];
        for (r, c, ch) in seq {
            s.write(r, c, ch, &style(), true, true);
        }
        for row in 0..3 {
            for col in 0..12 {
                let cell = s.cell_at(row, col).unwrap();
                if cell.is_wide_placeholder {
                    assert!(col > 0 && s.cell_at(row, col - 1).unwrap().is_wide_head);
                }
                if cell.is_wide_head {
                    assert!(col + 1 < 12 && s.cell_at(row, col + 1).unwrap().is_wide_placeholder);
                }
                assert!(!(cell.is_wide_head && cell.is_wide_placeholder));
            }
        }
    }

    #[test]
    fn lock_refusal_still_consumes_advance() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 0, 'M', &style(), true, true);
        // branche sans droit d'override : refusée mais avance
        assert_eq!(s.write(0, 0, 'x', &style(), false, false), 1);
        assert_eq!(s.cell_at(0, 0).unwrap().ch, 'M');
        // avec droit d'override : remplace et déverrouille
        assert_eq!(s.write(0, 0, 'y', &style(), false, true), 1);
        let cell = s.cell_at(0, 0).unwrap();
        assert_eq!(cell.ch, 'y');
        assert!(!cell.locked_by_main);
    }

    #[test]
    fn non_main_write_on_free_cell_succeeds() {
        let s = VirtualScreen::new(10, 4).unwrap();
        assert_eq!(s.write(0, 0, 'x', &style(), false, false), 1);
        assert_eq!(s.cell_at(0, 0).unwrap().ch, 'x');
        assert!(!s.cell_at(0, 0).unwrap().locked_by_main);
    }

    #[test]
    fn wide_lock_checks_both_cells() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 1, 'M', &style(), true, true);
        // la tête viserait 0, le placeholder 1 (verrouillé)
        assert_eq!(s.write(0, 0, '一', &style(), false, false), 2);
        assert_eq!(s.cell_at(0, 1).unwrap().ch, 'M');
        assert_eq!(s.cell_at(0, 0).unwrap().ch, ' ');
    }

    #[test]
    fn diff_emits_minimal_sequences() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 0, 'X', &red(), true, true);
        s.write(0, 1, 'Y', &style(), true, true);
        let diff = s.generate_diff_and_swap();
        assert_eq!(diff, "\x1b[1;1H\x1b[38;2;255;0;0mX\x1b[39mY\x1b[0m");
    }

    #[test]
    fn diff_is_idempotent() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(1, 3, 'a', &red(), true, true);
        let _ = s.generate_diff_and_swap();
        assert_eq!(s.generate_diff_and_swap(), "\x1b[0m");
    }

    #[test]
    fn diff_skips_cursor_move_for_adjacent_cells() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(2, 4, 'a', &style(), true, true);
        s.write(2, 5, 'b', &style(), true, true);
        s.write(2, 7, 'c', &style(), true, true);
        let diff = s.generate_diff_and_swap();
        assert_eq!(diff, "\x1b[3;5Hab\x1b[3;8Hc\x1b[0m");
    }

    #[test]
    fn diff_advances_two_columns_after_wide_head() {
        let s = VirtualScreen::new(10, 4).unwrap();
        s.write(0, 0, '一', &style(), true, true);
        s.write(0, 2, 'x', &style(), true, true);
        let diff = s.generate_diff_and_swap();
        // pas de repositionnement entre la tête large et 'x'
        assert_eq!(diff, "\x1b[1;1H一x\x1b[0m");
    }

    #[test]
    fn diff_emits_style_toggles_off() {
        let s = VirtualScreen::new(10, 4).unwrap();
        let bolded = TextStyle {
            bold: true,
            ..TextStyle::default()
        };
        s.write(0, 0, 'a', &bolded, true, true);
        s.write(0, 1, 'b', &style(), true, true);
        let diff = s.generate_diff_and_swap();
        assert_eq!(diff, "\x1b[1;1H\x1b[1ma\x1b[22mb\x1b[0m");
    }

    #[test]
    fn clear_screen_propagates_through_diff() {
        let s = VirtualScreen::new(10, 2).unwrap();
        s.write(0, 0, 'a', &style(), true, true);
        let _ = s.generate_diff_and_swap();
        s.clear_screen();
        let diff = s.generate_diff_and_swap();
        assert_eq!(diff, "\x1b[1;1H \x1b[0m");
        assert_eq!(s.generate_diff_and_swap(), "\x1b[0m");
    }

    #[test]
    fn background_alpha_is_not_emitted() {
        let s = VirtualScreen::new(10, 2).unwrap();
        let with_bg = TextStyle {
            bg: Some(Rgba {
                r: 1,
                g: 2,
                b: 3,
                a: 0x80,
            }),
            ..TextStyle::default()
        };
        s.write(0, 0, 'a', &with_bg, true, true);
        let diff = s.generate_diff_and_swap();
        assert_eq!(diff, "\x1b[1;1H\x1b[48;2;1;2;3ma\x1b[0m");
    }
}
