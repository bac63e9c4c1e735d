//! Propriétés de l'écran virtuel sous écritures arbitraires :
//! cohérence des paires larges, idempotence du diff, déterminisme.

use kt_core::cell::TextStyle;
use kt_screen::VirtualScreen;
use proptest::prelude::*;

const WIDTH: usize = 20;
const HEIGHT: usize = 6;

#[derive(Debug, Clone)]
struct WriteOp {
    row: i32,
    col: i32,
    ch: char,
    is_main: bool,
    can_override: bool,
}

/// Écriture arbitraire : positions qui débordent des deux côtés,
/// caractères étroits, larges, de largeur nulle, avec tous les
/// croisements de droits.
fn write_op() -> impl Strategy<Value = WriteOp> {
    (
        -2i32..(HEIGHT as i32 + 2),
        -2i32..(WIDTH as i32 + 2),
        prop_oneof![
            proptest::char::range('a', 'z'),
            proptest::char::range('一', '十'),
            Just('あ'),
            Just(' '),
            Just('\u{0301}'),
            Just('\0'),
        ],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(row, col, ch, is_main, can_override)| WriteOp {
            row,
            col,
            ch,
            is_main,
            can_override,
        })
}

fn apply(screen: &VirtualScreen, ops: &[WriteOp]) {
    for op in ops {
        screen.write(
            op.row,
            op.col,
            op.ch,
            &TextStyle::default(),
            op.is_main,
            op.can_override,
        );
    }
}

proptest! {
    /// Chaque placeholder a sa tête à gauche, chaque tête son
    /// placeholder à droite, jamais les deux drapeaux à la fois.
    #[test]
    fn wide_pairs_stay_consistent(ops in proptest::collection::vec(write_op(), 0..200)) {
        let screen = VirtualScreen::new(WIDTH, HEIGHT).unwrap();
        apply(&screen, &ops);
        for row in 0..HEIGHT {
            for col in 0..WIDTH {
                let cell = screen.cell_at(row, col).unwrap();
                prop_assert!(!(cell.is_wide_head && cell.is_wide_placeholder));
                if cell.is_wide_placeholder {
                    prop_assert!(col > 0, "placeholder en colonne 0 ({row},{col})");
                    prop_assert!(
                        screen.cell_at(row, col - 1).unwrap().is_wide_head,
                        "placeholder orphelin en ({row},{col})"
                    );
                }
                if cell.is_wide_head {
                    prop_assert!(col + 1 < WIDTH, "tête large au bord droit ({row},{col})");
                    prop_assert!(
                        screen.cell_at(row, col + 1).unwrap().is_wide_placeholder,
                        "tête sans placeholder en ({row},{col})"
                    );
                }
            }
        }
    }

    /// L'avance retournée est bornée par la largeur du caractère.
    #[test]
    fn advance_is_at_most_two(op in write_op()) {
        let screen = VirtualScreen::new(WIDTH, HEIGHT).unwrap();
        let advance = screen.write(
            op.row,
            op.col,
            op.ch,
            &TextStyle::default(),
            op.is_main,
            op.can_override,
        );
        prop_assert!(advance <= 2);
    }

    /// Après un swap, le diff suivant est exactement le reset SGR.
    #[test]
    fn second_diff_is_exactly_sgr_reset(ops in proptest::collection::vec(write_op(), 0..200)) {
        let screen = VirtualScreen::new(WIDTH, HEIGHT).unwrap();
        apply(&screen, &ops);
        let _ = screen.generate_diff_and_swap();
        prop_assert_eq!(screen.generate_diff_and_swap(), "\x1b[0m");
    }

    /// La même séquence d'écritures produit la même grille, que le
    /// diff soit demandé en cours de route ou pas.
    #[test]
    fn grid_state_is_independent_of_diff_schedule(
        ops in proptest::collection::vec(write_op(), 0..120),
        diff_at in 0usize..120,
    ) {
        let plain = VirtualScreen::new(WIDTH, HEIGHT).unwrap();
        let diffed = VirtualScreen::new(WIDTH, HEIGHT).unwrap();
        apply(&plain, &ops);
        for (i, op) in ops.iter().enumerate() {
            if i == diff_at {
                let _ = diffed.generate_diff_and_swap();
            }
            diffed.write(
                op.row,
                op.col,
                op.ch,
                &TextStyle::default(),
                op.is_main,
                op.can_override,
            );
        }
        for row in 0..HEIGHT {
            for col in 0..WIDTH {
                prop_assert_eq!(
                    screen_cell(&plain, row, col),
                    screen_cell(&diffed, row, col)
                );
            }
        }
    }
}

fn screen_cell(screen: &VirtualScreen, row: usize, col: usize) -> kt_core::cell::Cell {
    screen.cell_at(row, col).unwrap()
}
