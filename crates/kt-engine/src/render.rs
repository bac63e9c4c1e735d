use std::io::{Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use kt_screen::{VirtualScreen, ansi};

/// Lance la boucle de rendu sur son thread.
///
/// Chaque tour demande un diff à l'écran et l'émet d'un seul write
/// sous le mutex terminal, puis dort pour viser le budget de frame
/// (~33 ms à 30 fps, plancher 1 ms). Le curseur matériel est masqué à
/// la première frame. Une frame manquée ne coûte rien : le diff
/// suivant absorbe toutes les écritures intermédiaires.
///
/// Sur erreur d'écriture terminal, la boucle lève le drapeau
/// d'annulation et retourne l'erreur ; l'appelant la récupère au
/// join.
///
/// # Errors
/// La création du thread peut échouer.
pub fn spawn_render_loop(
    screen: Arc<VirtualScreen>,
    term: Arc<Mutex<Stdout>>,
    cancel: Arc<AtomicBool>,
    target_fps: u32,
) -> std::io::Result<JoinHandle<Result<()>>> {
    std::thread::Builder::new()
        .name("kt-render".to_string())
        .spawn(move || {
            let result = render_loop(&screen, &term, &cancel, target_fps);
            if result.is_err() {
                cancel.store(true, Ordering::Relaxed);
            }
            result
        })
}

fn render_loop(
    screen: &VirtualScreen,
    term: &Mutex<Stdout>,
    cancel: &AtomicBool,
    target_fps: u32,
) -> Result<()> {
    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1)));
    let mut first_frame = true;

    while !cancel.load(Ordering::Relaxed) {
        let frame_start = Instant::now();
        let diff = screen.generate_diff_and_swap();
        {
            let mut out = term.lock().unwrap_or_else(PoisonError::into_inner);
            if first_frame {
                out.write_all(ansi::CURSOR_HIDE.as_bytes())?;
                first_frame = false;
            }
            out.write_all(diff.as_bytes())?;
            out.flush()?;
        }
        let sleep = frame_budget
            .saturating_sub(frame_start.elapsed())
            .max(Duration::from_millis(1));
        std::thread::sleep(sleep);
    }
    Ok(())
}
