use std::collections::HashMap;
use std::io::{Read, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use kt_core::clock::PlaybackClock;
use kt_core::traits::AudioSink;
use kt_screen::{VirtualCursor, VirtualScreen, ansi};
use kt_script::element::{AliasDef, FunctionDef, ScriptElement};
use kt_script::parser::{parse, parse_line_content};

use crate::render;

/// Tempo par défaut d'un script qui ne déclare pas de `[bpm]`.
const DEFAULT_BPM: f64 = 120.0;
/// Largeur minimale de la grille, quel que soit le terminal.
const MIN_WIDTH: usize = 80;
/// Hauteur minimale de la grille.
const MIN_HEIGHT: usize = 24;
/// Délai de grâce après le dernier événement, avant le teardown.
const TAIL_MS: u64 = 1000;

/// Exécuteur de timeline.
///
/// À la construction, les définitions de fonctions et d'alias sont
/// indexées (elles sont ensuite inertes dans le flux). `run()` tient
/// tout le cycle de vie : boucle de rendu, top départ au clavier,
/// ancrage de l'horloge, audio, exécution, puis restauration du
/// terminal — même en cas d'erreur.
pub struct ScriptEngine {
    elements: Vec<ScriptElement>,
    shared: Arc<EngineShared>,
    audio: Option<Box<dyn AudioSink>>,
    target_fps: u32,
}

/// État partagé entre le scope principal, les branches et la boucle
/// de rendu.
struct EngineShared {
    functions: HashMap<String, FunctionDef>,
    aliases: HashMap<String, AliasDef>,
    /// Drapeau d'annulation unique : levé par le teardown, par un
    /// scope en erreur, ou par la boucle de rendu sur erreur
    /// d'écriture terminal. Tout le monde le lit.
    cancel: Arc<AtomicBool>,
}

impl ScriptEngine {
    /// Pré-scanne le flux d'éléments et construit le moteur.
    #[must_use]
    pub fn new(
        elements: Vec<ScriptElement>,
        audio: Option<Box<dyn AudioSink>>,
        target_fps: u32,
    ) -> Self {
        let mut functions = HashMap::new();
        let mut aliases = HashMap::new();
        for element in &elements {
            match element {
                ScriptElement::DefineFunction {
                    name,
                    params,
                    raw_body_lines,
                    allow_override,
                } => {
                    functions.insert(
                        name.clone(),
                        FunctionDef {
                            name: name.clone(),
                            params: params.clone(),
                            raw_body_lines: raw_body_lines.clone(),
                            allow_override: *allow_override,
                        },
                    );
                }
                ScriptElement::DefineAlias { name, raw_content } => {
                    aliases.insert(
                        name.clone(),
                        AliasDef {
                            name: name.clone(),
                            raw_content: raw_content.clone(),
                        },
                    );
                }
                _ => {}
            }
        }
        Self {
            elements,
            shared: Arc::new(EngineShared {
                functions,
                aliases,
                cancel: Arc::new(AtomicBool::new(false)),
            }),
            audio,
            target_fps,
        }
    }

    /// Joue le script dans le terminal courant.
    ///
    /// # Errors
    /// Erreur de re-parse d'une expansion, ou erreur d'écriture
    /// terminal remontée par la boucle de rendu. Le terminal est
    /// restauré (curseur visible, SGR reset) avant propagation.
    pub fn run(mut self) -> Result<()> {
        let (term_w, term_h) = crossterm::terminal::size().unwrap_or((0, 0));
        let width = (term_w as usize).max(MIN_WIDTH);
        let height = (term_h as usize).max(MIN_HEIGHT);
        let screen = Arc::new(VirtualScreen::new(width, height)?);
        let mut cursor = VirtualCursor::new(Arc::clone(&screen), true, true);

        let term: Arc<Mutex<Stdout>> = Arc::new(Mutex::new(std::io::stdout()));
        let render_handle = render::spawn_render_loop(
            Arc::clone(&screen),
            Arc::clone(&term),
            Arc::clone(&self.shared.cancel),
            self.target_fps,
        )?;

        let result = self.play(&screen, &mut cursor, &term);

        // Teardown, toujours : audio coupé, rendu annulé et joint,
        // curseur matériel restauré.
        if let Some(audio) = self.audio.take() {
            audio.stop();
        }
        self.shared.cancel.store(true, Ordering::Relaxed);
        let render_result = match render_handle.join() {
            Ok(r) => r,
            Err(_) => Ok(()),
        };
        restore_terminal(&term, height);

        result.and(render_result)
    }

    /// Top départ, horloge, audio, puis le flux principal.
    fn play(
        &mut self,
        screen: &Arc<VirtualScreen>,
        cursor: &mut VirtualCursor,
        term: &Arc<Mutex<Stdout>>,
    ) -> Result<()> {
        {
            let mut out = term.lock().unwrap_or_else(PoisonError::into_inner);
            out.write_all("Appuyez sur ENTRÉE pour lancer la lecture…".as_bytes())?;
            out.flush()?;
        }
        let mut byte = [0u8; 1];
        let _ = std::io::stdin().read(&mut byte)?;

        {
            let mut out = term.lock().unwrap_or_else(PoisonError::into_inner);
            out.write_all(ansi::CLEAR_SCREEN.as_bytes())?;
            out.write_all(ansi::cursor_to(1, 1).as_bytes())?;
            out.flush()?;
        }
        screen.clear_screen();

        let clock = PlaybackClock::start();
        if let Some(audio) = &self.audio {
            audio.play();
        }
        log::info!("Lecture démarrée ({}×{})", screen.width(), screen.height());

        execute_scope(&self.shared, &self.elements, cursor, clock, 0, DEFAULT_BPM)?;

        std::thread::sleep(Duration::from_millis(TAIL_MS));
        Ok(())
    }
}

fn restore_terminal(term: &Mutex<Stdout>, height: usize) {
    let mut out = term.lock().unwrap_or_else(PoisonError::into_inner);
    let _ = out.write_all(ansi::cursor_to(height, 1).as_bytes());
    let _ = out.write_all(ansi::RESET.as_bytes());
    let _ = out.write_all(ansi::CURSOR_SHOW.as_bytes());
    let _ = out.write_all(b"\n");
    let _ = out.flush();
}

/// Exécute une séquence d'éléments comme un scope : son tempo, son
/// ancre temporelle, son propre dernier-offset.
///
/// Les horodatages dorment jusqu'à `scope_start_ms + offset` si
/// l'échéance est future ; sinon l'exécution continue immédiatement
/// (correction de dérive). Les appels synchrones relancent
/// l'exécution avec une ancre rebasée à `scope_start_ms + dernier
/// offset` ; les coroutines partent sur leur thread avec la même
/// ancre rebasée. Le scope joint toutes ses branches avant de rendre
/// la main.
fn execute_scope(
    shared: &Arc<EngineShared>,
    elements: &[ScriptElement],
    cursor: &mut VirtualCursor,
    clock: PlaybackClock,
    scope_start_ms: i64,
    parent_bpm: f64,
) -> Result<()> {
    let mut branches: Vec<JoinHandle<()>> = Vec::new();
    let result = run_elements(
        shared,
        elements,
        cursor,
        clock,
        scope_start_ms,
        parent_bpm,
        &mut branches,
    );
    if result.is_err() {
        // les branches encore en vol s'arrêtent au prochain élément
        shared.cancel.store(true, Ordering::Relaxed);
    }
    for handle in branches {
        let _ = handle.join();
    }
    result
}

#[allow(clippy::too_many_lines)]
fn run_elements(
    shared: &Arc<EngineShared>,
    elements: &[ScriptElement],
    cursor: &mut VirtualCursor,
    clock: PlaybackClock,
    scope_start_ms: i64,
    parent_bpm: f64,
    branches: &mut Vec<JoinHandle<()>>,
) -> Result<()> {
    let mut current_bpm = parent_bpm;
    let mut last_ms: i64 = 0;

    for element in elements {
        if shared.cancel.load(Ordering::Relaxed) {
            break;
        }
        match element {
            ScriptElement::Timestamp(ts) => {
                let target = ts.offset_ms(60_000.0 / current_bpm, last_ms);
                if !ts.is_continuation() {
                    last_ms = target;
                }
                clock.sleep_until(scope_start_ms + target);
            }
            ScriptElement::SetBpm(bpm) => current_bpm = *bpm,
            ScriptElement::PrintText(text) => cursor.print_text(text),
            ScriptElement::PrintSpace(count) => cursor.print_text(&" ".repeat(*count)),
            ScriptElement::NewLine => cursor.new_line(),
            ScriptElement::ClearScreen => {
                cursor.screen().clear_screen();
                cursor.move_to(0, 0);
                cursor.reset_style();
            }
            ScriptElement::ClearScreenNoReset => cursor.screen().clear_screen(),
            ScriptElement::MoveAbsolute { row, col } => cursor.move_to(row - 1, col - 1),
            ScriptElement::MoveRelative { d_row, d_col } => cursor.move_relative(*d_row, *d_col),
            ScriptElement::SetColor(rgb) => cursor.set_color(*rgb),
            ScriptElement::ClearColor => cursor.clear_color(),
            ScriptElement::SetBackground(rgba) => cursor.set_background(*rgba),
            ScriptElement::ClearBackground => cursor.clear_background(),
            ScriptElement::SetStyle {
                bold,
                italic,
                underline,
                strikethrough,
            } => cursor.set_style(*bold, *italic, *underline, *strikethrough),
            ScriptElement::ClearStyle => cursor.clear_style(),
            // inertes : indexées au pré-scan
            ScriptElement::DefineAlias { .. } | ScriptElement::DefineFunction { .. } => {}
            ScriptElement::CallFunction { name, args } => {
                if let Some(alias) = shared.aliases.get(name) {
                    let resolved = parse_line_content(&alias.raw_content)
                        .with_context(|| format!("dans l'alias « {name} »"))?;
                    execute_scope(
                        shared,
                        &resolved,
                        cursor,
                        clock,
                        scope_start_ms + last_ms,
                        current_bpm,
                    )?;
                } else if let Some(def) = shared.functions.get(name) {
                    let body = substitute_params(&def.raw_body_lines, &def.params, args);
                    let resolved = parse(&body)
                        .with_context(|| format!("dans la fonction « {name} »"))?;
                    execute_scope(
                        shared,
                        &resolved,
                        cursor,
                        clock,
                        scope_start_ms + last_ms,
                        current_bpm,
                    )?;
                } else {
                    // nom inconnu : retombe en texte
                    cursor.print_text(&format!("[{name}]"));
                }
            }
            ScriptElement::CallCoroutine { name, args } => {
                // seules les fonctions sont éligibles ; un nom
                // inconnu est ignoré en silence
                let Some(def) = shared.functions.get(name) else {
                    log::debug!("Coroutine inconnue ignorée : {name}");
                    continue;
                };
                let body = substitute_params(&def.raw_body_lines, &def.params, args);
                let resolved =
                    parse(&body).with_context(|| format!("dans la coroutine « {name} »"))?;
                let mut sub_cursor = cursor.clone_for(false, def.allow_override);
                let shared = Arc::clone(shared);
                let branch_start = scope_start_ms + last_ms;
                let branch_bpm = current_bpm;
                let branch_name = name.clone();
                let handle = std::thread::Builder::new()
                    .name(format!("kt-branch-{name}"))
                    .spawn(move || {
                        if let Err(e) = execute_scope(
                            &shared,
                            &resolved,
                            &mut sub_cursor,
                            clock,
                            branch_start,
                            branch_bpm,
                        ) {
                            log::warn!("Branche « {branch_name} » interrompue : {e}");
                        }
                    })?;
                branches.push(handle);
            }
        }
    }
    Ok(())
}

/// Substitution textuelle des paramètres : chaque `[param]` du corps
/// est remplacé par son argument avant re-parse, ce qui autorise un
/// paramètre au sein d'une commande (`[color [hex]]`). Un argument
/// manquant devient la chaîne vide.
fn substitute_params(body: &[String], params: &[String], args: &[String]) -> Vec<String> {
    body.iter()
        .map(|line| {
            let mut line = line.clone();
            for (i, param) in params.iter().enumerate() {
                let needle = format!("[{param}]");
                let arg = args.get(i).map_or("", String::as_str);
                line = line.replace(&needle, arg);
            }
            line
        })
        .collect()
}
