/// Moteur d'exécution des scripts `.clip`.
///
/// Le moteur marche la séquence d'éléments parsés comme une timeline
/// ancrée à une horloge murale : chaque horodatage dort jusqu'à son
/// échéance, jamais plus (un événement en retard ne retarde pas les
/// suivants). Les appels de fonctions et d'alias sont re-parsés
/// juste-à-temps après substitution textuelle des paramètres ; les
/// coroutines deviennent des threads qui partagent l'écran virtuel.

pub mod engine;
pub mod render;

pub use engine::ScriptEngine;
