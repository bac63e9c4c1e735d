/// Pilote une piste audio de fond.
///
/// Implémenté par `kt_audio::MusicPlayer`. Le moteur ne connaît que
/// cette interface : démarrer au commit du temps zéro, arrêter à la
/// fin de la lecture.
///
/// # Example
/// ```
/// use kt_core::traits::AudioSink;
///
/// struct SilentSink;
/// impl AudioSink for SilentSink {
///     fn play(&self) {}
///     fn stop(&self) {}
/// }
/// ```
pub trait AudioSink: Send {
    /// Démarre la lecture asynchrone. Retourne immédiatement ; les
    /// erreurs sont avalées et loggées, jamais propagées au script.
    fn play(&self);

    /// Arrête la lecture. Idempotent, sans effet après la fin
    /// naturelle de la piste.
    fn stop(&self);
}
