use std::time::{Duration, Instant};

/// Horloge de lecture, ancrée à l'instant zéro du script.
///
/// Chaque scope d'exécution calcule ses échéances en millisecondes
/// depuis cette ancre ; une échéance déjà passée ne dort pas, ce qui
/// empêche une frame lente de retarder les événements suivants.
///
/// # Example
/// ```
/// use kt_core::clock::PlaybackClock;
/// let clock = PlaybackClock::start();
/// assert!(clock.now_ms() >= 0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct PlaybackClock {
    origin: Instant,
}

impl PlaybackClock {
    /// Ancre l'horloge à maintenant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Millisecondes écoulées depuis l'ancre.
    #[inline]
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Dort jusqu'à `target_ms` (relatif à l'ancre). Retourne
    /// immédiatement si l'échéance est déjà passée.
    pub fn sleep_until(&self, target_ms: i64) {
        let remaining = target_ms - self.now_ms();
        if remaining > 0 {
            std::thread::sleep(Duration::from_millis(remaining as u64));
        }
    }
}
