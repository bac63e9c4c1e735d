/// Écran virtuel double-buffer et curseurs stylés.
///
/// Toutes les écritures du script passent par un [`VirtualCursor`]
/// lié à un [`VirtualScreen`] partagé ; l'écran produit à chaque
/// frame le diff ANSI minimal entre son état courant et le dernier
/// état émis.

pub mod ansi;
pub mod cursor;
pub mod screen;

pub use cursor::VirtualCursor;
pub use screen::VirtualScreen;
