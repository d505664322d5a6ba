use std::path::Path;

/// Moves one file. The seam lets tests simulate a producer that keeps the
/// file locked for a while.
pub trait FileMover: Send {
    fn move_file(&self, from: &Path, to: &Path) -> std::io::Result<()>;
}
