//! Frame Display Port

/// Surface that renders a string as a machine-readable visual code.
pub trait FrameDisplay: Send + Sync {
    /// Replace the currently displayed code.
    fn show(&self, frame: &str);

    /// Remove any displayed code.
    fn clear(&self);
}
