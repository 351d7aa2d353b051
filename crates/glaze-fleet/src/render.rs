//! Configuration renderer collaborator.

use glaze_model::DesiredSpec;

/// Boxed error returned by a renderer.
pub type RenderError = Box<dyn std::error::Error + Send + Sync>;

/// Renders a desired spec into protocol-ready configuration text.
///
/// A pure function from the engine's point of view: the engine only looks at
/// success or failure and ships the text verbatim. Renderer loss is fatal to
/// the controller process, so failures are surfaced on the supervisor channel
/// as well as returned.
pub trait ConfigRenderer: Send + Sync {
    /// Render `spec` as configuration source text.
    fn render(&self, spec: &DesiredSpec) -> Result<String, RenderError>;
}

impl<F> ConfigRenderer for F
where
    F: Fn(&DesiredSpec) -> Result<String, RenderError> + Send + Sync,
{
    fn render(&self, spec: &DesiredSpec) -> Result<String, RenderError> {
        self(spec)
    }
}
