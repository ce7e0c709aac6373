/// Failure while rendering a page from the shared template.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A structurally required region is absent from the template. Every
    /// record depends on it, so the whole run is aborted.
    #[error("could not locate required anchor in template: {0}")]
    MissingAnchor(&'static str),
}
