use std::borrow::Cow;

/// Human-readable label for an event variant.
///
/// Used in diagnostics that name an event kind without its payload and in
/// structured log fields.
///
/// # Example
///
/// ```rust
/// use mocktcp::{Event, Label};
///
/// assert_eq!(Event::Connected.label(), "Connected");
/// assert_eq!(Event::BytesRead("hi".into()).label(), "BytesRead");
/// ```
pub trait Label {
    /// Returns a human-readable label for this item.
    fn label(&self) -> Cow<'static, str>;
}
