//! The page location's fragment, where locators are published.

/// Read and replace the fragment part of the page location.
///
/// An empty fragment and no fragment are the same thing: implementations
/// return `None` for both and treat `set_fragment(Some(""))` as clearing.
pub trait PageLocation {
    fn fragment(&self) -> Option<String>;
    fn set_fragment(&mut self, fragment: Option<&str>);
}
