use std::collections::VecDeque;

use crate::Position;

// -----------------------------------------------------------------------------
// Element

/// A buffered tree node: named, attributed, with text and ordered children.
///
/// One type serves both directions of a binding call.
///
/// - **Input**: [`next`](Self::next) takes the next unread child,
///   [`next_named`](Self::next_named) takes it only when the name matches
///   (the adjacent-run rule used for inline repetition). Attributes can be
///   inspected and removed; removal is how a resolution strategy hides its
///   bookkeeping attributes from the schema pass.
/// - **Output**: [`child`](Self::child) appends a fresh child and hands it
///   back for population, [`set_attribute`](Self::set_attribute) and
///   [`set_value`](Self::set_value) fill the node in, and
///   [`pop_child`](Self::pop_child) withdraws the most recently appended
///   child again.
///
/// # Examples
///
/// ```
/// use graft_node::Element;
///
/// let mut root = Element::new("example")
///     .with_attribute("name", "x")
///     .with_child(Element::new("value").with_value("7"));
///
/// assert_eq!(root.attribute("name"), Some("x"));
///
/// let value = root.next().unwrap();
/// assert_eq!(value.name(), "value");
/// assert_eq!(value.value(), Some("7"));
/// assert!(root.next().is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: VecDeque<Element>,
    text: Option<String>,
    position: Position,
    root: bool,
}

impl Element {
    /// Creates an empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: VecDeque::new(),
            text: None,
            position: Position::UNKNOWN,
            root: false,
        }
    }

    // -------------------------------------------------------------------------
    // Construction helpers

    /// Adds an attribute, builder style. Last write for a name wins.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Appends a child, builder style.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push_back(child);
        self
    }

    /// Sets the text value, builder style.
    pub fn with_value(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attaches a source position, builder style.
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Marks this element as the document root.
    pub fn into_root(mut self) -> Self {
        self.root = true;
        self
    }

    // -------------------------------------------------------------------------
    // Inspection

    /// The element name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The text value, if any was set.
    #[inline]
    pub fn value(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Where this element sat in its source document.
    #[inline]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Whether this element is the document root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// The attributes in insertion order as `(name, value)` pairs.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The names of all attributes, in insertion order.
    ///
    /// Useful when attributes are removed while iterating, which the
    /// borrowing [`attributes`](Self::attributes) iterator cannot allow.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Looks up one attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    /// Number of unread children.
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether all children have been read (or none were ever added).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Name of the next unread child without taking it.
    pub fn peek_name(&self) -> Option<&str> {
        self.children.front().map(|child| child.name())
    }

    // -------------------------------------------------------------------------
    // Input side

    /// Takes the next unread child, in document order.
    pub fn next(&mut self) -> Option<Element> {
        self.children.pop_front()
    }

    /// Takes the next unread child only if its name matches.
    ///
    /// This is the inline-repetition rule: a run of same-named siblings is
    /// consumed one by one, and the first differently named sibling ends
    /// the run without being disturbed.
    pub fn next_named(&mut self, name: &str) -> Option<Element> {
        if self.peek_name() == Some(name) {
            self.children.pop_front()
        } else {
            None
        }
    }

    /// Removes an attribute, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(index).1)
    }

    // -------------------------------------------------------------------------
    // Output side

    /// Appends a fresh child with the given name and returns it for
    /// population.
    pub fn child(&mut self, name: impl Into<String>) -> &mut Element {
        self.children.push_back(Element::new(name));
        self.children.back_mut().unwrap()
    }

    /// Appends an already built child.
    pub fn push_child(&mut self, child: Element) {
        self.children.push_back(child);
    }

    /// Sets an attribute. Last write for a name wins.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value.into(),
            None => self.attributes.push((name, value.into())),
        }
    }

    /// Sets the text value.
    pub fn set_value(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Withdraws the most recently appended child.
    ///
    /// The counterpart of [`child`](Self::child) for callers that build a
    /// node speculatively and decide against keeping it.
    pub fn pop_child(&mut self) -> Option<Element> {
        self.children.pop_back()
    }
}

#[cfg(test)]
mod tests {
    use super::Element;

    #[test]
    fn children_are_consumed_forward_only() {
        let mut root = Element::new("root")
            .with_child(Element::new("a"))
            .with_child(Element::new("b"));

        assert_eq!(root.len(), 2);
        assert_eq!(root.next().unwrap().name(), "a");
        assert_eq!(root.next().unwrap().name(), "b");
        assert!(root.next().is_none());
        assert!(root.is_empty());
    }

    #[test]
    fn next_named_stops_at_a_different_sibling() {
        let mut root = Element::new("root")
            .with_child(Element::new("entry"))
            .with_child(Element::new("entry"))
            .with_child(Element::new("other"));

        assert!(root.next_named("entry").is_some());
        assert!(root.next_named("entry").is_some());
        // The run ends here; `other` stays unread.
        assert!(root.next_named("entry").is_none());
        assert_eq!(root.peek_name(), Some("other"));
    }

    #[test]
    fn attributes_update_in_place() {
        let mut node = Element::new("node").with_attribute("id", "1");
        node.set_attribute("id", "2");
        assert_eq!(node.attribute("id"), Some("2"));
        assert_eq!(node.attributes().count(), 1);

        assert_eq!(node.remove_attribute("id"), Some("2".to_string()));
        assert_eq!(node.attribute("id"), None);
    }

    #[test]
    fn output_children_can_be_withdrawn() {
        let mut node = Element::new("node");
        node.child("wrapper").set_attribute("x", "1");
        let wrapper = node.pop_child().unwrap();
        assert_eq!(wrapper.name(), "wrapper");
        assert!(node.is_empty());
    }
}
