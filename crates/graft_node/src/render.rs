//! Debug rendering of element trees as XML-like text.
//!
//! This exists so tests and log output stay readable. It is not a
//! serialization guarantee: formatting, attribute order and escaping are
//! only as good as debugging requires.

use core::fmt;

use crate::Element;

fn escape(text: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in text.chars() {
        match c {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' => f.write_str("&quot;")?,
            c => write!(f, "{c}")?,
        }
    }
    Ok(())
}

fn render(node: &Element, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{}", node.name())?;
    for (name, value) in node.attributes() {
        write!(f, " {name}=\"")?;
        escape(value, f)?;
        f.write_str("\"")?;
    }
    if node.is_empty() && node.value().is_none() {
        return f.write_str("/>");
    }
    f.write_str(">")?;
    if let Some(text) = node.value() {
        escape(text, f)?;
    }
    // Rendering must not consume the tree, so children are walked by
    // cloning the read cursor.
    let mut cursor = node.clone();
    while let Some(child) = cursor.next() {
        render(&child, f)?;
    }
    write!(f, "</{}>", node.name())
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f)
    }
}
