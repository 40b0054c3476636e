//! The binding error taxonomy.
//!
//! Every error is fatal to the current read or write call: the first
//! violation unwinds the recursion and the caller receives no partial
//! object graph. Variants carry the offending wire name and, when the
//! failure was caused by a node, the node's document [`Position`].

use graft_node::Position;

// -----------------------------------------------------------------------------
// Error

/// An enumeration of all failure outcomes of a binding call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A class schema could not be built: duplicate wire names,
    /// conflicting text and element markers, a wire-order override naming
    /// an unknown label, or a type with nothing to bind.
    #[error("schema error for `{type_name}`: {reason}")]
    Schema {
        type_name: &'static str,
        reason: String,
    },

    /// An attribute had no matching label under strict policy, or a label
    /// found no matching attribute where one was mandatory.
    #[error("attribute `{name}` does not match the schema ({position})")]
    Attribute { name: String, position: Position },

    /// An element had no matching label under strict policy.
    #[error("element `{name}` does not match the schema ({position})")]
    Element { name: String, position: Position },

    /// Text content appeared where the schema declares none.
    #[error("text content on `{name}` does not match the schema ({position})")]
    Text { name: String, position: Position },

    /// A required label's value was null on read or on write.
    #[error("unable to satisfy required field `{name}`")]
    FieldRequired { name: String },

    /// A union inline-list entry whose resolved root name disagrees with
    /// the declared entry type.
    #[error("entry `{found}` does not match the expected root name `{expected}` ({position})")]
    RootNameMismatch {
        expected: String,
        found: String,
        position: Position,
    },

    /// The declared or resolved type cannot be constructed or is not
    /// registered.
    #[error("unable to instantiate `{type_name}`: {reason}")]
    Instantiation {
        type_name: String,
        reason: String,
    },

    /// A scalar value could not be parsed or formatted.
    #[error("cannot transform `{text}` into `{type_name}`: {reason}")]
    Transform {
        type_name: &'static str,
        text: String,
        reason: String,
    },

    /// A lifecycle hook reported a failure.
    #[error("`{hook}` hook on `{type_name}` failed: {reason}")]
    Hook {
        hook: &'static str,
        type_name: &'static str,
        reason: String,
    },
}

impl Error {
    pub(crate) fn schema(type_name: &'static str, reason: impl Into<String>) -> Self {
        Self::Schema {
            type_name,
            reason: reason.into(),
        }
    }

    pub(crate) fn instantiation(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Instantiation {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn required(name: impl Into<String>) -> Self {
        Self::FieldRequired { name: name.into() }
    }
}

/// Shorthand result type for binding operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use graft_node::Position;

    use super::Error;

    #[test]
    fn messages_carry_the_offending_name() {
        let error = Error::required("value");
        assert_eq!(error.to_string(), "unable to satisfy required field `value`");

        let error = Error::Element {
            name: "server".into(),
            position: Position::new(4, 2),
        };
        assert_eq!(
            error.to_string(),
            "element `server` does not match the schema (line 4, column 2)"
        );
    }
}
