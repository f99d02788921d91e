//! Vocabulary definitions for HAWG documents
//!
//! Reserved predicate names, well-known identifiers and the default
//! field and type names the query operations fall back to.

/// Identifier predicate
pub const ID: &str = "@id";

/// Type predicate, normalized to an array after flattening
pub const TYPE: &str = "@type";

/// Prefix marking reserved predicates; never copied by field composition
pub const RESERVED_PREFIX: char = '@';

/// Identifier of the document's entry-point node
pub const HEADER_ID: &str = "#__header__";

/// Reference field on the header listing the top-level roots
pub const ROOT_FIELD: &str = "root";

/// Prefix of synthesized blank-node identifiers
pub const BLANK_PREFIX: &str = "_:b";

/// Minimum zero-padded width of the blank-node counter
pub const BLANK_WIDTH: usize = 5;

/// Structural containment field used for parent/ancestor/tree walks
pub const MEMBER_FIELD: &str = "member";

/// Field linking a subject to its annotation nodes
pub const ANNOTATION_FIELD: &str = "annotation";

/// Type of annotation nodes
pub const ANNOTATION_TYPE: &str = "Annotation";

/// Field linking a subject to its style override nodes
pub const RENDER_OPTION_FIELD: &str = "renderOption";

/// Type at which tree walks stop descending
pub const STRUCTURE_TYPE: &str = "Structure";

/// Type of structural grouping nodes
pub const GROUP_TYPE: &str = "Group";

/// Display-name field of annotation nodes
pub const NAME_FIELD: &str = "name";

/// Whether a predicate name is reserved (`@`-prefixed)
pub fn is_reserved(field: &str) -> bool {
    field.starts_with(RESERVED_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved(ID));
        assert!(is_reserved(TYPE));
        assert!(is_reserved("@context"));
        assert!(!is_reserved("name"));
        assert!(!is_reserved(""));
    }
}
