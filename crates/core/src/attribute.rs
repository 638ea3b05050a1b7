//! Attribute trails, patterns, and unknown sets
//!
//! An attribute trail records *where* a stack value came from: a root
//! variable plus the field/index qualifiers applied to it. Trails are what
//! unknown and missing patterns match against, and what unknown values
//! carry as their payload.

use std::fmt;

/// One qualification step applied to a root variable.
///
/// `Field` covers both `.name` selection and `["name"]` string indexing;
/// CEL treats them as the same attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    Field(String),
    IntIndex(i64),
    UintIndex(u64),
    BoolIndex(bool),
}

impl Qualifier {
    /// Literal match used by pattern matching. Integer qualifiers match
    /// across signedness when they denote the same value, mirroring
    /// heterogeneous map-key lookup.
    pub fn literal_matches(&self, other: &Qualifier) -> bool {
        match (self, other) {
            (Qualifier::Field(a), Qualifier::Field(b)) => a == b,
            (Qualifier::BoolIndex(a), Qualifier::BoolIndex(b)) => a == b,
            (Qualifier::IntIndex(a), Qualifier::IntIndex(b)) => a == b,
            (Qualifier::UintIndex(a), Qualifier::UintIndex(b)) => a == b,
            (Qualifier::IntIndex(a), Qualifier::UintIndex(b))
            | (Qualifier::UintIndex(b), Qualifier::IntIndex(a)) => {
                *a >= 0 && (*a as u64) == *b
            }
            _ => false,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::Field(name) => write!(f, ".{}", name),
            Qualifier::IntIndex(i) => write!(f, "[{}]", i),
            Qualifier::UintIndex(u) => write!(f, "[{}u]", u),
            Qualifier::BoolIndex(b) => write!(f, "[{}]", b),
        }
    }
}

/// Symbolic derivation of a stack value: empty, or a root variable name
/// plus the qualifiers applied so far.
///
/// Trails for constants and call results are empty; `ident` steps create a
/// rooted trail and `select`/`index` steps extend it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeTrail {
    parts: Option<(String, Vec<Qualifier>)>,
}

impl AttributeTrail {
    /// The empty trail (value not derived from an input attribute)
    pub fn empty() -> Self {
        AttributeTrail { parts: None }
    }

    /// Trail rooted at a variable, with no qualifiers yet
    pub fn root(name: impl Into<String>) -> Self {
        AttributeTrail {
            parts: Some((name.into(), Vec::new())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_none()
    }

    pub fn root_name(&self) -> Option<&str> {
        self.parts.as_ref().map(|(root, _)| root.as_str())
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        match &self.parts {
            Some((_, quals)) => quals,
            None => &[],
        }
    }

    /// Extend with one qualifier, returning the longer trail.
    /// Extending the empty trail stays empty: there is no attribute to
    /// qualify.
    pub fn extend(&self, qualifier: Qualifier) -> AttributeTrail {
        match &self.parts {
            Some((root, quals)) => {
                let mut quals = quals.clone();
                quals.push(qualifier);
                AttributeTrail {
                    parts: Some((root.clone(), quals)),
                }
            }
            None => AttributeTrail::empty(),
        }
    }
}

impl fmt::Display for AttributeTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parts {
            None => write!(f, "<empty>"),
            Some((root, quals)) => {
                write!(f, "{}", root)?;
                for q in quals {
                    write!(f, "{}", q)?;
                }
                Ok(())
            }
        }
    }
}

/// One pattern qualifier: an exact literal or a wildcard matching any
/// single qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternQualifier {
    Exact(Qualifier),
    Wildcard,
}

/// A pattern over attributes: root variable name plus qualifier pattern
/// path. Used by activations to mark inputs unknown or missing.
///
/// A concrete trail matches when the pattern's qualifier path is a prefix
/// of the trail's and every pattern qualifier literal-matches (or is a
/// wildcard). Marking `a.b` therefore also covers `a.b.c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePattern {
    root: String,
    qualifiers: Vec<PatternQualifier>,
}

impl AttributePattern {
    pub fn new(root: impl Into<String>) -> Self {
        AttributePattern {
            root: root.into(),
            qualifiers: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.qualifiers
            .push(PatternQualifier::Exact(Qualifier::Field(name.into())));
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.qualifiers
            .push(PatternQualifier::Exact(Qualifier::IntIndex(index)));
        self
    }

    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(PatternQualifier::Exact(qualifier));
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.qualifiers.push(PatternQualifier::Wildcard);
        self
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Whether this pattern covers the given trail.
    pub fn matches(&self, trail: &AttributeTrail) -> bool {
        let Some(root) = trail.root_name() else {
            return false;
        };
        if root != self.root {
            return false;
        }
        let quals = trail.qualifiers();
        if quals.len() < self.qualifiers.len() {
            return false;
        }
        self.qualifiers.iter().zip(quals).all(|(p, q)| match p {
            PatternQualifier::Wildcard => true,
            PatternQualifier::Exact(expected) => expected.literal_matches(q),
        })
    }
}

impl fmt::Display for AttributePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for q in &self.qualifiers {
            match q {
                PatternQualifier::Exact(q) => write!(f, "{}", q)?,
                PatternQualifier::Wildcard => write!(f, ".*")?,
            }
        }
        Ok(())
    }
}

/// The payload of an unknown value: the set of attribute trails whose
/// concrete values were withheld from this evaluation.
///
/// Kept sorted and deduplicated so unions and equality are canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UnknownSet {
    attributes: Vec<AttributeTrail>,
}

impl UnknownSet {
    pub fn single(trail: AttributeTrail) -> Self {
        UnknownSet {
            attributes: vec![trail],
        }
    }

    pub fn attributes(&self) -> &[AttributeTrail] {
        &self.attributes
    }

    pub fn union(&self, other: &UnknownSet) -> UnknownSet {
        let mut attributes = self.attributes.clone();
        attributes.extend(other.attributes.iter().cloned());
        attributes.sort();
        attributes.dedup();
        UnknownSet { attributes }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for UnknownSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown{{")?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", attr)?;
        }
        write!(f, "}}")
    }
}
