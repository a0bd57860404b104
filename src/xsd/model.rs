use std::fmt::{Display, Formatter};

use regex::Regex;

use crate::xsd::builtin::{Builtin, WhiteSpace};

pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// An expanded name: an optional namespace URI and a local name
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct QName {
    pub ns: Option<String>,
    pub local: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Occurs {
    pub min: u32,
    /// None when unbounded
    pub max: Option<u32>,
}

/// A reference to, or inline definition of, a type
#[derive(Debug)]
pub enum TypeDef {
    Named(QName),
    Simple(Box<SimpleType>),
    Complex(Box<ComplexType>),
}

#[derive(Debug)]
pub struct ElementDecl {
    pub name: QName,
    pub type_def: TypeDef,
    pub nillable: bool,
    pub is_abstract: bool,
    pub fixed: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug)]
pub enum ElementParticle {
    Local(ElementDecl),
    Ref(QName),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum NamespaceConstraint {
    Any,
    /// Any namespace other than the target namespace, and not unqualified
    Other(Option<String>),
    /// An explicit list, where `None` stands for unqualified names
    List(Vec<Option<String>>),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessContents {
    Strict,
    Lax,
    Skip,
}

#[derive(Debug)]
pub enum Particle {
    Element {
        element: ElementParticle,
        occurs: Occurs,
    },
    Sequence {
        items: Vec<Particle>,
        occurs: Occurs,
    },
    Choice {
        items: Vec<Particle>,
        occurs: Occurs,
    },
    All {
        items: Vec<Particle>,
        occurs: Occurs,
    },
    Any {
        namespaces: NamespaceConstraint,
        process: ProcessContents,
        occurs: Occurs,
    },
    Group {
        name: QName,
        occurs: Occurs,
    },
}

#[derive(Debug)]
pub struct AttributeDecl {
    pub name: QName,
    pub type_def: TypeDef,
    pub fixed: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttributeUsage {
    Optional,
    Required,
    Prohibited,
}

#[derive(Debug)]
pub enum AttributeUse {
    Local {
        decl: AttributeDecl,
        usage: AttributeUsage,
    },
    Ref {
        name: QName,
        usage: AttributeUsage,
    },
    Group(QName),
}

#[derive(Debug, Default)]
pub struct AttributeSet {
    pub uses: Vec<AttributeUse>,
    pub any: Option<NamespaceConstraint>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DerivationKind {
    Extension,
    Restriction,
}

#[derive(Debug)]
pub struct Derivation {
    pub base: QName,
    pub kind: DerivationKind,
}

#[derive(Debug)]
pub enum ContentModel {
    Empty,
    Elements(Particle),
    /// Simple content derived from the type's base, optionally restricted further
    Simple(Option<Facets>),
}

#[derive(Debug)]
pub struct ComplexType {
    pub derivation: Option<Derivation>,
    pub content: ContentModel,
    pub attributes: AttributeSet,
    pub mixed: bool,
    /// May only be used through an xsi:type naming a derived type
    pub is_abstract: bool,
}

#[derive(Debug)]
pub enum SimpleType {
    Restriction { base: TypeDef, facets: Facets },
    List { item: TypeDef },
    Union { members: Vec<TypeDef> },
}

/// A globally named type definition
#[derive(Debug)]
pub enum NamedType {
    Simple(SimpleType),
    Complex(ComplexType),
}

/// Constraining facets of a single restriction step
#[derive(Debug, Default)]
pub struct Facets {
    pub enumeration: Vec<String>,
    /// Patterns of the same step, any of which may match
    pub patterns: Vec<Regex>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_inclusive: Option<String>,
    pub max_inclusive: Option<String>,
    pub min_exclusive: Option<String>,
    pub max_exclusive: Option<String>,
    pub total_digits: Option<usize>,
    pub fraction_digits: Option<usize>,
    pub white_space: Option<WhiteSpace>,
}

/// A simple type resolved from a `TypeDef`
#[derive(Debug, Copy, Clone)]
pub enum SimpleRef<'s> {
    Builtin(Builtin),
    Defined(&'s SimpleType),
}

/// A type resolved from a `TypeDef`
#[derive(Debug, Copy, Clone)]
pub enum Resolved<'s> {
    AnyType,
    Simple(SimpleRef<'s>),
    Complex(&'s ComplexType),
}

impl QName {
    pub fn new<S: Into<String>>(ns: Option<String>, local: S) -> Self {
        Self {
            ns,
            local: local.into(),
        }
    }

    pub fn xs<S: Into<String>>(local: S) -> Self {
        Self::new(Some(XS_NS.to_string()), local)
    }

    /// True if this name equals the name of an instance element or attribute
    pub fn matches(&self, ns: Option<&str>, local: &str) -> bool {
        self.local == local && self.ns.as_deref() == ns
    }
}

impl Display for QName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

impl Occurs {
    pub const ONCE: Occurs = Occurs {
        min: 1,
        max: Some(1),
    };
}

impl Particle {
    pub fn occurs(&self) -> Occurs {
        match self {
            Particle::Element { occurs, .. }
            | Particle::Sequence { occurs, .. }
            | Particle::Choice { occurs, .. }
            | Particle::All { occurs, .. }
            | Particle::Any { occurs, .. }
            | Particle::Group { occurs, .. } => *occurs,
        }
    }
}

impl NamespaceConstraint {
    pub fn allows(&self, ns: Option<&str>) -> bool {
        match self {
            NamespaceConstraint::Any => true,
            NamespaceConstraint::Other(target) => ns.is_some() && ns != target.as_deref(),
            NamespaceConstraint::List(allowed) => allowed.iter().any(|a| a.as_deref() == ns),
        }
    }
}

impl Facets {
    pub fn is_empty(&self) -> bool {
        self.enumeration.is_empty()
            && self.patterns.is_empty()
            && self.length.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min_inclusive.is_none()
            && self.max_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_exclusive.is_none()
            && self.total_digits.is_none()
            && self.fraction_digits.is_none()
            && self.white_space.is_none()
    }
}

#[cfg(test)]
mod tests {
    use crate::xsd::model::{NamespaceConstraint, QName};

    #[test]
    fn namespace_constraints() {
        let target = Some("urn:t".to_string());

        assert!(NamespaceConstraint::Any.allows(None));
        assert!(NamespaceConstraint::Other(target.clone()).allows(Some("urn:x")));
        assert!(!NamespaceConstraint::Other(target.clone()).allows(Some("urn:t")));
        assert!(!NamespaceConstraint::Other(target.clone()).allows(None));
        assert!(NamespaceConstraint::List(vec![None, target]).allows(None));
        assert!(!NamespaceConstraint::List(vec![]).allows(Some("urn:t")));
    }

    #[test]
    fn qnames_display_in_clark_notation() {
        assert_eq!("{urn:t}a", QName::new(Some("urn:t".into()), "a").to_string());
        assert_eq!("a", QName::new(None, "a").to_string());
        assert!(QName::new(None, "a").matches(None, "a"));
        assert!(!QName::new(None, "a").matches(Some("urn:t"), "a"));
    }
}
