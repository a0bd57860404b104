use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use regex::Regex;
use roxmltree::{Document, Node};
use snafu::ResultExt;

use crate::xsd::builtin::{Builtin, WhiteSpace};
use crate::xsd::error::*;
use crate::xsd::model::*;

/// A compiled XML Schema, ready to validate instance documents
#[derive(Debug)]
pub struct Schema {
    target_namespace: Option<String>,
    elements: HashMap<QName, ElementDecl>,
    types: HashMap<QName, NamedType>,
    groups: HashMap<QName, Particle>,
    attributes: HashMap<QName, AttributeDecl>,
    attribute_groups: HashMap<QName, AttributeSet>,
}

#[derive(Debug, Clone)]
enum Load {
    Root,
    /// Included by a schema with the given target namespace
    Include(Option<String>),
    /// Imported for the given namespace
    Import(Option<String>),
}

/// Declaration context of one schema document
struct Context<'a> {
    path: &'a Path,
    target_ns: Option<String>,
    /// Set when a schema without a target namespace is included into one with a namespace
    chameleon: bool,
    qualified_elements: bool,
    qualified_attributes: bool,
}

/// Schema constructs that are recognized but not supported
const UNSUPPORTED: &[&str] = &[
    "redefine",
    "override",
    "assert",
    "assertion",
    "alternative",
    "openContent",
    "defaultOpenContent",
];

impl Schema {
    /// Compiles the schema file at `path`, along with any schemas it includes or imports
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Compiling schema {}", path.display());

        let mut compiler = Compiler::new();
        compiler.load_file(path, Load::Root)?;
        compiler.finish()
    }

    /// Compiles a schema from text. Includes and imports are resolved against the current
    /// directory.
    pub fn parse(text: &str) -> Result<Self> {
        let mut compiler = Compiler::new();
        compiler.compile_text(text, Path::new("schema.xsd"), Load::Root)?;
        compiler.finish()
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub(crate) fn global_element(&self, ns: Option<&str>, local: &str) -> Option<&ElementDecl> {
        self.elements
            .get(&QName::new(ns.map(|ns| ns.to_string()), local))
    }

    pub(crate) fn element(&self, name: &QName) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    pub(crate) fn group(&self, name: &QName) -> Option<&Particle> {
        self.groups.get(name)
    }

    pub(crate) fn attribute(&self, name: &QName) -> Option<&AttributeDecl> {
        self.attributes.get(name)
    }

    pub(crate) fn attribute_group(&self, name: &QName) -> Option<&AttributeSet> {
        self.attribute_groups.get(name)
    }

    /// Resolves a type reference or inline definition. None if the name is not defined.
    pub(crate) fn resolve_type<'s>(&'s self, type_def: &'s TypeDef) -> Option<Resolved<'s>> {
        match type_def {
            TypeDef::Named(name) => self.resolve_type_name(name),
            TypeDef::Simple(simple) => Some(Resolved::Simple(SimpleRef::Defined(simple))),
            TypeDef::Complex(complex) => Some(Resolved::Complex(complex)),
        }
    }

    pub(crate) fn resolve_type_name(&self, name: &QName) -> Option<Resolved> {
        if name.ns.as_deref() == Some(XS_NS) {
            if name.local == "anyType" {
                return Some(Resolved::AnyType);
            }
            if let Some(builtin) = Builtin::from_name(&name.local) {
                return Some(Resolved::Simple(SimpleRef::Builtin(builtin)));
            }
        }

        match self.types.get(name)? {
            NamedType::Simple(simple) => Some(Resolved::Simple(SimpleRef::Defined(simple))),
            NamedType::Complex(complex) => Some(Resolved::Complex(complex)),
        }
    }

    pub(crate) fn resolve_simple<'s>(&'s self, type_def: &'s TypeDef) -> Option<SimpleRef<'s>> {
        match self.resolve_type(type_def)? {
            Resolved::Simple(simple) => Some(simple),
            Resolved::AnyType | Resolved::Complex(_) => None,
        }
    }

    /// True if the type named `derived` is `base` or is derived from it by any number of
    /// extension, restriction, list or union steps
    pub(crate) fn derives_from(&self, derived: &QName, base: &QName) -> bool {
        // derivation cycles are rejected at compile time, so every chain ends at anyType
        let mut current = Some(derived.clone());
        while let Some(name) = current {
            if &name == base {
                return true;
            }
            current = self.base_type_name(&name);
        }
        false
    }

    fn base_type_name(&self, name: &QName) -> Option<QName> {
        if name.ns.as_deref() == Some(XS_NS) {
            if name.local == "anyType" {
                return None;
            }
            if let Some(builtin) = Builtin::from_name(&name.local) {
                return Some(match builtin.base() {
                    Some(base) => QName::xs(base.name()),
                    None => QName::xs("anyType"),
                });
            }
        }

        match self.types.get(name)? {
            NamedType::Complex(complex) => Some(
                complex
                    .derivation
                    .as_ref()
                    .map(|d| d.base.clone())
                    .unwrap_or_else(|| QName::xs("anyType")),
            ),
            NamedType::Simple(SimpleType::Restriction {
                base: TypeDef::Named(base),
                ..
            }) => Some(base.clone()),
            NamedType::Simple(_) => Some(QName::xs("anySimpleType")),
        }
    }

    fn new() -> Self {
        let mut schema = Self {
            target_namespace: None,
            elements: HashMap::new(),
            types: HashMap::new(),
            groups: HashMap::new(),
            attributes: HashMap::new(),
            attribute_groups: HashMap::new(),
        };

        // The xml namespace attributes are always available for reference
        for (local, builtin) in [
            ("lang", Builtin::String),
            ("space", Builtin::NcName),
            ("base", Builtin::AnyUri),
            ("id", Builtin::Id),
        ] {
            let name = QName::new(Some(XML_NS.to_string()), local);
            schema.attributes.insert(
                name.clone(),
                AttributeDecl {
                    name,
                    type_def: TypeDef::Named(QName::xs(builtin.name())),
                    fixed: None,
                },
            );
        }

        schema
    }
}

struct Compiler {
    schema: Schema,
    loaded: HashSet<PathBuf>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            schema: Schema::new(),
            loaded: HashSet::new(),
        }
    }

    fn load_file(&mut self, path: &Path, load: Load) -> Result<()> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.loaded.insert(canonical) {
            debug!("Schema {} is already loaded", path.display());
            return Ok(());
        }

        let text = fs::read_to_string(path).context(IoReadSnafu { path })?;
        self.compile_text(&text, path, load)
    }

    fn compile_text(&mut self, text: &str, path: &Path, load: Load) -> Result<()> {
        let doc = Document::parse(text).context(ParseSchemaSnafu { path })?;
        let root = doc.root_element();

        if !root.has_tag_name((XS_NS, "schema")) {
            return NotASchemaSnafu {
                path,
                root: QName::new(
                    root.tag_name().namespace().map(|ns| ns.to_string()),
                    root.tag_name().name(),
                )
                .to_string(),
            }
            .fail();
        }

        let declared_ns = root.attribute("targetNamespace").map(|ns| ns.to_string());

        let (target_ns, chameleon) = match &load {
            Load::Root => {
                self.schema.target_namespace = declared_ns.clone();
                (declared_ns, false)
            }
            Load::Include(includer_ns) => {
                if declared_ns.is_some() && declared_ns != *includer_ns {
                    return IncludeNamespaceMismatchSnafu {
                        path,
                        namespace: declared_ns.unwrap_or_default(),
                    }
                    .fail();
                }
                (
                    includer_ns.clone(),
                    declared_ns.is_none() && includer_ns.is_some(),
                )
            }
            Load::Import(expected) => {
                if declared_ns != *expected {
                    return InvalidSchemaSnafu {
                        path,
                        line: line(&root),
                        message: format!(
                            "imported schema has target namespace {}, expected {}",
                            declared_ns.as_deref().unwrap_or("(none)"),
                            expected.as_deref().unwrap_or("(none)")
                        ),
                    }
                    .fail();
                }
                (declared_ns, false)
            }
        };

        let ctx = Context {
            path,
            target_ns,
            chameleon,
            qualified_elements: root.attribute("elementFormDefault") == Some("qualified"),
            qualified_attributes: root.attribute("attributeFormDefault") == Some("qualified"),
        };

        for child in xs_children(root) {
            self.compile_top_level(&ctx, child)?;
        }

        Ok(())
    }

    fn compile_top_level(&mut self, ctx: &Context, node: Node) -> Result<()> {
        match xs_local(&node) {
            Some("include") => {
                let location = self.location(ctx, node, true)?.unwrap_or_default();
                self.load_file(&location, Load::Include(ctx.target_ns.clone()))?;
            }
            Some("import") => match self.location(ctx, node, false)? {
                Some(location) => {
                    let namespace = node.attribute("namespace").map(|ns| ns.to_string());
                    self.load_file(&location, Load::Import(namespace))?;
                }
                None => debug!(
                    "Skipping import without schemaLocation on line {}",
                    line(&node)
                ),
            },
            Some("element") => {
                let decl = ctx.element_decl(node, true)?;
                insert(&mut self.schema.elements, decl.name.clone(), decl, "element")?;
            }
            Some("complexType") => {
                let name = ctx.global_name(node)?;
                let complex = ctx.complex_type(node)?;
                insert(
                    &mut self.schema.types,
                    name,
                    NamedType::Complex(complex),
                    "type",
                )?;
            }
            Some("simpleType") => {
                let name = ctx.global_name(node)?;
                let simple = ctx.simple_type(node)?;
                insert(
                    &mut self.schema.types,
                    name,
                    NamedType::Simple(simple),
                    "type",
                )?;
            }
            Some("group") => {
                let name = ctx.global_name(node)?;
                let mut children = xs_children(node);
                let particle = match children.next() {
                    Some(child)
                        if matches!(xs_local(&child), Some("sequence" | "choice" | "all")) =>
                    {
                        ctx.particle(child)?
                    }
                    _ => {
                        return Err(
                            ctx.invalid(node, "group must contain a sequence, choice or all")
                        )
                    }
                };
                insert(&mut self.schema.groups, name, particle, "group")?;
            }
            Some("attribute") => {
                let decl = ctx.attribute_decl(node, true)?;
                insert(&mut self.schema.attributes, decl.name.clone(), decl, "attribute")?;
            }
            Some("attributeGroup") => {
                let name = ctx.global_name(node)?;
                let mut set = AttributeSet::default();
                for child in xs_children(node) {
                    ctx.attribute_use(child, &mut set)?;
                }
                insert(
                    &mut self.schema.attribute_groups,
                    name,
                    set,
                    "attribute group",
                )?;
            }
            Some("notation") => debug!("Ignoring notation on line {}", line(&node)),
            _ => return Err(ctx.unexpected(node)),
        }

        Ok(())
    }

    fn location(&self, ctx: &Context, node: Node, required: bool) -> Result<Option<PathBuf>> {
        match node.attribute("schemaLocation") {
            Some(location) => {
                let base = ctx.path.parent().unwrap_or_else(|| Path::new(""));
                Ok(Some(base.join(location)))
            }
            None if required => Err(ctx.invalid(node, "missing schemaLocation")),
            None => Ok(None),
        }
    }

    fn finish(self) -> Result<Schema> {
        let schema = self.schema;
        References { schema: &schema }.check()?;
        debug!(
            "Compiled schema with {} elements and {} types",
            schema.elements.len(),
            schema.types.len()
        );
        Ok(schema)
    }
}

impl<'a> Context<'a> {
    fn element_decl(&self, node: Node, global: bool) -> Result<ElementDecl> {
        let local = self.required_attr(node, "name")?;
        if node.has_attribute("substitutionGroup") {
            return UnsupportedConstructSnafu {
                path: self.path,
                line: line(&node),
                name: "element/@substitutionGroup",
            }
            .fail();
        }

        let ns = if global || self.is_qualified(node, self.qualified_elements) {
            self.target_ns.clone()
        } else {
            None
        };

        let mut type_def = self.attr_qname(node, "type")?.map(TypeDef::Named);

        for child in xs_children(node) {
            match xs_local(&child) {
                Some("complexType") if type_def.is_none() => {
                    type_def = Some(TypeDef::Complex(Box::new(self.complex_type(child)?)));
                }
                Some("simpleType") if type_def.is_none() => {
                    type_def = Some(TypeDef::Simple(Box::new(self.simple_type(child)?)));
                }
                Some("key" | "keyref" | "unique") => {
                    debug!("Ignoring identity constraint on line {}", line(&child))
                }
                _ => return Err(self.unexpected(child)),
            }
        }

        Ok(ElementDecl {
            name: QName::new(ns, local),
            type_def: type_def.unwrap_or_else(|| TypeDef::Named(QName::xs("anyType"))),
            nillable: self.bool_attr(node, "nillable")?.unwrap_or(false),
            is_abstract: self.bool_attr(node, "abstract")?.unwrap_or(false),
            fixed: node.attribute("fixed").map(|f| f.to_string()),
            default: node.attribute("default").map(|d| d.to_string()),
        })
    }

    fn complex_type(&self, node: Node) -> Result<ComplexType> {
        let mut mixed = self.bool_attr(node, "mixed")?.unwrap_or(false);
        let mut derivation = None;
        let mut content = None;
        let mut attributes = AttributeSet::default();

        for child in xs_children(node) {
            match xs_local(&child) {
                Some("simpleContent") if content.is_none() && derivation.is_none() => {
                    let (d, facets, set) = self.simple_content(child)?;
                    content = Some(ContentModel::Simple(facets));
                    derivation = Some(d);
                    attributes = set;
                }
                Some("complexContent") if content.is_none() && derivation.is_none() => {
                    if let Some(m) = self.bool_attr(child, "mixed")? {
                        mixed = m;
                    }
                    let (d, particle, set) = self.complex_content(child)?;
                    content = particle.map(ContentModel::Elements);
                    derivation = Some(d);
                    attributes = set;
                }
                Some("sequence" | "choice" | "all" | "group")
                    if content.is_none() && derivation.is_none() =>
                {
                    content = Some(ContentModel::Elements(self.particle(child)?));
                }
                Some("attribute" | "attributeGroup" | "anyAttribute") if derivation.is_none() => {
                    self.attribute_use(child, &mut attributes)?
                }
                _ => return Err(self.unexpected(child)),
            }
        }

        Ok(ComplexType {
            derivation,
            content: content.unwrap_or(ContentModel::Empty),
            attributes,
            mixed,
            is_abstract: self.bool_attr(node, "abstract")?.unwrap_or(false),
        })
    }

    /// Reads the extension or restriction of a simpleContent element
    fn simple_content(&self, node: Node) -> Result<(Derivation, Option<Facets>, AttributeSet)> {
        let (derivation, body) = self.derivation_header(node)?;
        let mut facets = Facets::default();
        let mut attributes = AttributeSet::default();

        for child in xs_children(body) {
            match xs_local(&child) {
                Some("attribute" | "attributeGroup" | "anyAttribute") => {
                    self.attribute_use(child, &mut attributes)?
                }
                Some(_)
                    if derivation.kind == DerivationKind::Restriction
                        && self.facet(child, &mut facets)? => {}
                _ => return Err(self.unexpected(child)),
            }
        }

        let facets = if facets.is_empty() { None } else { Some(facets) };
        Ok((derivation, facets, attributes))
    }

    fn complex_content(&self, node: Node) -> Result<(Derivation, Option<Particle>, AttributeSet)> {
        let (derivation, body) = self.derivation_header(node)?;
        let mut particle = None;
        let mut attributes = AttributeSet::default();

        for child in xs_children(body) {
            match xs_local(&child) {
                Some("sequence" | "choice" | "all" | "group") if particle.is_none() => {
                    particle = Some(self.particle(child)?)
                }
                Some("attribute" | "attributeGroup" | "anyAttribute") => {
                    self.attribute_use(child, &mut attributes)?
                }
                _ => return Err(self.unexpected(child)),
            }
        }

        Ok((derivation, particle, attributes))
    }

    fn derivation_header<'n, 'i>(&self, node: Node<'n, 'i>) -> Result<(Derivation, Node<'n, 'i>)> {
        let mut children = xs_children(node);
        let (body, kind) = match children.next() {
            Some(child) if xs_local(&child) == Some("extension") => {
                (child, DerivationKind::Extension)
            }
            Some(child) if xs_local(&child) == Some("restriction") => {
                (child, DerivationKind::Restriction)
            }
            Some(child) => return Err(self.unexpected(child)),
            None => return Err(self.invalid(node, "missing extension or restriction")),
        };

        if let Some(extra) = children.next() {
            return Err(self.unexpected(extra));
        }

        let base = self
            .attr_qname(body, "base")?
            .ok_or_else(|| self.invalid(body, "missing base"))?;

        Ok((Derivation { base, kind }, body))
    }

    fn particle(&self, node: Node) -> Result<Particle> {
        let occurs = self.occurs(node)?;

        let particle = match xs_local(&node) {
            Some("element") => {
                let element = match self.attr_qname(node, "ref")? {
                    Some(name) => ElementParticle::Ref(name),
                    None => ElementParticle::Local(self.element_decl(node, false)?),
                };
                Particle::Element { element, occurs }
            }
            Some("sequence") => Particle::Sequence {
                items: self.particles(node)?,
                occurs,
            },
            Some("choice") => Particle::Choice {
                items: self.particles(node)?,
                occurs,
            },
            Some("all") => {
                let items = self.particles(node)?;
                let single_elements = items.iter().all(|item| match item {
                    Particle::Element { occurs, .. } => occurs.max.map(|m| m <= 1).unwrap_or(false),
                    _ => false,
                });
                if !single_elements {
                    return Err(
                        self.invalid(node, "all may only contain elements that occur at most once")
                    );
                }
                Particle::All { items, occurs }
            }
            Some("group") => Particle::Group {
                name: self
                    .attr_qname(node, "ref")?
                    .ok_or_else(|| self.invalid(node, "missing ref"))?,
                occurs,
            },
            Some("any") => Particle::Any {
                namespaces: self.namespace_constraint(node)?,
                process: self.process_contents(node)?,
                occurs,
            },
            _ => return Err(self.unexpected(node)),
        };

        Ok(particle)
    }

    fn particles(&self, node: Node) -> Result<Vec<Particle>> {
        xs_children(node).map(|child| self.particle(child)).collect()
    }

    fn attribute_use(&self, node: Node, set: &mut AttributeSet) -> Result<()> {
        match xs_local(&node) {
            Some("attribute") => {
                let usage = match node.attribute("use") {
                    None | Some("optional") => AttributeUsage::Optional,
                    Some("required") => AttributeUsage::Required,
                    Some("prohibited") => AttributeUsage::Prohibited,
                    Some(other) => {
                        return Err(self.invalid(node, &format!("invalid use '{}'", other)))
                    }
                };
                let attribute_use = match self.attr_qname(node, "ref")? {
                    Some(name) => AttributeUse::Ref { name, usage },
                    None => AttributeUse::Local {
                        decl: self.attribute_decl(node, false)?,
                        usage,
                    },
                };
                set.uses.push(attribute_use);
            }
            Some("attributeGroup") => {
                let name = self
                    .attr_qname(node, "ref")?
                    .ok_or_else(|| self.invalid(node, "missing ref"))?;
                set.uses.push(AttributeUse::Group(name));
            }
            Some("anyAttribute") => set.any = Some(self.namespace_constraint(node)?),
            _ => return Err(self.unexpected(node)),
        }
        Ok(())
    }

    fn attribute_decl(&self, node: Node, global: bool) -> Result<AttributeDecl> {
        let local = self.required_attr(node, "name")?;
        let ns = if global || self.is_qualified(node, self.qualified_attributes) {
            self.target_ns.clone()
        } else {
            None
        };

        let mut type_def = self.attr_qname(node, "type")?.map(TypeDef::Named);
        for child in xs_children(node) {
            match xs_local(&child) {
                Some("simpleType") if type_def.is_none() => {
                    type_def = Some(TypeDef::Simple(Box::new(self.simple_type(child)?)))
                }
                _ => return Err(self.unexpected(child)),
            }
        }

        Ok(AttributeDecl {
            name: QName::new(ns, local),
            type_def: type_def.unwrap_or_else(|| TypeDef::Named(QName::xs("anySimpleType"))),
            fixed: node.attribute("fixed").map(|f| f.to_string()),
        })
    }

    fn simple_type(&self, node: Node) -> Result<SimpleType> {
        let mut children = xs_children(node);
        let body = children
            .next()
            .ok_or_else(|| self.invalid(node, "missing restriction, list or union"))?;
        if let Some(extra) = children.next() {
            return Err(self.unexpected(extra));
        }

        match xs_local(&body) {
            Some("restriction") => {
                let mut base = self.attr_qname(body, "base")?.map(TypeDef::Named);
                let mut facets = Facets::default();
                for child in xs_children(body) {
                    match xs_local(&child) {
                        Some("simpleType") if base.is_none() => {
                            base = Some(TypeDef::Simple(Box::new(self.simple_type(child)?)))
                        }
                        Some(_) if self.facet(child, &mut facets)? => {}
                        _ => return Err(self.unexpected(child)),
                    }
                }
                let base = base.ok_or_else(|| self.invalid(body, "missing base"))?;
                Ok(SimpleType::Restriction { base, facets })
            }
            Some("list") => {
                let mut item = self.attr_qname(body, "itemType")?.map(TypeDef::Named);
                for child in xs_children(body) {
                    match xs_local(&child) {
                        Some("simpleType") if item.is_none() => {
                            item = Some(TypeDef::Simple(Box::new(self.simple_type(child)?)))
                        }
                        _ => return Err(self.unexpected(child)),
                    }
                }
                let item = item.ok_or_else(|| self.invalid(body, "missing itemType"))?;
                Ok(SimpleType::List { item })
            }
            Some("union") => {
                let mut members = Vec::new();
                if let Some(names) = body.attribute("memberTypes") {
                    for name in names.split_whitespace() {
                        members.push(TypeDef::Named(self.resolve_qname(body, name)?));
                    }
                }
                for child in xs_children(body) {
                    match xs_local(&child) {
                        Some("simpleType") => {
                            members.push(TypeDef::Simple(Box::new(self.simple_type(child)?)))
                        }
                        _ => return Err(self.unexpected(child)),
                    }
                }
                if members.is_empty() {
                    return Err(self.invalid(body, "union has no member types"));
                }
                Ok(SimpleType::Union { members })
            }
            _ => Err(self.unexpected(body)),
        }
    }

    /// Adds the facet `node` to `facets`. Returns false if the node is not a facet.
    fn facet(&self, node: Node, facets: &mut Facets) -> Result<bool> {
        let name = match xs_local(&node) {
            Some(name) => name,
            None => return Ok(false),
        };

        let value = || self.required_attr(node, "value");
        let size = || -> Result<usize> {
            let value = value()?;
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| self.invalid(node, &format!("invalid {} '{}'", name, value)))
        };

        match name {
            "enumeration" => facets.enumeration.push(value()?.to_string()),
            "pattern" => {
                let pattern = value()?;
                let translated = translate_pattern(pattern)
                    .map_err(|message| self.invalid(node, &message))?;
                let regex = Regex::new(&format!("^(?:{})$", translated)).map_err(|e| {
                    self.invalid(node, &format!("invalid pattern '{}': {}", pattern, e))
                })?;
                facets.patterns.push(regex);
            }
            "length" => facets.length = Some(size()?),
            "minLength" => facets.min_length = Some(size()?),
            "maxLength" => facets.max_length = Some(size()?),
            "totalDigits" => facets.total_digits = Some(size()?),
            "fractionDigits" => facets.fraction_digits = Some(size()?),
            "minInclusive" => facets.min_inclusive = Some(value()?.trim().to_string()),
            "maxInclusive" => facets.max_inclusive = Some(value()?.trim().to_string()),
            "minExclusive" => facets.min_exclusive = Some(value()?.trim().to_string()),
            "maxExclusive" => facets.max_exclusive = Some(value()?.trim().to_string()),
            "whiteSpace" => {
                facets.white_space = Some(match value()? {
                    "preserve" => WhiteSpace::Preserve,
                    "replace" => WhiteSpace::Replace,
                    "collapse" => WhiteSpace::Collapse,
                    other => {
                        return Err(self.invalid(node, &format!("invalid whiteSpace '{}'", other)))
                    }
                })
            }
            _ => return Ok(false),
        }

        Ok(true)
    }

    fn occurs(&self, node: Node) -> Result<Occurs> {
        let min = match node.attribute("minOccurs") {
            Some(min) => min
                .trim()
                .parse::<u32>()
                .map_err(|_| self.invalid(node, &format!("invalid minOccurs '{}'", min)))?,
            None => 1,
        };
        let max = match node.attribute("maxOccurs").map(|max| max.trim()) {
            Some("unbounded") => None,
            Some(max) => Some(
                max.parse::<u32>()
                    .map_err(|_| self.invalid(node, &format!("invalid maxOccurs '{}'", max)))?,
            ),
            None => Some(1),
        };

        if max.map(|max| max < min).unwrap_or(false) {
            return Err(self.invalid(node, "maxOccurs is less than minOccurs"));
        }

        Ok(Occurs { min, max })
    }

    fn namespace_constraint(&self, node: Node) -> Result<NamespaceConstraint> {
        let constraint = match node.attribute("namespace").map(|ns| ns.trim()) {
            None | Some("##any") => NamespaceConstraint::Any,
            Some("##other") => NamespaceConstraint::Other(self.target_ns.clone()),
            Some(list) => NamespaceConstraint::List(
                list.split_whitespace()
                    .map(|ns| match ns {
                        "##targetNamespace" => self.target_ns.clone(),
                        "##local" => None,
                        ns => Some(ns.to_string()),
                    })
                    .collect(),
            ),
        };
        Ok(constraint)
    }

    fn process_contents(&self, node: Node) -> Result<ProcessContents> {
        match node.attribute("processContents") {
            None | Some("strict") => Ok(ProcessContents::Strict),
            Some("lax") => Ok(ProcessContents::Lax),
            Some("skip") => Ok(ProcessContents::Skip),
            Some(other) => Err(self.invalid(node, &format!("invalid processContents '{}'", other))),
        }
    }

    fn global_name(&self, node: Node) -> Result<QName> {
        let local = self.required_attr(node, "name")?;
        Ok(QName::new(self.target_ns.clone(), local))
    }

    fn is_qualified(&self, node: Node, default: bool) -> bool {
        match node.attribute("form") {
            Some(form) => form == "qualified",
            None => default,
        }
    }

    fn required_attr<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str> {
        node.attribute(name)
            .ok_or_else(|| self.invalid(node, &format!("missing {} attribute", name)))
    }

    fn bool_attr(&self, node: Node, name: &str) -> Result<Option<bool>> {
        match node.attribute(name).map(|v| v.trim()) {
            None => Ok(None),
            Some("true" | "1") => Ok(Some(true)),
            Some("false" | "0") => Ok(Some(false)),
            Some(other) => Err(self.invalid(node, &format!("invalid {} '{}'", name, other))),
        }
    }

    fn attr_qname(&self, node: Node, name: &str) -> Result<Option<QName>> {
        node.attribute(name)
            .map(|value| self.resolve_qname(node, value))
            .transpose()
    }

    /// Expands a prefixed name using the namespace declarations in scope at `node`
    fn resolve_qname(&self, node: Node, value: &str) -> Result<QName> {
        let value = value.trim();
        match value.split_once(':') {
            Some(("xml", local)) => Ok(QName::new(Some(XML_NS.to_string()), local)),
            Some((prefix, local)) => match node.lookup_namespace_uri(Some(prefix)) {
                Some(ns) => Ok(QName::new(Some(ns.to_string()), local)),
                None => Err(self.invalid(node, &format!("undeclared prefix in '{}'", value))),
            },
            None => {
                let ns = node
                    .lookup_namespace_uri(None)
                    .map(|ns| ns.to_string())
                    .or_else(|| {
                        if self.chameleon {
                            self.target_ns.clone()
                        } else {
                            None
                        }
                    });
                Ok(QName::new(ns, value))
            }
        }
    }

    fn invalid(&self, node: Node, message: &str) -> Error {
        Error::InvalidSchema {
            path: self.path.to_path_buf(),
            line: line(&node),
            message: format!("{}: {}", display_name(&node), message),
        }
    }

    fn unexpected(&self, node: Node) -> Error {
        match xs_local(&node) {
            Some(name) if UNSUPPORTED.contains(&name) => Error::UnsupportedConstruct {
                path: self.path.to_path_buf(),
                line: line(&node),
                name: name.to_string(),
            },
            _ => {
                let parent = node
                    .parent_element()
                    .map(|p| display_name(&p))
                    .unwrap_or_default();
                self.invalid(node, &format!("not allowed here in {}", parent))
            }
        }
    }
}

/// Checks that every reference in a schema resolves, and that no definition refers to itself
struct References<'s> {
    schema: &'s Schema,
}

impl<'s> References<'s> {
    fn check(&self) -> Result<()> {
        let schema = self.schema;

        for decl in schema.elements.values() {
            self.element_decl(decl)?;
        }
        for named in schema.types.values() {
            match named {
                NamedType::Simple(simple) => self.simple_type(simple)?,
                NamedType::Complex(complex) => self.complex_type(complex)?,
            }
        }
        for particle in schema.groups.values() {
            self.particle(particle)?;
        }
        for decl in schema.attributes.values() {
            self.simple_type_def(&decl.type_def)?;
        }
        for set in schema.attribute_groups.values() {
            self.attribute_set(set)?;
        }

        self.derivation_cycles()?;
        self.group_cycles()?;
        self.attribute_group_cycles()
    }

    fn element_decl(&self, decl: &ElementDecl) -> Result<()> {
        match &decl.type_def {
            TypeDef::Named(name) => self.type_name(name),
            TypeDef::Simple(simple) => self.simple_type(simple),
            TypeDef::Complex(complex) => self.complex_type(complex),
        }
    }

    fn complex_type(&self, complex: &ComplexType) -> Result<()> {
        if let Some(derivation) = &complex.derivation {
            self.type_name(&derivation.base)?;
            if matches!(complex.content, ContentModel::Elements(_))
                && matches!(
                    self.schema.resolve_type_name(&derivation.base),
                    Some(Resolved::Simple(_))
                )
            {
                return undefined("complex type", &derivation.base);
            }
        }
        if let ContentModel::Elements(particle) = &complex.content {
            self.particle(particle)?;
        }
        self.attribute_set(&complex.attributes)
    }

    fn simple_type(&self, simple: &SimpleType) -> Result<()> {
        match simple {
            SimpleType::Restriction { base, .. } => self.simple_type_def(base),
            SimpleType::List { item } => self.simple_type_def(item),
            SimpleType::Union { members } => members
                .iter()
                .try_for_each(|member| self.simple_type_def(member)),
        }
    }

    fn simple_type_def(&self, type_def: &TypeDef) -> Result<()> {
        match type_def {
            TypeDef::Named(name) => match self.schema.resolve_type_name(name) {
                Some(Resolved::Simple(_)) => Ok(()),
                _ => undefined("simple type", name),
            },
            TypeDef::Simple(simple) => self.simple_type(simple),
            TypeDef::Complex(_) => undefined("simple type", &QName::xs("anyType")),
        }
    }

    fn type_name(&self, name: &QName) -> Result<()> {
        match self.schema.resolve_type_name(name) {
            Some(_) => Ok(()),
            None => undefined("type", name),
        }
    }

    fn particle(&self, particle: &Particle) -> Result<()> {
        match particle {
            Particle::Element { element, .. } => match element {
                ElementParticle::Local(decl) => self.element_decl(decl),
                ElementParticle::Ref(name) => match self.schema.element(name) {
                    Some(_) => Ok(()),
                    None => undefined("element", name),
                },
            },
            Particle::Sequence { items, .. }
            | Particle::Choice { items, .. }
            | Particle::All { items, .. } => items.iter().try_for_each(|item| self.particle(item)),
            Particle::Any { .. } => Ok(()),
            Particle::Group { name, .. } => match self.schema.group(name) {
                Some(_) => Ok(()),
                None => undefined("group", name),
            },
        }
    }

    fn attribute_set(&self, set: &AttributeSet) -> Result<()> {
        for attribute_use in &set.uses {
            match attribute_use {
                AttributeUse::Local { decl, .. } => self.simple_type_def(&decl.type_def)?,
                AttributeUse::Ref { name, .. } => {
                    if self.schema.attribute(name).is_none() {
                        return undefined("attribute", name);
                    }
                }
                AttributeUse::Group(name) => {
                    if self.schema.attribute_group(name).is_none() {
                        return undefined("attribute group", name);
                    }
                }
            }
        }
        Ok(())
    }

    fn derivation_cycles(&self) -> Result<()> {
        for start in self.schema.types.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(start);
            while let Some(name) = current {
                if !seen.insert(name) {
                    return CircularDefinitionSnafu {
                        kind: "type",
                        name: start.to_string(),
                    }
                    .fail();
                }
                current = match self.schema.types.get(name) {
                    Some(NamedType::Complex(complex)) => {
                        complex.derivation.as_ref().map(|d| &d.base)
                    }
                    Some(NamedType::Simple(SimpleType::Restriction {
                        base: TypeDef::Named(base),
                        ..
                    }))
                    | Some(NamedType::Simple(SimpleType::List {
                        item: TypeDef::Named(base),
                    })) => Some(base),
                    _ => None,
                };
            }
        }
        Ok(())
    }

    fn group_cycles(&self) -> Result<()> {
        for (start, particle) in &self.schema.groups {
            let mut pending = Vec::new();
            group_refs(particle, &mut pending);
            let mut seen = HashSet::new();

            while let Some(name) = pending.pop() {
                if name == start {
                    return CircularDefinitionSnafu {
                        kind: "group",
                        name: start.to_string(),
                    }
                    .fail();
                }
                if seen.insert(name) {
                    if let Some(particle) = self.schema.groups.get(name) {
                        group_refs(particle, &mut pending);
                    }
                }
            }
        }
        Ok(())
    }

    fn attribute_group_cycles(&self) -> Result<()> {
        for (start, set) in &self.schema.attribute_groups {
            let mut pending: Vec<&QName> = attribute_group_refs(set).collect();
            let mut seen = HashSet::new();

            while let Some(name) = pending.pop() {
                if name == start {
                    return CircularDefinitionSnafu {
                        kind: "attribute group",
                        name: start.to_string(),
                    }
                    .fail();
                }
                if seen.insert(name) {
                    if let Some(set) = self.schema.attribute_groups.get(name) {
                        pending.extend(attribute_group_refs(set));
                    }
                }
            }
        }
        Ok(())
    }
}

fn group_refs<'s>(particle: &'s Particle, refs: &mut Vec<&'s QName>) {
    match particle {
        Particle::Group { name, .. } => refs.push(name),
        Particle::Sequence { items, .. }
        | Particle::Choice { items, .. }
        | Particle::All { items, .. } => items.iter().for_each(|item| group_refs(item, refs)),
        Particle::Element { .. } | Particle::Any { .. } => {}
    }
}

fn attribute_group_refs(set: &AttributeSet) -> impl Iterator<Item = &QName> {
    set.uses.iter().filter_map(|attribute_use| match attribute_use {
        AttributeUse::Group(name) => Some(name),
        _ => None,
    })
}

fn undefined<T>(kind: &str, name: &QName) -> Result<T> {
    UndefinedReferenceSnafu {
        kind,
        name: name.to_string(),
    }
    .fail()
}

fn insert<V>(map: &mut HashMap<QName, V>, name: QName, value: V, kind: &str) -> Result<()> {
    match map.entry(name) {
        Entry::Occupied(entry) => DuplicateDefinitionSnafu {
            kind,
            name: entry.key().to_string(),
        }
        .fail(),
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
    }
}

/// Translates an XML Schema regular expression into the regex crate's syntax. XML Schema
/// patterns are implicitly anchored, and `^` and `$` are ordinary characters outside of classes.
pub(crate) fn translate_pattern(pattern: &str) -> Result<String, String> {
    const NAME_START: &str = r"\p{L}_:";
    const NAME_CHAR: &str = r"\p{L}\p{N}\p{M}._:\-";

    let mut translated = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| format!("pattern '{}' ends with an escape", pattern))?;
                match (escaped, in_class) {
                    ('i', false) => translated.push_str(&format!("[{}]", NAME_START)),
                    ('i', true) => translated.push_str(NAME_START),
                    ('c', false) => translated.push_str(&format!("[{}]", NAME_CHAR)),
                    ('c', true) => translated.push_str(NAME_CHAR),
                    ('I', false) => translated.push_str(&format!("[^{}]", NAME_START)),
                    ('C', false) => translated.push_str(&format!("[^{}]", NAME_CHAR)),
                    ('I' | 'C', true) => {
                        return Err(format!(
                            "pattern '{}' uses \\{} inside a character class",
                            pattern, escaped
                        ))
                    }
                    (escaped, _) => {
                        translated.push('\\');
                        translated.push(escaped);
                    }
                }
            }
            '[' if in_class => translated.push_str(r"\["),
            '[' => {
                in_class = true;
                translated.push('[');
                if chars.peek() == Some(&'^') {
                    chars.next();
                    translated.push('^');
                }
            }
            ']' if in_class => {
                in_class = false;
                translated.push(']');
            }
            '-' if in_class && chars.peek() == Some(&'[') => {
                return Err(format!(
                    "pattern '{}' uses character class subtraction",
                    pattern
                ));
            }
            '.' if !in_class => translated.push_str(r"[^\r\n]"),
            '^' | '$' if !in_class => {
                translated.push('\\');
                translated.push(c);
            }
            '&' | '~' if in_class => {
                translated.push('\\');
                translated.push(c);
            }
            c => translated.push(c),
        }
    }

    Ok(translated)
}

/// Element children of a schema component, without annotations
fn xs_children<'a, 'i: 'a>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children()
        .filter(|child| child.is_element() && !child.has_tag_name((XS_NS, "annotation")))
}

/// The local name of a schema component, or None for elements outside the XML Schema namespace
fn xs_local<'a>(node: &Node<'a, '_>) -> Option<&'a str> {
    if node.tag_name().namespace() == Some(XS_NS) {
        Some(node.tag_name().name())
    } else {
        None
    }
}

fn display_name(node: &Node) -> String {
    match xs_local(node) {
        Some(local) => format!("xs:{}", local),
        None => node.tag_name().name().to_string(),
    }
}

pub(crate) fn line(node: &Node) -> u32 {
    node.document().text_pos_at(node.range().start).row
}
