use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use log::{debug, info, warn};
use roxmltree::{Document, Node};
use snafu::ResultExt;

use crate::xsd::builtin::{normalize, Builtin, WhiteSpace};
use crate::xsd::compile::{line, Schema};
use crate::xsd::error::*;
use crate::xsd::model::*;

/// A way in which an instance document does not conform to a schema
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Violation {
    path: String,
    line: u32,
    message: String,
}

/// The outcome of validating a document. The document is valid if there are no violations.
#[derive(Debug, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl Violation {
    /// Path to the offending element or attribute, eg `/paket/inhaltsverzeichnis/ordner[2]`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (line {}): {}", self.path, self.line, self.message)
    }
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

/// Compiles the schema at `schema` and validates the document at `document` against it
pub fn validate_file<D: AsRef<Path>, S: AsRef<Path>>(
    document: D,
    schema: S,
) -> Result<ValidationReport> {
    let schema = Schema::from_file(schema)?;
    let document = document.as_ref();

    info!("Validating {}", document.display());
    let xml = fs::read_to_string(document).context(IoReadSnafu { path: document })?;

    schema.validate(&xml)
}

impl Schema {
    /// Validates an instance document. An error is only returned if the document is not
    /// well-formed; schema violations are collected in the report.
    pub fn validate(&self, xml: &str) -> Result<ValidationReport> {
        let doc = Document::parse(xml).context(ParseDocumentSnafu)?;

        let mut validator = Validator {
            schema: self,
            report: ValidationReport::default(),
        };
        validator.root(doc.root_element());

        debug!(
            "Validation finished with {} violations",
            validator.report.violations.len()
        );

        Ok(validator.report)
    }
}

struct Validator<'s> {
    schema: &'s Schema,
    report: ValidationReport,
}

/// The content allowed in an element of a complex type, with derivations applied
enum Content<'s> {
    Simple(SimpleRef<'s>, Vec<&'s Facets>),
    /// Particles that are matched in sequence
    Elements(Vec<&'s Particle>),
}

/// The primitive a simple type is ultimately restricted from
#[derive(Copy, Clone)]
enum Base<'s> {
    Atomic(Builtin),
    List(&'s TypeDef),
    Union(&'s [TypeDef]),
}

impl<'s> Validator<'s> {
    fn root(&mut self, node: Node) {
        let path = format!("/{}", node.tag_name().name());
        match self
            .schema
            .global_element(node.tag_name().namespace(), node.tag_name().name())
        {
            Some(decl) => self.element(node, decl, &path),
            None => self.violation(
                &node,
                &path,
                format!(
                    "No declaration for root element '{}'",
                    expanded_name(&node)
                ),
            ),
        }
    }

    fn element(&mut self, node: Node, decl: &'s ElementDecl, path: &str) {
        if decl.is_abstract {
            self.violation(
                &node,
                path,
                format!("Element '{}' is abstract", decl.name.local),
            );
            return;
        }

        let resolved = match self.instance_type(node, decl, path) {
            Some(resolved) => resolved,
            None => self
                .schema
                .resolve_type(&decl.type_def)
                .unwrap_or(Resolved::AnyType),
        };

        if matches!(resolved, Resolved::Complex(complex) if complex.is_abstract) {
            self.violation(
                &node,
                path,
                "Element has an abstract type and needs an xsi:type naming a derived type"
                    .to_string(),
            );
            return;
        }

        if let Some(nil) = node.attribute((XSI_NS, "nil")) {
            if matches!(nil.trim(), "true" | "1") {
                if !decl.nillable {
                    self.violation(&node, path, "Element is not nillable".to_string());
                } else if has_element_children(node) || has_text(node) {
                    self.violation(
                        &node,
                        path,
                        "Element is nil but has content".to_string(),
                    );
                }
                if let Resolved::Complex(complex) = resolved {
                    self.attributes(node, complex, path);
                }
                return;
            }
        }

        match resolved {
            Resolved::AnyType => {}
            Resolved::Simple(simple) => {
                self.no_attributes(node, path);
                self.simple_content(node, path, simple, &[], decl);
            }
            Resolved::Complex(complex) => {
                self.attributes(node, complex, path);
                match self.content(complex) {
                    Content::Simple(simple, facets) => {
                        self.simple_content(node, path, simple, &facets, decl)
                    }
                    Content::Elements(particles) => {
                        if !complex.mixed && has_text(node) {
                            self.violation(
                                &node,
                                path,
                                "Element must not contain text".to_string(),
                            );
                        }
                        self.children(node, &particles, path);
                    }
                }
            }
        }
    }

    /// The type an element selects with xsi:type, if any. The type must be derived from the
    /// declared type.
    fn instance_type(
        &mut self,
        node: Node,
        decl: &'s ElementDecl,
        path: &str,
    ) -> Option<Resolved<'s>> {
        let value = node.attribute((XSI_NS, "type"))?.trim();

        let name = match value.split_once(':') {
            Some((prefix, local)) => {
                QName::new(node.lookup_namespace_uri(Some(prefix)).map(String::from), local)
            }
            None => QName::new(node.lookup_namespace_uri(None).map(String::from), value),
        };

        let resolved = self.schema.resolve_type_name(&name);
        if resolved.is_none() {
            self.violation(&node, path, format!("Unknown xsi:type '{}'", value));
            return None;
        }

        let derived = match &decl.type_def {
            TypeDef::Named(declared) => self.schema.derives_from(&name, declared),
            TypeDef::Simple(_) | TypeDef::Complex(_) => false,
        };
        if !derived {
            self.violation(
                &node,
                path,
                format!(
                    "xsi:type '{}' is not derived from the declared type of element '{}'",
                    value, decl.name.local
                ),
            );
        }
        resolved
    }

    fn simple_content(
        &mut self,
        node: Node,
        path: &str,
        simple: SimpleRef<'s>,
        facets: &[&'s Facets],
        decl: &ElementDecl,
    ) {
        if let Some(child) = node.children().find(|c| c.is_element()) {
            self.violation(
                &child,
                path,
                format!(
                    "Element '{}' is not allowed in an element with simple content",
                    child.tag_name().name()
                ),
            );
            return;
        }

        let fixed = decl.fixed.as_deref();
        let text = text_content(node);
        let value = match fixed.or(decl.default.as_deref()) {
            Some(implied) if text.is_empty() => implied.to_string(),
            _ => text,
        };
        self.value(&node, path, simple, facets, &value, fixed);
    }

    fn value(
        &mut self,
        node: &Node,
        path: &str,
        simple: SimpleRef<'s>,
        facets: &[&'s Facets],
        value: &str,
        fixed: Option<&str>,
    ) {
        if let Err(message) = self.check_value(simple, facets, value) {
            self.violation(node, path, message);
            return;
        }

        if let Some(fixed) = fixed {
            if normalize(value, WhiteSpace::Collapse) != normalize(fixed, WhiteSpace::Collapse) {
                self.violation(
                    node,
                    path,
                    format!("Value '{}' does not equal the fixed value '{}'", value, fixed),
                );
            }
        }
    }

    fn content(&self, complex: &'s ComplexType) -> Content<'s> {
        let base = complex
            .derivation
            .as_ref()
            .and_then(|d| self.schema.resolve_type_name(&d.base).map(|r| (d.kind, r)));

        match &complex.content {
            ContentModel::Simple(facets) => {
                let mut steps: Vec<&Facets> = facets.iter().collect();
                let mut base = base.map(|(_, resolved)| resolved);
                loop {
                    match base {
                        Some(Resolved::Simple(simple)) => return Content::Simple(simple, steps),
                        Some(Resolved::Complex(base_complex)) => match &base_complex.content {
                            ContentModel::Simple(facets) => {
                                steps.extend(facets.iter());
                                base = base_complex
                                    .derivation
                                    .as_ref()
                                    .and_then(|d| self.schema.resolve_type_name(&d.base));
                            }
                            _ => break,
                        },
                        _ => break,
                    }
                }
                Content::Simple(SimpleRef::Builtin(Builtin::AnySimpleType), steps)
            }
            own => {
                let mut particles = match base {
                    Some((DerivationKind::Extension, Resolved::Complex(base_complex))) => {
                        match self.content(base_complex) {
                            Content::Elements(particles) => particles,
                            Content::Simple(..) => Vec::new(),
                        }
                    }
                    _ => Vec::new(),
                };
                if let ContentModel::Elements(particle) = own {
                    particles.push(particle);
                }
                Content::Elements(particles)
            }
        }
    }

    fn attributes(&mut self, node: Node, complex: &'s ComplexType, path: &str) {
        let (uses, any) = self.attribute_uses(complex);

        for attribute in node.attributes() {
            let ns = attribute.namespace();
            if ns == Some(XSI_NS) {
                continue;
            }

            let attribute_path = format!("{}/@{}", path, attribute.name());
            match uses
                .iter()
                .find(|(decl, _)| decl.name.matches(ns, attribute.name()))
            {
                Some((decl, _)) => {
                    let simple = self
                        .schema
                        .resolve_simple(&decl.type_def)
                        .unwrap_or(SimpleRef::Builtin(Builtin::AnySimpleType));
                    self.value(
                        &node,
                        &attribute_path,
                        simple,
                        &[],
                        attribute.value(),
                        decl.fixed.as_deref(),
                    );
                }
                None if any.map(|any| any.allows(ns)).unwrap_or(false) => {}
                None => self.violation(
                    &node,
                    &attribute_path,
                    format!("Attribute '{}' is not allowed", attribute.name()),
                ),
            }
        }

        for (decl, usage) in &uses {
            if *usage == AttributeUsage::Required
                && !node
                    .attributes()
                    .any(|a| decl.name.matches(a.namespace(), a.name()))
            {
                self.violation(
                    &node,
                    path,
                    format!("Missing required attribute '{}'", decl.name.local),
                );
            }
        }
    }

    fn no_attributes(&mut self, node: Node, path: &str) {
        for attribute in node.attributes() {
            if attribute.namespace() != Some(XSI_NS) {
                self.violation(
                    &node,
                    &format!("{}/@{}", path, attribute.name()),
                    format!("Attribute '{}' is not allowed", attribute.name()),
                );
            }
        }
    }

    /// The attribute uses of a complex type, including inherited ones, and its wildcard
    #[allow(clippy::type_complexity)]
    fn attribute_uses(
        &self,
        complex: &'s ComplexType,
    ) -> (
        Vec<(&'s AttributeDecl, AttributeUsage)>,
        Option<&'s NamespaceConstraint>,
    ) {
        let (mut uses, base_any) = match complex
            .derivation
            .as_ref()
            .map(|d| (d.kind, self.schema.resolve_type_name(&d.base)))
        {
            Some((kind, Some(Resolved::Complex(base)))) => {
                let (uses, any) = self.attribute_uses(base);
                (uses, any.filter(|_| kind == DerivationKind::Extension))
            }
            _ => (Vec::new(), None),
        };

        let mut own = Vec::new();
        let mut own_any = None;
        self.expand_attributes(&complex.attributes, &mut own, &mut own_any);

        for (decl, usage) in own {
            uses.retain(|(existing, _)| existing.name != decl.name);
            if usage != AttributeUsage::Prohibited {
                uses.push((decl, usage));
            }
        }

        (uses, own_any.or(base_any))
    }

    fn expand_attributes(
        &self,
        set: &'s AttributeSet,
        uses: &mut Vec<(&'s AttributeDecl, AttributeUsage)>,
        any: &mut Option<&'s NamespaceConstraint>,
    ) {
        for attribute_use in &set.uses {
            match attribute_use {
                AttributeUse::Local { decl, usage } => uses.push((decl, *usage)),
                AttributeUse::Ref { name, usage } => {
                    if let Some(decl) = self.schema.attribute(name) {
                        uses.push((decl, *usage));
                    }
                }
                AttributeUse::Group(name) => {
                    if let Some(group) = self.schema.attribute_group(name) {
                        self.expand_attributes(group, uses, any);
                    }
                }
            }
        }
        if any.is_none() {
            *any = set.any.as_ref();
        }
    }

    fn children(&mut self, node: Node, particles: &[&'s Particle], path: &str) {
        let children: Vec<Node> = node.children().filter(|c| c.is_element()).collect();
        let names: Vec<(Option<&str>, &str)> = children
            .iter()
            .map(|c| (c.tag_name().namespace(), c.tag_name().name()))
            .collect();

        let mut matcher = Matcher {
            schema: self.schema,
            names: &names,
            furthest: 0,
            expected: BTreeSet::new(),
        };

        let mut states = vec![State {
            pos: 0,
            trail: None,
        }];
        for particle in particles {
            states = matcher.repeat(particle, states);
        }

        let complete = states.into_iter().find(|s| s.pos == names.len());

        let state = match complete {
            Some(state) => state,
            None => {
                let expected = matcher.expected.iter().cloned().collect::<Vec<String>>();
                match children.get(matcher.furthest) {
                    Some(child) if expected.is_empty() => self.violation(
                        child,
                        path,
                        format!("Element '{}' is not allowed here", child.tag_name().name()),
                    ),
                    Some(child) => self.violation(
                        child,
                        path,
                        format!(
                            "Element '{}' is not allowed here; expected {}",
                            child.tag_name().name(),
                            expected.join(", ")
                        ),
                    ),
                    None => self.violation(
                        &node,
                        path,
                        format!("Element is incomplete; expected {}", expected.join(", ")),
                    ),
                }
                return;
            }
        };

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (_, local) in &names {
            *counts.entry(*local).or_default() += 1;
        }
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (child, binding) in children.iter().zip(bindings(&state.trail)) {
            let local = child.tag_name().name();
            let index = seen.entry(local).or_default();
            *index += 1;

            let child_path = if counts.get(local).copied().unwrap_or(0) > 1 {
                format!("{}/{}[{}]", path, local, index)
            } else {
                format!("{}/{}", path, local)
            };

            match binding {
                Binding::Element(decl) => self.element(*child, decl, &child_path),
                Binding::Wildcard(ProcessContents::Skip) => {}
                Binding::Wildcard(process) => {
                    match self
                        .schema
                        .global_element(child.tag_name().namespace(), local)
                    {
                        Some(decl) => self.element(*child, decl, &child_path),
                        None if process == ProcessContents::Strict => self.violation(
                            child,
                            &child_path,
                            format!("No declaration for element '{}'", expanded_name(child)),
                        ),
                        None => {}
                    }
                }
            }
        }
    }

    /// Checks a value against a simple type, with additional facets applied first
    fn check_value(
        &self,
        simple: SimpleRef<'s>,
        extra: &[&'s Facets],
        raw: &str,
    ) -> Result<(), String> {
        let mut steps: Vec<&Facets> = extra.to_vec();
        let mut current = simple;

        let base = loop {
            match current {
                SimpleRef::Builtin(builtin) => break Base::Atomic(builtin),
                SimpleRef::Defined(SimpleType::Restriction { base, facets }) => {
                    steps.push(facets);
                    current = self
                        .schema
                        .resolve_simple(base)
                        .unwrap_or(SimpleRef::Builtin(Builtin::AnySimpleType));
                }
                SimpleRef::Defined(SimpleType::List { item }) => break Base::List(item),
                SimpleRef::Defined(SimpleType::Union { members }) => break Base::Union(members),
            }
        };

        let white_space = steps
            .iter()
            .find_map(|f| f.white_space)
            .unwrap_or(match base {
                Base::Atomic(builtin) => builtin.white_space(),
                Base::List(_) | Base::Union(_) => WhiteSpace::Collapse,
            });
        let value = normalize(raw, white_space);

        match base {
            Base::Atomic(builtin) => builtin.check(&value)?,
            Base::List(item) => {
                let item = self
                    .schema
                    .resolve_simple(item)
                    .unwrap_or(SimpleRef::Builtin(Builtin::AnySimpleType));
                for token in value.split_whitespace() {
                    self.check_value(item, &[], token)?;
                }
            }
            Base::Union(members) => {
                let matched = members.iter().any(|member| {
                    self.schema
                        .resolve_simple(member)
                        .map(|member| self.check_value(member, &[], raw).is_ok())
                        .unwrap_or(false)
                });
                if !matched {
                    return Err(format!(
                        "'{}' is not valid for any member type of the union",
                        value
                    ));
                }
            }
        }

        for facets in steps {
            check_facets(facets, base, &value, white_space)?;
        }

        Ok(())
    }

    fn violation(&mut self, node: &Node, path: &str, message: String) {
        let violation = Violation {
            path: path.to_string(),
            line: line(node),
            message,
        };
        warn!("{}", violation);
        self.report.violations.push(violation);
    }
}

fn check_facets(
    facets: &Facets,
    base: Base,
    value: &str,
    white_space: WhiteSpace,
) -> Result<(), String> {
    let builtin = match base {
        Base::Atomic(builtin) => Some(builtin),
        Base::List(_) | Base::Union(_) => None,
    };

    if !facets.enumeration.is_empty() {
        let allowed = facets.enumeration.iter().any(|allowed| {
            let allowed = normalize(allowed, white_space);
            match builtin {
                Some(builtin) if builtin.is_numeric() => {
                    builtin.compare(&allowed, value) == Some(Ordering::Equal)
                }
                _ => allowed == value,
            }
        });
        if !allowed {
            return Err(format!(
                "'{}' is not one of the allowed values: {}",
                value,
                facets.enumeration.join(", ")
            ));
        }
    }

    if !facets.patterns.is_empty() && !facets.patterns.iter().any(|p| p.is_match(value)) {
        return Err(format!("'{}' does not match the required pattern", value));
    }

    let length = match base {
        Base::Atomic(builtin) => builtin.value_length(value),
        Base::List(_) => value.split_whitespace().count(),
        Base::Union(_) => value.chars().count(),
    };
    if let Some(expected) = facets.length {
        if length != expected {
            return Err(format!("'{}' must have a length of {}", value, expected));
        }
    }
    if let Some(min) = facets.min_length {
        if length < min {
            return Err(format!("'{}' must have a length of at least {}", value, min));
        }
    }
    if let Some(max) = facets.max_length {
        if length > max {
            return Err(format!("'{}' must have a length of at most {}", value, max));
        }
    }

    if let Some(builtin) = builtin {
        let bounds = [
            (&facets.min_inclusive, "at least", &[Ordering::Greater, Ordering::Equal][..]),
            (&facets.max_inclusive, "at most", &[Ordering::Less, Ordering::Equal][..]),
            (&facets.min_exclusive, "greater than", &[Ordering::Greater][..]),
            (&facets.max_exclusive, "less than", &[Ordering::Less][..]),
        ];
        for (bound, description, allowed) in bounds {
            if let Some(bound) = bound {
                if let Some(ordering) = builtin.compare(value, bound) {
                    if !allowed.contains(&ordering) {
                        return Err(format!("'{}' must be {} {}", value, description, bound));
                    }
                }
            }
        }

        if builtin.is_numeric() && !matches!(builtin, Builtin::Float | Builtin::Double) {
            let (total, fraction) = count_digits(value);
            if let Some(max) = facets.total_digits {
                if total > max {
                    return Err(format!("'{}' has more than {} digits", value, max));
                }
            }
            if let Some(max) = facets.fraction_digits {
                if fraction > max {
                    return Err(format!(
                        "'{}' has more than {} fraction digits",
                        value, max
                    ));
                }
            }
        }
    }

    Ok(())
}

/// Counts the significant total and fraction digits of a decimal
fn count_digits(value: &str) -> (usize, usize) {
    let unsigned = value.trim_start_matches(['+', '-']);
    let (int, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int = int.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');
    ((int.len() + fraction.len()).max(1), fraction.len())
}

#[derive(Debug, Copy, Clone)]
enum Binding<'s> {
    Element(&'s ElementDecl),
    Wildcard(ProcessContents),
}

/// Bindings of the children matched so far, most recent first
type Trail<'s> = Option<Rc<Step<'s>>>;

#[derive(Debug)]
struct Step<'s> {
    binding: Binding<'s>,
    prev: Trail<'s>,
}

/// A possible position in the list of children, with how the children before it were matched
#[derive(Debug, Clone)]
struct State<'s> {
    pos: usize,
    trail: Trail<'s>,
}

impl<'s> State<'s> {
    fn advance(&self, binding: Binding<'s>) -> Self {
        Self {
            pos: self.pos + 1,
            trail: Some(Rc::new(Step {
                binding,
                prev: self.trail.clone(),
            })),
        }
    }
}

/// Matches a list of child element names against a content model, following every
/// alternative at once
struct Matcher<'s, 'n> {
    schema: &'s Schema,
    names: &'n [(Option<&'n str>, &'n str)],
    /// The furthest position any alternative reached
    furthest: usize,
    /// Element names that would have been accepted at the furthest position
    expected: BTreeSet<String>,
}

impl<'s, 'n> Matcher<'s, 'n> {
    /// Matches a particle, respecting its occurrence bounds
    fn repeat(&mut self, particle: &'s Particle, states: Vec<State<'s>>) -> Vec<State<'s>> {
        let occurs = particle.occurs();
        let mut results = Vec::new();
        let mut emitted = HashSet::new();
        let mut current = states;
        let mut count = 0;

        loop {
            if count >= occurs.min {
                for state in &current {
                    if emitted.insert(state.pos) {
                        results.push(state.clone());
                    }
                }
            }

            if current.is_empty() || occurs.max.map(|max| count >= max).unwrap_or(false) {
                break;
            }

            let mut next = self.term(particle, &current);
            count += 1;
            // past the minimum, only new positions can lead anywhere new
            if count > occurs.min {
                next.retain(|state| !emitted.contains(&state.pos));
            }
            current = dedupe(next);
        }

        results
    }

    /// Matches a particle once
    fn term(&mut self, particle: &'s Particle, states: &[State<'s>]) -> Vec<State<'s>> {
        match particle {
            Particle::Element { element, .. } => match self.resolve(element) {
                Some(decl) => {
                    let mut matched = Vec::new();
                    for state in states {
                        if let Some(next) = self.element(decl, state) {
                            matched.push(next);
                        }
                    }
                    matched
                }
                None => Vec::new(),
            },
            Particle::Any { namespaces, process, .. } => {
                let mut matched = Vec::new();
                for state in states {
                    if let Some((ns, _)) = self.names.get(state.pos) {
                        if namespaces.allows(*ns) {
                            matched.push(self.reach(state.advance(Binding::Wildcard(*process))));
                        }
                    }
                }
                matched
            }
            Particle::Sequence { items, .. } => {
                let mut current = states.to_vec();
                for item in items {
                    current = self.repeat(item, current);
                    if current.is_empty() {
                        break;
                    }
                }
                current
            }
            Particle::Choice { items, .. } => {
                let mut matched = Vec::new();
                for item in items {
                    matched.extend(self.repeat(item, states.to_vec()));
                }
                dedupe(matched)
            }
            Particle::All { items, .. } => {
                let mut matched = Vec::new();
                for state in states {
                    if let Some(next) = self.all(items, state.clone()) {
                        matched.push(next);
                    }
                }
                matched
            }
            Particle::Group { name, .. } => match self.schema.group(name) {
                Some(definition) => self.repeat(definition, states.to_vec()),
                None => Vec::new(),
            },
        }
    }

    /// Matches the members of an all group in any order
    fn all(&mut self, items: &'s [Particle], mut state: State<'s>) -> Option<State<'s>> {
        let mut used = vec![false; items.len()];

        loop {
            let mut matched = false;
            for (i, item) in items.iter().enumerate() {
                if used[i] {
                    continue;
                }
                if let Particle::Element { element, .. } = item {
                    if let Some(decl) = self.resolve(element) {
                        if let Some(next) = self.element(decl, &state) {
                            used[i] = true;
                            state = next;
                            matched = true;
                            break;
                        }
                    }
                }
            }
            if !matched {
                break;
            }
        }

        let complete = items
            .iter()
            .zip(&used)
            .all(|(item, used)| *used || item.occurs().min == 0);

        if complete {
            Some(state)
        } else {
            for (item, _) in items.iter().zip(&used).filter(|(_, used)| !**used) {
                if let Particle::Element { element, .. } = item {
                    if let Some(decl) = self.resolve(element) {
                        self.expect(state.pos, decl.name.local.clone());
                    }
                }
            }
            None
        }
    }

    fn element(&mut self, decl: &'s ElementDecl, state: &State<'s>) -> Option<State<'s>> {
        self.expect(state.pos, decl.name.local.clone());
        match self.names.get(state.pos) {
            Some((ns, local)) if decl.name.matches(*ns, local) => {
                Some(self.reach(state.advance(Binding::Element(decl))))
            }
            _ => None,
        }
    }

    fn resolve(&self, element: &'s ElementParticle) -> Option<&'s ElementDecl> {
        match element {
            ElementParticle::Local(decl) => Some(decl),
            ElementParticle::Ref(name) => self.schema.element(name),
        }
    }

    fn reach(&mut self, state: State<'s>) -> State<'s> {
        if state.pos > self.furthest {
            self.furthest = state.pos;
            self.expected.clear();
        }
        state
    }

    fn expect(&mut self, pos: usize, name: String) {
        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }
        if pos == self.furthest {
            self.expected.insert(name);
        }
    }
}

/// Keeps the first state for each position
fn dedupe(states: Vec<State>) -> Vec<State> {
    let mut seen = HashSet::new();
    states
        .into_iter()
        .filter(|state| seen.insert(state.pos))
        .collect()
}

fn bindings<'s>(trail: &Trail<'s>) -> Vec<Binding<'s>> {
    let mut bindings = Vec::new();
    let mut current = trail.as_ref();
    while let Some(step) = current {
        bindings.push(step.binding);
        current = step.prev.as_ref();
    }
    bindings.reverse();
    bindings
}

fn text_content(node: Node) -> String {
    node.children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect()
}

fn has_text(node: Node) -> bool {
    node.children()
        .filter(|c| c.is_text())
        .any(|c| !c.text().unwrap_or("").trim().is_empty())
}

fn has_element_children(node: Node) -> bool {
    node.children().any(|c| c.is_element())
}

fn expanded_name(node: &Node) -> String {
    QName::new(
        node.tag_name().namespace().map(String::from),
        node.tag_name().name(),
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use crate::xsd::compile::Schema;
    use crate::xsd::error::Error;

    const SCHEMA: &str = r###"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns="urn:test" targetNamespace="urn:test" elementFormDefault="qualified">
  <xs:element name="package" type="Package"/>
  <xs:complexType name="Package">
    <xs:sequence>
      <xs:element name="type" type="PackageType"/>
      <xs:element name="inventory" type="Folder"/>
      <xs:choice minOccurs="0">
        <xs:element name="note" type="xs:string"/>
        <xs:element name="notes" type="Notes"/>
      </xs:choice>
      <xs:any namespace="##other" processContents="skip" minOccurs="0" maxOccurs="unbounded"/>
    </xs:sequence>
    <xs:attribute name="version" type="Version" use="required"/>
  </xs:complexType>
  <xs:simpleType name="PackageType">
    <xs:restriction base="xs:token">
      <xs:enumeration value="SIP"/>
      <xs:enumeration value="AIP"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Version">
    <xs:restriction base="xs:decimal">
      <xs:minInclusive value="1"/>
      <xs:maxExclusive value="10"/>
      <xs:fractionDigits value="1"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="Folder">
    <xs:sequence>
      <xs:element name="name" type="xs:string" minOccurs="0"/>
      <xs:element name="folder" type="Folder" minOccurs="0" maxOccurs="unbounded"/>
      <xs:element name="file" type="File" minOccurs="0" maxOccurs="unbounded"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="File">
    <xs:all>
      <xs:element name="name" type="xs:string"/>
      <xs:element name="checksum" type="Checksum"/>
      <xs:element name="size" type="xs:nonNegativeInteger" minOccurs="0" nillable="true"/>
    </xs:all>
    <xs:attribute name="id" type="xs:ID" use="required"/>
  </xs:complexType>
  <xs:complexType name="Checksum">
    <xs:simpleContent>
      <xs:extension base="Md5">
        <xs:attribute name="algorithm" type="xs:string" fixed="MD5"/>
      </xs:extension>
    </xs:simpleContent>
  </xs:complexType>
  <xs:simpleType name="Md5">
    <xs:restriction base="xs:string">
      <xs:pattern value="[0-9a-fA-F]{32}"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="Notes">
    <xs:complexContent>
      <xs:extension base="NoteList">
        <xs:sequence>
          <xs:element name="signature" type="xs:string"/>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:complexType name="NoteList">
    <xs:sequence>
      <xs:element name="note" type="Tags" maxOccurs="3"/>
    </xs:sequence>
  </xs:complexType>
  <xs:simpleType name="Tags">
    <xs:list itemType="Tag"/>
  </xs:simpleType>
  <xs:simpleType name="Tag">
    <xs:union memberTypes="xs:int xs:date"/>
  </xs:simpleType>
</xs:schema>"###;

    fn document(version: &str, type_: &str, inventory: &str, extra: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="urn:test" xmlns:o="urn:other" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" version="{version}">
  <type>{type_}</type>
  <inventory>{inventory}</inventory>{extra}
</package>"#
        )
    }

    const INVENTORY: &str = r#"
    <folder>
      <name>content</name>
      <file id="f1">
        <checksum algorithm="MD5">5eb63bbbe01eeed093cb22bb8f5acdc3</checksum>
        <name>a.txt</name>
      </file>
      <file id="f2">
        <name>b.txt</name>
        <size xsi:nil="true"/>
        <checksum>900150983cd24fb0d6963f7d28e17f72</checksum>
      </file>
    </folder>"#;

    fn messages(xml: &str) -> Vec<String> {
        messages_for(SCHEMA, xml)
    }

    fn messages_for(schema: &str, xml: &str) -> Vec<String> {
        let schema = Schema::parse(schema).unwrap();
        schema
            .validate(xml)
            .unwrap()
            .violations()
            .iter()
            .map(|v| v.to_string())
            .collect()
    }

    #[test]
    fn valid_document() {
        let xml = document(
            "4.0",
            " SIP ",
            INVENTORY,
            r#"
  <notes><note>1 2024-01-31</note><note>-7</note><signature>x</signature></notes>
  <o:extension><anything/></o:extension>"#,
        );
        assert_eq!(Vec::<String>::new(), messages(&xml));
    }

    #[test]
    fn missing_required_element() {
        let xml = r#"<package xmlns="urn:test" version="4"><inventory/></package>"#;
        assert_eq!(
            vec!["/package (line 1): Element 'inventory' is not allowed here; expected type"],
            messages(xml)
        );

        let xml = document(
            "4",
            "SIP",
            r#"<file id="f1"><name>a</name></file>"#,
            "",
        );
        assert_eq!(
            vec!["/package/inventory/file (line 4): Element is incomplete; expected checksum, size"],
            messages(&xml)
        );
    }

    #[test]
    fn unexpected_elements() {
        let xml = document("4", "SIP", "<bogus/>", "");
        assert_eq!(
            vec![
                "/package/inventory (line 4): Element 'bogus' is not allowed here; expected file, folder, name"
            ],
            messages(&xml)
        );

        // wildcards only accept other namespaces
        let xml = document("4", "SIP", "", "<extension/>");
        assert_eq!(1, messages(&xml).len());

        let xml = document("4", "SIP", "", "<note>a</note><note>b</note>");
        assert_eq!(
            vec!["/package (line 4): Element 'note' is not allowed here"],
            messages(&xml)
        );
    }

    #[test]
    fn simple_value_violations() {
        let xml = document("10", "DIP", "", "");
        assert_eq!(
            vec![
                "/package/@version (line 2): '10' must be less than 10",
                "/package/type (line 3): 'DIP' is not one of the allowed values: SIP, AIP",
            ],
            messages(&xml)
        );

        let xml = document("1.25", "SIP", "", "");
        assert_eq!(
            vec!["/package/@version (line 2): '1.25' has more than 1 fraction digits"],
            messages(&xml)
        );

        let xml = document(
            "4",
            "SIP",
            r#"<file id="f1"><name>a</name><checksum>abc</checksum><size>-1</size></file>"#,
            "<notes><note>x</note><signature/></notes>",
        );
        assert_eq!(
            vec![
                "/package/inventory/file/checksum (line 4): 'abc' does not match the required pattern",
                "/package/inventory/file/size (line 4): -1 is out of range for nonNegativeInteger",
                "/package/notes/note (line 4): 'x' is not valid for any member type of the union",
            ],
            messages(&xml)
        );
    }

    #[test]
    fn attribute_violations() {
        let xml = r#"<package xmlns="urn:test" extra="1"><type>SIP</type><inventory>
            <file><name>a</name><checksum algorithm="SHA1">5eb63bbbe01eeed093cb22bb8f5acdc3</checksum></file>
          </inventory></package>"#;
        assert_eq!(
            vec![
                "/package/@extra (line 1): Attribute 'extra' is not allowed",
                "/package (line 1): Missing required attribute 'version'",
                "/package/inventory/file (line 2): Missing required attribute 'id'",
                "/package/inventory/file/checksum/@algorithm (line 2): Value 'SHA1' does not equal the fixed value 'MD5'",
            ],
            messages(xml)
        );
    }

    #[test]
    fn text_in_element_only_content() {
        let xml = document("4", "SIP", "stray text", "");
        assert_eq!(
            vec!["/package/inventory (line 4): Element must not contain text"],
            messages(&xml)
        );
    }

    #[test]
    fn undeclared_root() {
        let schema = Schema::parse(SCHEMA).unwrap();
        let report = schema.validate("<package/>").unwrap();
        assert!(!report.is_valid());
        assert_eq!(
            "No declaration for root element 'package'",
            report.violations()[0].message()
        );
    }

    const SHAPES: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root" type="Base"/>
  <xs:element name="count" type="xs:integer"/>
  <xs:element name="shape" type="xs:string" abstract="true"/>
  <xs:element name="holder">
    <xs:complexType>
      <xs:sequence>
        <xs:element ref="shape"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="settings">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="n" type="xs:integer" default="5" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:complexType name="Base" abstract="true">
    <xs:sequence>
      <xs:element name="a" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="Derived">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence>
          <xs:element name="b" type="xs:int" minOccurs="0"/>
        </xs:sequence>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:complexType name="Other">
    <xs:sequence>
      <xs:element name="a" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
</xs:schema>"#;

    const XSI: &str = r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#;

    #[test]
    fn abstract_types_need_a_derived_xsi_type() {
        assert_eq!(
            vec!["/root (line 1): Element has an abstract type and needs an xsi:type naming a derived type"],
            messages_for(SHAPES, "<root><a>x</a></root>")
        );

        let xml = format!(r#"<root {XSI} xsi:type="Derived"><a>x</a><b>1</b></root>"#);
        assert_eq!(Vec::<String>::new(), messages_for(SHAPES, &xml));

        let xml = format!(r#"<root {XSI} xsi:type="Base"><a>x</a></root>"#);
        assert_eq!(1, messages_for(SHAPES, &xml).len());
    }

    #[test]
    fn abstract_elements_are_invalid() {
        assert_eq!(
            vec!["/shape (line 1): Element 'shape' is abstract"],
            messages_for(SHAPES, "<shape>x</shape>")
        );
        assert_eq!(
            vec!["/holder/shape (line 1): Element 'shape' is abstract"],
            messages_for(SHAPES, "<holder><shape>x</shape></holder>")
        );
    }

    #[test]
    fn xsi_type_must_derive_from_declared_type() {
        let xml = format!(r#"<root {XSI} xsi:type="Other"><a>x</a></root>"#);
        assert_eq!(
            vec!["/root (line 1): xsi:type 'Other' is not derived from the declared type of element 'root'"],
            messages_for(SHAPES, &xml)
        );

        let xml = format!(
            r#"<count {XSI} xmlns:xs="http://www.w3.org/2001/XMLSchema" xsi:type="xs:int">5</count>"#
        );
        assert_eq!(Vec::<String>::new(), messages_for(SHAPES, &xml));

        let xml = format!(
            r#"<count {XSI} xmlns:xs="http://www.w3.org/2001/XMLSchema" xsi:type="xs:string">5</count>"#
        );
        assert_eq!(1, messages_for(SHAPES, &xml).len());
    }

    #[test]
    fn empty_elements_take_their_default() {
        assert_eq!(
            Vec::<String>::new(),
            messages_for(SHAPES, "<settings><n/><n>7</n><n></n></settings>")
        );
        assert_eq!(
            1,
            messages_for(SHAPES, "<settings><n/><n>x</n></settings>").len()
        );
    }

    #[test]
    fn malformed_document_is_an_error() {
        let schema = Schema::parse(SCHEMA).unwrap();
        assert!(matches!(
            schema.validate("<package>"),
            Err(Error::ParseDocument { .. })
        ));
    }
}
