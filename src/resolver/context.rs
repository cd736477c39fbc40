use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use super::components::ConstructionTable;
use super::model::{
    Attribute, ComplexType, ComplexTypeId, Content, Element, ElementId, ElementTerm, ElementUse,
    Group, LocalElement, Particle, ResolvedSchema, SimpleType, SimpleTypeId, SimpleVariety,
    TypeRef,
};
use crate::error::{ReferenceKind, ResolveError};
use crate::xsd::{
    self,
    builtins::{self, Primitive, ANY_SIMPLE_TYPE, ANY_TYPE, XS_NAMESPACE},
    AttributeDeclaration, AttributeGroupDefinition, AttributeItem, AttributeUse,
    ComplexTypeDefinition, Compositor, ContentModel, DerivationMethod, ElementDeclaration,
    InlineType, MaxOccurs, ModelGroup, ModelGroupDefinition, NamespaceRegistry, PrefixedName,
    QName, Schema, SimpleTypeDefinition,
};

type Result<T> = std::result::Result<T, ResolveError>;

/// One schema document in the namespace context it is merged in.
///
/// A chameleon document pulled in from two different namespaces yields two units.
pub(super) struct SchemaUnit<'s> {
    pub schema: &'s Schema,
    pub registry: NamespaceRegistry,
}

/// Collects the schema graph below `root` breadth-first, root first.
///
/// Each document is visited once per effective namespace. A document without a
/// `targetNamespace` adopts the effective namespace of the document pulling it in; the root's
/// `targetNamespace` is taken as-is.
pub(super) fn collect_units(root: &Schema) -> Vec<SchemaUnit<'_>> {
    let mut units = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((root, root.target_namespace.clone()));

    while let Some((schema, effective_namespace)) = queue.pop_front() {
        let identity = schema as *const Schema as usize;
        if !visited.insert((identity, effective_namespace.clone())) {
            continue;
        }
        if schema.target_namespace.is_none() && effective_namespace.is_some() {
            debug!(namespace = ?effective_namespace, "absorbing chameleon schema");
        }

        let directives = schema
            .imports
            .iter()
            .map(|import| (import.schema.as_ref(), import.schema_location.as_deref()))
            .chain(
                schema
                    .includes
                    .iter()
                    .map(|include| (include.schema.as_ref(), include.schema_location.as_deref())),
            )
            .chain(
                schema
                    .redefines
                    .iter()
                    .map(|redefine| (redefine.schema.as_ref(), redefine.schema_location.as_deref())),
            );
        for (child, location) in directives {
            match child {
                Some(child) => {
                    let child_namespace = child
                        .target_namespace
                        .clone()
                        .or_else(|| effective_namespace.clone());
                    queue.push_back((Arc::as_ref(child), child_namespace));
                }
                None => debug!(location, "skipping unlinked schema directive"),
            }
        }

        units.push(SchemaUnit {
            schema,
            registry: NamespaceRegistry::new(schema, effective_namespace.as_deref()),
        });
    }
    units
}

/// A top-level declaration together with the unit it was declared in.
pub(super) struct Declared<'s, T> {
    unit: &'s SchemaUnit<'s>,
    item: &'s T,
    /// Declared inside a `<redefine>`
    redefinition: bool,
}

impl<'s, T> Declared<'s, T> {
    fn new(unit: &'s SchemaUnit<'s>, item: &'s T, redefinition: bool) -> Self {
        Self {
            unit,
            item,
            redefinition,
        }
    }
}

// derive(Clone, Copy) would require T: Copy
impl<'s, T> Clone for Declared<'s, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, T> Copy for Declared<'s, T> {}

/// Simple and complex type definitions share a symbol space
#[derive(Clone, Copy)]
pub(super) enum TypeDeclaration<'s> {
    Complex(Declared<'s, ComplexTypeDefinition>),
    Simple(Declared<'s, SimpleTypeDefinition>),
}

trait SameDefinition {
    /// Whether two declarations of the same name may be merged silently.
    fn same_definition(&self, other: &Self) -> bool;
}

impl<'s, T: PartialEq> SameDefinition for Declared<'s, T> {
    fn same_definition(&self, other: &Self) -> bool {
        std::ptr::eq(self.item, other.item) || self.item == other.item
    }
}

impl<'s> SameDefinition for TypeDeclaration<'s> {
    fn same_definition(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Complex(a), Self::Complex(b)) => a.same_definition(b),
            (Self::Simple(a), Self::Simple(b)) => a.same_definition(b),
            _ => false,
        }
    }
}

/// The declarations of one symbol space, merged over all units.
struct SymbolSpace<V> {
    kind: ReferenceKind,
    entries: HashMap<QName, V>,
    /// Previous versions of redefined components
    shadowed: HashMap<QName, V>,
    by_local_name: HashMap<String, Vec<QName>>,
    order: Vec<QName>,
}

impl<V: Copy + SameDefinition> SymbolSpace<V> {
    fn new(kind: ReferenceKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            shadowed: HashMap::new(),
            by_local_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn declare(&mut self, name: QName, value: V) -> Result<()> {
        match self.entries.get(&name) {
            Some(existing) if existing.same_definition(&value) => Ok(()),
            Some(_) => Err(ResolveError::ConflictingDefinition {
                kind: self.kind,
                name,
            }),
            None => {
                self.by_local_name
                    .entry(name.local_name.clone())
                    .or_default()
                    .push(name.clone());
                self.order.push(name.clone());
                self.entries.insert(name, value);
                Ok(())
            }
        }
    }

    /// Replaces the declaration of `name`, keeping the previous one reachable through
    /// [`Self::shadowed()`].
    fn redefine(&mut self, name: QName, value: V) -> Result<()> {
        let Some(&original) = self.entries.get(&name) else {
            return Err(ResolveError::not_found(self.kind, name));
        };
        if original.same_definition(&value) {
            return Ok(());
        }
        if self.shadowed.contains_key(&name) {
            return Err(ResolveError::ConflictingDefinition {
                kind: self.kind,
                name,
            });
        }
        self.shadowed.insert(name.clone(), original);
        self.entries.insert(name, value);
        Ok(())
    }

    /// Finds the declaration for a reference. An exact match wins; otherwise a unique
    /// declaration with the same local name is accepted.
    fn lookup(&self, reference: &QName) -> Option<(QName, V)> {
        if let Some(&value) = self.entries.get(reference) {
            return Some((reference.clone(), value));
        }
        match self
            .by_local_name
            .get(&reference.local_name)
            .map(Vec::as_slice)
        {
            Some([only]) => {
                debug!(kind = %self.kind, reference = %reference, resolved = %only, "resolved reference by local name");
                self.entries.get(only).map(|&value| (only.clone(), value))
            }
            _ => None,
        }
    }

    fn resolve(&self, reference: &QName) -> Result<(QName, V)> {
        self.lookup(reference)
            .ok_or_else(|| ResolveError::not_found(self.kind, reference.clone()))
    }

    fn shadowed(&self, name: &QName) -> Result<V> {
        self.shadowed
            .get(name)
            .copied()
            .ok_or_else(|| ResolveError::not_found(self.kind, name.clone()))
    }

    /// All entries in declaration order
    fn iter(&self) -> impl Iterator<Item = (&QName, V)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|&value| (name, value)))
    }
}

/// Whether `reference` (as expanded in the referencing unit) names the component `name`.
///
/// A reference with an undeclared prefix has no namespace; it still matches by local name.
fn refers_to(reference: &QName, name: &QName) -> bool {
    reference == name
        || (reference.namespace_name.is_none() && reference.local_name == name.local_name)
}

fn global_name(unit: &SchemaUnit, local_name: &str) -> QName {
    QName::with_optional_namespace(unit.registry.target_namespace(), local_name)
}

/// An attribute of a content model, or a prohibition removing an inherited one.
type AttributeEntry = (QName, Option<Attribute>);

/// The state of one resolution run: the merged symbol spaces and the component tables being
/// filled.
pub(super) struct ResolutionContext<'s> {
    units: &'s [SchemaUnit<'s>],

    elements: SymbolSpace<Declared<'s, ElementDeclaration>>,
    attributes: SymbolSpace<Declared<'s, AttributeDeclaration>>,
    types: SymbolSpace<TypeDeclaration<'s>>,
    groups: SymbolSpace<Declared<'s, ModelGroupDefinition>>,
    attribute_groups: SymbolSpace<Declared<'s, AttributeGroupDefinition>>,

    element_table: ConstructionTable<Element>,
    complex_table: ConstructionTable<ComplexType>,
    simple_table: ConstructionTable<SimpleType>,

    element_ids: HashMap<QName, ElementId>,
    element_declarations: HashMap<ElementId, (QName, Declared<'s, ElementDeclaration>)>,
    type_ids: HashMap<QName, TypeRef>,
    /// Previous versions of redefined types; only reachable from their redefinition
    original_type_ids: HashMap<QName, TypeRef>,
    type_declarations: HashMap<TypeRef, (QName, TypeDeclaration<'s>)>,

    /// Concrete substitutes per substitution group head, in declaration order
    substitutions: HashMap<QName, Vec<QName>>,

    /// Components under construction, for cycle detection. The flag marks the previous version
    /// of a redefined component.
    in_progress: HashSet<(ReferenceKind, QName, bool)>,
    /// Redefined groups and attribute groups whose new body is being inlined; references to
    /// them resolve to the previous version.
    redefining: Vec<(ReferenceKind, QName)>,
    /// Anonymous derivations of a type that was under construction when they were reached
    deferred: Vec<DeferredType<'s>>,
}

struct DeferredType<'s> {
    id: ComplexTypeId,
    base: TypeRef,
    definition: &'s ComplexTypeDefinition,
    unit: &'s SchemaUnit<'s>,
}

impl<'s> ResolutionContext<'s> {
    /// Registers the declarations of all units, applies redefinitions and computes the
    /// substitution groups.
    pub(super) fn new(units: &'s [SchemaUnit<'s>]) -> Result<Self> {
        let mut context = Self {
            units,
            elements: SymbolSpace::new(ReferenceKind::Element),
            attributes: SymbolSpace::new(ReferenceKind::Attribute),
            types: SymbolSpace::new(ReferenceKind::Type),
            groups: SymbolSpace::new(ReferenceKind::Group),
            attribute_groups: SymbolSpace::new(ReferenceKind::AttributeGroup),
            element_table: ConstructionTable::default(),
            complex_table: ConstructionTable::default(),
            simple_table: ConstructionTable::default(),
            element_ids: HashMap::new(),
            element_declarations: HashMap::new(),
            type_ids: HashMap::new(),
            original_type_ids: HashMap::new(),
            type_declarations: HashMap::new(),
            substitutions: HashMap::new(),
            in_progress: HashSet::new(),
            redefining: Vec::new(),
            deferred: Vec::new(),
        };

        for unit in units {
            context.declare_unit(unit)?;
        }
        // Redefinitions apply after everything else is declared, so that they replace the
        // original no matter in which order the documents were visited.
        for unit in units {
            context.redefine_unit(unit)?;
        }
        context.substitutions = context.collect_substitutions()?;
        Ok(context)
    }

    fn declare_unit(&mut self, unit: &'s SchemaUnit<'s>) -> Result<()> {
        let schema = unit.schema;
        for element in &schema.elements {
            if let Some(local_name) = element.name.as_deref() {
                let name = unit.registry.element_name(local_name, true, None);
                self.elements
                    .declare(name, Declared::new(unit, element, false))?;
            }
        }
        for attribute in &schema.attributes {
            if let Some(local_name) = attribute.name.as_deref() {
                let name = unit.registry.attribute_name(local_name, true, None);
                self.attributes
                    .declare(name, Declared::new(unit, attribute, false))?;
            }
        }
        for complex_type in &schema.complex_types {
            if let Some(local_name) = complex_type.name.as_deref() {
                self.types.declare(
                    global_name(unit, local_name),
                    TypeDeclaration::Complex(Declared::new(unit, complex_type, false)),
                )?;
            }
        }
        for simple_type in &schema.simple_types {
            if let Some(local_name) = simple_type.name.as_deref() {
                self.types.declare(
                    global_name(unit, local_name),
                    TypeDeclaration::Simple(Declared::new(unit, simple_type, false)),
                )?;
            }
        }
        for group in &schema.groups {
            self.groups.declare(
                global_name(unit, &group.name),
                Declared::new(unit, group, false),
            )?;
        }
        for attribute_group in &schema.attribute_groups {
            self.attribute_groups.declare(
                global_name(unit, &attribute_group.name),
                Declared::new(unit, attribute_group, false),
            )?;
        }
        Ok(())
    }

    fn redefine_unit(&mut self, unit: &'s SchemaUnit<'s>) -> Result<()> {
        for redefine in &unit.schema.redefines {
            debug!(location = ?redefine.schema_location, "applying redefinitions");
            for complex_type in &redefine.complex_types {
                if let Some(local_name) = complex_type.name.as_deref() {
                    self.types.redefine(
                        global_name(unit, local_name),
                        TypeDeclaration::Complex(Declared::new(unit, complex_type, true)),
                    )?;
                }
            }
            for simple_type in &redefine.simple_types {
                if let Some(local_name) = simple_type.name.as_deref() {
                    self.types.redefine(
                        global_name(unit, local_name),
                        TypeDeclaration::Simple(Declared::new(unit, simple_type, true)),
                    )?;
                }
            }
            for group in &redefine.groups {
                self.groups.redefine(
                    global_name(unit, &group.name),
                    Declared::new(unit, group, true),
                )?;
            }
            for attribute_group in &redefine.attribute_groups {
                self.attribute_groups.redefine(
                    global_name(unit, &attribute_group.name),
                    Declared::new(unit, attribute_group, true),
                )?;
            }
        }
        Ok(())
    }

    /// Maps every substitution group head to its concrete members, direct and transitive.
    fn collect_substitutions(&self) -> Result<HashMap<QName, Vec<QName>>> {
        let mut direct = HashMap::<QName, Vec<QName>>::new();
        let mut position = HashMap::<QName, usize>::new();
        for (index, (name, declared)) in self.elements.iter().enumerate() {
            position.insert(name.clone(), index);
            if let Some(head) = &declared.item.substitution_group {
                let (head, _) = self
                    .elements
                    .resolve(&declared.unit.registry.expand(head))?;
                direct.entry(head).or_default().push(name.clone());
            }
        }

        let mut substitutions = HashMap::new();
        for head in direct.keys() {
            let mut members = HashSet::new();
            let mut stack = vec![head];
            while let Some(current) = stack.pop() {
                for member in direct.get(current).into_iter().flatten() {
                    if members.insert(member.clone()) {
                        stack.push(member);
                    }
                }
            }
            members.remove(head);

            let mut concrete: Vec<QName> = members
                .into_iter()
                .filter(|member| {
                    self.elements
                        .lookup(member)
                        .is_some_and(|(_, declared)| !declared.item.abstract_)
                })
                .collect();
            concrete.sort_by_key(|member| position.get(member).copied().unwrap_or(usize::MAX));
            debug!(head = %head, substitutes = concrete.len(), "collected substitution group");
            substitutions.insert(head.clone(), concrete);
        }
        Ok(substitutions)
    }

    /// Constructs every declared component and freezes the tables.
    pub(super) fn finish(mut self) -> Result<ResolvedSchema> {
        let types: Vec<(QName, TypeDeclaration<'s>)> = self
            .types
            .iter()
            .map(|(name, declaration)| (name.clone(), declaration))
            .collect();
        for (name, declaration) in types {
            let type_ = self.reserve_type(name, declaration);
            self.ensure_type(type_)?;
        }

        let element_names: Vec<QName> = self.elements.iter().map(|(name, _)| name.clone()).collect();
        let mut top_level_elements = Vec::with_capacity(element_names.len());
        for name in &element_names {
            let (_, id) = self.element_ref(name)?;
            self.ensure_element(id)?;
            top_level_elements.push(id);
        }

        // Anything reserved along the way, e.g. previous versions of redefined types
        let pending: Vec<TypeRef> = self.type_declarations.keys().copied().collect();
        for type_ in pending {
            self.ensure_type(type_)?;
        }
        self.construct_deferred()?;

        let mut substitutions = HashMap::new();
        for (head, members) in &self.substitutions {
            let Some(&head) = self.element_ids.get(head) else {
                continue;
            };
            let members = members
                .iter()
                .filter_map(|member| self.element_ids.get(member).copied())
                .collect();
            substitutions.insert(head, members);
        }

        let mut namespaces = self
            .units
            .first()
            .map(|unit| unit.registry.bindings().clone())
            .unwrap_or_default();
        for unit in self.units.iter().skip(1) {
            namespaces.merge(unit.registry.bindings());
        }

        let elements = self.element_table.into_arena().map_err(|missing| {
            let name = self
                .element_declarations
                .get(&missing)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| QName::unqualified("?"));
            ResolveError::not_found(ReferenceKind::Element, name)
        })?;
        let type_declarations = &self.type_declarations;
        let missing_type = |type_: TypeRef| {
            let name = type_declarations
                .get(&type_)
                .map(|(name, _)| name.clone())
                .unwrap_or_else(|| QName::unqualified("?"));
            ResolveError::not_found(ReferenceKind::Type, name)
        };
        let complex_types = self
            .complex_table
            .into_arena()
            .map_err(|missing| missing_type(TypeRef::Complex(missing)))?;
        let simple_types = self
            .simple_table
            .into_arena()
            .map_err(|missing| missing_type(TypeRef::Simple(missing)))?;

        let fields = (0..complex_types.len()).map(|_| OnceCell::new()).collect();
        Ok(ResolvedSchema {
            target_namespace: self
                .units
                .first()
                .and_then(|unit| unit.schema.target_namespace.clone()),
            namespaces,
            elements,
            complex_types,
            simple_types,
            top_level_elements,
            element_index: self.element_ids,
            type_index: self.type_ids,
            substitutions,
            fields,
        })
    }

    // Types

    /// Resolves a type reference to a (possibly not yet constructed) type.
    fn resolve_type(&mut self, reference: &QName) -> Result<TypeRef> {
        if reference.namespace() == Some(XS_NAMESPACE) {
            return builtins::lookup(&reference.local_name)
                .map(TypeRef::Builtin)
                .ok_or_else(|| ResolveError::not_found(ReferenceKind::Type, reference.clone()));
        }
        match self.types.lookup(reference) {
            Some((name, declaration)) => Ok(self.reserve_type(name, declaration)),
            None => {
                // Tolerate built-in types referenced without (or with an undeclared) prefix
                if reference.namespace().is_none() {
                    if let Some(builtin) = builtins::lookup(&reference.local_name) {
                        return Ok(TypeRef::Builtin(builtin));
                    }
                }
                Err(ResolveError::not_found(
                    ReferenceKind::Type,
                    reference.clone(),
                ))
            }
        }
    }

    fn reserve_type(&mut self, name: QName, declaration: TypeDeclaration<'s>) -> TypeRef {
        if let Some(&type_) = self.type_ids.get(&name) {
            return type_;
        }
        let type_ = self.reserve_slot(declaration);
        self.type_ids.insert(name.clone(), type_);
        self.type_declarations.insert(type_, (name, declaration));
        type_
    }

    fn reserve_slot(&mut self, declaration: TypeDeclaration<'s>) -> TypeRef {
        match declaration {
            TypeDeclaration::Complex(_) => TypeRef::Complex(self.complex_table.reserve()),
            TypeDeclaration::Simple(_) => TypeRef::Simple(self.simple_table.reserve()),
        }
    }

    /// The previous version of the redefined type `name`.
    fn original_type(&mut self, name: &QName) -> Result<TypeRef> {
        if let Some(&type_) = self.original_type_ids.get(name) {
            return Ok(type_);
        }
        let declaration = self.types.shadowed(name)?;
        let type_ = self.reserve_slot(declaration);
        self.original_type_ids.insert(name.clone(), type_);
        self.type_declarations
            .insert(type_, (name.clone(), declaration));
        Ok(type_)
    }

    fn is_constructed(&self, type_: TypeRef) -> bool {
        match type_ {
            TypeRef::Builtin(_) => true,
            TypeRef::Complex(id) => self.complex_table.is_present(id),
            TypeRef::Simple(id) => self.simple_table.is_present(id),
        }
    }

    /// Constructs `type_` now if it has only been reserved so far. Needed wherever the content
    /// of a type matters, i.e. for derivations.
    fn ensure_type(&mut self, type_: TypeRef) -> Result<()> {
        if self.is_constructed(type_) {
            return Ok(());
        }
        let Some((name, declaration)) = self.type_declarations.get(&type_).cloned() else {
            return Ok(());
        };
        let original = self.original_type_ids.get(&name) == Some(&type_);
        let key = (ReferenceKind::Type, name.clone(), original);
        if !self.in_progress.insert(key.clone()) {
            return Err(ResolveError::cycle(ReferenceKind::Type, name));
        }

        trace!(name = %name, original, "constructing type");
        match (type_, declaration) {
            (TypeRef::Complex(id), TypeDeclaration::Complex(declared)) => {
                let complex_type = self.complex_type(
                    Some(&name),
                    declared.item,
                    declared.unit,
                    declared.redefinition,
                )?;
                self.complex_table.insert(id, complex_type);
            }
            (TypeRef::Simple(id), TypeDeclaration::Simple(declared)) => {
                let simple_type = self.simple_type(
                    Some(&name),
                    declared.item,
                    declared.unit,
                    declared.redefinition,
                )?;
                self.simple_table.insert(id, simple_type);
            }
            _ => {}
        }

        self.in_progress.remove(&key);
        self.construct_deferred()
    }

    /// Whether `type_` is being constructed further up the stack.
    fn is_under_construction(&self, type_: TypeRef) -> bool {
        if self.is_constructed(type_) {
            return false;
        }
        let Some((name, _)) = self.type_declarations.get(&type_) else {
            return false;
        };
        let original = self.original_type_ids.get(name) == Some(&type_);
        self.in_progress
            .contains(&(ReferenceKind::Type, name.clone(), original))
    }

    /// Constructs the deferred anonymous types whose base has been constructed meanwhile.
    fn construct_deferred(&mut self) -> Result<()> {
        while let Some(index) = self
            .deferred
            .iter()
            .position(|deferred| self.is_constructed(deferred.base))
        {
            let deferred = self.deferred.remove(index);
            let complex_type = self.complex_type(None, deferred.definition, deferred.unit, false)?;
            self.complex_table.insert(deferred.id, complex_type);
        }
        Ok(())
    }

    /// The base of a derivation. A redefinition must derive from its own previous version.
    fn derivation_base(
        &mut self,
        base: &PrefixedName,
        own_name: Option<&QName>,
        redefinition: bool,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<TypeRef> {
        let reference = unit.registry.expand(base);
        match own_name {
            Some(own_name) if redefinition => {
                if !refers_to(&reference, own_name) {
                    return Err(ResolveError::InvalidRedefinition {
                        name: own_name.clone(),
                    });
                }
                self.original_type(own_name)
            }
            _ => self.resolve_type(&reference),
        }
    }

    /// The effective content and attributes of a complex type, constructing it if needed.
    fn complex_snapshot(&mut self, id: ComplexTypeId) -> Result<(Content, Vec<Attribute>)> {
        self.ensure_type(TypeRef::Complex(id))?;
        match self.complex_table.get(id) {
            Some(base) => Ok((base.content.clone(), base.attributes.clone())),
            None => {
                let name = self
                    .type_declarations
                    .get(&TypeRef::Complex(id))
                    .map(|(name, _)| name.clone())
                    .unwrap_or_else(|| QName::unqualified("?"));
                Err(ResolveError::cycle(ReferenceKind::Type, name))
            }
        }
    }

    fn complex_type(
        &mut self,
        name: Option<&QName>,
        definition: &'s ComplexTypeDefinition,
        unit: &'s SchemaUnit<'s>,
        redefinition: bool,
    ) -> Result<ComplexType> {
        if let (Some(name), true) = (name, redefinition) {
            if !matches!(
                definition.content,
                ContentModel::ComplexContent(_) | ContentModel::SimpleContent(_)
            ) {
                return Err(ResolveError::InvalidRedefinition { name: name.clone() });
            }
        }

        let mut own_attributes = Vec::new();
        self.attribute_entries(&definition.attributes, unit, &mut own_attributes)?;

        let (base, derivation, content, inherited) = match &definition.content {
            ContentModel::Empty => (None, None, Content::Empty, Vec::new()),
            ContentModel::Particle(model_group) => (
                None,
                None,
                Content::Elements(self.model_group(model_group, unit)?),
                Vec::new(),
            ),
            ContentModel::ComplexContent(derivation) => {
                let base =
                    self.derivation_base(&derivation.base, name, redefinition, unit)?;
                let (base_content, base_attributes) = match base {
                    TypeRef::Complex(id) => self.complex_snapshot(id)?,
                    TypeRef::Builtin(builtin) if builtin.primitive == Primitive::Any => {
                        (Content::Empty, Vec::new())
                    }
                    simple => (Content::Simple(simple), Vec::new()),
                };
                let own_particle = derivation
                    .particle
                    .as_ref()
                    .map(|model_group| self.model_group(model_group, unit))
                    .transpose()?;
                let content = match derivation.method {
                    DerivationMethod::Extension => extend_content(base_content, own_particle),
                    DerivationMethod::Restriction => {
                        own_particle.map_or(Content::Empty, Content::Elements)
                    }
                };
                self.attribute_entries(&derivation.attributes, unit, &mut own_attributes)?;
                (Some(base), Some(derivation.method), content, base_attributes)
            }
            ContentModel::SimpleContent(derivation) => {
                let base =
                    self.derivation_base(&derivation.base, name, redefinition, unit)?;
                let (text_type, base_attributes) = match base {
                    TypeRef::Complex(id) => match self.complex_snapshot(id)? {
                        (Content::Simple(text_type), attributes) => (text_type, attributes),
                        (_, attributes) => (TypeRef::Builtin(ANY_SIMPLE_TYPE), attributes),
                    },
                    simple => (simple, Vec::new()),
                };
                self.attribute_entries(&derivation.attributes, unit, &mut own_attributes)?;
                (
                    Some(base),
                    Some(derivation.method),
                    Content::Simple(text_type),
                    base_attributes,
                )
            }
        };

        Ok(ComplexType {
            name: name.cloned(),
            abstract_: definition.abstract_,
            mixed: definition.mixed,
            base,
            derivation,
            content,
            attributes: merge_attributes(inherited, own_attributes),
            documentation: definition.documentation.clone(),
        })
    }

    fn anonymous_complex_type(
        &mut self,
        definition: &'s ComplexTypeDefinition,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<ComplexTypeId> {
        if let ContentModel::ComplexContent(derivation) | ContentModel::SimpleContent(derivation) =
            &definition.content
        {
            // A local element deriving from the type it is declared in
            let base = self.resolve_type(&unit.registry.expand(&derivation.base))?;
            if self.is_under_construction(base) {
                if let Some((name, _)) = self.type_declarations.get(&base) {
                    trace!(base = %name, "deferring anonymous derivation");
                }
                let id = self.complex_table.reserve();
                self.deferred.push(DeferredType {
                    id,
                    base,
                    definition,
                    unit,
                });
                return Ok(id);
            }
        }
        let complex_type = self.complex_type(None, definition, unit, false)?;
        Ok(self.complex_table.create(complex_type))
    }

    fn simple_type(
        &mut self,
        name: Option<&QName>,
        definition: &'s SimpleTypeDefinition,
        unit: &'s SchemaUnit<'s>,
        redefinition: bool,
    ) -> Result<SimpleType> {
        if let (Some(name), true) = (name, redefinition) {
            let restricts_named_base = matches!(
                &definition.variety,
                xsd::SimpleVariety::Restriction(restriction) if restriction.base.is_some()
            );
            if !restricts_named_base {
                return Err(ResolveError::InvalidRedefinition { name: name.clone() });
            }
        }

        let variety = match &definition.variety {
            xsd::SimpleVariety::Restriction(restriction) => {
                let base = match (&restriction.base, &restriction.inline_base) {
                    (Some(base), _) => self.derivation_base(base, name, redefinition, unit)?,
                    (None, Some(inline)) => {
                        TypeRef::Simple(self.anonymous_simple_type(inline, unit)?)
                    }
                    (None, None) => TypeRef::Builtin(ANY_SIMPLE_TYPE),
                };
                self.restricted_variety(base, &restriction.enumerations)?
            }
            xsd::SimpleVariety::List {
                item_type,
                inline_item,
            } => {
                let item = match (item_type, inline_item) {
                    (Some(item_type), _) => self.resolve_type(&unit.registry.expand(item_type))?,
                    (None, Some(inline)) => {
                        TypeRef::Simple(self.anonymous_simple_type(inline, unit)?)
                    }
                    (None, None) => TypeRef::Builtin(ANY_SIMPLE_TYPE),
                };
                SimpleVariety::List { item }
            }
            xsd::SimpleVariety::Union {
                member_types,
                inline_members,
            } => {
                let mut members = Vec::with_capacity(member_types.len() + inline_members.len());
                for member in member_types {
                    members.push(self.resolve_type(&unit.registry.expand(member))?);
                }
                for inline in inline_members {
                    members.push(TypeRef::Simple(self.anonymous_simple_type(inline, unit)?));
                }
                SimpleVariety::Union { members }
            }
        };

        Ok(SimpleType {
            name: name.cloned(),
            variety,
            documentation: definition.documentation.clone(),
        })
    }

    /// The variety of a restriction of `base`. Enumerations narrow the base's enumerations.
    fn restricted_variety(&mut self, base: TypeRef, enumerations: &[String]) -> Result<SimpleVariety> {
        let narrowed = |inherited: &[String]| {
            if enumerations.is_empty() {
                inherited.to_vec()
            } else {
                enumerations.to_vec()
            }
        };
        match base {
            TypeRef::Builtin(builtin) => Ok(SimpleVariety::Atomic {
                primitive: builtin.primitive,
                enumerations: enumerations.to_vec(),
            }),
            TypeRef::Simple(id) => {
                self.ensure_type(base)?;
                let variety = match self.simple_table.get(id).map(|base| &base.variety) {
                    Some(SimpleVariety::Atomic {
                        primitive,
                        enumerations: inherited,
                    }) => SimpleVariety::Atomic {
                        primitive: *primitive,
                        enumerations: narrowed(inherited),
                    },
                    Some(other) => other.clone(),
                    None => SimpleVariety::Atomic {
                        primitive: Primitive::Any,
                        enumerations: enumerations.to_vec(),
                    },
                };
                Ok(variety)
            }
            TypeRef::Complex(id) => match self.complex_snapshot(id)? {
                (Content::Simple(text_type), _) => self.restricted_variety(text_type, enumerations),
                _ => Ok(SimpleVariety::Atomic {
                    primitive: Primitive::Any,
                    enumerations: enumerations.to_vec(),
                }),
            },
        }
    }

    fn anonymous_simple_type(
        &mut self,
        definition: &'s SimpleTypeDefinition,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<SimpleTypeId> {
        let simple_type = self.simple_type(None, definition, unit, false)?;
        Ok(self.simple_table.create(simple_type))
    }

    // Elements

    /// Resolves an element reference to a (possibly not yet constructed) top-level element.
    fn element_ref(&mut self, reference: &QName) -> Result<(QName, ElementId)> {
        let (name, declared) = self.elements.resolve(reference)?;
        if let Some(&id) = self.element_ids.get(&name) {
            return Ok((name, id));
        }
        let id = self.element_table.reserve();
        self.element_ids.insert(name.clone(), id);
        self.element_declarations
            .insert(id, (name.clone(), declared));
        Ok((name, id))
    }

    fn ensure_element(&mut self, id: ElementId) -> Result<()> {
        if self.element_table.is_present(id) {
            return Ok(());
        }
        let Some((name, declared)) = self.element_declarations.get(&id).cloned() else {
            return Ok(());
        };
        let key = (ReferenceKind::Element, name.clone(), false);
        if !self.in_progress.insert(key.clone()) {
            return Err(ResolveError::cycle(ReferenceKind::Element, name));
        }

        let declaration = declared.item;
        let unit = declared.unit;
        let head = declaration
            .substitution_group
            .as_ref()
            .map(|head| self.element_ref(&unit.registry.expand(head)))
            .transpose()?
            .map(|(_, head)| head);

        let type_ = match self.element_type(
            declaration.type_name.as_ref(),
            declaration.inline_type.as_ref(),
            unit,
        )? {
            Some(type_) => type_,
            // A member of a substitution group defaults to the type of its head
            None => match head {
                Some(head) => {
                    self.ensure_element(head)?;
                    self.element_table
                        .get(head)
                        .map_or(TypeRef::Builtin(ANY_TYPE), |head| head.type_)
                }
                None => TypeRef::Builtin(ANY_TYPE),
            },
        };

        self.element_table.insert(
            id,
            Element {
                name,
                type_,
                abstract_: declaration.abstract_,
                nillable: declaration.nillable,
                substitution_group: head,
                default: declaration.default.clone(),
                fixed: declaration.fixed.clone(),
                documentation: declaration.documentation.clone(),
            },
        );
        self.in_progress.remove(&key);
        Ok(())
    }

    fn element_type(
        &mut self,
        type_name: Option<&PrefixedName>,
        inline_type: Option<&'s InlineType>,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<Option<TypeRef>> {
        if let Some(type_name) = type_name {
            return self.resolve_type(&unit.registry.expand(type_name)).map(Some);
        }
        let type_ = match inline_type {
            Some(InlineType::Complex(definition)) => {
                Some(TypeRef::Complex(self.anonymous_complex_type(definition, unit)?))
            }
            Some(InlineType::Simple(definition)) => {
                Some(TypeRef::Simple(self.anonymous_simple_type(definition, unit)?))
            }
            None => None,
        };
        Ok(type_)
    }

    // Content models

    fn model_group(&mut self, model_group: &'s ModelGroup, unit: &'s SchemaUnit<'s>) -> Result<Group> {
        let mut particles = Vec::with_capacity(model_group.particles.len());
        for particle in &model_group.particles {
            particles.push(self.particle(particle, unit)?);
        }
        Ok(Group {
            compositor: model_group.compositor,
            min_occurs: model_group.min_occurs,
            max_occurs: model_group.max_occurs,
            particles,
        })
    }

    fn particle(&mut self, particle: &'s xsd::Particle, unit: &'s SchemaUnit<'s>) -> Result<Particle> {
        match particle {
            xsd::Particle::Element(element) => self.element_particle(element, unit),
            xsd::Particle::Group(reference) => {
                let mut group = self.group_reference(&unit.registry.expand(&reference.ref_))?;
                group.min_occurs = group.min_occurs.saturating_mul(reference.min_occurs);
                group.max_occurs = group.max_occurs.mul(&reference.max_occurs);
                Ok(Particle::Group(group))
            }
            xsd::Particle::ModelGroup(model_group) => {
                Ok(Particle::Group(self.model_group(model_group, unit)?))
            }
        }
    }

    fn element_particle(
        &mut self,
        element: &'s ElementDeclaration,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<Particle> {
        if let Some(reference) = &element.ref_ {
            let (name, id) = self.element_ref(&unit.registry.expand(reference))?;
            return self.substitution_particle(&name, id, element.min_occurs, element.max_occurs);
        }

        let local_name = element.name.as_deref().unwrap_or_default();
        let name = unit.registry.element_name(local_name, false, element.form);
        let type_ = self
            .element_type(element.type_name.as_ref(), element.inline_type.as_ref(), unit)?
            .unwrap_or(TypeRef::Builtin(ANY_TYPE));
        Ok(Particle::Element(ElementUse {
            term: ElementTerm::Local(Box::new(LocalElement {
                name,
                type_,
                nillable: element.nillable,
                default: element.default.clone(),
                fixed: element.fixed.clone(),
                documentation: element.documentation.clone(),
            })),
            min_occurs: element.min_occurs,
            max_occurs: element.max_occurs,
        }))
    }

    /// A reference to `head`, expanded into a choice over its substitution group if it has
    /// members. An abstract head is left out of the choice.
    fn substitution_particle(
        &mut self,
        head_name: &QName,
        head: ElementId,
        min_occurs: u64,
        max_occurs: MaxOccurs,
    ) -> Result<Particle> {
        let element_use = |id| {
            Particle::Element(ElementUse {
                term: ElementTerm::Global(id),
                min_occurs,
                max_occurs,
            })
        };
        let abstract_ = self
            .elements
            .lookup(head_name)
            .is_some_and(|(_, declared)| declared.item.abstract_);
        let members = self.substitutions.get(head_name).cloned().unwrap_or_default();
        if members.is_empty() && !abstract_ {
            return Ok(element_use(head));
        }
        if members.is_empty() {
            debug!(head = %head_name, "abstract element has no substitutes");
        }

        let mut alternatives = Vec::with_capacity(members.len() + 1);
        if !abstract_ {
            alternatives.push(element_use(head));
        }
        for member in &members {
            let (_, id) = self.element_ref(member)?;
            alternatives.push(element_use(id));
        }
        trace!(head = %head_name, alternatives = alternatives.len(), "expanded substitution group");
        Ok(Particle::Group(Group {
            compositor: Compositor::Choice,
            min_occurs: 1,
            max_occurs: MaxOccurs::Count(1),
            particles: alternatives,
        }))
    }

    /// Inlines the model group of the group definition `reference` refers to.
    fn group_reference(&mut self, reference: &QName) -> Result<Group> {
        let (name, declared) = self.groups.resolve(reference)?;
        let original = self.redefining.contains(&(ReferenceKind::Group, name.clone()));
        let declared = if original {
            self.groups.shadowed(&name)?
        } else {
            declared
        };

        let key = (ReferenceKind::Group, name.clone(), original);
        if !self.in_progress.insert(key.clone()) {
            return Err(ResolveError::cycle(ReferenceKind::Group, name));
        }
        if declared.redefinition {
            self.redefining.push((ReferenceKind::Group, name.clone()));
        }
        let group = self.model_group(&declared.item.model_group, declared.unit);
        if declared.redefinition {
            self.redefining.pop();
        }
        self.in_progress.remove(&key);
        group
    }

    // Attributes

    fn attribute_entries(
        &mut self,
        items: &'s [AttributeItem],
        unit: &'s SchemaUnit<'s>,
        entries: &mut Vec<AttributeEntry>,
    ) -> Result<()> {
        for item in items {
            match item {
                AttributeItem::Attribute(declaration) => {
                    entries.push(self.attribute_entry(declaration, unit)?)
                }
                AttributeItem::Group(reference) => {
                    self.attribute_group_reference(&unit.registry.expand(reference), entries)?
                }
            }
        }
        Ok(())
    }

    fn attribute_entry(
        &mut self,
        declaration: &'s AttributeDeclaration,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<AttributeEntry> {
        let required = declaration.use_ == AttributeUse::Required;
        let prohibited = declaration.use_ == AttributeUse::Prohibited;

        if let Some(reference) = &declaration.ref_ {
            let (name, global) = self.attributes.resolve(&unit.registry.expand(reference))?;
            if prohibited {
                return Ok((name, None));
            }
            let type_ = self.attribute_type(global.item, global.unit)?;
            let attribute = Attribute {
                name: name.clone(),
                type_,
                required,
                default: declaration
                    .default
                    .clone()
                    .or_else(|| global.item.default.clone()),
                fixed: declaration
                    .fixed
                    .clone()
                    .or_else(|| global.item.fixed.clone()),
                documentation: declaration
                    .documentation
                    .clone()
                    .or_else(|| global.item.documentation.clone()),
            };
            return Ok((name, Some(attribute)));
        }

        let local_name = declaration.name.as_deref().unwrap_or_default();
        let name = unit
            .registry
            .attribute_name(local_name, false, declaration.form);
        if prohibited {
            return Ok((name, None));
        }
        let attribute = Attribute {
            name: name.clone(),
            type_: self.attribute_type(declaration, unit)?,
            required,
            default: declaration.default.clone(),
            fixed: declaration.fixed.clone(),
            documentation: declaration.documentation.clone(),
        };
        Ok((name, Some(attribute)))
    }

    fn attribute_type(
        &mut self,
        declaration: &'s AttributeDeclaration,
        unit: &'s SchemaUnit<'s>,
    ) -> Result<TypeRef> {
        if let Some(type_name) = &declaration.type_name {
            return self.resolve_type(&unit.registry.expand(type_name));
        }
        match &declaration.simple_type {
            Some(definition) => Ok(TypeRef::Simple(
                self.anonymous_simple_type(definition, unit)?,
            )),
            None => Ok(TypeRef::Builtin(ANY_SIMPLE_TYPE)),
        }
    }

    fn attribute_group_reference(
        &mut self,
        reference: &QName,
        entries: &mut Vec<AttributeEntry>,
    ) -> Result<()> {
        let (name, declared) = self.attribute_groups.resolve(reference)?;
        let original = self
            .redefining
            .contains(&(ReferenceKind::AttributeGroup, name.clone()));
        let declared = if original {
            self.attribute_groups.shadowed(&name)?
        } else {
            declared
        };

        let key = (ReferenceKind::AttributeGroup, name.clone(), original);
        if !self.in_progress.insert(key.clone()) {
            return Err(ResolveError::cycle(ReferenceKind::AttributeGroup, name));
        }
        if declared.redefinition {
            self.redefining
                .push((ReferenceKind::AttributeGroup, name.clone()));
        }
        let result = self.attribute_entries(&declared.item.attributes, declared.unit, entries);
        if declared.redefinition {
            self.redefining.pop();
        }
        self.in_progress.remove(&key);
        result
    }
}

/// Appends the particle of an extension to the content of its base.
fn extend_content(base: Content, own: Option<Group>) -> Content {
    match (base, own) {
        (base, None) => base,
        (Content::Empty, Some(own)) => Content::Elements(own),
        (Content::Elements(base), Some(own)) => Content::Elements(Group {
            compositor: Compositor::Sequence,
            min_occurs: 1,
            max_occurs: MaxOccurs::Count(1),
            particles: vec![Particle::Group(base), Particle::Group(own)],
        }),
        (Content::Simple(_), Some(own)) => {
            debug!("element content replaces the simple content of an extended type");
            Content::Elements(own)
        }
    }
}

/// Applies the attribute declarations of a derived type to the inherited ones: a redeclaration
/// replaces the inherited attribute in place, a prohibition removes it.
fn merge_attributes(inherited: Vec<Attribute>, own: Vec<AttributeEntry>) -> Vec<Attribute> {
    let mut attributes = inherited;
    for (name, attribute) in own {
        let existing = attributes.iter().position(|a| a.name == name);
        match (existing, attribute) {
            (Some(index), Some(attribute)) => attributes[index] = attribute,
            (Some(index), None) => {
                attributes.remove(index);
            }
            (None, Some(attribute)) => attributes.push(attribute),
            (None, None) => {}
        }
    }
    attributes
}
