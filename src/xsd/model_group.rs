use roxmltree::Node;

use super::{
    particle::{occurs, MaxOccurs, Particle},
    xs_children, SchemaParseError,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compositor {
    All,
    Choice,
    Sequence,
}

/// A `<sequence>`, `<choice>` or `<all>` with its particles in document order
#[derive(Clone, Debug, PartialEq)]
pub struct ModelGroup {
    pub compositor: Compositor,
    pub min_occurs: u64,
    pub max_occurs: MaxOccurs,
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    pub(super) fn is_model_group_tag(name: &str) -> bool {
        matches!(name, "all" | "choice" | "sequence")
    }

    pub(super) fn map_from_xml(group: Node) -> Result<Self, SchemaParseError> {
        // {compositor}
        //   One of all, choice, sequence depending on the element information item.
        let compositor = match group.tag_name().name() {
            "all" => Compositor::All,
            "choice" => Compositor::Choice,
            "sequence" => Compositor::Sequence,
            other => {
                return Err(super::structure_error(
                    group,
                    format!("<{other}> is not a model group"),
                ))
            }
        };
        let (min_occurs, max_occurs) = occurs(group)?;

        // {particles}
        //   A sequence of particles corresponding to all the <all>, <choice>, <sequence>,
        //   <any>, <group> or <element> items among the [children], in order.
        let mut particles = Vec::new();
        for child in xs_children(group) {
            if let Some(particle) = Particle::map_from_xml(child)? {
                particles.push(particle);
            }
        }

        Ok(Self {
            compositor,
            min_occurs,
            max_occurs,
            particles,
        })
    }

    /// Wraps a lone particle into a sequence, as used for `<group ref>` content of complex types.
    pub(super) fn singleton(particle: Particle) -> Self {
        Self {
            compositor: Compositor::Sequence,
            min_occurs: 1,
            max_occurs: MaxOccurs::Count(1),
            particles: vec![particle],
        }
    }

    /// Finds the content model among the children of `parent`: a model group, or a group
    /// reference wrapped into a sequence.
    pub(super) fn map_content_from_children(
        parent: Node,
    ) -> Result<Option<Self>, SchemaParseError> {
        for child in xs_children(parent) {
            let name = child.tag_name().name();
            if Self::is_model_group_tag(name) {
                return Self::map_from_xml(child).map(Some);
            }
            if name == super::GroupReference::TAG_NAME {
                let group = super::GroupReference::map_from_xml(child)?;
                return Ok(Some(Self::singleton(Particle::Group(group))));
            }
        }
        Ok(None)
    }
}
