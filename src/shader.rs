use std::{
    cell::Cell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use scene_common::{Element, Property};

use crate::{data_value::DataValue, error::DecodeError};

pub type PShader = Rc<Shader>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SocketIo {
    #[default]
    None,
    In,
    Out,
}

impl SocketIo {
    fn name(self) -> &'static str {
        match self {
            SocketIo::None => "None",
            SocketIo::In => "In",
            SocketIo::Out => "Out",
        }
    }

    fn parse(value: &str) -> Result<Self, DecodeError> {
        match value {
            "None" => Ok(SocketIo::None),
            "In" => Ok(SocketIo::In),
            "Out" => Ok(SocketIo::Out),
            _ => Err(DecodeError::UnknownEnumValue {
                field: "io",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SocketDesc {
    pub io: SocketIo,
    pub value: DataValue,
}

impl SocketDesc {
    pub fn input(value: impl Into<DataValue>) -> Self {
        Self {
            io: SocketIo::In,
            value: value.into(),
        }
    }

    pub fn output(value: DataValue) -> Self {
        Self {
            io: SocketIo::Out,
            value,
        }
    }

    fn to_element(&self) -> Element {
        let mut element = Element::new();
        element.insert("io", self.io.name());
        self.value.serialize(&mut element);
        element
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        Ok(Self {
            io: SocketIo::parse(&element.get_as::<String>("io")?)?,
            value: DataValue::deserialize(element)?,
        })
    }
}

pub type SocketMap = BTreeMap<String, SocketDesc>;

/// One node of a shader graph, described as plain data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeDesc {
    pub type_name: String,
    pub name: String,
    pub inputs: SocketMap,
    pub properties: SocketMap,
    pub outputs: SocketMap,
    pub primary_output: Option<String>,
}

impl NodeDesc {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn to_element(&self) -> Element {
        fn sockets(map: &SocketMap) -> Property {
            map.iter()
                .map(|(key, socket)| (key.clone(), Property::Element(socket.to_element())))
                .collect::<Element>()
                .into()
        }
        let mut element = Element::new();
        element
            .insert("typeName", self.type_name.as_str())
            .insert("name", self.name.as_str())
            .insert("inputs", sockets(&self.inputs))
            .insert("properties", sockets(&self.properties))
            .insert("outputs", sockets(&self.outputs))
            .insert_opt("primaryOutputSocket", self.primary_output.clone());
        element
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        fn sockets(element: &Element, key: &str) -> Result<SocketMap, DecodeError> {
            let mut map = SocketMap::new();
            for (name, socket) in element.element(key)?.iter() {
                let Property::Element(socket) = socket else {
                    return Err(scene_common::PropertyError::TypeMismatch {
                        field: name.to_string(),
                        expected: "element",
                    }
                    .into());
                };
                map.insert(name.to_string(), SocketDesc::from_element(socket)?);
            }
            Ok(map)
        }
        Ok(Self {
            type_name: element.get_as("typeName")?,
            name: element.get_as("name")?,
            inputs: sockets(element, "inputs")?,
            properties: sockets(element, "properties")?,
            outputs: sockets(element, "outputs")?,
            primary_output: element.get_opt("primaryOutputSocket")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketRef {
    pub node: u32,
    pub socket: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLink {
    pub from: SocketRef,
    pub to: SocketRef,
}

/// A group of nodes and the links between their sockets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeGraph {
    pub nodes: Vec<NodeDesc>,
    pub links: Vec<NodeLink>,
}

impl NodeGraph {
    pub fn add_node(&mut self, node: NodeDesc) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Returns false if either node does not exist.
    #[must_use]
    pub fn link(&mut self, from: (u32, &str), to: (u32, &str)) -> bool {
        let node_count = self.nodes.len() as u32;
        if from.0 >= node_count || to.0 >= node_count {
            return false;
        }
        self.links.push(NodeLink {
            from: SocketRef {
                node: from.0,
                socket: from.1.to_string(),
            },
            to: SocketRef {
                node: to.0,
                socket: to.1.to_string(),
            },
        });
        true
    }

    fn to_element(&self) -> Element {
        let socket_ref = |r: &SocketRef| {
            let mut element = Element::new();
            element.insert("node", r.node).insert("socket", r.socket.as_str());
            Property::Element(element)
        };
        let nodes = self
            .nodes
            .iter()
            .map(|n| Property::Element(n.to_element()))
            .collect::<Vec<_>>();
        let links = self
            .links
            .iter()
            .map(|l| {
                let mut element = Element::new();
                element
                    .insert("fromSocket", socket_ref(&l.from))
                    .insert("toSocket", socket_ref(&l.to));
                Property::Element(element)
            })
            .collect::<Vec<_>>();
        let mut element = Element::new();
        element.insert("nodes", nodes).insert("links", links);
        element
    }

    fn from_element(element: &Element) -> Result<Self, DecodeError> {
        let nodes = element
            .elements("nodes")?
            .map(|node| NodeDesc::from_element(node?))
            .collect::<Result<Vec<_>, _>>()?;
        let socket_ref = |element: &Element| -> Result<SocketRef, DecodeError> {
            let node: u32 = element.get_as("node")?;
            if node as usize >= nodes.len() {
                return Err(DecodeError::MissingNodeIndex {
                    index: node,
                    node_count: nodes.len(),
                });
            }
            Ok(SocketRef {
                node,
                socket: element.get_as("socket")?,
            })
        };
        let mut links = Vec::new();
        for link in element.elements("links")? {
            let link = link?;
            links.push(NodeLink {
                from: socket_ref(link.element("fromSocket")?)?,
                to: socket_ref(link.element("toSocket")?)?,
            });
        }
        Ok(Self { nodes, links })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderPass {
    Combined = 0,
    Albedo,
    Normal,
    Depth,
}

impl ShaderPass {
    pub const ALL: [ShaderPass; 4] = [
        ShaderPass::Combined,
        ShaderPass::Albedo,
        ShaderPass::Normal,
        ShaderPass::Depth,
    ];

    pub fn flag(self) -> u32 {
        1 << self as u32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HairConfig {
    pub segment_count: u32,
    pub hair_per_square_meter: f32,
    pub default_thickness: f32,
    pub default_length: f32,
    pub default_hair_strength: f32,
    pub random_hair_length_factor: f32,
    pub curvature: f32,
}

impl Default for HairConfig {
    fn default() -> Self {
        Self {
            segment_count: 1,
            hair_per_square_meter: 1_000_000.0,
            default_thickness: 0.1,
            default_length: 0.7,
            default_hair_strength: 0.2,
            random_hair_length_factor: 0.5,
            curvature: 0.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubdivisionSettings {
    pub max_level: u32,
    pub max_edge_screen_size: f32,
}

impl Default for SubdivisionSettings {
    fn default() -> Self {
        Self {
            max_level: 2,
            max_edge_screen_size: 0.0,
        }
    }
}

/// A shader definition. The graphs are carried as data and never evaluated here.
#[derive(Debug, Default)]
pub struct Shader {
    pub name: String,
    passes: [Option<NodeGraph>; 4],
    pub hair: Option<HairConfig>,
    pub subdivision: Option<SubdivisionSettings>,
    id: Cell<Option<u32>>,
}

impl Shader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn pass(&self, pass: ShaderPass) -> Option<&NodeGraph> {
        self.passes[pass as usize].as_ref()
    }

    pub fn set_pass(&mut self, pass: ShaderPass, graph: Option<NodeGraph>) {
        self.passes[pass as usize] = graph;
    }

    pub fn pass_flags(&self) -> u32 {
        ShaderPass::ALL
            .into_iter()
            .filter(|p| self.pass(*p).is_some())
            .fold(0, |flags, p| flags | p.flag())
    }

    /// Set by scene finalization, see [`crate::scene::Scene::finalize`].
    pub fn id(&self) -> Option<u32> {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.id.set(Some(id));
    }

    pub fn serialize(&self, element: &mut Element) {
        if let Some(hair) = &self.hair {
            let mut hair_element = Element::new();
            hair_element
                .insert("numSegments", hair.segment_count)
                .insert("hairPerSquareMeter", hair.hair_per_square_meter)
                .insert("defaultThickness", hair.default_thickness)
                .insert("defaultLength", hair.default_length)
                .insert("defaultHairStrength", hair.default_hair_strength)
                .insert("randomHairLengthFactor", hair.random_hair_length_factor)
                .insert("curvature", hair.curvature);
            element.insert("hairConfig", hair_element);
        }
        if let Some(subdivision) = &self.subdivision {
            let mut subdiv_element = Element::new();
            subdiv_element
                .insert("maxLevel", subdivision.max_level)
                .insert("maxEdgeScreenSize", subdivision.max_edge_screen_size);
            element.insert("subdiv", subdiv_element);
        }
        let passes = self
            .passes
            .iter()
            .map(|pass| match pass {
                Some(graph) => Property::Element(graph.to_element()),
                None => Property::Nil,
            })
            .collect::<Vec<_>>();
        element
            .insert("name", self.name.as_str())
            .insert("flags", self.pass_flags())
            .insert("passes", passes);
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let mut shader = Shader::new(element.get_as::<String>("name")?);
        if element.contains("hairConfig") {
            let hair = element.element("hairConfig")?;
            shader.hair = Some(HairConfig {
                segment_count: hair.get_as("numSegments")?,
                hair_per_square_meter: hair.get_as("hairPerSquareMeter")?,
                default_thickness: hair.get_as("defaultThickness")?,
                default_length: hair.get_as("defaultLength")?,
                default_hair_strength: hair.get_as("defaultHairStrength")?,
                random_hair_length_factor: hair.get_as("randomHairLengthFactor")?,
                curvature: hair.get_as("curvature")?,
            });
        }
        if element.contains("subdiv") {
            let subdiv = element.element("subdiv")?;
            shader.subdivision = Some(SubdivisionSettings {
                max_level: subdiv.get_as("maxLevel")?,
                max_edge_screen_size: subdiv.get_as("maxEdgeScreenSize")?,
            });
        }
        let flags: u32 = element.get_as("flags")?;
        let passes = element.array("passes")?;
        for pass in ShaderPass::ALL {
            if flags & pass.flag() == 0 {
                continue;
            }
            match passes.get(pass as usize) {
                Some(Property::Element(graph)) => {
                    shader.set_pass(pass, Some(NodeGraph::from_element(graph)?));
                }
                _ => {
                    return Err(DecodeError::LengthMismatch {
                        field: "passes",
                        expected: pass as usize + 1,
                        actual: passes.len(),
                    })
                }
            }
        }
        Ok(shader)
    }
}

/// Insertion ordered, index addressable list of shaders.
#[derive(Debug, Default)]
pub struct ShaderCache {
    shaders: Vec<PShader>,
}

impl ShaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shader(&mut self, shader: PShader) -> usize {
        self.shaders.push(shader);
        self.shaders.len() - 1
    }

    pub fn shader(&self, index: usize) -> Option<&PShader> {
        self.shaders.get(index)
    }

    pub fn shaders(&self) -> &[PShader] {
        &self.shaders
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Appends the other cache's shaders by reference.
    pub fn merge(&mut self, other: &ShaderCache) {
        self.shaders.extend(other.shaders.iter().cloned());
    }

    pub fn index_of(&self, shader: &PShader) -> Option<usize> {
        self.shaders.iter().position(|s| Rc::ptr_eq(s, shader))
    }

    /// Reverse lookup from shader identity to its index.
    pub fn shader_to_index_table(&self) -> HashMap<*const Shader, usize> {
        self.shaders
            .iter()
            .enumerate()
            .map(|(i, s)| (Rc::as_ptr(s), i))
            .collect()
    }

    pub fn serialize(&self, element: &mut Element) {
        let shaders = self
            .shaders
            .iter()
            .map(|shader| {
                let mut shader_element = Element::new();
                shader.serialize(&mut shader_element);
                Property::Element(shader_element)
            })
            .collect::<Vec<_>>();
        element.insert("shaders", shaders);
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let mut cache = ShaderCache::new();
        for shader in element.elements("shaders")? {
            cache.add_shader(Rc::new(Shader::deserialize(shader?)?));
        }
        Ok(cache)
    }
}
