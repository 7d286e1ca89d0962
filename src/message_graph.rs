//! Graph of embedded-message relationships, for recursion detection.

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::graph::NodeIndex;
use petgraph::Graph;

use crate::base_type::parse_type;
use crate::spec::MsgContext;

/// `MessageGraph` builds a graph of registered messages whose edges
/// correspond to direct (non-array) embedding. Flattening inlines exactly
/// those edges, so a cycle here means flattening would not terminate; array
/// fields serialize element-wise and are excluded.
pub struct MessageGraph {
    index: HashMap<String, NodeIndex>,
    graph: Graph<String, ()>,
}

impl MessageGraph {
    pub fn new(context: &MsgContext) -> MessageGraph {
        let mut msg_graph = MessageGraph {
            index: HashMap::new(),
            graph: Graph::new(),
        };

        let mut names: Vec<&str> = context.registered_names().collect();
        names.sort_unstable();
        for name in names {
            let spec = match context.get_registered(name) {
                Ok(spec) => spec,
                Err(_) => continue,
            };
            let msg_index = msg_graph.get_or_insert_index(name.to_string());
            for field in &spec.fields {
                let (_, is_array, _) = match parse_type(&field.ty) {
                    Ok(parsed) => parsed,
                    Err(_) => continue,
                };
                if is_array {
                    continue;
                }
                if let Some(embedded) = context.resolve(&spec.package, &field.ty) {
                    let field_index = msg_graph.get_or_insert_index(embedded);
                    msg_graph.graph.add_edge(msg_index, field_index, ());
                }
            }
        }
        msg_graph
    }

    fn get_or_insert_index(&mut self, msg_name: String) -> NodeIndex {
        let MessageGraph {
            ref mut index,
            ref mut graph,
        } = *self;
        *index
            .entry(msg_name.clone())
            .or_insert_with(|| graph.add_node(msg_name))
    }

    /// Returns true if message type `inner` is embedded, directly or
    /// transitively, inside message type `outer`.
    pub fn is_nested(&self, outer: &str, inner: &str) -> bool {
        let outer = match self.index.get(outer) {
            Some(outer) => *outer,
            None => return false,
        };
        let inner = match self.index.get(inner) {
            Some(inner) => *inner,
            None => return false,
        };
        self.graph
            .neighbors(outer)
            .any(|next| next == inner || has_path_connecting(&self.graph, next, inner, None))
    }

    /// Returns true if `msg_name` participates in an embedding cycle.
    pub fn is_recursive(&self, msg_name: &str) -> bool {
        self.is_nested(msg_name, msg_name)
    }
}
