//! The parsed-operation contract. An upstream GraphQL parser produces these
//! types; the compiler only consumes them. Fields form a flat sequence in
//! parent-before-child order, roots carrying a parent id of −1.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldType {
    /// A plain field selecting a table, column or function.
    #[default]
    Normal,
    /// A synthetic companion field (e.g. `<name>_cursor`) skipped by the
    /// compiler.
    Keyword,
    /// A field whose selection set is made of inline fragments.
    Union,
    /// One `... on Table` fragment under a union field.
    Member,
}

/// Value-node kinds produced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Str,
    Num,
    Bool,
    Var,
    Obj,
    List,
    /// A bare identifier, e.g. an order keyword or a column reference.
    Label,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeType::Str => "string",
            NodeType::Num => "number",
            NodeType::Bool => "boolean",
            NodeType::Var => "variable",
            NodeType::Obj => "object",
            NodeType::List => "list",
            NodeType::Label => "label",
        };
        f.write_str(s)
    }
}

/// A parsed value. Object children carry their key in `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub node_type: NodeType,
    pub name: String,
    pub val: String,
    pub children: Vec<Node>,
}

impl Node {
    fn leaf(node_type: NodeType, val: &str) -> Self {
        Node {
            node_type,
            name: String::new(),
            val: val.to_string(),
            children: Vec::new(),
        }
    }

    pub fn str(val: &str) -> Self {
        Self::leaf(NodeType::Str, val)
    }

    pub fn num(val: &str) -> Self {
        Self::leaf(NodeType::Num, val)
    }

    pub fn bool(val: bool) -> Self {
        Self::leaf(NodeType::Bool, if val { "true" } else { "false" })
    }

    /// A variable reference; `name` is given without the `$` sigil.
    pub fn var(name: &str) -> Self {
        Self::leaf(NodeType::Var, name)
    }

    pub fn label(val: &str) -> Self {
        Self::leaf(NodeType::Label, val)
    }

    pub fn obj(entries: impl IntoIterator<Item = (&'static str, Node)>) -> Self {
        let children = entries
            .into_iter()
            .map(|(k, mut v)| {
                v.name = k.to_string();
                v
            })
            .collect();
        Node {
            node_type: NodeType::Obj,
            name: String::new(),
            val: String::new(),
            children,
        }
    }

    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Node {
            node_type: NodeType::List,
            name: String::new(),
            val: String::new(),
            children: items.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub val: Node,
}

impl Arg {
    pub fn new(name: &str, val: Node) -> Self {
        Arg {
            name: name.to_string(),
            val,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<Arg>,
}

impl Directive {
    pub fn new(name: &str, args: impl IntoIterator<Item = Arg>) -> Self {
        Directive {
            name: name.to_string(),
            args: args.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub id: i32,
    pub parent_id: i32,
    pub field_type: FieldType,
    pub name: String,
    pub alias: String,
    pub args: Vec<Arg>,
    pub directives: Vec<Directive>,
    pub children: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op_type: OpType,
    pub name: String,
    pub directives: Vec<Directive>,
    pub fields: Vec<Field>,
}

impl Operation {
    pub fn new(op_type: OpType, name: &str) -> Self {
        Operation {
            op_type,
            name: name.to_string(),
            directives: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn query(name: &str) -> Self {
        Self::new(OpType::Query, name)
    }

    pub fn mutation(name: &str) -> Self {
        Self::new(OpType::Mutation, name)
    }

    pub fn subscription(name: &str) -> Self {
        Self::new(OpType::Subscription, name)
    }

    /// Appends a field under `parent_id` (−1 for a root) and returns its id.
    pub fn push_field(&mut self, parent_id: i32, name: &str) -> i32 {
        self.push_typed_field(parent_id, FieldType::Normal, name)
    }

    pub fn push_typed_field(&mut self, parent_id: i32, field_type: FieldType, name: &str) -> i32 {
        let id = self.fields.len() as i32;
        self.fields.push(Field {
            id,
            parent_id,
            field_type,
            name: name.to_string(),
            ..Default::default()
        });
        if parent_id >= 0 {
            self.fields[parent_id as usize].children.push(id);
        }
        id
    }

    pub fn field_mut(&mut self, id: i32) -> &mut Field {
        &mut self.fields[id as usize]
    }
}
