//! Generated source for named types.
//!
//! One [`SourcePrinter`] exists per file qualifier. It renders the classes,
//! interfaces and named tuples routed to it as Python-like declarations,
//! records the source range of every statement it prints (the `.debug_pkl`
//! companion), and tracks the minimum file-format version its text needs.
//!
//! Printing is also discovery: every named type a declaration mentions is
//! printed under its unique name and reported through
//! [`PrintContext::discovered`], so the packager can route it to its own
//! printer. Tensor constants met in method bodies are moved into the shared
//! [`ConstantTable`] and printed as `CONSTANTS.c<i>`.

use mobex_ir::{
    Block, Graph, NodeId, NodeKind, OperatorName, SourceRange, Tensor, TypeId, TypeKind,
    TypePool, Value, ValueId,
};
use mobex_lower::GraphError;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::version::{BASE_FILE_FORMAT_VERSION, DIV_FILE_FORMAT_VERSION};
use crate::{ExportError, TypeNameUniquer};

const INDENT: &str = "  ";

// ── Constant table ──────────────────────────────────────────────────

/// Tensor constants referenced by generated source, in first-use order.
///
/// This is the global constant pool of one export session.
#[derive(Debug, Default)]
pub struct ConstantTable {
    values: Vec<Value>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of `tensor`, appending it the first time its storage is seen.
    pub fn intern_tensor(&mut self, tensor: &Tensor) -> usize {
        let existing = self.values.iter().position(|value| {
            value.as_tensor().is_some_and(|known| {
                known.shares_storage(tensor)
                    && known.dtype() == tensor.dtype()
                    && known.shape() == tensor.shape()
            })
        });
        existing.unwrap_or_else(|| {
            self.values.push(Value::Tensor(tensor.clone()));
            self.values.len() - 1
        })
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ── Print context ───────────────────────────────────────────────────

/// Session state every printer of one export shares.
pub struct PrintContext<'a> {
    pub pool: &'a TypePool,
    pub namer: &'a mut TypeNameUniquer,
    pub constants: &'a mut ConstantTable,
    /// Named types mentioned by printed text, in discovery order.
    pub discovered: &'a mut Vec<TypeId>,
}

impl PrintContext<'_> {
    /// Unique qualified name of a named type; reports it as discovered.
    fn type_name(&mut self, ty: TypeId) -> String {
        self.discovered.push(ty);
        self.namer.unique_name(self.pool, ty).qualified_name()
    }

    /// Annotation with every named type printed under its unique name.
    fn annotation(&mut self, ty: TypeId) -> String {
        let mut names: FxHashMap<TypeId, String> = FxHashMap::default();
        let mut pending = vec![ty];
        while let Some(current) = pending.pop() {
            if self.pool.is_named(current) {
                if !names.contains_key(&current) {
                    let name = self.type_name(current);
                    names.insert(current, name);
                }
            } else {
                pending.extend(self.pool.contained_types(current));
            }
        }
        self.pool
            .annotation_str_with(ty, &|named| names.get(&named).cloned())
    }
}

// ── Printer ─────────────────────────────────────────────────────────

/// Source accumulator for one file qualifier.
#[derive(Debug)]
pub struct SourcePrinter {
    text: String,
    /// `(byte offset into text, range)` for each statement with a range.
    ranges: Vec<(usize, SourceRange)>,
    printed: FxHashSet<TypeId>,
    /// Types in the order they were printed.
    order: Vec<TypeId>,
    min_version: u64,
}

impl Default for SourcePrinter {
    fn default() -> Self {
        Self {
            text: String::new(),
            ranges: Vec::new(),
            printed: FxHashSet::default(),
            order: Vec::new(),
            min_version: BASE_FILE_FORMAT_VERSION,
        }
    }
}

impl SourcePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn ranges(&self) -> &[(usize, SourceRange)] {
        &self.ranges
    }

    #[inline]
    pub fn min_version(&self) -> u64 {
        self.min_version
    }

    /// Types printed so far, in print order.
    #[inline]
    pub fn printed_types(&self) -> &[TypeId] {
        &self.order
    }

    /// Render `ty` unless it was already printed here. Returns whether
    /// anything was printed.
    ///
    /// Fails when a method body has a node missing its operands; the text
    /// printed so far is then incomplete.
    pub fn print_named_type(
        &mut self,
        ty: TypeId,
        ctx: &mut PrintContext<'_>,
    ) -> Result<bool, ExportError> {
        if !self.printed.insert(ty) {
            return Ok(false);
        }
        self.order.push(ty);
        let pool = ctx.pool;
        let base = ctx.namer.unique_name(pool, ty).name().to_owned();
        match pool.kind(ty) {
            TypeKind::Class(class) => {
                let base_kind = if class.is_module { "Module" } else { "object" };
                self.line(0, &format!("class {base}({base_kind}):"));
                if class.is_module {
                    let parameters = attribute_list(class, mobex_ir::AttributeKind::Parameter);
                    let buffers = attribute_list(class, mobex_ir::AttributeKind::Buffer);
                    self.line(1, &format!("__parameters__ = {parameters}"));
                    self.line(1, &format!("__buffers__ = {buffers}"));
                }
                for attribute in &class.attributes {
                    let annotation = ctx.annotation(attribute.ty);
                    self.line(1, &format!("{} : {annotation}", attribute.name));
                }
                for method in &class.methods {
                    if let Some(graph) = method.graph_body() {
                        self.print_method(method.name().name(), graph, ctx)
                            .map_err(|source| ExportError::MalformedMethod {
                                method: method.name().qualified_name(),
                                source,
                            })?;
                    }
                }
            }
            TypeKind::Interface(interface) => {
                self.line(0, &format!("class {base}(Interface):"));
                for method in &interface.methods {
                    let signature = method.signature();
                    let params: Vec<String> = std::iter::once(String::from("self"))
                        .chain(
                            signature
                                .inputs
                                .iter()
                                .enumerate()
                                .map(|(i, &ty)| format!("arg{i}: {}", ctx.annotation(ty))),
                        )
                        .collect();
                    let ret = self.return_annotation(&signature.outputs, ctx);
                    self.line(
                        1,
                        &format!("def {}({}) -> {ret}:", method.name().name(), params.join(", ")),
                    );
                    self.line(2, "pass");
                }
            }
            TypeKind::Tuple {
                elements,
                schema: Some(schema),
            } => {
                self.line(0, &format!("class {base}(NamedTuple):"));
                for (field, &ty) in schema.fields.iter().zip(elements) {
                    let annotation = ctx.annotation(ty);
                    self.line(1, &format!("{field} : {annotation}"));
                }
            }
            _ => {
                tracing::warn!(ty = ty.raw(), "asked to print an unnamed type");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.text.push_str(INDENT);
        }
        self.text.push_str(text);
        self.text.push('\n');
    }

    fn statement(&mut self, indent: usize, range: Option<&SourceRange>, text: &str) {
        if let Some(range) = range {
            self.ranges.push((self.text.len(), range.clone()));
        }
        self.line(indent, text);
    }

    fn return_annotation(&mut self, outputs: &[TypeId], ctx: &mut PrintContext<'_>) -> String {
        match outputs {
            [] => String::from("NoneType"),
            [single] => ctx.annotation(*single),
            many => {
                let parts: Vec<String> = many.iter().map(|&ty| ctx.annotation(ty)).collect();
                format!("Tuple[{}]", parts.join(", "))
            }
        }
    }

    // ── Method bodies ───────────────────────────────────────────────

    fn print_method(
        &mut self,
        name: &str,
        graph: &Graph,
        ctx: &mut PrintContext<'_>,
    ) -> Result<(), GraphError> {
        let params: Vec<String> = graph
            .inputs()
            .iter()
            .map(|&input| {
                format!(
                    "{}: {}",
                    value_name(graph, input),
                    ctx.annotation(graph.value_ty(input))
                )
            })
            .collect();
        let outputs: Vec<TypeId> = graph.outputs().iter().map(|&v| graph.value_ty(v)).collect();
        let ret = self.return_annotation(&outputs, ctx);
        self.line(1, &format!("def {name}({}) -> {ret}:", params.join(", ")));

        let literals = graph
            .walk()
            .into_iter()
            .filter_map(|id| match (&graph.node(id).kind, graph.node(id).outputs.first()) {
                (NodeKind::Constant(_), Some(&output)) => Some((output, id)),
                _ => None,
            })
            .collect();
        let mut body = BodyPrinter {
            printer: self,
            graph,
            literals,
        };
        body.block(graph.block(), 2, ctx)
    }
}

fn attribute_list(class: &mobex_ir::ClassType, kind: mobex_ir::AttributeKind) -> String {
    let names: Vec<String> = class
        .attributes
        .iter()
        .filter(|attr| attr.kind == kind)
        .map(|attr| format!("\"{}\", ", attr.name))
        .collect();
    format!("[{}]", names.concat())
}

fn value_name(graph: &Graph, value: ValueId) -> String {
    match &graph.value(value).debug_name {
        Some(name) => name.clone(),
        None => format!("_{}", value.raw()),
    }
}

/// `aten::add` prints as `torch.add`; other namespaces as `ops.<ns>.<name>`.
fn callee(operator: &OperatorName) -> String {
    match operator.name.split_once("::") {
        Some(("aten", name)) => format!("torch.{name}"),
        Some((namespace, name)) => format!("ops.{namespace}.{name}"),
        None => operator.name.clone(),
    }
}

struct BodyPrinter<'p, 'g> {
    printer: &'p mut SourcePrinter,
    graph: &'g Graph,
    /// Constant outputs, printed inline at each use.
    literals: FxHashMap<ValueId, NodeId>,
}

impl BodyPrinter<'_, '_> {
    fn block(
        &mut self,
        block: &Block,
        indent: usize,
        ctx: &mut PrintContext<'_>,
    ) -> Result<(), GraphError> {
        for &id in &block.nodes {
            self.node(id, indent, ctx)?;
        }
        Ok(())
    }

    fn expr(&self, value: ValueId, ctx: &mut PrintContext<'_>) -> String {
        let constant = self
            .literals
            .get(&value)
            .map(|&id| &self.graph.node(id).kind);
        match constant {
            Some(NodeKind::Constant(literal)) => render_literal(literal, ctx),
            _ => value_name(self.graph, value),
        }
    }

    fn exprs(&self, values: &[ValueId], ctx: &mut PrintContext<'_>) -> Vec<String> {
        values.iter().map(|&v| self.expr(v, ctx)).collect()
    }

    fn assign(&self, outputs: &[ValueId], rhs: &str) -> String {
        match outputs {
            [] => rhs.to_owned(),
            [single] => format!("{} = {rhs}", value_name(self.graph, *single)),
            many => {
                let names: Vec<String> = many.iter().map(|&v| value_name(self.graph, v)).collect();
                format!("{} = {rhs}", names.join(", "))
            }
        }
    }

    fn node(
        &mut self,
        id: NodeId,
        indent: usize,
        ctx: &mut PrintContext<'_>,
    ) -> Result<(), GraphError> {
        let graph = self.graph;
        let node = graph.node(id);
        let range = node.source_range.as_ref();
        let args = self.exprs(&node.inputs, ctx);
        let output_ty = || node.outputs.first().map_or(TypeId::ANY, |&v| graph.value_ty(v));
        let operand = |index: usize| {
            args.get(index)
                .ok_or_else(|| GraphError::missing_operand(node, index + 1))
        };

        let statement = match &node.kind {
            NodeKind::Constant(_) => return Ok(()),
            NodeKind::If => return self.if_node(id, indent, ctx),
            NodeKind::Operator { name, .. } => {
                if name.name == "aten::div" {
                    self.printer.min_version = self.printer.min_version.max(DIV_FILE_FORMAT_VERSION);
                }
                self.assign(&node.outputs, &format!("{}({})", callee(name), args.join(", ")))
            }
            NodeKind::GetAttr { name } => {
                self.assign(&node.outputs, &format!("{}.{name}", operand(0)?))
            }
            NodeKind::SetAttr { name } => format!("{}.{name} = {}", operand(0)?, operand(1)?),
            NodeKind::CallMethod { name } => {
                let [receiver, rest @ ..] = args.as_slice() else {
                    return Err(GraphError::missing_operand(node, 1));
                };
                self.assign(
                    &node.outputs,
                    &format!("({receiver}).{name}({})", rest.join(", ")),
                )
            }
            NodeKind::CallFunction { function } => self.assign(
                &node.outputs,
                &format!("{}({})", function.name(), args.join(", ")),
            ),
            NodeKind::TupleConstruct => self.assign(&node.outputs, &tuple_literal(&args)),
            NodeKind::NamedTupleConstruct => {
                let ty = ctx.type_name(output_ty());
                self.assign(&node.outputs, &format!("{ty}({})", args.join(", ")))
            }
            NodeKind::ListConstruct => {
                let annotation = ctx.annotation(output_ty());
                let rhs = format!("annotate({annotation}, [{}])", args.join(", "));
                self.assign(&node.outputs, &rhs)
            }
            NodeKind::DictConstruct => {
                let entries: Vec<String> = args
                    .chunks(2)
                    .map(|pair| pair.join(": "))
                    .collect();
                self.assign(&node.outputs, &format!("{{{}}}", entries.join(", ")))
            }
            NodeKind::ListUnpack => {
                let names: Vec<String> = node
                    .outputs
                    .iter()
                    .map(|&v| value_name(graph, v))
                    .collect();
                let trailing = if names.len() == 1 { "," } else { "" };
                format!("{}{trailing} = {}", names.join(", "), operand(0)?)
            }
            NodeKind::TupleSlice { begin, end } => {
                self.assign(&node.outputs, &format!("{}[{begin}:{end}]", operand(0)?))
            }
            NodeKind::CreateObject => {
                let ty = ctx.type_name(output_ty());
                self.assign(&node.outputs, &format!("{ty}.__new__({ty})"))
            }
            NodeKind::IsInstance { types } => {
                let names: Vec<String> = types.iter().map(|&ty| ctx.annotation(ty)).collect();
                let rhs = format!("isinstance({}, {})", operand(0)?, tuple_literal(&names));
                self.assign(&node.outputs, &rhs)
            }
            NodeKind::Warn => format!("torch.warn({})", args.join(", ")),
            NodeKind::Return => match args.as_slice() {
                [] => String::from("return None"),
                [single] => format!("return {single}"),
                many => format!("return {}", tuple_literal(many)),
            },
        };
        self.printer.statement(indent, range, &statement);
        Ok(())
    }

    fn if_node(
        &mut self,
        id: NodeId,
        indent: usize,
        ctx: &mut PrintContext<'_>,
    ) -> Result<(), GraphError> {
        let graph = self.graph;
        let node = graph.node(id);
        let Some(&cond) = node.inputs.first() else {
            return Err(GraphError::MalformedIf);
        };
        let cond = self.expr(cond, ctx);
        self.printer
            .statement(indent, node.source_range.as_ref(), &format!("if {cond}:"));
        for (i, block) in node.blocks.iter().enumerate() {
            if i > 0 {
                self.printer.line(indent, "else:");
            }
            let before = self.printer.text.len();
            self.block(block, indent + 1, ctx)?;
            for (&output, &value) in node.outputs.iter().zip(&block.outputs) {
                let rhs = self.expr(value, ctx);
                let name = value_name(graph, output);
                self.printer.line(indent + 1, &format!("{name} = {rhs}"));
            }
            if self.printer.text.len() == before {
                self.printer.line(indent + 1, "pass");
            }
        }
        Ok(())
    }
}

fn tuple_literal(items: &[String]) -> String {
    match items {
        [single] => format!("({single},)"),
        _ => format!("({})", items.join(", ")),
    }
}

fn render_literal(value: &Value, ctx: &mut PrintContext<'_>) -> String {
    match value {
        Value::Tensor(tensor) => format!("CONSTANTS.c{}", ctx.constants.intern_tensor(tensor)),
        Value::Tuple(items) => {
            let items: Vec<String> = items.iter().map(|v| render_literal(v, ctx)).collect();
            tuple_literal(&items)
        }
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(|v| render_literal(v, ctx)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Dict(entries) => {
            let entries: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", render_literal(k, ctx), render_literal(v, ctx)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Value::Object(object) => format!("{}.__new__()", ctx.type_name(object.ty())),
        scalar => scalar.to_string(),
    }
}
