//! Python syntax lowered from a tree-sitter parse into the small expression
//! model graph extraction works on.
//!
//! Only the shapes extraction distinguishes get their own [`ExprKind`]
//! variant; everything else is [`ExprKind::Other`] and is represented by its
//! source text.

use tree_sitter::{Node, Parser, Tree};

use crate::error::ExtractError;
use crate::extract::literal::{cleandoc, decode_segment, StringPrefix};

/// A piece of an f-string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FStringPart {
    Literal(String),
    /// Source text of the interpolated expression, without braces.
    Interpolation(String),
}

/// A keyword argument; `arg` is `None` for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

/// A call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    pub keywords: Vec<Keyword>,
    /// 1-based source line of the call.
    pub line: usize,
}

impl Call {
    /// Attribute name when the callee is `<value>.<attr>`.
    pub fn method(&self) -> Option<&str> {
        match &self.func.kind {
            ExprKind::Attribute { attr, .. } => Some(attr),
            _ => None,
        }
    }

    /// Receiver name when the callee is `<name>.<attr>`.
    pub fn receiver(&self) -> Option<&str> {
        match &self.func.kind {
            ExprKind::Attribute { value, .. } => match &value.kind {
                ExprKind::Name(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Bare or attribute callee name: `f(...)` and `m.f(...)` both give `f`.
    pub fn callee(&self) -> Option<&str> {
        match &self.func.kind {
            ExprKind::Name(name) => Some(name),
            _ => self.method(),
        }
    }

    /// First keyword argument named `name`.
    pub fn keyword(&self, name: &str) -> Option<&Expr> {
        self.keywords
            .iter()
            .find(|k| k.arg.as_deref() == Some(name))
            .map(|k| &k.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A plain (non-f, non-bytes) string literal, decoded.
    Str(String),
    FString(Vec<FStringPart>),
    /// Any other literal (number, bytes, `True`, `None`); the value is the
    /// expression's source text.
    Constant,
    Name(String),
    Attribute { value: Box<Expr>, attr: String },
    Call(Call),
    List(Vec<Expr>),
    Other,
}

/// A lowered expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub source: String,
}

impl Expr {
    /// Literal value as text, if this is a literal.
    pub fn literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str(s) => Some(s),
            ExprKind::Constant => Some(&self.source),
            _ => None,
        }
    }

    /// The bare name, if this is one.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Identifier-style rendering: literal value, bare name, or source text.
    pub fn identifier(&self) -> String {
        match &self.kind {
            ExprKind::Name(name) => name.clone(),
            _ => self.literal().unwrap_or(&self.source).to_string(),
        }
    }

    /// Readable text of a string or f-string; interpolations are rendered as
    /// `{<expression source>}`.
    pub fn rendered_text(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Str(s) => Some(s.clone()),
            ExprKind::FString(parts) => Some(
                parts
                    .iter()
                    .map(|p| match p {
                        FStringPart::Literal(s) => s.clone(),
                        FStringPart::Interpolation(src) => format!("{{{}}}", src),
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }
}

/// A top-level function definition.
#[derive(Debug, Clone)]
pub struct FunctionDef<'t> {
    pub name: String,
    /// The `function_definition` node.
    pub node: Node<'t>,
    /// Positional parameter names (positional-only ones excluded).
    pub params: Vec<String>,
    pub docstring: Option<String>,
}

/// A top-level `targets = <call>` assignment.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// Plain-name targets, chained assignments included.
    pub targets: Vec<String>,
    pub value: Expr,
}

/// A parsed Python module.
pub struct SourceTree {
    source: String,
    tree: Tree,
}

impl SourceTree {
    /// Parses `source`, rejecting it if the parse contains syntax errors.
    pub fn parse(source: &str) -> Result<Self, ExtractError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ExtractError::ParserSetup {
                message: e.to_string(),
            })?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ExtractError::ParserSetup {
                message: "parser produced no tree".to_string(),
            })?;

        let root = tree.root_node();
        if root.has_error() {
            let mut at = root;
            preorder(root, |n| {
                if (n.is_error() || n.is_missing()) && at == root {
                    at = n;
                }
            });
            let pos = at.start_position();
            return Err(ExtractError::Syntax {
                line: pos.row + 1,
                column: pos.column + 1,
            });
        }

        Ok(SourceTree {
            source: source.to_string(),
            tree,
        })
    }

    /// The module node.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn top_level(&self) -> Vec<Node<'_>> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        root.named_children(&mut cursor).collect()
    }

    /// Top-level, non-async function definitions in source order, decorated
    /// ones included.
    pub fn functions(&self) -> Vec<FunctionDef<'_>> {
        self.top_level()
            .into_iter()
            .filter_map(|stmt| match stmt.kind() {
                "function_definition" => Some(stmt),
                "decorated_definition" => stmt
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                _ => None,
            })
            .filter(|def| !is_async(*def))
            .filter_map(|def| {
                let name = self.text(def.child_by_field_name("name")?).to_string();
                Some(FunctionDef {
                    name,
                    node: def,
                    params: self.positional_params(def),
                    docstring: self.docstring(def),
                })
            })
            .collect()
    }

    /// Top-level assignments whose value is a call.
    pub fn call_assignments(&self) -> Vec<Assignment> {
        let mut out = Vec::new();
        for stmt in self.top_level() {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let mut cursor = stmt.walk();
            let Some(assign) = stmt
                .named_children(&mut cursor)
                .find(|n| n.kind() == "assignment")
            else {
                continue;
            };
            // `x: T = v` is an annotated assignment, not a plain one.
            if assign.child_by_field_name("type").is_some() {
                continue;
            }

            let mut targets = Vec::new();
            let mut current = assign;
            let value = loop {
                if let Some(left) = current.child_by_field_name("left") {
                    if left.kind() == "identifier" {
                        targets.push(self.text(left).to_string());
                    }
                }
                match current.child_by_field_name("right") {
                    Some(right) if right.kind() == "assignment" => current = right,
                    other => break other,
                }
            };
            let Some(value) = value else {
                continue;
            };
            let value = self.lower(value);
            if value.as_call().is_some() {
                out.push(Assignment { targets, value });
            }
        }
        out
    }

    /// Every call inside `node`, pre-order and left to right.
    pub fn calls_in(&self, node: Node<'_>) -> Vec<Call> {
        let mut nodes = Vec::new();
        preorder(node, |n| {
            if n.kind() == "call" {
                nodes.push(n);
            }
        });
        nodes
            .into_iter()
            .filter_map(|n| match self.lower(n).kind {
                ExprKind::Call(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Lowers an expression node.
    pub fn lower(&self, node: Node<'_>) -> Expr {
        let source = self.text(node).to_string();
        let kind = match node.kind() {
            "string" | "concatenated_string" => self.lower_string(node),
            "identifier" => ExprKind::Name(source.clone()),
            "integer" | "float" | "true" | "false" | "none" | "ellipsis" => ExprKind::Constant,
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node
                    .named_children(&mut cursor)
                    .find(|n| n.kind() != "comment");
                return match inner {
                    Some(inner) => self.lower(inner),
                    None => Expr {
                        kind: ExprKind::Other,
                        source,
                    },
                };
            }
            "attribute" => match (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                (Some(object), Some(attr)) => ExprKind::Attribute {
                    value: Box::new(self.lower(object)),
                    attr: self.text(attr).to_string(),
                },
                _ => ExprKind::Other,
            },
            "call" => self.lower_call(node).map_or(ExprKind::Other, ExprKind::Call),
            "list" => {
                let mut cursor = node.walk();
                let elts = node
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| self.lower(n))
                    .collect();
                ExprKind::List(elts)
            }
            _ => ExprKind::Other,
        };
        Expr { kind, source }
    }

    fn lower_call(&self, node: Node<'_>) -> Option<Call> {
        let func = self.lower(node.child_by_field_name("function")?);
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "argument_list" {
                let mut cursor = arguments.walk();
                for arg in arguments.named_children(&mut cursor) {
                    match arg.kind() {
                        "comment" => {}
                        "keyword_argument" => {
                            let (Some(name), Some(value)) = (
                                arg.child_by_field_name("name"),
                                arg.child_by_field_name("value"),
                            ) else {
                                continue;
                            };
                            keywords.push(Keyword {
                                arg: Some(self.text(name).to_string()),
                                value: self.lower(value),
                            });
                        }
                        "dictionary_splat" => keywords.push(Keyword {
                            arg: None,
                            value: Expr {
                                kind: ExprKind::Other,
                                source: self.text(arg).to_string(),
                            },
                        }),
                        _ => args.push(self.lower(arg)),
                    }
                }
            } else {
                // A bare generator argument: `f(x for x in y)`.
                args.push(self.lower(arguments));
            }
        }
        Some(Call {
            func: Box::new(func),
            args,
            keywords,
            line: node.start_position().row + 1,
        })
    }

    fn lower_string(&self, node: Node<'_>) -> ExprKind {
        let pieces: Vec<Node<'_>> = if node.kind() == "concatenated_string" {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .filter(|n| n.kind() == "string")
                .collect()
        } else {
            vec![node]
        };

        let mut parts = Vec::new();
        let mut any_format = false;
        let mut any_bytes = false;
        for piece in pieces {
            let mut cursor = piece.walk();
            let children: Vec<Node<'_>> = piece.named_children(&mut cursor).collect();
            let prefix = children
                .iter()
                .find(|c| c.kind() == "string_start")
                .map(|c| StringPrefix::from_start_token(self.text(*c)))
                .unwrap_or_default();
            any_format |= prefix.format;
            any_bytes |= prefix.bytes;
            for child in children {
                match child.kind() {
                    "string_content" => {
                        parts.push(FStringPart::Literal(decode_segment(self.text(child), prefix)));
                    }
                    "interpolation" => {
                        let expr = child
                            .child_by_field_name("expression")
                            .map(|e| self.text(e).to_string())
                            .unwrap_or_default();
                        parts.push(FStringPart::Interpolation(expr));
                    }
                    _ => {}
                }
            }
        }

        if any_bytes {
            ExprKind::Constant
        } else if any_format {
            ExprKind::FString(merge_literals(parts))
        } else {
            ExprKind::Str(
                parts
                    .into_iter()
                    .map(|p| match p {
                        FStringPart::Literal(s) | FStringPart::Interpolation(s) => s,
                    })
                    .collect(),
            )
        }
    }

    fn positional_params(&self, def: Node<'_>) -> Vec<String> {
        let Some(params) = def.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut names = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "identifier" => names.push(self.text(param).to_string()),
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = param.child_by_field_name("name") {
                        names.push(self.text(name).to_string());
                    }
                }
                "typed_parameter" => {
                    let mut inner = param.walk();
                    let first = param.named_children(&mut inner).next();
                    match first {
                        Some(n) if n.kind() == "identifier" => names.push(self.text(n).to_string()),
                        // `*args: T` ends the positional parameters.
                        Some(n) if n.kind() == "list_splat_pattern" => break,
                        _ => {}
                    }
                }
                // everything before `/` is positional-only
                "positional_separator" => names.clear(),
                "list_splat_pattern" | "keyword_separator" => break,
                _ => {}
            }
        }
        names
    }

    fn docstring(&self, def: Node<'_>) -> Option<String> {
        let body = def.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment")?;
        if first.kind() != "expression_statement" || first.named_child_count() != 1 {
            return None;
        }
        let mut inner = first.walk();
        let expr = first.named_children(&mut inner).next()?;
        match self.lower(expr).kind {
            ExprKind::Str(text) => Some(cleandoc(&text)),
            _ => None,
        }
    }
}

fn is_async(def: Node<'_>) -> bool {
    let mut cursor = def.walk();
    let first = def.children(&mut cursor).next();
    first.is_some_and(|c| c.kind() == "async")
}

fn merge_literals(parts: Vec<FStringPart>) -> Vec<FStringPart> {
    let mut merged: Vec<FStringPart> = Vec::with_capacity(parts.len());
    for part in parts {
        match (merged.last_mut(), part) {
            (Some(FStringPart::Literal(prev)), FStringPart::Literal(s)) => prev.push_str(&s),
            (_, part) => merged.push(part),
        }
    }
    merged
}

/// Visits `root` and its descendants in pre-order.
fn preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    'walk: loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_call(src: &str) -> Call {
        let tree = SourceTree::parse(src).unwrap();
        let root = tree.tree.root_node();
        tree.calls_in(root).into_iter().next().unwrap()
    }

    #[test]
    fn syntax_errors_report_location() {
        let err = SourceTree::parse("def broken(:\n    pass\n").err().unwrap();
        assert!(matches!(err, ExtractError::Syntax { line: 1, .. }), "{:?}", err);
    }

    #[test]
    fn lowers_call_arguments() {
        let call = single_call("graph.add_node(\"start\", handler, retries=3)\n");
        assert_eq!(call.method(), Some("add_node"));
        assert_eq!(call.receiver(), Some("graph"));
        assert_eq!(call.args[0].kind, ExprKind::Str("start".into()));
        assert_eq!(call.args[1].kind, ExprKind::Name("handler".into()));
        assert_eq!(call.keyword("retries").unwrap().literal(), Some("3"));
        assert_eq!(call.line, 1);
    }

    #[test]
    fn identifier_falls_back_to_source() {
        let call = single_call("g.add_edge(NODES[0], (\"end\"))\n");
        assert_eq!(call.args[0].identifier(), "NODES[0]");
        assert_eq!(call.args[1].identifier(), "end");
    }

    #[test]
    fn f_strings_keep_interpolations() {
        let call = single_call("f(f\"Hi {user['name']}, {{braces}} \\n{n + 1}\")\n");
        assert_eq!(
            call.args[0].rendered_text().unwrap(),
            "Hi {user['name']}, {braces} \n{n + 1}"
        );
    }

    #[test]
    fn concatenated_strings_join() {
        let call = single_call("f('a' \"b\", 'x' f'{y}')\n");
        assert_eq!(call.args[0].kind, ExprKind::Str("ab".into()));
        assert_eq!(call.args[1].rendered_text().unwrap(), "x{y}");
    }

    #[test]
    fn functions_and_params() {
        let src = "\
def plain(a, b=1, *args, c, **kw):
    '''  Doc.

    More.
    '''
    return a

@decorated
def wrapped(x: int, y: str = 'y', /, z=0):
    pass

async def skipped(q):
    pass

class C:
    def method(self):
        pass
";
        let tree = SourceTree::parse(src).unwrap();
        let funcs = tree.functions();
        let names: Vec<&str> = funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["plain", "wrapped"]);
        assert_eq!(funcs[0].params, vec!["a", "b"]);
        assert_eq!(funcs[0].docstring.as_deref(), Some("Doc.\n\nMore."));
        assert_eq!(funcs[1].params, vec!["z"]);
        assert_eq!(funcs[1].docstring, None);
    }

    #[test]
    fn f_string_docstring_is_not_a_docstring() {
        let tree = SourceTree::parse("def f():\n    f'''doc {x}'''\n").unwrap();
        assert_eq!(tree.functions()[0].docstring, None);
    }

    #[test]
    fn call_assignments_collect_chained_targets() {
        let src = "\
llm = fast = ChatOpenAI(model=\"gpt-4o\")
typed: Client = Client(model=\"x\")
count = 3
a.b = Thing(model=\"y\")
";
        let tree = SourceTree::parse(src).unwrap();
        let assigns = tree.call_assignments();
        assert_eq!(assigns.len(), 2);
        assert_eq!(assigns[0].targets, vec!["llm", "fast"]);
        assert_eq!(
            assigns[0].value.as_call().unwrap().keyword("model").unwrap().literal(),
            Some("gpt-4o")
        );
        assert!(assigns[1].targets.is_empty());
    }

    #[test]
    fn calls_are_preorder() {
        let tree = SourceTree::parse("outer(inner(a), other())\nlast()\n").unwrap();
        let calls = tree.calls_in(tree.tree.root_node());
        let names: Vec<&str> = calls.iter().filter_map(|c| c.callee()).collect();
        assert_eq!(names, vec!["outer", "inner", "other", "last"]);
    }
}
