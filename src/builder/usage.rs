//! Usage extraction: the walk over a method/constructor body that records
//! local-variable declarations and dotted name references, in body order.
//!
//! The extractor deliberately resolves nothing. A chain head may be a local,
//! a field, or a class name; refactoring clients decide by cross-referencing
//! the `LocalVariable` items seen so far and the class's field table, which
//! is why a declarator is emitted before the usage items of its own
//! initializer.

use tree_sitter::Node;

use crate::model::UsageItem;

pub fn extract_usages(body: Node, source: &str) -> Vec<UsageItem> {
    let mut walker = UsageWalker {
        source,
        items: Vec::new(),
    };
    walker.visit_children(body);
    walker.items
}

struct UsageWalker<'a> {
    source: &'a str,
    items: Vec<UsageItem>,
}

impl<'a> UsageWalker<'a> {
    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node) {
        match node.kind() {
            "local_variable_declaration" => self.visit_local_declaration(node),
            "enhanced_for_statement" => {
                // The loop variable is a local declaration, scoped over the
                // loop body but emitted before the iterable's names to keep
                // declaration-before-use ordering simple for clients.
                if let (Some(ty), Some(name)) = (
                    node.child_by_field_name("type"),
                    node.child_by_field_name("name"),
                ) {
                    self.push_local(self.node_text(name), self.node_text(ty));
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body);
                }
            }
            "resource" => {
                // try-with-resources introduces a local when it declares one;
                // a bare identifier resource is an ordinary expression name.
                match (
                    node.child_by_field_name("type"),
                    node.child_by_field_name("name"),
                ) {
                    (Some(ty), Some(name)) => {
                        self.push_local(self.node_text(name), self.node_text(ty));
                        if let Some(value) = node.child_by_field_name("value") {
                            self.visit(value);
                        }
                    }
                    _ => self.visit_children(node),
                }
            }
            "catch_formal_parameter" => {
                let mut declared_type = String::new();
                let mut identifier = None;
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "catch_type" => declared_type = self.node_text(child).to_string(),
                        "identifier" => identifier = Some(self.node_text(child).to_string()),
                        _ => {}
                    }
                }
                if let Some(identifier) = identifier {
                    self.items.push(UsageItem::LocalVariable {
                        identifier,
                        declared_type,
                    });
                }
            }
            "field_access" => match self.flatten_chain(node) {
                Some(identifiers) => self.items.push(UsageItem::ExpressionName { identifiers }),
                // Impure chain (call or index in the middle): walk the
                // receiver for the pure names it contains. The member name
                // right of the dot is not a standalone expression name.
                None => {
                    if let Some(object) = node.child_by_field_name("object") {
                        self.visit(object);
                    }
                }
            },
            "method_invocation" => {
                // The invocation name is not an expression name; the
                // receiver and arguments are walked normally.
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.visit_children(arguments);
                }
            }
            "lambda_expression" => {
                // Lambda parameters are declarations of a different scope;
                // only the body produces usage items.
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit(body);
                }
            }
            "identifier" => {
                if self.is_expression_position(node) {
                    self.items.push(UsageItem::ExpressionName {
                        identifiers: vec![self.node_text(node).to_string()],
                    });
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_local_declaration(&mut self, node: Node) {
        let declared_type = node
            .child_by_field_name("type")
            .map(|t| self.node_text(t).to_string())
            .unwrap_or_default();
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            if let Some(name) = declarator.child_by_field_name("name") {
                self.push_local(self.node_text(name), &declared_type);
            }
            if let Some(value) = declarator.child_by_field_name("value") {
                self.visit(value);
            }
        }
    }

    fn push_local(&mut self, identifier: &str, declared_type: &str) {
        self.items.push(UsageItem::LocalVariable {
            identifier: identifier.to_string(),
            declared_type: declared_type.to_string(),
        });
    }

    /// Labels and break/continue targets look like identifiers but are not
    /// expression names.
    fn is_expression_position(&self, node: Node) -> bool {
        !matches!(
            node.parent().map(|p| p.kind()).unwrap_or(""),
            "labeled_statement" | "break_statement" | "continue_statement"
        )
    }

    /// Flatten `a.b.c` / `this.x` / `super.x` into its identifier chain.
    /// Returns `None` when any link is not a plain name.
    fn flatten_chain(&self, node: Node) -> Option<Vec<String>> {
        match node.kind() {
            "identifier" | "this" | "super" => Some(vec![self.node_text(node).to_string()]),
            "field_access" => {
                let object = node.child_by_field_name("object")?;
                let field = node.child_by_field_name("field")?;
                let mut chain = self.flatten_chain(object)?;
                chain.push(self.node_text(field).to_string());
                Some(chain)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UsageItem;
    use crate::parser;

    /// Parse a class with one method and extract usages from its body.
    fn usages_of(body: &str) -> Vec<UsageItem> {
        let source = format!("class T {{ void m() {}\n}}\n", body);
        let tree = parser::parse_source(&source).unwrap();
        let class_decl = tree.root_node().child(0).unwrap();
        let class_body = class_decl.child_by_field_name("body").unwrap();
        let mut cursor = class_body.walk();
        let method = class_body
            .children(&mut cursor)
            .find(|n| n.kind() == "method_declaration")
            .unwrap();
        let method_body = method.child_by_field_name("body").unwrap();
        extract_usages(method_body, &source)
    }

    fn local(identifier: &str, declared_type: &str) -> UsageItem {
        UsageItem::LocalVariable {
            identifier: identifier.into(),
            declared_type: declared_type.into(),
        }
    }

    fn name(chain: &[&str]) -> UsageItem {
        UsageItem::ExpressionName {
            identifiers: chain.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn local_declaration_before_initializer_names() {
        let items = usages_of("{ int x = y; }");
        assert_eq!(items, vec![local("x", "int"), name(&["y"])]);
    }

    #[test]
    fn multi_declarator_statement() {
        let items = usages_of("{ int a = 1, b = a; }");
        assert_eq!(items, vec![local("a", "int"), local("b", "int"), name(&["a"])]);
    }

    #[test]
    fn this_field_chain() {
        let items = usages_of("{ this.x = 1; }");
        assert_eq!(items, vec![name(&["this", "x"])]);
    }

    #[test]
    fn long_dotted_chain() {
        let items = usages_of("{ a.b.c = 2; }");
        assert_eq!(items, vec![name(&["a", "b", "c"])]);
    }

    #[test]
    fn method_invocation_name_is_not_recorded() {
        let items = usages_of("{ obj.run(arg); }");
        assert_eq!(items, vec![name(&["obj"]), name(&["arg"])]);
    }

    #[test]
    fn impure_chain_records_inner_names_only() {
        // a.b() breaks the chain; `a` and `arg` are still names.
        let items = usages_of("{ a.b(arg).c = 1; }");
        assert!(items.contains(&name(&["a"])), "items: {:?}", items);
        assert!(items.contains(&name(&["arg"])), "items: {:?}", items);
        assert!(
            !items.iter().any(|i| matches!(
                i,
                UsageItem::ExpressionName { identifiers } if identifiers.len() > 1
            )),
            "no flattened chain expected: {:?}",
            items
        );
    }

    #[test]
    fn enhanced_for_variable_is_local() {
        let items = usages_of("{ for (String s : names) { use(s); } }");
        assert_eq!(
            items,
            vec![local("s", "String"), name(&["names"]), name(&["s"])]
        );
    }

    #[test]
    fn type_names_are_not_expression_names() {
        let items = usages_of("{ Widget w = new Widget(); }");
        assert_eq!(items, vec![local("w", "Widget")]);
    }

    #[test]
    fn assignment_left_side_is_recorded() {
        let items = usages_of("{ x = y + z; }");
        assert_eq!(items, vec![name(&["x"]), name(&["y"]), name(&["z"])]);
    }

    #[test]
    fn labels_are_not_names() {
        let items = usages_of("{ outer: while (flag) { break outer; } }");
        assert_eq!(items, vec![name(&["flag"])]);
    }

    #[test]
    fn catch_parameter_is_local() {
        let items = usages_of("{ try { run(); } catch (Exception e) { log(e); } }");
        assert_eq!(items, vec![local("e", "Exception"), name(&["e"])]);
    }
}
