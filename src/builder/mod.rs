//! Entity Model Builder: folds parsed source files into one [`Program`].
//!
//! The fold is single-threaded and deterministic: files are processed in the
//! order given, and within a file declarations are visited in document
//! order. Class-name collision handling and usage-item ordering both depend
//! on this.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tree_sitter::Node;

use crate::discovery::{self, DiscoveryConfig};
use crate::model::{
    Class, Field, FileId, FileUnit, Import, Method, Package, Parameter, Program, DEFAULT_PACKAGE,
};
use crate::parser;
use crate::tokens::{TokenSpan, TokenStream};

pub mod usage;

/// A non-fatal problem recorded during the build. The model is built from
/// whatever parses; most refactorings only need a subset of the project.
#[derive(Debug, Clone, Serialize)]
pub struct BuildDiagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// The file could not be read.
    Io,
    /// The file could not be parsed; it contributes nothing to the model.
    ParseError,
    /// A (package, simple name) pair was declared twice; the first
    /// declaration wins and the duplicate is skipped.
    DuplicateClass,
}

/// Result of one build pass: the model plus everything it skipped.
#[derive(Debug, Default)]
pub struct ProgramBuild {
    pub program: Program,
    pub diagnostics: Vec<BuildDiagnostic>,
}

/// Build a program from an explicit set of source files.
pub fn build_program(paths: &[PathBuf]) -> ProgramBuild {
    let mut build = ProgramBuild::default();
    for path in paths {
        match fs::read_to_string(path) {
            Ok(source) => fold_file(&mut build, path, &source),
            Err(err) => build.diagnostics.push(BuildDiagnostic {
                path: path.clone(),
                kind: DiagnosticKind::Io,
                message: format!("failed to read {}: {}", path.display(), err),
            }),
        }
    }
    build
}

/// Build a program from every `.java` file under a directory.
pub fn build_program_in_dir(root: &Path, config: &DiscoveryConfig) -> Result<ProgramBuild> {
    let paths = discovery::discover_java_files(root, config)?;
    Ok(build_program(&paths))
}

/// Fold one file's declarations into the program under construction.
fn fold_file(build: &mut ProgramBuild, path: &Path, source: &str) {
    let tree = match parser::parse_source(source) {
        Ok(tree) => tree,
        Err(err) => {
            build.diagnostics.push(BuildDiagnostic {
                path: path.to_path_buf(),
                kind: DiagnosticKind::ParseError,
                message: format!("skipping {}: {}", path.display(), err),
            });
            return;
        }
    };

    let file = FileId(build.program.files.len());
    let tokens = parser::tokenize(&tree, source);

    let mut extractor = Extractor {
        file,
        source,
        tokens: &tokens,
        package_name: DEFAULT_PACKAGE.to_string(),
        imports: Vec::new(),
        classes: Vec::new(),
    };
    extractor.extract(tree.root_node());

    let Extractor {
        package_name,
        imports,
        classes,
        ..
    } = extractor;

    build.program.files.push(FileUnit {
        path: path.to_path_buf(),
        package_name: package_name.clone(),
        imports,
        tokens,
    });

    for class in classes {
        let package = build
            .program
            .packages
            .entry(package_name.clone())
            .or_insert_with(|| Package::new(package_name.clone()));
        if let Some(existing) = package.classes.get(&class.name) {
            let first_path = build.program.files[existing.file.0].path.clone();
            build.diagnostics.push(BuildDiagnostic {
                path: path.to_path_buf(),
                kind: DiagnosticKind::DuplicateClass,
                message: format!(
                    "duplicate class {}.{}: first declared in {}, skipping this one",
                    package_name,
                    class.name,
                    first_path.display()
                ),
            });
            continue;
        }
        package.classes.insert(class.name.clone(), class);
    }
}

/// Walks one file's CST, collecting package, imports, and top-level type
/// declarations. Nested, local, and anonymous types are excluded from the
/// model.
struct Extractor<'a> {
    file: FileId,
    source: &'a str,
    tokens: &'a TokenStream,
    package_name: String,
    imports: Vec<Import>,
    classes: Vec<Class>,
}

impl<'a> Extractor<'a> {
    fn node_text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn node_span(&self, node: Node) -> TokenSpan {
        self.tokens
            .span_for_byte_range(self.file, node.start_byte(), node.end_byte())
    }

    fn extract(&mut self, root: Node) {
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "package_declaration" => self.extract_package(child),
                "import_declaration" => self.extract_import(child),
                "class_declaration" => self.extract_class(child, false),
                "interface_declaration" => self.extract_class(child, true),
                _ => {}
            }
        }
    }

    fn extract_package(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "scoped_identifier" | "identifier" => {
                    self.package_name = self.node_text(child).to_string();
                }
                _ => {}
            }
        }
    }

    fn extract_import(&mut self, node: Node) {
        let mut path = String::new();
        let mut is_wildcard = false;
        let mut is_static = false;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "scoped_identifier" | "identifier" => {
                    path = self.node_text(child).to_string();
                }
                "asterisk" => is_wildcard = true,
                "static" => is_static = true,
                _ => {}
            }
        }

        if !path.is_empty() {
            self.imports.push(Import {
                path,
                is_wildcard,
                is_static,
            });
        }
    }

    /// Extract keyword modifiers from a declaration node, skipping
    /// annotations.
    fn extract_modifiers(&self, node: Node) -> Vec<String> {
        let mut modifiers = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "modifiers" {
                let mut inner = child.walk();
                for modifier in child.children(&mut inner) {
                    match modifier.kind() {
                        "marker_annotation" | "annotation" => {}
                        _ => modifiers.push(self.node_text(modifier).to_string()),
                    }
                }
            }
        }
        modifiers
    }

    fn extract_class(&mut self, node: Node, is_interface: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let name = self.node_text(name_node).to_string();

        // `extends` clause, verbatim and unresolved.
        let superclass_name = node
            .child_by_field_name("superclass")
            .and_then(|sc| sc.named_child(0))
            .map(|ty| self.node_text(ty).to_string());

        let mut class = Class {
            name: name.clone(),
            package: self.package_name.clone(),
            modifiers: self.extract_modifiers(node),
            is_interface,
            superclass_name,
            file: self.file,
            declaration_span: self.node_span(node),
            body_span: self.node_span(body),
            fields: Default::default(),
            methods: Default::default(),
        };

        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    self.extract_field_group(member, &mut class);
                }
                "method_declaration" => self.extract_method(member, false, &mut class),
                "constructor_declaration" => self.extract_method(member, true, &mut class),
                _ => {}
            }
        }

        self.classes.push(class);
    }

    fn extract_field_group(&mut self, node: Node, class: &mut Class) {
        let modifiers = self.extract_modifiers(node);
        let type_text = node
            .child_by_field_name("type")
            .map(|t| self.node_text(t).to_string())
            .unwrap_or_default();

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();

        let names: Vec<String> = declarators
            .iter()
            .filter_map(|d| d.child_by_field_name("name"))
            .map(|n| self.node_text(n).to_string())
            .collect();
        let group_spans: Vec<TokenSpan> =
            declarators.iter().map(|d| self.node_span(*d)).collect();

        for (index, declarator) in declarators.iter().enumerate() {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = self.node_text(name_node).to_string();
            let initializer = declarator
                .child_by_field_name("value")
                .map(|v| self.node_text(v).to_string());
            let neighbor_names = names
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, n)| n.clone())
                .collect();

            let field = Field {
                name: name.clone(),
                type_text: type_text.clone(),
                modifiers: modifiers.clone(),
                initializer,
                neighbor_names,
                index_in_variable_declarators: index,
                class_name: class.name.clone(),
                file: self.file,
                declaration_span: self.node_span(node),
                declarator_span: group_spans[index],
                group_declarator_spans: group_spans.clone(),
            };
            class.fields.entry(name).or_insert(field);
        }
    }

    fn extract_method(&mut self, node: Node, is_constructor: bool, class: &mut Class) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.node_text(name_node).to_string();

        let parameters = node
            .child_by_field_name("parameters")
            .map(|p| self.extract_parameters(p))
            .unwrap_or_default();

        let body = node.child_by_field_name("body");
        let body_text = body.map(|b| self.node_text(b).to_string());
        let body_span = body.map(|b| self.node_span(b));
        let usages = body
            .map(|b| usage::extract_usages(b, self.source))
            .unwrap_or_default();

        let method = Method {
            name,
            parameters,
            modifiers: self.extract_modifiers(node),
            is_constructor,
            class_name: class.name.clone(),
            file: self.file,
            body_text,
            body_span,
            declaration_span: self.node_span(node),
            usages,
        };
        class.methods.entry(method.signature()).or_insert(method);
    }

    fn extract_parameters(&self, params_node: Node) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        let mut cursor = params_node.walk();
        for child in params_node.children(&mut cursor) {
            match child.kind() {
                "formal_parameter" => {
                    if let (Some(ty), Some(name)) = (
                        child.child_by_field_name("type"),
                        child.child_by_field_name("name"),
                    ) {
                        parameters.push(Parameter {
                            type_text: self.node_text(ty).to_string(),
                            name: self.node_text(name).to_string(),
                        });
                    }
                }
                "spread_parameter" => {
                    let ty = child
                        .named_child(0)
                        .map(|t| format!("{}...", self.node_text(t)))
                        .unwrap_or_default();
                    let name = self
                        .find_child_of_kind(child, "variable_declarator")
                        .and_then(|d| d.child_by_field_name("name"))
                        .map(|n| self.node_text(n).to_string())
                        .unwrap_or_default();
                    parameters.push(Parameter {
                        type_text: ty,
                        name,
                    });
                }
                _ => {}
            }
        }
        parameters
    }

    fn find_child_of_kind<'n>(&self, node: Node<'n>, kind: &str) -> Option<Node<'n>> {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).find(|c| c.kind() == kind);
        found
    }
}
