use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::tokens::{TokenSpan, TokenStream};

/// Package name used for source files with no `package` declaration.
/// The default package is addressable with the empty string.
pub const DEFAULT_PACKAGE: &str = "";

/// Index of a [`FileUnit`] within its owning [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub usize);

/// Root of the entity model: everything extracted from one build pass over a
/// set of source files. Rebuilt from scratch per refactoring invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    /// Fully-qualified package name -> package.
    pub packages: HashMap<String, Package>,
    pub files: Vec<FileUnit>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn lookup_class(&self, package: &str, name: &str) -> Option<&Class> {
        self.packages.get(package)?.classes.get(name)
    }

    pub fn file(&self, id: FileId) -> &FileUnit {
        &self.files[id.0]
    }

    /// All classes in the model, in no particular order.
    pub fn iter_classes(&self) -> impl Iterator<Item = &Class> {
        self.packages.values().flat_map(|p| p.classes.values())
    }

    /// Every class whose `extends` clause resolves to the given class.
    pub fn subclasses_of(&self, package: &str, name: &str) -> Vec<&Class> {
        let mut subclasses: Vec<&Class> = self
            .iter_classes()
            .filter(|c| {
                c.resolve_superclass(self)
                    .is_some_and(|sup| sup.name == name && sup.package == package)
            })
            .collect();
        subclasses.sort_by(|a, b| (&a.package, &a.name).cmp(&(&b.package, &b.name)));
        subclasses
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    /// Simple class name -> class.
    pub classes: HashMap<String, Class>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            classes: HashMap::new(),
        }
    }
}

/// A top-level class or interface declaration.
///
/// The superclass is held as the verbatim `extends` text, not a pointer:
/// declaration order across files is unspecified and the superclass may live
/// outside the project entirely, so resolution happens lazily via
/// [`Class::resolve_superclass`] and may legitimately fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub package: String,
    pub modifiers: Vec<String>,
    pub is_interface: bool,
    /// Verbatim `extends` clause text (simple or qualified), if any.
    pub superclass_name: Option<String>,
    pub file: FileId,
    /// Span of the whole declaration, modifiers through closing brace.
    pub declaration_span: TokenSpan,
    /// Span of the `{ ... }` class body; anchors member insertions.
    pub body_span: TokenSpan,
    /// Field name -> field.
    pub fields: HashMap<String, Field>,
    /// Signature key (`name(T1,T2)`) -> method.
    pub methods: HashMap<String, Method>,
}

impl Class {
    /// Resolve the superclass against the program, by name.
    ///
    /// A qualified name is looked up directly. A simple name is tried in the
    /// declaring file's own package, then against its single-type imports,
    /// then against its wildcard imports. `None` means the superclass is
    /// external to the project (not an error).
    pub fn resolve_superclass<'p>(&self, program: &'p Program) -> Option<&'p Class> {
        let raw = self.superclass_name.as_deref()?;
        // Strip generic arguments: `Base<T>` resolves as `Base`.
        let name = raw.split('<').next().unwrap_or(raw).trim();

        if let Some((package, simple)) = name.rsplit_once('.') {
            return program.lookup_class(package, simple);
        }

        let unit = program.file(self.file);
        if let Some(class) = program.lookup_class(&unit.package_name, name) {
            return Some(class);
        }
        for import in &unit.imports {
            if import.is_wildcard {
                continue;
            }
            if let Some((package, simple)) = import.path.rsplit_once('.') {
                if simple == name {
                    return program.lookup_class(package, simple);
                }
            }
        }
        for import in unit.imports.iter().filter(|i| i.is_wildcard) {
            if let Some(class) = program.lookup_class(&import.path, name) {
                return Some(class);
            }
        }
        None
    }

    /// Constructors of this class, in no particular order.
    pub fn constructors(&self) -> impl Iterator<Item = &Method> {
        self.methods.values().filter(|m| m.is_constructor)
    }

    /// Anchor on the opening `{` of the class body, for inserting new
    /// members right after it.
    pub fn body_insertion_anchor(&self) -> TokenSpan {
        self.body_span.collapsed_to_start()
    }
}

/// One declared field. Multi-variable declarations (`int a, b;`) are modeled
/// as one `Field` per declarator, each retaining its declarator-group
/// metadata: removing one declarator from a group needs different token-span
/// surgery than removing a whole statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Declared type, verbatim, unresolved.
    pub type_text: String,
    pub modifiers: Vec<String>,
    /// Initializer expression text, verbatim, unparsed.
    pub initializer: Option<String>,
    /// Names of the sibling declarators in the same statement.
    pub neighbor_names: Vec<String>,
    pub index_in_variable_declarators: usize,
    pub class_name: String,
    pub file: FileId,
    /// Span of the whole `field_declaration` statement, modifiers through `;`.
    pub declaration_span: TokenSpan,
    /// Span of this field's own declarator (`b = 2` in `int a, b = 2;`).
    pub declarator_span: TokenSpan,
    /// Declarator spans for the whole group, in declaration order.
    pub group_declarator_spans: Vec<TokenSpan>,
}

impl Field {
    /// The span to delete when removing this field from its declaration.
    ///
    /// Sole declarator: the whole statement. First of several: this
    /// declarator plus the comma after it. Otherwise: this declarator plus
    /// the comma before it.
    pub fn removal_span(&self) -> TokenSpan {
        if self.neighbor_names.is_empty() {
            return self.declaration_span;
        }
        let i = self.index_in_variable_declarators;
        let mut span = self.declarator_span;
        if i == 0 {
            span.stop = self.group_declarator_spans[i + 1].start - 1;
        } else {
            span.start = self.group_declarator_spans[i - 1].stop + 1;
        }
        span
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub type_text: String,
    pub name: String,
}

/// A method or constructor declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub modifiers: Vec<String>,
    pub is_constructor: bool,
    pub class_name: String,
    pub file: FileId,
    /// Verbatim body text including braces; `None` for abstract and
    /// interface methods without a body.
    pub body_text: Option<String>,
    pub body_span: Option<TokenSpan>,
    pub declaration_span: TokenSpan,
    /// Local declarations and dotted name references, in body order.
    pub usages: Vec<UsageItem>,
}

impl Method {
    /// Signature key used in [`Class::methods`]: `name(T1,T2)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.parameters.iter().map(|p| p.type_text.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }
}

/// One semantic signal extracted from a method/constructor body. Whether an
/// `ExpressionName` head is a local, a field, or a class name is left to the
/// refactoring client, which cross-references `LocalVariable` items already
/// seen and the class's field table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageItem {
    LocalVariable {
        identifier: String,
        declared_type: String,
    },
    ExpressionName {
        /// The full dotted chain, e.g. `["this", "x"]` for `this.x`.
        identifiers: Vec<String>,
    },
}

/// Import statement recorded on a file, raw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Imported path without the trailing `.*` for wildcards.
    pub path: String,
    pub is_wildcard: bool,
    pub is_static: bool,
}

/// One parsed source file: its package, imports, and token stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUnit {
    pub path: PathBuf,
    /// Declared package name; [`DEFAULT_PACKAGE`] when absent.
    pub package_name: String,
    pub imports: Vec<Import>,
    pub tokens: TokenStream,
}

impl FileUnit {
    /// Whether code in this file can refer to `package.class` by simple
    /// name: same package, exact single-type import, or wildcard import.
    pub fn has_imported_class(&self, package: &str, class: &str) -> bool {
        if self.package_name == package {
            return true;
        }
        self.imports.iter().any(|import| {
            if import.is_wildcard {
                import.path == package
            } else {
                import.path.len() == package.len() + 1 + class.len()
                    && import.path.starts_with(package)
                    && import.path.ends_with(class)
                    && import.path.as_bytes()[package.len()] == b'.'
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(package: &str, imports: Vec<Import>) -> FileUnit {
        FileUnit {
            path: PathBuf::from("Test.java"),
            package_name: package.to_string(),
            imports,
            tokens: TokenStream::default(),
        }
    }

    #[test]
    fn has_imported_class_same_package() {
        let u = unit("com.example", vec![]);
        assert!(u.has_imported_class("com.example", "Foo"));
        assert!(!u.has_imported_class("com.other", "Foo"));
    }

    #[test]
    fn has_imported_class_exact_import() {
        let u = unit(
            "com.example",
            vec![Import {
                path: "com.other.Foo".into(),
                is_wildcard: false,
                is_static: false,
            }],
        );
        assert!(u.has_imported_class("com.other", "Foo"));
        assert!(!u.has_imported_class("com.other", "Bar"));
        // `com.other.Foo` must not satisfy a lookup for `com.oth` + `er.Foo`
        assert!(!u.has_imported_class("com.oth", "Foo"));
    }

    #[test]
    fn has_imported_class_wildcard() {
        let u = unit(
            "com.example",
            vec![Import {
                path: "com.other".into(),
                is_wildcard: true,
                is_static: false,
            }],
        );
        assert!(u.has_imported_class("com.other", "Anything"));
        assert!(!u.has_imported_class("com.other.nested", "Anything"));
    }

    #[test]
    fn removal_span_sole_declarator() {
        let f = FileId(0);
        let field = Field {
            name: "x".into(),
            type_text: "int".into(),
            modifiers: vec!["private".into()],
            initializer: None,
            neighbor_names: vec![],
            index_in_variable_declarators: 0,
            class_name: "A".into(),
            file: f,
            declaration_span: TokenSpan::new(f, 3, 8),
            declarator_span: TokenSpan::new(f, 5, 7),
            group_declarator_spans: vec![TokenSpan::new(f, 5, 7)],
        };
        assert_eq!(field.removal_span(), TokenSpan::new(f, 3, 8));
    }

    #[test]
    fn removal_span_first_of_group_eats_following_comma() {
        let f = FileId(0);
        // int a , b , c ;  => declarators at tokens 1, 3, 5
        let spans = vec![
            TokenSpan::new(f, 1, 1),
            TokenSpan::new(f, 3, 3),
            TokenSpan::new(f, 5, 5),
        ];
        let field = Field {
            name: "a".into(),
            type_text: "int".into(),
            modifiers: vec![],
            initializer: None,
            neighbor_names: vec!["b".into(), "c".into()],
            index_in_variable_declarators: 0,
            class_name: "A".into(),
            file: f,
            declaration_span: TokenSpan::new(f, 0, 6),
            declarator_span: spans[0],
            group_declarator_spans: spans,
        };
        assert_eq!(field.removal_span(), TokenSpan::new(f, 1, 2));
    }

    #[test]
    fn removal_span_later_declarator_eats_preceding_comma() {
        let f = FileId(0);
        let spans = vec![
            TokenSpan::new(f, 1, 1),
            TokenSpan::new(f, 3, 3),
            TokenSpan::new(f, 5, 5),
        ];
        let field = Field {
            name: "b".into(),
            type_text: "int".into(),
            modifiers: vec![],
            initializer: None,
            neighbor_names: vec!["a".into(), "c".into()],
            index_in_variable_declarators: 1,
            class_name: "A".into(),
            file: f,
            declaration_span: TokenSpan::new(f, 0, 6),
            declarator_span: spans[1],
            group_declarator_spans: spans,
        };
        assert_eq!(field.removal_span(), TokenSpan::new(f, 2, 3));
    }

    #[test]
    fn method_signature_key() {
        let m = Method {
            name: "setUp".into(),
            parameters: vec![
                Parameter { type_text: "int".into(), name: "a".into() },
                Parameter { type_text: "String".into(), name: "b".into() },
            ],
            modifiers: vec![],
            is_constructor: false,
            class_name: "A".into(),
            file: FileId(0),
            body_text: None,
            body_span: None,
            declaration_span: TokenSpan::new(FileId(0), 0, 0),
            usages: vec![],
        };
        assert_eq!(m.signature(), "setUp(int,String)");
    }
}
