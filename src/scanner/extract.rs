//! Structural extraction with tree-sitter.
//!
//! For each supported language this pulls out:
//! - public top-level names and `Class.method` names (private-convention names skipped),
//! - imported modules,
//! - a complexity estimate: 1 + branching, loop, and exception-handling nodes,
//! - the leading doc comment or module docstring,
//! - a one-line-per-symbol API summary.
//!
//! Files where more than [`ERROR_THRESHOLD`] of the tokens failed to parse
//! are rejected so that the caller can skip them.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tree_sitter::{Node, Parser};

/// If more than this fraction of tokens are in error, the file is rejected.
const ERROR_THRESHOLD: f64 = 0.30;
const MAX_DESCRIPTION_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" | "pyi" => Some(SourceLanguage::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(SourceLanguage::JavaScript),
            "ts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            "rs" => Some(SourceLanguage::Rust),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SourceLanguage::Python => "python",
            SourceLanguage::JavaScript => "javascript",
            SourceLanguage::TypeScript | SourceLanguage::Tsx => "typescript",
            SourceLanguage::Rust => "rust",
        }
    }

    fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    fn branch_kinds(self) -> &'static [&'static str] {
        match self {
            SourceLanguage::Python => &[
                "if_statement",
                "elif_clause",
                "for_statement",
                "while_statement",
                "except_clause",
                "conditional_expression",
                "case_clause",
            ],
            SourceLanguage::JavaScript | SourceLanguage::TypeScript | SourceLanguage::Tsx => &[
                "if_statement",
                "for_statement",
                "for_in_statement",
                "while_statement",
                "do_statement",
                "switch_case",
                "catch_clause",
                "ternary_expression",
            ],
            SourceLanguage::Rust => &[
                "if_expression",
                "match_arm",
                "for_expression",
                "while_expression",
                "loop_expression",
                "try_expression",
            ],
        }
    }
}

/// What extraction found in one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Public names in source order, `Class.method` for members.
    pub public_methods: Vec<String>,
    /// Imported modules, sorted and deduplicated.
    pub imports: Vec<String>,
    pub complexity: u32,
    pub description: Option<String>,
    /// One header line per public symbol.
    pub api_signature: Vec<String>,
}

impl Extracted {
    fn public(&mut self, name: String, header: String) {
        if !self.public_methods.contains(&name) {
            self.public_methods.push(name);
            self.api_signature.push(header);
        }
    }
}

pub fn extract(source: &str, language: SourceLanguage) -> Result<Extracted> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .context("failed to load grammar")?;
    let tree = match parser.parse(source, None) {
        Some(tree) => tree,
        None => bail!("parser produced no tree"),
    };
    let root = tree.root_node();

    let ratio = error_ratio(root);
    if ratio > ERROR_THRESHOLD {
        bail!("parse error rate {:.0}% exceeds threshold", ratio * 100.0);
    }

    let mut out = Extracted {
        complexity: 1 + count_kinds(root, language.branch_kinds()),
        ..Default::default()
    };

    match language {
        SourceLanguage::Python => python(source, root, &mut out),
        SourceLanguage::JavaScript | SourceLanguage::TypeScript | SourceLanguage::Tsx => {
            javascript(source, root, &mut out)
        }
        SourceLanguage::Rust => rust(source, root, &mut out),
    }

    out.imports.sort();
    out.imports.dedup();
    Ok(out)
}

fn text<'a>(source: &'a str, node: Node) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or_default()
}

fn field_text<'a>(source: &'a str, node: Node, field: &str) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| text(source, n))
}

/// First line of a declaration, without a trailing body opener.
fn header(source: &str, node: Node) -> String {
    let first = text(source, node).lines().next().unwrap_or_default();
    first
        .trim()
        .trim_end_matches('{')
        .trim_end_matches(':')
        .trim()
        .to_string()
}

/// Fraction of leaf tokens that are missing or sit under an error node.
pub fn error_ratio(root: Node) -> f64 {
    let (total, errors) = count_leaves(root);
    if total == 0 {
        return 0.0;
    }
    errors as f64 / total as f64
}

/// Pre-order walk over `root` and its descendants with a single cursor.
///
/// `visit` receives each node and its depth below `root`. Nesting depth
/// costs no stack.
fn visit_nodes<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>, usize)) {
    let mut cursor = root.walk();
    let mut depth = 0usize;
    loop {
        visit(cursor.node(), depth);
        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if depth == 0 {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// `(leaves, leaves that are missing or sit under an ERROR node)`.
fn count_leaves(root: Node) -> (usize, usize) {
    let mut total = 0usize;
    let mut errors = 0usize;
    // Depth of the outermost ERROR ancestor of the current node.
    let mut error_depth: Option<usize> = None;
    visit_nodes(root, |node, depth| {
        if error_depth.is_some_and(|d| depth <= d) {
            error_depth = None;
        }
        if error_depth.is_none() && node.is_error() {
            error_depth = Some(depth);
        }
        if node.child_count() == 0 {
            total += 1;
            if error_depth.is_some() || node.is_missing() {
                errors += 1;
            }
        }
    });
    (total, errors)
}

fn count_kinds(root: Node, kinds: &[&str]) -> u32 {
    let mut n = 0u32;
    visit_nodes(root, |node, _| {
        if kinds.contains(&node.kind()) {
            n += 1;
        }
    });
    n
}

fn clean_description(raw: &str) -> Option<String> {
    let paragraph: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .skip_while(|l| l.is_empty())
        .take_while(|l| !l.is_empty())
        .collect();
    let joined = paragraph.join(" ");
    if joined.is_empty() {
        return None;
    }
    Some(joined.chars().take(MAX_DESCRIPTION_CHARS).collect())
}

// ─── Python ───

fn python(source: &str, root: Node, out: &mut Extracted) {
    let mut cursor = root.walk();
    for (i, child) in root.named_children(&mut cursor).enumerate() {
        let node = if child.kind() == "decorated_definition" {
            match child.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            }
        } else {
            child
        };

        match node.kind() {
            "expression_statement" if i == 0 => {
                if let Some(s) = node.named_child(0).filter(|s| s.kind() == "string") {
                    out.description = clean_description(strip_python_string(text(source, s)));
                }
            }
            "function_definition" => {
                if let Some(name) = field_text(source, node, "name") {
                    if !name.starts_with('_') {
                        out.public(name.to_string(), header(source, node));
                    }
                }
            }
            "class_definition" => python_class(source, node, out),
            "import_statement" => {
                let mut c = node.walk();
                for name in node.children_by_field_name("name", &mut c) {
                    let module = match name.kind() {
                        "aliased_import" => field_text(source, name, "name").unwrap_or_default(),
                        _ => text(source, name),
                    };
                    if !module.is_empty() {
                        out.imports.push(module.to_string());
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = field_text(source, node, "module_name") {
                    out.imports.push(module.to_string());
                }
            }
            _ => {}
        }
    }
}

fn python_class(source: &str, class: Node, out: &mut Extracted) {
    let class_name = match field_text(source, class, "name") {
        Some(name) if !name.starts_with('_') => name,
        _ => return,
    };
    out.public(class_name.to_string(), header(source, class));

    let body = match class.child_by_field_name("body") {
        Some(body) => body,
        None => return,
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        let member = if member.kind() == "decorated_definition" {
            match member.child_by_field_name("definition") {
                Some(def) => def,
                None => continue,
            }
        } else {
            member
        };
        if member.kind() != "function_definition" {
            continue;
        }
        if let Some(name) = field_text(source, member, "name") {
            if !name.starts_with('_') {
                out.public(format!("{}.{}", class_name, name), header(source, member));
            }
        }
    }
}

fn strip_python_string(raw: &str) -> &str {
    raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c))
        .trim_matches('"')
        .trim_matches('\'')
}

// ─── JavaScript / TypeScript ───

fn js_is_private(name: &str) -> bool {
    name.starts_with('#') || name.starts_with('_')
}

fn javascript(source: &str, root: Node, out: &mut Extracted) {
    let mut cursor = root.walk();
    let children: Vec<Node> = root.named_children(&mut cursor).collect();

    if let Some(first) = children.first().filter(|n| n.kind() == "comment") {
        out.description = clean_description(strip_comment(text(source, *first)));
    }

    for child in children {
        match child.kind() {
            "import_statement" => {
                if let Some(src) = field_text(source, child, "source") {
                    out.imports.push(src.trim_matches(|c| c == '"' || c == '\'').to_string());
                }
            }
            "export_statement" => {
                if let Some(decl) = child.child_by_field_name("declaration") {
                    js_declaration(source, decl, out);
                }
            }
            _ => js_declaration(source, child, out),
        }
    }

    js_requires(source, root, out);
}

fn js_declaration(source: &str, node: Node, out: &mut Extracted) {
    match node.kind() {
        "function_declaration"
        | "generator_function_declaration"
        | "interface_declaration"
        | "type_alias_declaration"
        | "enum_declaration" => {
            if let Some(name) = field_text(source, node, "name") {
                if !js_is_private(name) {
                    out.public(name.to_string(), header(source, node));
                }
            }
        }
        "class_declaration" | "abstract_class_declaration" => js_class(source, node, out),
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = field_text(source, declarator, "name") {
                    if !js_is_private(name) && !name.starts_with('{') && !name.starts_with('[') {
                        out.public(name.to_string(), header(source, node));
                    }
                }
            }
        }
        _ => {}
    }
}

fn js_class(source: &str, class: Node, out: &mut Extracted) {
    let class_name = match field_text(source, class, "name") {
        Some(name) if !js_is_private(name) => name,
        _ => return,
    };
    out.public(class_name.to_string(), header(source, class));

    let body = match class.child_by_field_name("body") {
        Some(body) => body,
        None => return,
    };
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "method_definition" {
            continue;
        }
        let name = match field_text(source, member, "name") {
            Some(name) => name,
            None => continue,
        };
        let restricted = {
            let mut c = member.walk();
            let found = member.children(&mut c).any(|m| {
                m.kind() == "accessibility_modifier"
                    && matches!(text(source, m), "private" | "protected")
            });
            found
        };
        if name == "constructor" || js_is_private(name) || restricted {
            continue;
        }
        out.public(format!("{}.{}", class_name, name), header(source, member));
    }
}

/// `require("x")` calls anywhere in the file.
fn js_requires(source: &str, root: Node, out: &mut Extracted) {
    visit_nodes(root, |node, _| {
        if node.kind() != "call_expression" || field_text(source, node, "function") != Some("require") {
            return;
        }
        if let Some(arg) = node
            .child_by_field_name("arguments")
            .and_then(|args| args.named_child(0))
            .filter(|a| a.kind() == "string")
        {
            out.imports.push(
                text(source, arg)
                    .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                    .to_string(),
            );
        }
    });
}

fn strip_comment(raw: &str) -> &str {
    raw.trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_start_matches("//")
        .trim_end_matches("*/")
}

// ─── Rust ───

fn has_pub(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier");
    found
}

fn rust(source: &str, root: Node, out: &mut Extracted) {
    let mut cursor = root.walk();
    let children: Vec<Node> = root.named_children(&mut cursor).collect();

    let doc: Vec<&str> = children
        .iter()
        .take_while(|n| n.kind() == "line_comment" || n.kind() == "block_comment")
        .map(|n| text(source, *n))
        .filter(|t| t.starts_with("//!") || t.starts_with("///") || t.starts_with("/*!"))
        .map(|t| {
            t.trim_start_matches("//!")
                .trim_start_matches("///")
                .trim_start_matches("/*!")
                .trim_end_matches("*/")
        })
        .collect();
    if !doc.is_empty() {
        out.description = clean_description(&doc.join("\n"));
    }

    for child in children {
        match child.kind() {
            "use_declaration" => {
                if let Some(arg) = field_text(source, child, "argument") {
                    let path = arg.split("::{").next().unwrap_or(arg);
                    let path = path.split(" as ").next().unwrap_or(path);
                    out.imports.push(path.trim().to_string());
                }
            }
            "function_item" | "struct_item" | "enum_item" | "trait_item" | "mod_item"
            | "const_item" | "static_item" | "type_item" | "union_item" => {
                if has_pub(child) {
                    if let Some(name) = field_text(source, child, "name") {
                        out.public(name.to_string(), header(source, child));
                    }
                }
            }
            "impl_item" => rust_impl(source, child, out),
            _ => {}
        }
    }
}

fn rust_impl(source: &str, item: Node, out: &mut Extracted) {
    let type_name = match field_text(source, item, "type") {
        Some(t) => t.split('<').next().unwrap_or(t).trim(),
        None => return,
    };
    let body = match item.child_by_field_name("body") {
        Some(body) => body,
        None => return,
    };
    // Trait impls expose their methods through the trait.
    let is_trait_impl = item.child_by_field_name("trait").is_some();

    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "function_item" || !(is_trait_impl || has_pub(member)) {
            continue;
        }
        if let Some(name) = field_text(source, member, "name") {
            out.public(format!("{}.{}", type_name, name), header(source, member));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_public_surface() {
        let src = r#""""HTTP client for the billing API.

Longer notes.
"""
import os
import requests as rq
from urllib.parse import urljoin

class BillingClient:
    def get(self, path):
        if path:
            return rq.get(path)
        return None

    def _sign(self, req):
        pass

def _helper():
    pass

def build(url):
    for _ in range(3):
        try:
            return BillingClient()
        except Exception:
            pass
"#;
        let ex = extract(src, SourceLanguage::Python).unwrap();
        assert_eq!(ex.public_methods, vec!["BillingClient", "BillingClient.get", "build"]);
        assert_eq!(ex.imports, vec!["os", "requests", "urllib.parse"]);
        assert_eq!(ex.description.as_deref(), Some("HTTP client for the billing API."));
        // if + for + except
        assert_eq!(ex.complexity, 4);
        assert_eq!(ex.api_signature[2], "def build(url)");
    }

    #[test]
    fn javascript_skips_private_members() {
        let src = r#"// Cache helpers.
import { LRU } from "lru-cache";
const fs = require('fs');

export class Cache {
  constructor() {}
  get(key) { return key ? 1 : 2; }
  #evict() {}
  _internal() {}
}

export function createCache() {}
function _hidden() {}
"#;
        let ex = extract(src, SourceLanguage::JavaScript).unwrap();
        assert_eq!(ex.public_methods, vec!["fs", "Cache", "Cache.get", "createCache"]);
        assert_eq!(ex.imports, vec!["fs", "lru-cache"]);
        assert_eq!(ex.description.as_deref(), Some("Cache helpers."));
        assert_eq!(ex.complexity, 2);
    }

    #[test]
    fn typescript_respects_accessibility() {
        let src = r#"export class Api {
  public fetchAll(): void {}
  private secret(): void {}
  protected guarded(): void {}
}
export interface Options { retries: number }
"#;
        let ex = extract(src, SourceLanguage::TypeScript).unwrap();
        assert_eq!(ex.public_methods, vec!["Api", "Api.fetchAll", "Options"]);
    }

    #[test]
    fn rust_pub_items_only() {
        let src = r#"//! Retry policy.
use std::time::Duration;
use serde::{Deserialize, Serialize};

pub struct Retry { attempts: u32 }

impl Retry {
    pub fn next(&self) -> Option<Duration> {
        if self.attempts > 0 { Some(Duration::from_secs(1)) } else { None }
    }
    fn reset(&mut self) {}
}

fn private() {}
"#;
        let ex = extract(src, SourceLanguage::Rust).unwrap();
        assert_eq!(ex.public_methods, vec!["Retry", "Retry.next"]);
        assert_eq!(ex.imports, vec!["serde", "std::time::Duration"]);
        assert_eq!(ex.description.as_deref(), Some("Retry policy."));
        assert_eq!(ex.complexity, 2);
    }

    #[test]
    fn error_ratio_reflects_broken_input() {
        let mut parser = Parser::new();
        parser
            .set_language(&SourceLanguage::Python.tree_sitter_language())
            .unwrap();
        let clean = parser.parse("def f(x):\n    return x\n", None).unwrap();
        assert_eq!(error_ratio(clean.root_node()), 0.0);
        let broken = parser.parse("def f(x:\n    return ))) x\n", None).unwrap();
        assert!(error_ratio(broken.root_node()) > 0.0);
    }

    #[test]
    fn deeply_nested_source_walks_without_recursion() {
        let depth = 100_000;
        let src = format!(
            "const fs = require('fs');\nexport const data = {}1{};\n",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        let ex = extract(&src, SourceLanguage::JavaScript).unwrap();
        assert_eq!(ex.imports, vec!["fs"]);
        assert_eq!(ex.complexity, 1);
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(SourceLanguage::from_path(Path::new("a/b.py")), Some(SourceLanguage::Python));
        assert_eq!(SourceLanguage::from_path(Path::new("x.tsx")), Some(SourceLanguage::Tsx));
        assert_eq!(SourceLanguage::from_path(Path::new("Dockerfile")), None);
    }
}
