use once_cell::sync::Lazy;
use regex::Regex;
use swc_core::ecma::ast::{Callee, Expr, ImportDecl, Lit, Str, VarDeclarator};

static MACROS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[./]macro(\.c?js)?$").unwrap());

/// Default macro-name predicate: the source ends in `/macro` or `.macro`, optionally followed by a
/// `.js` or `.cjs` extension.
pub fn is_macros_name(source: &str) -> bool {
  MACROS_REGEX.is_match(source)
}

/// A structural pattern that a syntax node can be tested against
pub trait Shape<Node: ?Sized> {
  fn matches(&self, node: &Node) -> bool;
}

/// Predicates are shapes: the candidate matches when the predicate returns true
impl<Node: ?Sized, F> Shape<Node> for F
where
  F: Fn(&Node) -> bool,
{
  fn matches(&self, node: &Node) -> bool {
    self(node)
  }
}

/// Matches candidates equal to the wrapped value
pub struct Literal<T>(pub T);

impl<Node, T> Shape<Node> for Literal<T>
where
  Node: ?Sized + PartialEq<T>,
{
  fn matches(&self, node: &Node) -> bool {
    *node == self.0
  }
}

/// Test `candidate` against `shape`. A missing candidate never matches.
pub fn looks_like<Node, S>(candidate: Option<&Node>, shape: &S) -> bool
where
  Node: ?Sized,
  S: Shape<Node> + ?Sized,
{
  candidate.is_some_and(|candidate| shape.matches(candidate))
}

/// `import ... from "<source>"` where the source is a macro name
pub struct MacroImport<'a> {
  pub is_macros_name: &'a dyn Fn(&str) -> bool,
}

impl Shape<ImportDecl> for MacroImport<'_> {
  fn matches(&self, decl: &ImportDecl) -> bool {
    looks_like(Some(&*decl.src.value), &self.is_macros_name)
  }
}

/// `<pattern> = require("<source>")` where the source is a macro name
pub struct MacroRequire<'a> {
  pub is_macros_name: &'a dyn Fn(&str) -> bool,
}

impl Shape<VarDeclarator> for MacroRequire<'_> {
  fn matches(&self, declarator: &VarDeclarator) -> bool {
    looks_like(
      require_source(declarator).map(|source| &*source.value),
      &self.is_macros_name,
    )
  }
}

/// The string literal passed to `require` when `declarator` is initialised with a single
/// argument `require` call.
pub(crate) fn require_source(declarator: &VarDeclarator) -> Option<&Str> {
  let Some(Expr::Call(call)) = declarator.init.as_deref() else {
    return None;
  };

  let Callee::Expr(callee) = &call.callee else {
    return None;
  };

  let is_require = match &**callee {
    Expr::Ident(ident) => looks_like(Some(&&*ident.sym), &Literal("require")),
    _ => false,
  };
  if !is_require || call.args.len() != 1 {
    return None;
  }

  let argument = &call.args[0];
  if argument.spread.is_some() {
    return None;
  }

  match &*argument.expr {
    Expr::Lit(Lit::Str(source)) => Some(source),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use swc_core::common::DUMMY_SP;
  use swc_core::ecma::ast::*;

  use super::*;

  fn import_decl(source: &str) -> ImportDecl {
    ImportDecl {
      span: DUMMY_SP,
      specifiers: vec![],
      src: Box::new(Str::from(source)),
      type_only: false,
      with: None,
      phase: Default::default(),
    }
  }

  fn declarator(init: Expr) -> VarDeclarator {
    VarDeclarator {
      span: DUMMY_SP,
      name: Pat::Ident(BindingIdent::from(Ident::new_no_ctxt("evaler".into(), DUMMY_SP))),
      init: Some(Box::new(init)),
      definite: false,
    }
  }

  fn call(callee: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(CallExpr {
      callee: Callee::Expr(Box::new(Expr::Ident(Ident::new_no_ctxt(
        callee.into(),
        DUMMY_SP,
      )))),
      args: args
        .into_iter()
        .map(|expr| ExprOrSpread {
          spread: None,
          expr: Box::new(expr),
        })
        .collect(),
      ..Default::default()
    })
  }

  fn string(value: &str) -> Expr {
    Expr::Lit(Lit::Str(Str::from(value)))
  }

  #[test]
  fn test_default_macros_name() {
    assert!(is_macros_name("./fixtures/eval.macro"));
    assert!(is_macros_name("./fixtures/eval.macro.js"));
    assert!(is_macros_name("./fixtures/eval.macro.cjs"));
    assert!(is_macros_name("fake/macro"));
    assert!(is_macros_name("@scope/package/macro"));

    assert!(!is_macros_name("./some-file-without-macro"));
    assert!(!is_macros_name("./eval.macro.ts"));
    assert!(!is_macros_name("macro"));
    assert!(!is_macros_name("./eval.macros"));
  }

  #[test]
  fn test_missing_candidate_never_matches() {
    let always = |_: &str| true;
    assert!(!looks_like(None, &always));
  }

  #[test]
  fn test_literal_shape() {
    assert!(looks_like(Some(&"require"), &Literal("require")));
    assert!(!looks_like(Some(&"import"), &Literal("require")));
  }

  #[test]
  fn test_matching_is_idempotent() {
    let decl = import_decl("./eval.macro");
    let shape = MacroImport {
      is_macros_name: &is_macros_name,
    };

    let first = looks_like(Some(&decl), &shape);
    let second = looks_like(Some(&decl), &shape);

    assert!(first);
    assert_eq!(first, second);
  }

  #[test]
  fn test_macro_import_uses_the_predicate() {
    let only_eval = |source: &str| source == "eval";
    let shape = MacroImport {
      is_macros_name: &only_eval,
    };

    assert!(looks_like(Some(&import_decl("eval")), &shape));
    assert!(!looks_like(Some(&import_decl("./eval.macro")), &shape));
  }

  #[test]
  fn test_macro_require() {
    let shape = MacroRequire {
      is_macros_name: &is_macros_name,
    };

    assert!(looks_like(
      Some(&declarator(call("require", vec![string("./eval.macro")]))),
      &shape
    ));

    // not a macro
    assert!(!looks_like(
      Some(&declarator(call("require", vec![string("./eval")]))),
      &shape
    ));
    // not require
    assert!(!looks_like(
      Some(&declarator(call("load", vec![string("./eval.macro")]))),
      &shape
    ));
    // too many arguments
    assert!(!looks_like(
      Some(&declarator(call(
        "require",
        vec![string("./eval.macro"), string("extra")]
      ))),
      &shape
    ));
    // not a string
    assert!(!looks_like(
      Some(&declarator(call(
        "require",
        vec![Expr::Ident(Ident::new_no_ctxt("source".into(), DUMMY_SP))]
      ))),
      &shape
    ));
  }
}
