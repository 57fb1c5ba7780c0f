use std::collections::HashMap;

use indexmap::IndexMap;
use swc_core::common::collections::AHashSet;
use swc_core::common::{Span, SyntaxContext};
use swc_core::ecma::ast::{BindingIdent, Id, Ident, ImportDecl, JSXClosingElement, Program};
use swc_core::ecma::atoms::Atom;
use swc_core::ecma::utils::collect_decls;
use swc_core::ecma::visit::{Visit, VisitWith};

/// Pairs a name exported by a macro module with the local name it is bound to in the consuming
/// file.
///
/// `imported_name` is `"default"` for default imports and plain `require` assignments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportBinding {
  pub local_name: Atom,
  pub imported_name: Atom,
}

impl ImportBinding {
  pub fn new(local_name: impl Into<Atom>, imported_name: impl Into<Atom>) -> Self {
    ImportBinding {
      local_name: local_name.into(),
      imported_name: imported_name.into(),
    }
  }

  pub fn default_import(local_name: impl Into<Atom>) -> Self {
    ImportBinding::new(local_name, "default")
  }
}

/// A usage site of an imported binding.
///
/// This is a handle into the program rather than the node itself, so that macros can mutate the
/// tree while holding their references. Use [`Reference::is`] to find the identifier it points at.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
  id: Id,
  span: Span,
}

impl Reference {
  pub fn id(&self) -> &Id {
    &self.id
  }

  pub fn span(&self) -> Span {
    self.span
  }

  /// Whether `ident` is the identifier at this usage site
  pub fn is(&self, ident: &Ident) -> bool {
    ident.span == self.span && ident.sym == self.id.0 && ident.ctxt == self.id.1
  }
}

/// Usage sites of each imported name, in source order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct References {
  by_imported_name: IndexMap<Atom, Vec<Reference>>,
}

impl References {
  pub fn get(&self, imported_name: &str) -> Option<&[Reference]> {
    self
      .by_imported_name
      .get(&Atom::from(imported_name))
      .map(Vec::as_slice)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Atom, &[Reference])> {
    self
      .by_imported_name
      .iter()
      .map(|(imported_name, references)| (imported_name, references.as_slice()))
  }

  /// The imported name `ident` refers to, if it is one of the collected usage sites
  pub fn imported_name_of(&self, ident: &Ident) -> Option<&Atom> {
    self
      .iter()
      .find(|(_, references)| references.iter().any(|reference| reference.is(ident)))
      .map(|(imported_name, _)| imported_name)
  }

  pub fn contains(&self, ident: &Ident) -> bool {
    self.imported_name_of(ident).is_some()
  }

  /// Whether any imported name is used at least once
  pub fn has_references(&self) -> bool {
    self
      .by_imported_name
      .values()
      .any(|references| !references.is_empty())
  }
}

/// Resolve the usage sites of each binding introduced by a macro import.
///
/// Each binding is looked up in `scope`, the syntax context its declaration was resolved into.
/// Bindings that are no longer declared in the program are skipped. Imported names whose
/// binding exists are always present in the result, even when they are never used.
///
/// This walks the whole program every time it is called, so it always reflects the current state
/// of the tree, including any rewrites made by earlier passes or macros.
pub fn collect_references(
  program: &Program,
  scope: SyntaxContext,
  imports: &[ImportBinding],
) -> References {
  let declared: AHashSet<Id> = collect_decls(program);
  let mut bindings: HashMap<Id, Atom> = HashMap::new();
  let mut by_imported_name: IndexMap<Atom, Vec<Reference>> = IndexMap::new();

  for import in imports {
    let id = (import.local_name.clone(), scope);
    if !declared.contains(&id) {
      tracing::debug!(
        "Skipping {} imported as {}: binding not found",
        import.imported_name,
        import.local_name
      );
      continue;
    }

    by_imported_name
      .entry(import.imported_name.clone())
      .or_default();
    bindings.insert(id, import.imported_name.clone());
  }

  program.visit_with(&mut ReferenceCollector {
    bindings: &bindings,
    by_imported_name: &mut by_imported_name,
  });

  References { by_imported_name }
}

struct ReferenceCollector<'a> {
  bindings: &'a HashMap<Id, Atom>,
  by_imported_name: &'a mut IndexMap<Atom, Vec<Reference>>,
}

impl Visit for ReferenceCollector<'_> {
  fn visit_ident(&mut self, ident: &Ident) {
    let id = ident.to_id();
    let Some(imported_name) = self.bindings.get(&id) else {
      return;
    };

    self
      .by_imported_name
      .entry(imported_name.clone())
      .or_default()
      .push(Reference {
        id,
        span: ident.span,
      });
  }

  // Declarations and assignment targets bind the name rather than use it
  fn visit_binding_ident(&mut self, _: &BindingIdent) {}

  fn visit_import_decl(&mut self, _: &ImportDecl) {}

  // The opening element is the usage site
  fn visit_jsx_closing_element(&mut self, _: &JSXClosingElement) {}
}
