use std::collections::HashSet;
use std::sync::Arc;

use atlaspack_filesystem::FileSystemRef;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use swc_core::common::{Span, SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::{
  Decl, EmptyStmt, ExportDecl, ForStmt, ImportDecl, ImportSpecifier, ModuleDecl, ModuleExportName,
  ModuleItem, ObjectPatProp, Pat, Program, PropName, Stmt, VarDecl, VarDeclOrExpr, VarDeclarator,
};
use swc_core::ecma::atoms::Atom;
use swc_core::ecma::visit::{Visit, VisitMut, VisitMutWith, VisitWith};

use crate::apply_macros::MacroStatement;
use crate::config::ConfigExplorer;
use crate::create_macro::{FileState, MacroHost};
use crate::errors::MacrosError;
use crate::loader::{LoadMacroRef, MacroRegistry};
use crate::looks_like::{self, looks_like, require_source, MacroImport, MacroRequire};
use crate::references::ImportBinding;
use crate::resolve_path::{NodeResolvePath, ResolvePathRef};

pub type IsMacrosName = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Options of a [`MacrosPlugin`] instance
#[derive(Clone)]
pub struct MacrosPluginOptions {
  /// Loads resolved macro modules
  pub require: LoadMacroRef,
  /// Resolves import sources, defaults to node resolution over the plugin's file-system
  pub resolve_path: Option<ResolvePathRef>,
  /// Decides which import sources are macros, defaults to [`looks_like::is_macros_name`]
  pub is_macros_name: Option<IsMacrosName>,
  /// Per-macro configuration keyed by config name
  pub config: Map<String, Value>,
}

impl Default for MacrosPluginOptions {
  fn default() -> Self {
    MacrosPluginOptions {
      require: Arc::new(MacroRegistry::new()),
      resolve_path: None,
      is_macros_name: None,
      config: Map::new(),
    }
  }
}

/// Finds imports and requires of macro modules, invokes the macros with the places their bindings
/// are used, and removes the statements afterwards.
///
/// Each instance lazily creates its own config explorer, so separate instances never share
/// cached configuration.
pub struct MacrosPlugin {
  pub(crate) fs: FileSystemRef,
  pub(crate) require: LoadMacroRef,
  pub(crate) resolve_path: ResolvePathRef,
  pub(crate) config: Map<String, Value>,
  is_macros_name: IsMacrosName,
  config_explorer: OnceCell<ConfigExplorer>,
}

impl MacrosPlugin {
  pub fn new(options: MacrosPluginOptions, fs: FileSystemRef) -> Self {
    let resolve_path = options
      .resolve_path
      .unwrap_or_else(|| Arc::new(NodeResolvePath::new(fs.clone())));
    let is_macros_name = options
      .is_macros_name
      .unwrap_or_else(|| Arc::new(looks_like::is_macros_name));

    MacrosPlugin {
      fs,
      require: options.require,
      resolve_path,
      config: options.config,
      is_macros_name,
      config_explorer: OnceCell::new(),
    }
  }

  pub(crate) fn config_explorer(&self) -> &ConfigExplorer {
    self
      .config_explorer
      .get_or_init(|| ConfigExplorer::new(self.fs.clone()))
  }

  /// Apply every macro imported or required by `program`, in source order.
  ///
  /// Statements are removed once their macro ran, unless it asked for them to be kept. Any error
  /// aborts the transformation and leaves the program partially transformed.
  pub fn transform(
    &self,
    program: &mut Program,
    state: &FileState,
    host: &MacroHost,
  ) -> Result<(), MacrosError> {
    let mut handled = HashSet::new();

    while let Some(node) = self.find_next(program, &handled) {
      let statement = node.statement()?;
      tracing::debug!("Found macro statement for {}", statement.source);

      let result = self.apply_macros(program, &statement, state, host)?;
      let keep = result.is_some_and(|result| result.keep_imports);
      if keep || !node.remove_from(program) {
        handled.insert(node.key());
      }
    }

    Ok(())
  }

  fn find_next(&self, program: &Program, handled: &HashSet<StatementKey>) -> Option<MacroNode> {
    let mut finder = MacroFinder {
      is_macros_name: &*self.is_macros_name,
      handled,
      found: None,
    };
    program.visit_with(&mut finder);
    finder.found
  }
}

type StatementKey = (Span, Atom);

/// A matched statement, cloned out of the program so the program can be mutated while it is
/// processed
enum MacroNode {
  Import(ImportDecl),
  Require { declarator: VarDeclarator, source: Atom },
}

impl MacroNode {
  fn key(&self) -> StatementKey {
    match self {
      MacroNode::Import(decl) => (decl.span, decl.src.value.clone()),
      MacroNode::Require { declarator, source } => (declarator.span, source.clone()),
    }
  }

  fn statement(&self) -> Result<MacroStatement, MacrosError> {
    let (imports, scope) = match self {
      MacroNode::Import(decl) => import_bindings(decl)?,
      MacroNode::Require { declarator, .. } => require_bindings(&declarator.name)?,
    };

    Ok(MacroStatement {
      source: self.key().1,
      imports,
      scope,
    })
  }

  /// Returns false when the statement is no longer in the program
  fn remove_from(&self, program: &mut Program) -> bool {
    let key = self.key();

    match self {
      MacroNode::Import(_) => {
        let Program::Module(module) = program else {
          return false;
        };

        let len = module.body.len();
        module.body.retain(|item| match item {
          ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => {
            (import.span, import.src.value.clone()) != key
          }
          _ => true,
        });
        tracing::debug!("Removed import of {}", key.1);

        module.body.len() != len
      }
      MacroNode::Require { .. } => {
        let mut remover = DeclaratorRemover {
          key,
          removed: false,
        };
        program.visit_mut_with(&mut remover);
        remover.removed
      }
    }
  }
}

fn import_bindings(decl: &ImportDecl) -> Result<(Vec<ImportBinding>, SyntaxContext), MacrosError> {
  let mut scope = SyntaxContext::empty();
  let mut imports = Vec::with_capacity(decl.specifiers.len());

  for specifier in &decl.specifiers {
    let binding = match specifier {
      ImportSpecifier::Default(default) => {
        scope = default.local.ctxt;
        ImportBinding::default_import(default.local.sym.clone())
      }
      ImportSpecifier::Namespace(_) => {
        return Err(MacrosError::UnsupportedBinding(
          "Not sure how to handle this situation",
        ))
      }
      ImportSpecifier::Named(named) => {
        scope = named.local.ctxt;
        let imported_name = match &named.imported {
          None => named.local.sym.clone(),
          Some(ModuleExportName::Ident(imported)) => imported.sym.clone(),
          Some(ModuleExportName::Str(_)) => {
            return Err(MacrosError::UnsupportedBinding("Not sure what to do"))
          }
        };
        ImportBinding::new(named.local.sym.clone(), imported_name)
      }
    };
    imports.push(binding);
  }

  Ok((imports, scope))
}

/// `const x = require(...)` binds the default export, `const { a, b: c } = require(...)` binds
/// named exports. No other patterns are supported.
fn require_bindings(pat: &Pat) -> Result<(Vec<ImportBinding>, SyntaxContext), MacrosError> {
  match pat {
    Pat::Ident(ident) => Ok((
      vec![ImportBinding::default_import(ident.id.sym.clone())],
      ident.id.ctxt,
    )),
    Pat::Object(object) => {
      let mut scope = SyntaxContext::empty();
      let mut imports = Vec::with_capacity(object.props.len());

      for prop in &object.props {
        let binding = match prop {
          ObjectPatProp::Rest(_) => {
            return Err(MacrosError::UnsupportedBinding("Don't know how to handle this"))
          }
          ObjectPatProp::Assign(assign) => {
            if assign.value.is_some() {
              return Err(MacrosError::UnsupportedBinding("Value is not named"));
            }
            scope = assign.key.id.ctxt;
            ImportBinding::new(assign.key.id.sym.clone(), assign.key.id.sym.clone())
          }
          ObjectPatProp::KeyValue(key_value) => {
            let PropName::Ident(key) = &key_value.key else {
              return Err(MacrosError::UnsupportedBinding("Key is not named"));
            };
            let Pat::Ident(value) = &*key_value.value else {
              return Err(MacrosError::UnsupportedBinding("Value is not named"));
            };
            scope = value.id.ctxt;
            ImportBinding::new(value.id.sym.clone(), key.sym.clone())
          }
        };
        imports.push(binding);
      }

      Ok((imports, scope))
    }
    _ => Err(MacrosError::UnsupportedBinding("Not sure how to handle this")),
  }
}

/// Finds the first macro statement, in source order, that has not been handled yet
struct MacroFinder<'a> {
  is_macros_name: &'a dyn Fn(&str) -> bool,
  handled: &'a HashSet<StatementKey>,
  found: Option<MacroNode>,
}

impl Visit for MacroFinder<'_> {
  fn visit_module_item(&mut self, item: &ModuleItem) {
    if self.found.is_none() {
      item.visit_children_with(self);
    }
  }

  fn visit_stmt(&mut self, stmt: &Stmt) {
    if self.found.is_none() {
      stmt.visit_children_with(self);
    }
  }

  fn visit_import_decl(&mut self, decl: &ImportDecl) {
    let shape = MacroImport {
      is_macros_name: self.is_macros_name,
    };
    let key = (decl.span, decl.src.value.clone());

    if self.found.is_none() && looks_like(Some(decl), &shape) && !self.handled.contains(&key) {
      self.found = Some(MacroNode::Import(decl.clone()));
    }
  }

  fn visit_var_declarator(&mut self, declarator: &VarDeclarator) {
    if self.found.is_some() {
      return;
    }

    let shape = MacroRequire {
      is_macros_name: self.is_macros_name,
    };
    if looks_like(Some(declarator), &shape) {
      if let Some(source) = require_source(declarator) {
        let key = (declarator.span, source.value.clone());
        if !self.handled.contains(&key) {
          self.found = Some(MacroNode::Require {
            declarator: declarator.clone(),
            source: key.1,
          });
          return;
        }
      }
    }

    declarator.visit_children_with(self);
  }
}

/// Removes a single macro require declarator, and the declaration around it when it becomes empty
struct DeclaratorRemover {
  key: StatementKey,
  removed: bool,
}

fn is_empty_var_decl(decl: &VarDecl) -> bool {
  decl.decls.is_empty()
}

fn is_empty_stmt(stmt: &Stmt) -> bool {
  matches!(stmt, Stmt::Decl(Decl::Var(decl)) if is_empty_var_decl(decl))
}

impl VisitMut for DeclaratorRemover {
  fn visit_mut_var_decl(&mut self, decl: &mut VarDecl) {
    if !self.removed {
      let position = decl.decls.iter().position(|declarator| {
        require_source(declarator)
          .is_some_and(|source| (declarator.span, source.value.clone()) == self.key)
      });

      if let Some(position) = position {
        decl.decls.remove(position);
        self.removed = true;
        tracing::debug!("Removed require of {}", self.key.1);
      }
    }

    decl.visit_mut_children_with(self);
  }

  fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
    items.retain_mut(|item| match item {
      ModuleItem::Stmt(stmt) => {
        stmt.visit_mut_children_with(self);
        !is_empty_stmt(stmt)
      }
      ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(ExportDecl {
        decl: Decl::Var(decl),
        ..
      })) => {
        decl.visit_mut_with(self);
        !is_empty_var_decl(decl)
      }
      item => {
        item.visit_mut_children_with(self);
        true
      }
    });
  }

  fn visit_mut_stmts(&mut self, stmts: &mut Vec<Stmt>) {
    stmts.retain_mut(|stmt| {
      stmt.visit_mut_children_with(self);
      !is_empty_stmt(stmt)
    });
  }

  // A declaration emptied outside of a statement list is replaced rather than removed
  fn visit_mut_stmt(&mut self, stmt: &mut Stmt) {
    stmt.visit_mut_children_with(self);

    if is_empty_stmt(stmt) {
      *stmt = Stmt::Empty(EmptyStmt { span: DUMMY_SP });
    }
  }

  fn visit_mut_for_stmt(&mut self, stmt: &mut ForStmt) {
    stmt.visit_mut_children_with(self);

    if matches!(&stmt.init, Some(VarDeclOrExpr::VarDecl(decl)) if is_empty_var_decl(decl)) {
      stmt.init = None;
    }
  }
}
