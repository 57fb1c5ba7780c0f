//! Macros and helpers shared by the plugin tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use atlaspack_filesystem::in_memory_file_system::InMemoryFileSystem;
use atlaspack_swc_runner::runner::{run_transform, RunOptions, RunWithTransformationError};
use parking_lot::Mutex;
use serde_json::Value;
use swc_core::common::DUMMY_SP;
use swc_core::ecma::ast::{
  Callee, Expr, JSXElementChild, JSXElementName, Lit, Number, Str,
};
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

use crate::create_macro::{create_macro, FileState, Macro, MacroHost, MacroOptions, MacroResult};
use crate::errors::MacroError;
use crate::plugin::MacrosPlugin;
use crate::references::Reference;

pub const PROJECT_ROOT: &str = "/project";

pub fn project_path(path: &str) -> PathBuf {
  Path::new(PROJECT_ROOT).join(path)
}

/// An empty file-system whose cwd is the project root
pub fn project_fs() -> Arc<InMemoryFileSystem> {
  let fs = InMemoryFileSystem::default();
  fs.set_current_working_directory(Path::new(PROJECT_ROOT));
  Arc::new(fs)
}

/// Run `plugin` over `code` as if it was the contents of `filename`
pub fn transform(
  plugin: &MacrosPlugin,
  code: &str,
  filename: Option<&Path>,
) -> Result<String, RunWithTransformationError> {
  let result = run_transform(code, RunOptions { filename }, |context, program| {
    let host = MacroHost {
      source_map: context.source_map,
      unresolved_mark: context.unresolved_mark,
      global_mark: context.global_mark,
    };
    let state = FileState {
      filename: filename.map(Path::to_path_buf),
    };

    plugin.transform(program, &state, &host)?;
    Ok(())
  })?;

  Ok(result.output_code)
}

/// Add up the numbers in `code`, e.g. `34 + 45`
fn evaluate(code: &str) -> anyhow::Result<f64> {
  code
    .split('+')
    .map(|term| {
      term
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow!("Unable to evaluate {code:?}"))
    })
    .sum()
}

fn is_reference(references: &[Reference], expr: &Expr) -> bool {
  match expr {
    Expr::Ident(ident) => references.iter().any(|reference| reference.is(ident)),
    _ => false,
  }
}

/// Replaces tagged templates, calls and JSX elements of the evaluator with their result
struct Evaluator<'a> {
  references: &'a [Reference],
  error: Option<anyhow::Error>,
}

impl VisitMut for Evaluator<'_> {
  fn visit_mut_expr(&mut self, expr: &mut Expr) {
    expr.visit_mut_children_with(self);

    let code = match &*expr {
      Expr::TaggedTpl(tagged) if is_reference(self.references, &tagged.tag) => tagged
        .tpl
        .quasis
        .iter()
        .map(|quasi| quasi.raw.to_string())
        .collect::<String>(),
      Expr::Call(call) => match (&call.callee, call.args.first()) {
        (Callee::Expr(callee), Some(argument)) if is_reference(self.references, callee) => {
          match &*argument.expr {
            Expr::Lit(Lit::Str(code)) => code.value.to_string(),
            _ => return,
          }
        }
        _ => return,
      },
      Expr::JSXElement(element) => match &element.opening.name {
        JSXElementName::Ident(ident)
          if self.references.iter().any(|reference| reference.is(ident)) =>
        {
          element
            .children
            .iter()
            .filter_map(|child| match child {
              JSXElementChild::JSXText(text) => Some(text.value.to_string()),
              _ => None,
            })
            .collect::<String>()
        }
        _ => return,
      },
      _ => return,
    };

    match evaluate(&code) {
      Ok(value) => {
        *expr = Expr::Lit(Lit::Num(Number {
          span: DUMMY_SP,
          value,
          raw: None,
        }))
      }
      Err(error) => self.error = Some(error),
    }
  }
}

/// Evaluates additions at compile time: `` myEval`34 + 45` ``, `myEval('1 + 2')` and
/// `<MyEval>3 + 4</MyEval>`
pub fn eval_macro() -> Macro {
  create_macro(
    |params| {
      let Some(references) = params.references.get("default") else {
        return Ok(None);
      };

      let mut evaluator = Evaluator {
        references,
        error: None,
      };
      params.program.visit_mut_with(&mut evaluator);

      match evaluator.error {
        Some(error) => Err(error),
        None => Ok(None),
      }
    },
    MacroOptions::default(),
  )
  .unwrap()
}

/// Replaces every usage with a string of the imported name, e.g. `"css"`, and keeps the import
pub fn keep_imports_macro() -> Macro {
  struct NameReplacer<'a>(&'a crate::references::References);

  impl VisitMut for NameReplacer<'_> {
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
      if let Expr::Ident(ident) = expr {
        if let Some(imported_name) = self.0.imported_name_of(ident) {
          *expr = Expr::Lit(Lit::Str(Str::from(imported_name.clone())));
          return;
        }
      }
      expr.visit_mut_children_with(self);
    }
  }

  create_macro(
    |params| {
      params
        .program
        .visit_mut_with(&mut NameReplacer(params.references));
      Ok(Some(MacroResult { keep_imports: true }))
    },
    MacroOptions::default(),
  )
  .unwrap()
}

/// Fails with a [`MacroError`]
pub fn macro_error_macro() -> Macro {
  create_macro(
    |_| Err(MacroError::new("very helpful").into()),
    MacroOptions::default(),
  )
  .unwrap()
}

/// Fails with a plain error
pub fn error_thrower_macro() -> Macro {
  create_macro(|_| Err(anyhow!("very unhelpful")), MacroOptions::default()).unwrap()
}

/// Records the config each invocation received
pub fn configurable_macro(received: Arc<Mutex<Vec<Option<Value>>>>) -> Macro {
  create_macro(
    move |params| {
      received.lock().push(params.config.cloned());
      Ok(None)
    },
    MacroOptions {
      config_name: Some(String::from("configurableMacro")),
    },
  )
  .unwrap()
}

/// Records the imported names and the number of usages of each
pub fn recording_macro(received: Arc<Mutex<Vec<(String, usize)>>>) -> Macro {
  create_macro(
    move |params| {
      received.lock().extend(
        params
          .references
          .iter()
          .map(|(name, references)| (name.to_string(), references.len())),
      );
      Ok(None)
    },
    MacroOptions::default(),
  )
  .unwrap()
}
