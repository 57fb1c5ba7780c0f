use std::path::Path;
use std::string::FromUtf8Error;

use swc_core::common::input::StringInput;
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, Globals, Mark, SourceMap, GLOBALS};
use swc_core::ecma::ast::{EsVersion, Program};
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::parser::lexer::Lexer;
use swc_core::ecma::parser::{EsSyntax, Parser, Syntax};
use swc_core::ecma::transforms::base::resolver;
use swc_core::ecma::visit::VisitMutWith;

pub struct RunContext {
  /// Source-map in use
  pub source_map: Lrc<SourceMap>,
  /// Global mark from SWC resolver
  pub global_mark: Mark,
  /// Unresolved mark from SWC resolver
  pub unresolved_mark: Mark,
}

pub struct RunTransformResult {
  pub output_code: String,
}

/// Options controlling how source code is parsed before a transformation runs
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions<'a> {
  /// Path of the file being transformed, used as the source file name
  pub filename: Option<&'a Path>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunWithTransformationError {
  #[error("Failed to parse module")]
  SwcParse(swc_core::ecma::parser::error::Error),
  #[error("IO Error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Invalid utf-8 output: {0}")]
  InvalidUtf8Output(#[from] FromUtf8Error),
  #[error(transparent)]
  Transform(#[from] anyhow::Error),
}

/// Runner of SWC transformations
///
/// * Parse `code` with SWC (ES syntax with JSX enabled, as a module or a script)
/// * Run the SWC resolver so identifiers carry their binding context
/// * Run the fallible `transform` over the program
/// * Return the generated code
///
/// An error returned from `transform` aborts code generation and is returned as
/// `RunWithTransformationError::Transform`.
pub fn run_transform(
  code: &str,
  options: RunOptions,
  transform: impl FnOnce(RunContext, &mut Program) -> anyhow::Result<()>,
) -> Result<RunTransformResult, RunWithTransformationError> {
  let source_map = Lrc::new(SourceMap::default());
  let file_name = match options.filename {
    Some(filename) => FileName::Real(filename.to_path_buf()),
    None => FileName::Anon,
  };
  let source_file = source_map.new_source_file(Lrc::new(file_name), code.into());

  let lexer = Lexer::new(
    Syntax::Es(EsSyntax {
      jsx: true,
      ..Default::default()
    }),
    EsVersion::latest(),
    StringInput::from(&*source_file),
    None,
  );

  let mut parser = Parser::new_from(lexer);
  let mut program = parser
    .parse_program()
    .map_err(RunWithTransformationError::SwcParse)?;

  GLOBALS.set(
    &Globals::new(),
    || -> Result<RunTransformResult, RunWithTransformationError> {
      let global_mark = Mark::new();
      let unresolved_mark = Mark::new();
      program.visit_mut_with(&mut resolver(unresolved_mark, global_mark, false));

      let context = RunContext {
        source_map: source_map.clone(),
        global_mark,
        unresolved_mark,
      };
      transform(context, &mut program)?;

      let mut output_buffer = vec![];
      let writer = JsWriter::new(source_map.clone(), "\n", &mut output_buffer, None);
      let mut emitter = swc_core::ecma::codegen::Emitter {
        cfg: Default::default(),
        cm: source_map.clone(),
        comments: None,
        wr: writer,
      };
      match &program {
        Program::Module(module) => emitter.emit_module(module)?,
        Program::Script(script) => emitter.emit_script(script)?,
      }

      let output_code = String::from_utf8(output_buffer)?;

      Ok(RunTransformResult { output_code })
    },
  )
}
