//! Bootstrap and the document-level interface.
//!
//! An [`Engine`] owns one root environment. Creating it registers every primitive and
//! then evaluates the embedded prelude into that same environment, so prelude helpers
//! such as `fun`, `map` or `h1` are visible to every document evaluated afterwards.
//!
//! ```
//! use bebop::Engine;
//!
//! let engine = Engine::new().unwrap();
//! let html = engine.render(r#"(def [title] "Notes") (h1 title) (p (concat "n = " (echo (fac 5))))"#).unwrap();
//! assert_eq!(html, "<h1>Notes</h1><p>n = 120</p>");
//! ```

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::Value;
use crate::evaluator::{Environment, create_global_env, eval};
use crate::reader::parse_with_config;
use crate::{Error, ParseConfig};

const PRELUDE: &str = include_str!("prelude.lisp");

/// Options for creating an [`Engine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Reader options for documents passed to [`Engine::eval_source`] and
    /// [`Engine::render`]. The prelude is always read with the defaults.
    pub parse: ParseConfig,
    /// Evaluate the standard-library prelude at bootstrap
    pub load_prelude: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            parse: ParseConfig::default(),
            load_prelude: true,
        }
    }
}

/// An [`Error`] together with the top-level form that raised it
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentError {
    /// Zero-based index of the failing form; `None` when the source did not read
    pub form_index: Option<usize>,
    pub error: Error,
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form_index {
            Some(index) => write!(f, "in top-level form #{}: {}", index + 1, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<Error> for DocumentError {
    fn from(error: Error) -> Self {
        DocumentError {
            form_index: None,
            error,
        }
    }
}

/// Evaluation engine with a persistent root environment.
///
/// Closures defined at top level capture the root frame that binds them, so the
/// root is part of reference cycles. Dropping the engine clears the root frame to
/// break them; values handed out earlier keep working only as plain data.
pub struct Engine {
    env: Rc<Environment>,
    config: EngineConfig,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine with all primitives and the prelude loaded
    pub fn new() -> Result<Self, DocumentError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, DocumentError> {
        let engine = Engine {
            env: create_global_env(),
            config,
        };
        if config.load_prelude {
            let forms = parse_with_config(PRELUDE, ParseConfig::default())?;
            engine.eval_forms(&forms)?;
            debug!(forms = forms.len(), "prelude loaded");
        }
        Ok(engine)
    }

    /// Engine with the primitives only
    pub fn bare() -> Self {
        Engine {
            env: create_global_env(),
            config: EngineConfig {
                load_prelude: false,
                ..EngineConfig::default()
            },
        }
    }

    /// The root environment, for host registration of further builtins
    pub fn env(&self) -> &Rc<Environment> {
        &self.env
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate a single expression in the root environment
    pub fn eval(&self, expr: &Value) -> Result<Value, Error> {
        eval(expr, &self.env)
    }

    /// Evaluate top-level forms in order, stopping at the first failure. Bindings
    /// made by earlier forms stay in place.
    pub fn eval_forms(&self, forms: &[Value]) -> Result<Vec<Value>, DocumentError> {
        forms
            .iter()
            .enumerate()
            .map(|(index, form)| {
                trace!(index, %form, "evaluating top-level form");
                self.eval(form).map_err(|error| {
                    debug!(index, %error, "top-level form failed");
                    DocumentError {
                        form_index: Some(index),
                        error,
                    }
                })
            })
            .collect()
    }

    /// Read `source` and evaluate every form in it
    pub fn eval_source(&self, source: &str) -> Result<Vec<Value>, DocumentError> {
        let forms = parse_with_config(source, self.config.parse)?;
        self.eval_forms(&forms)
    }

    /// Evaluate `source` and concatenate the document text of each result
    pub fn render(&self, source: &str) -> Result<String, DocumentError> {
        Ok(self
            .eval_source(source)?
            .iter()
            .map(Value::to_document_text)
            .collect())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.env.clear();
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, sexpr, sym, val};

    #[test]
    fn test_prelude_loads() {
        let engine = Engine::new().unwrap();
        for name in [
            "fun", "nil", "true", "false", "not", "is-nil", "not-nil", "empty", "inc", "dec",
            "first", "cons", "len", "nth", "last", "take", "drop", "reverse", "foldl", "sum",
            "product", "rec", "rec-list", "map", "filter", "fac", "gauss", "gcd", "h1", "h6",
            "p", "ul", "a", "img", "hr",
        ] {
            assert!(engine.env().get(name).is_some(), "prelude should define {name}");
        }
    }

    #[test]
    fn test_bare_engine_has_primitives_only() {
        let engine = Engine::bare();
        assert!(engine.env().get("+").is_some());
        assert!(engine.env().get("fun").is_none());
        assert!(!engine.config().load_prelude);

        let config = EngineConfig {
            load_prelude: false,
            ..EngineConfig::default()
        };
        let engine = Engine::with_config(config).unwrap();
        assert!(engine.env().get("map").is_none());
    }

    #[test]
    fn test_eval_forms_returns_one_value_per_form() {
        let engine = Engine::new().unwrap();
        let forms = vec![
            sexpr(vec![sym("def"), val(vec![sym("x")]), val(2)]),
            sexpr(vec![sym("*"), sym("x"), val(21)]),
            val("text"),
        ];
        assert_eq!(
            engine.eval_forms(&forms).unwrap(),
            vec![nil(), val(42), val("text")]
        );
    }

    #[test]
    fn test_failure_reports_form_index() {
        let engine = Engine::new().unwrap();
        let err = engine.eval_source("(def [y] 1) (+ y 1) (head [])").unwrap_err();
        assert_eq!(err.form_index, Some(2));
        assert_eq!(err.error, Error::EmptyListAccess("head".to_owned()));
        assert!(err.to_string().starts_with("in top-level form #3: "));
        assert!(std::error::Error::source(&err).is_some());

        // Earlier bindings survive the failed document
        assert_eq!(engine.eval_source("y").unwrap(), vec![val(1)]);
    }

    #[test]
    fn test_drop_releases_root_environment() {
        let engine = Engine::new().unwrap();
        engine.eval_source("(def [keep] (\\ [x] [x]))").unwrap();
        let root = Rc::downgrade(engine.env());
        let prelude_fn = Rc::downgrade(match &engine.env().get("map").unwrap() {
            Value::Lambda(lambda) => lambda,
            other => panic!("expected a lambda, got {other}"),
        });
        drop(engine);
        assert!(root.upgrade().is_none());
        assert!(prelude_fn.upgrade().is_none());

        let bare = Engine::bare();
        let root = Rc::downgrade(bare.env());
        drop(bare);
        assert!(root.upgrade().is_none());
    }

    #[test]
    fn test_syntax_error_has_no_form_index() {
        let engine = Engine::new().unwrap();
        let err = engine.eval_source("(+ 1 2").unwrap_err();
        assert_eq!(err.form_index, None);
        assert!(matches!(err.error, Error::SyntaxError(_)));
    }

    #[test]
    fn test_parse_config_is_applied_to_documents() {
        let config = EngineConfig {
            parse: ParseConfig {
                handle_comments: false,
            },
            load_prelude: true,
        };
        // Prelude comments still read fine
        let engine = Engine::with_config(config).unwrap();
        assert!(engine.eval_source("(+ 1 2) ; trailing").is_err());
        assert_eq!(engine.render("(inc 1)").unwrap(), "2");
    }
}
