//! Template rendering for portal views.

// crates.io
use minijinja::{AutoEscape, Environment, Value};
// self
use crate::{_prelude::*, presenter::{ERROR_VIEW, ViewModel}};

/// Renders named views with a serializable model.
pub trait TemplateEngine
where
	Self: Send + Sync,
{
	/// Renders `view` with `context`.
	fn render(&self, view: &str, context: Value) -> Result<String, minijinja::Error>;
}

/// [`TemplateEngine`] backed by minijinja with the portal's embedded templates.
pub struct MiniJinjaEngine {
	env: Environment<'static>,
}
impl MiniJinjaEngine {
	/// Creates an engine that only knows the embedded templates.
	pub fn new() -> Self {
		let mut env = Environment::new();

		// View names carry no extension, so extension-based escaping would leave them raw.
		env.set_auto_escape_callback(|_| AutoEscape::Html);
		env.set_loader(embedded_template_loader);

		Self { env }
	}

	/// Registers (or replaces) a template, e.g. a branded `error` view.
	pub fn with_template(mut self, name: &'static str, source: &'static str) -> Result<Self, minijinja::Error> {
		self.env.add_template(name, source)?;

		Ok(self)
	}
}
impl Default for MiniJinjaEngine {
	fn default() -> Self {
		Self::new()
	}
}
impl TemplateEngine for MiniJinjaEngine {
	fn render(&self, view: &str, context: Value) -> Result<String, minijinja::Error> {
		self.env.get_template(view)?.render(context)
	}
}
impl Debug for MiniJinjaEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("MiniJinjaEngine(..)")
	}
}

/// Renders the `error` view, falling back to a static page if the template fails.
pub fn render_error_view(engine: &dyn TemplateEngine, view: &ViewModel) -> String {
	match engine.render(ERROR_VIEW, Value::from_serialize(view)) {
		Ok(html) => html,
		Err(e) => {
			tracing::error!(error = %e, status = view.status, "error template failed, using fallback page");

			fallback_error_html(view)
		},
	}
}

fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
	let source = match name {
		ERROR_VIEW => Some(include_str!("view/error.html")),
		_ => None,
	};

	Ok(source.map(str::to_owned))
}

fn fallback_error_html(view: &ViewModel) -> String {
	format!(
		"<!DOCTYPE html>\n<html><head><title>{status}</title></head>\n<body><h1>{status}</h1><p>{message}</p></body></html>",
		status = view.status,
		message = escape_html(&view.message),
	)
}

fn escape_html(raw: &str) -> String {
	let mut escaped = String::with_capacity(raw.len());

	for c in raw.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#x27;"),
			_ => escaped.push(c),
		}
	}

	escaped
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct BrokenEngine;
	impl TemplateEngine for BrokenEngine {
		fn render(&self, view: &str, _context: Value) -> Result<String, minijinja::Error> {
			Err(minijinja::Error::new(minijinja::ErrorKind::TemplateNotFound, view.to_owned()))
		}
	}

	#[test]
	fn error_view_renders_status_and_message() {
		let html = render_error_view(
			&MiniJinjaEngine::new(),
			&ViewModel { message: "Not Found".into(), status: 404 },
		);

		assert!(html.contains("<h1>404</h1>"));
		assert!(html.contains("Not Found"));
	}

	#[test]
	fn messages_are_html_escaped() {
		let view = ViewModel { message: "<script>alert(1)</script>".into(), status: 500 };
		let html = render_error_view(&MiniJinjaEngine::new(), &view);

		assert!(!html.contains("<script>"));
		assert!(html.contains("&lt;script&gt;"));
	}

	#[test]
	fn broken_templates_use_the_fallback_page() {
		let view = ViewModel { message: "a & b".into(), status: 502 };
		let html = render_error_view(&BrokenEngine, &view);

		assert!(html.contains("<h1>502</h1>"));
		assert!(html.contains("a &amp; b"));
	}

	#[test]
	fn custom_templates_override_the_embedded_view() {
		let engine = MiniJinjaEngine::new()
			.with_template(ERROR_VIEW, "oops {{ status }}")
			.expect("Template should compile.");
		let html = render_error_view(&engine, &ViewModel { message: String::new(), status: 418 });

		assert_eq!(html, "oops 418");
	}
}
