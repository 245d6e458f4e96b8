use std::path::PathBuf;

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// A file read from, or written to, a repository
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct File {
  pub path: PathBuf,
  pub data: Vec<u8>,
}

/// Values available to Quick Start templates
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateParameters {
  pub cluster_name: String,
  pub cluster_region: String,
}

/// Renders `*.tmpl` files and passes everything else through
pub struct TemplateProcessor {
  registry: Handlebars<'static>,
  params: TemplateParameters,
}

impl TemplateProcessor {
  pub fn new(params: TemplateParameters) -> Self {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);

    Self { registry, params }
  }

  pub fn process(&self, file: File) -> Result<File> {
    let Some(name) = file.path.to_str().and_then(|p| p.strip_suffix(TEMPLATE_SUFFIX)) else {
      return Ok(file);
    };

    let source = String::from_utf8(file.data).with_context(|| format!("template {name} is not valid UTF-8"))?;
    let rendered = self
      .registry
      .render_template(&normalize(&source), &self.params)
      .with_context(|| format!("cannot render template {}", file.path.display()))?;

    Ok(File {
      path: PathBuf::from(name),
      data: rendered.into_bytes(),
    })
  }
}

/// Quick Start repositories reference parameters as `{{ .ClusterName }}`
fn normalize(source: &str) -> String {
  source.replace("{{ .", "{{ ").replace("{{.", "{{")
}
