use std::{fs::File, io::prelude::*};

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled, settings::Style};

use crate::{addon, label};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  /// Human readable table written to stdout
  #[default]
  Table,
  /// JSON format used for logging or writing to a *.json file
  Json,
  /// YAML format
  Yaml,
}

/// Data that can be printed in every output format
pub trait Printable: Serialize {
  fn to_table(&self) -> String;
}

fn table<R: Tabled>(rows: impl IntoIterator<Item = R>) -> String {
  let mut table = Table::new(rows);
  table.with(Style::sharp());
  table.to_string()
}

impl Printable for Vec<label::Summary> {
  fn to_table(&self) -> String {
    table(self.iter().map(label::SummaryRow::from))
  }
}

impl Printable for Vec<addon::Summary> {
  fn to_table(&self) -> String {
    table(self.iter().map(addon::SummaryRow::from))
  }
}

/// Renders the value in the requested format
pub fn render<P: Printable>(value: &P, format: Format) -> Result<String> {
  let rendered = match format {
    Format::Table => value.to_table(),
    Format::Json => serde_json::to_string_pretty(value)?,
    Format::Yaml => serde_yaml::to_string(value)?,
  };

  Ok(rendered)
}

/// Writes the rendered value to a file, or stdout when no file is given
pub fn print<P: Printable>(value: &P, format: Format, filename: Option<&str>) -> Result<()> {
  let output = render(value, format)?;

  match filename {
    Some(filename) => {
      let mut file = File::create(filename)?;
      file.write_all(output.as_bytes())?;
    }
    None => {
      println!("{output}");
    }
  }

  Ok(())
}
