//! xlsx sink backed by rust_xlsxwriter

use anyhow::{Context, Result};
use rust_xlsxwriter::{
    Color, DataValidation, DataValidationErrorStyle, Format, FormatAlign, FormatBorder,
    FormatPattern, Workbook, Worksheet,
};

use crate::value::Value;

use super::TableSink;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Largest integer magnitude a numeric cell holds exactly
const MAX_EXACT_INT: u64 = 1 << 53;

/// Single-sheet xlsx workbook built in memory
pub struct XlsxSink {
    workbook: Workbook,
    header_format: Format,
    text_format: Format,
}

impl XlsxSink {
    pub fn new(sheet_name: &str) -> Result<Self> {
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .set_name(sheet_name)
            .with_context(|| format!("Invalid sheet name: {}", sheet_name))?;

        let header_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_font_size(12)
            .set_background_color(Color::RGB(0x366092))
            .set_pattern(FormatPattern::Solid)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(Color::Black);

        // "@" is the built-in text number format
        let text_format = Format::new()
            .set_num_format("@")
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::VerticalCenter);

        Ok(XlsxSink {
            workbook,
            header_format,
            text_format,
        })
    }

    fn sheet(&mut self) -> Result<&mut Worksheet> {
        Ok(self.workbook.worksheet_from_index(0)?)
    }
}

impl TableSink for XlsxSink {
    fn set_cell(&mut self, row: u32, col: u16, value: &Value, text: bool) -> Result<()> {
        if text {
            let s = value.to_string();
            if !s.is_empty() {
                let format = self.text_format.clone();
                self.sheet()?.write_string_with_format(row, col, s, &format)?;
            }
            return Ok(());
        }

        let ws = self.sheet()?;
        match value {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            Value::String(s) => {
                ws.write_string(row, col, s)?;
            }
            Value::Int(i) if i.unsigned_abs() > MAX_EXACT_INT => {
                ws.write_string(row, col, i.to_string())?;
            }
            Value::Int(i) => {
                ws.write_number(row, col, *i as f64)?;
            }
            Value::UInt(u) if *u > MAX_EXACT_INT => {
                ws.write_string(row, col, u.to_string())?;
            }
            Value::UInt(u) => {
                ws.write_number(row, col, *u as f64)?;
            }
            Value::Float(f) => {
                ws.write_number(row, col, *f)?;
            }
            Value::Bool(b) => {
                ws.write_boolean(row, col, *b)?;
            }
            Value::DateTime(_) => {
                ws.write_string(row, col, value.to_string())?;
            }
        }
        Ok(())
    }

    fn set_header(&mut self, col: u16, name: &str) -> Result<()> {
        let format = self.header_format.clone();
        self.sheet()?.write_string_with_format(0, col, name, &format)?;
        Ok(())
    }

    fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        self.sheet()?.set_column_width(col, width)?;
        Ok(())
    }

    fn style_text_column(&mut self, col: u16) -> Result<()> {
        let format = self.text_format.clone();
        self.sheet()?.set_column_format(col, &format)?;
        Ok(())
    }

    fn add_dropdown(&mut self, col: u16, first_row: u32, last_row: u32, options: &[String]) -> Result<()> {
        let options: Vec<&str> = options.iter().map(String::as_str).collect();
        let validation = DataValidation::new()
            .allow_list_strings(&options)
            .context("Invalid dropdown values")?
            .set_error_style(DataValidationErrorStyle::Warning);
        self.sheet()?
            .add_data_validation(first_row, col, last_row, col, &validation)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        self.workbook
            .save_to_buffer()
            .context("Failed to serialize workbook")
    }
}
