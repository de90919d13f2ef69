mod contract;
mod dot_a;
mod dot_b;
mod dot_e;
mod overlay;

use std::io::Cursor;

use crate::{
    errors::Error,
    formatting::OutputFormat,
    parser::{ShefParser, Summary},
    record::OutputRecord,
};

pub(crate) struct Run {
    pub records: Vec<OutputRecord>,
    pub lines: Vec<String>,
    pub summary: Summary,
}

pub(crate) fn try_parse(
    input: &str,
    shefit_times: bool,
    reject_problematic: bool,
) -> Result<Run, Error> {
    let mut parser = ShefParser::new(OutputFormat::Text1, None, shefit_times, reject_problematic)?;
    parser.set_input_reader("<test>", Box::new(Cursor::new(input.to_string())));
    let mut records = Vec::new();
    let mut lines = Vec::new();
    let summary = parser.parse_records(|parser, record| {
        lines.push(record.render(OutputFormat::Text1, parser.tables())?);
        records.push(record);
        Ok(())
    })?;
    Ok(Run {
        records,
        lines,
        summary,
    })
}

pub(crate) fn parse(input: &str, shefit_times: bool, reject_problematic: bool) -> Run {
    try_parse(input, shefit_times, reject_problematic).unwrap()
}
